//! Finite difference utilities for gradient verification.
//!
//! Provides numerical gradient computation for testing autodiff correctness.

use rust_decimal::Decimal;

use crate::error::{Error, Result};

/// Compute gradients using central finite differences.
///
/// # Arguments
/// * `f` - Function that takes a slice of variable values and returns a scalar
/// * `point` - The point at which to compute gradients
/// * `eps` - Step size for finite differences (typically 1e-6 to 1e-4)
///
/// # Returns
/// Vector of partial derivatives [df/dx_0, df/dx_1, ...] at the given point
///
/// # Example
/// ```
/// use dg_core::finite_diff_grad;
/// use rust_decimal::Decimal;
///
/// // f(x, y) = x^2 + y^2
/// // df/dx = 2x, df/dy = 2y
/// let f = |v: &[Decimal]| Ok(v[0] * v[0] + v[1] * v[1]);
/// let grads = finite_diff_grad(f, &[Decimal::from(3), Decimal::from(4)], Decimal::new(1, 6)).unwrap();
///
/// assert_eq!(grads[0], Decimal::from(6)); // df/dx at x=3
/// assert_eq!(grads[1], Decimal::from(8)); // df/dy at y=4
/// ```
pub fn finite_diff_grad<F>(f: F, point: &[Decimal], eps: Decimal) -> Result<Vec<Decimal>>
where
    F: Fn(&[Decimal]) -> Result<Decimal>,
{
    let overflow = Error::Arithmetic { op: "finite_diff" };
    let two_eps = eps.checked_mul(Decimal::TWO).ok_or(overflow.clone())?;
    if two_eps.is_zero() {
        return Err(Error::DivisionByZero);
    }

    let mut grads = Vec::with_capacity(point.len());
    let mut perturbed = point.to_vec();

    for i in 0..point.len() {
        // Central difference: (f(x + eps) - f(x - eps)) / (2 * eps)
        perturbed[i] = point[i].checked_add(eps).ok_or(overflow.clone())?;
        let f_plus = f(&perturbed)?;

        perturbed[i] = point[i].checked_sub(eps).ok_or(overflow.clone())?;
        let f_minus = f(&perturbed)?;

        perturbed[i] = point[i]; // restore

        let slope = f_plus
            .checked_sub(f_minus)
            .and_then(|d| d.checked_div(two_eps))
            .ok_or(overflow.clone())?;
        grads.push(slope);
    }

    Ok(grads)
}

/// Compute the maximum absolute difference between two gradient vectors.
///
/// Useful for comparing autodiff gradients against finite difference gradients.
pub fn max_grad_error(grad1: &[Decimal], grad2: &[Decimal]) -> Decimal {
    assert_eq!(grad1.len(), grad2.len(), "gradient vectors differ in length");
    grad1
        .iter()
        .zip(grad2.iter())
        .map(|(a, b)| (a - b).abs())
        .fold(Decimal::ZERO, Decimal::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_finite_diff_quadratic() {
        // f(x, y) = x^2 + 2*x*y + y^2
        // df/dx = 2x + 2y
        // df/dy = 2x + 2y
        let f = |v: &[Decimal]| Ok(v[0] * v[0] + dec!(2) * v[0] * v[1] + v[1] * v[1]);
        let grads = finite_diff_grad(f, &[dec!(1), dec!(2)], dec!(0.0001)).unwrap();

        assert_eq!(grads[0], dec!(6)); // 2*1 + 2*2 = 6
        assert_eq!(grads[1], dec!(6));
    }

    #[test]
    fn test_finite_diff_propagates_errors() {
        let f = |_: &[Decimal]| Err(Error::DivisionByZero);
        assert_eq!(
            finite_diff_grad(f, &[dec!(1)], dec!(0.001)),
            Err(Error::DivisionByZero)
        );
    }

    #[test]
    fn test_zero_step_rejected() {
        let f = |v: &[Decimal]| Ok(v[0]);
        assert!(finite_diff_grad(f, &[dec!(1)], dec!(0)).is_err());
    }

    #[test]
    fn test_max_grad_error() {
        let g1 = vec![dec!(1.0), dec!(2.0), dec!(3.0)];
        let g2 = vec![dec!(1.1), dec!(2.0), dec!(2.8)];

        assert_eq!(max_grad_error(&g1, &g2), dec!(0.2));
    }
}
