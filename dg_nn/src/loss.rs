//! Loss functions.
//!
//! A loss reduces the network output and the expectation to one scalar node
//! built from ordinary tape operations, so backpropagating from it
//! differentiates through the whole network.

use dg_core::{Decimal, Tape, Value};

use crate::error::{Error, Result};

/// Strategy reducing `(output, expectation)` to a scalar loss node.
pub trait Loss {
    fn loss(&self, tape: &mut Tape, output: &[Value], expectation: &[Value]) -> Result<Value>;

    fn name(&self) -> &str {
        "loss"
    }
}

impl<F> Loss for F
where
    F: Fn(&mut Tape, &[Value], &[Value]) -> Result<Value>,
{
    fn loss(&self, tape: &mut Tape, output: &[Value], expectation: &[Value]) -> Result<Value> {
        self(tape, output, expectation)
    }
}

/// Mean Squared Error loss: (1/N) * Σ (y_i - ŷ_i)^2
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanSquaredError;

impl Loss for MeanSquaredError {
    fn loss(&self, tape: &mut Tape, output: &[Value], expectation: &[Value]) -> Result<Value> {
        mse_loss(tape, output, expectation)
    }

    fn name(&self) -> &str {
        "mse"
    }
}

/// Mean squared error as a free function.
///
/// Fails with [`Error::EmptyOutput`] or [`Error::ShapeMismatch`] before
/// recording anything on the tape.
pub fn mse_loss(tape: &mut Tape, output: &[Value], expectation: &[Value]) -> Result<Value> {
    if output.is_empty() {
        return Err(Error::EmptyOutput);
    }
    if output.len() != expectation.len() {
        return Err(Error::ShapeMismatch {
            expected: output.len(),
            got: expectation.len(),
        });
    }

    let mut squares = Vec::with_capacity(output.len());
    for (&y, &y_hat) in output.iter().zip(expectation) {
        let diff = tape.sub(y, y_hat)?;
        squares.push(tape.pow(diff, Decimal::TWO)?);
    }

    let total = tape.sum(&squares)?;
    let divisor = tape.constant(Decimal::from(output.len()));
    Ok(tape.div(total, divisor)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn leaves(tape: &mut Tape, data: &[Decimal], prefix: &str) -> Vec<Value> {
        data.iter()
            .enumerate()
            .map(|(i, &d)| tape.input(d, format!("{prefix}{i}")))
            .collect()
    }

    #[test]
    fn test_mse_loss_zero() {
        let mut tape = Tape::new();
        let pred = leaves(&mut tape, &[dec!(1), dec!(2)], "y");
        let target = leaves(&mut tape, &[dec!(1), dec!(2)], "t");

        let loss = mse_loss(&mut tape, &pred, &target).unwrap();
        assert_eq!(tape.data(loss).unwrap(), dec!(0));

        tape.backward(loss).unwrap();
        assert_eq!(tape.grads(&pred).unwrap(), vec![dec!(0), dec!(0)]);
    }

    #[test]
    fn test_mse_loss_nonzero() {
        let mut tape = Tape::new();
        let pred = leaves(&mut tape, &[dec!(3)], "y");
        let target = leaves(&mut tape, &[dec!(1)], "t");

        let loss = mse_loss(&mut tape, &pred, &target).unwrap();
        assert_eq!(tape.data(loss).unwrap(), dec!(4));

        // dL/dy = 2(y - t)/N = 4, dL/dt = -4
        tape.backward(loss).unwrap();
        assert_eq!(tape.grad(pred[0]).unwrap(), dec!(4));
        assert_eq!(tape.grad(target[0]).unwrap(), dec!(-4));
    }

    #[test]
    fn test_mse_loss_mean() {
        let mut tape = Tape::new();
        let pred = leaves(&mut tape, &[dec!(0), dec!(0)], "y");
        let target = leaves(&mut tape, &[dec!(1), dec!(3)], "t");

        let loss = mse_loss(&mut tape, &pred, &target).unwrap();
        assert_eq!(tape.data(loss).unwrap(), dec!(5));

        tape.backward(loss).unwrap();
        // 2(y - t)/2
        assert_eq!(tape.grads(&pred).unwrap(), vec![dec!(-1), dec!(-3)]);
    }

    #[test]
    fn test_mse_shape_errors() {
        let mut tape = Tape::new();
        let pred = leaves(&mut tape, &[dec!(1), dec!(2)], "y");
        let target = leaves(&mut tape, &[dec!(1)], "t");
        let before = tape.len();

        assert_eq!(
            mse_loss(&mut tape, &pred, &target),
            Err(Error::ShapeMismatch { expected: 2, got: 1 })
        );
        assert_eq!(mse_loss(&mut tape, &[], &[]), Err(Error::EmptyOutput));
        assert_eq!(tape.len(), before);
    }

    #[test]
    fn test_closure_loss() {
        // Sum of absolute-ish error via relu, as a custom strategy
        let l1 = |tape: &mut Tape, out: &[Value], exp: &[Value]| -> Result<Value> {
            let d = tape.sub(out[0], exp[0])?;
            Ok(tape.relu(d)?)
        };

        let mut tape = Tape::new();
        let pred = leaves(&mut tape, &[dec!(5)], "y");
        let target = leaves(&mut tape, &[dec!(2)], "t");
        let loss = Loss::loss(&l1, &mut tape, &pred, &target).unwrap();
        assert_eq!(tape.data(loss).unwrap(), dec!(3));
        assert_eq!(MeanSquaredError.name(), "mse");
    }
}
