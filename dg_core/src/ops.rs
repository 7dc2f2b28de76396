//! Local gradient computations for each operation.
//!
//! Each operation knows how to compute its local gradients with respect to its
//! argument slots. The backward pass multiplies them by the node's accumulated
//! gradient and adds the products onto the arguments.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, MathematicalOps};

use crate::error::{Error, Result};
use crate::node::Op;

/// Compute local gradients for a node given its arguments' values and its own value.
///
/// Returns one partial derivative d(output)/d(args[i]) per argument slot.
pub fn local_gradients(op: &Op, args: &[Decimal], out: Decimal) -> Result<Vec<Decimal>> {
    let grads = match *op {
        // Leaf nodes have no arguments
        Op::Leaf => vec![],

        // z = a + b: dz/da = 1, dz/db = 1
        Op::Add => vec![Decimal::ONE, Decimal::ONE],

        // z = a - b: dz/da = 1, dz/db = -1
        Op::Sub => vec![Decimal::ONE, Decimal::NEGATIVE_ONE],

        // z = a * b: dz/da = b, dz/db = a
        Op::Mul => vec![args[1], args[0]],

        Op::Div => {
            // z = a / b: dz/da = 1/b, dz/db = -a/b^2
            let (a, b) = (args[0], args[1]);
            if b.is_zero() {
                return Err(Error::DivisionByZero);
            }
            let da = Decimal::ONE
                .checked_div(b)
                .ok_or(Error::Arithmetic { op: "div" })?;
            let db = b
                .checked_mul(b)
                .and_then(|b2| a.checked_div(b2))
                .ok_or(Error::Arithmetic { op: "div" })?;
            vec![da, -db]
        }

        // z = a^0 is constant
        Op::Pow { exponent } if exponent.is_zero() => vec![Decimal::ZERO],

        Op::Pow { exponent } => {
            // z = a^c: dz/da = c * a^(c-1)
            let lowered = exponent
                .checked_sub(Decimal::ONE)
                .ok_or(Error::Arithmetic { op: "pow" })?;
            let da = checked_pow(args[0], lowered)?
                .checked_mul(exponent)
                .ok_or(Error::Arithmetic { op: "pow" })?;
            vec![da]
        }

        // z = max(0, a): dz/da = 1 where the unit is active
        Op::Relu => {
            if out > Decimal::ZERO {
                vec![Decimal::ONE]
            } else {
                vec![Decimal::ZERO]
            }
        }
    };

    Ok(grads)
}

/// `base ^ exponent` in decimal arithmetic.
///
/// Integral exponents are computed by repeated multiplication; fractional ones
/// go through `powd`, which rejects negative bases.
pub fn checked_pow(base: Decimal, exponent: Decimal) -> Result<Decimal> {
    let overflow = Error::Arithmetic { op: "pow" };

    if exponent.fract().is_zero() {
        let e = exponent.to_i64().ok_or(overflow.clone())?;
        let magnitude = base.checked_powu(e.unsigned_abs()).ok_or(overflow.clone())?;
        if e >= 0 {
            return Ok(magnitude);
        }
        if magnitude.is_zero() {
            return Err(Error::DivisionByZero);
        }
        return Decimal::ONE.checked_div(magnitude).ok_or(overflow);
    }

    if base.is_zero() && exponent.is_sign_negative() {
        return Err(Error::DivisionByZero);
    }
    base.checked_powd(exponent).ok_or(overflow)
}
