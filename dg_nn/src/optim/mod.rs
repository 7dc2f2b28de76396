//! Optimizers for neural network training.
//!
//! An optimizer receives the network's parameter leaves in their fixed order
//! and updates their data in place from the gradients accumulated by the last
//! backward pass.

mod sgd;

pub use sgd::{Sgd, DEFAULT_LEARNING_RATE};

use dg_core::{Decimal, Tape, Value};

use crate::error::Result;

/// Strategy updating parameter leaves in place.
///
/// Implementations must validate every update before writing any of them, so a
/// failed call leaves all parameters untouched.
pub trait Optimizer {
    fn optimize(&mut self, tape: &mut Tape, parameters: &[Value]) -> Result<()>;

    /// Learning rate, when the strategy has a single fixed one.
    fn learning_rate(&self) -> Option<Decimal> {
        None
    }
}

impl<F> Optimizer for F
where
    F: FnMut(&mut Tape, &[Value]) -> Result<()>,
{
    fn optimize(&mut self, tape: &mut Tape, parameters: &[Value]) -> Result<()> {
        self(tape, parameters)
    }
}

/// Reset the gradient of every parameter to zero.
pub fn zero_grad(tape: &mut Tape, parameters: &[Value]) -> Result<()> {
    for &p in parameters {
        tape.zero_grad(p)?;
    }
    Ok(())
}
