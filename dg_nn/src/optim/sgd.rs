//! Stochastic Gradient Descent optimizer.

use dg_core::{Decimal, Tape, Value};
use rust_decimal_macros::dec;

use super::Optimizer;
use crate::error::{Error, Result};

/// Learning rate used when none is configured.
pub const DEFAULT_LEARNING_RATE: Decimal = dec!(0.01);

/// Fixed-rate gradient descent: `param += (-lr) * grad`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sgd {
    /// Learning rate.
    pub lr: Decimal,
}

impl Sgd {
    /// Create a new SGD optimizer.
    pub fn new(lr: Decimal) -> Self {
        Sgd { lr }
    }
}

impl Default for Sgd {
    fn default() -> Self {
        Sgd::new(DEFAULT_LEARNING_RATE)
    }
}

impl Optimizer for Sgd {
    fn optimize(&mut self, tape: &mut Tape, parameters: &[Value]) -> Result<()> {
        let rate = -self.lr;

        // Compute every update first so a failure leaves all parameters as they were
        let mut updates = Vec::with_capacity(parameters.len());
        for &p in parameters {
            let node = tape.node(p)?;
            let next = rate
                .checked_mul(node.grad())
                .and_then(|step| node.data().checked_add(step))
                .ok_or(Error::Core(dg_core::Error::Arithmetic { op: "sgd" }))?;
            updates.push((p, next));
        }

        for (p, next) in updates {
            tape.set_data(p, next)?;
        }
        Ok(())
    }

    fn learning_rate(&self) -> Option<Decimal> {
        Some(self.lr)
    }
}
