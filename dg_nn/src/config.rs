//! Network configuration.
//!
//! Deserialized from the `[network]` table of a TOML file, or built in code.
//! Call [`NetworkConfig::validate`] before use; [`crate::NeuralNetwork::new`]
//! does so itself.

use dg_core::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::optim::DEFAULT_LEARNING_RATE;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Number of inputs the first layer accepts.
    pub input_shape: usize,
    /// Output count of each layer, in order.
    pub shape: Vec<usize>,
    /// Gradient descent step size.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: Decimal,
    /// Seed for weight initialization. Unseeded networks draw from entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_learning_rate() -> Decimal {
    DEFAULT_LEARNING_RATE
}

impl NetworkConfig {
    pub fn new(input_shape: usize, shape: impl Into<Vec<usize>>) -> Self {
        NetworkConfig {
            input_shape,
            shape: shape.into(),
            learning_rate: DEFAULT_LEARNING_RATE,
            seed: None,
        }
    }

    pub fn with_learning_rate(mut self, learning_rate: Decimal) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Width of the network's prediction.
    pub fn output_shape(&self) -> usize {
        self.shape.last().copied().unwrap_or(self.input_shape)
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_shape == 0 {
            return Err(Error::InvalidConfig("input_shape must be positive".into()));
        }
        if self.shape.is_empty() {
            return Err(Error::InvalidConfig("network needs at least one layer".into()));
        }
        if let Some(i) = self.shape.iter().position(|&n| n == 0) {
            return Err(Error::InvalidConfig(format!("layer {i} has no neurons")));
        }
        if self.learning_rate <= Decimal::ZERO {
            return Err(Error::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}
