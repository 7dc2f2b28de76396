//! # dg_nn - Neural Networks on the dg_core tape
//!
//! This crate builds a small feed-forward network out of scalar tape nodes and
//! trains it one step at a time:
//!
//! - **Layers**: Neuron (ReLU unit), Layer, Mlp
//! - **Losses**: Mean Squared Error, or any `Fn(&mut Tape, &[Value], &[Value])`
//! - **Optimizers**: SGD, or any `FnMut(&mut Tape, &[Value])`
//! - **Training**: NeuralNetwork, a phase state machine running
//!   forward, loss, backward and optimize as one step
//! - **Observation**: StepHooks for logging and in-memory metrics
//!
//! ## Example: Training a Small MLP
//!
//! ```
//! use dg_nn::{NetworkConfig, NeuralNetwork, Phase};
//! use rust_decimal_macros::dec;
//!
//! let config = NetworkConfig::new(2, [4, 1]).with_seed(7);
//! let mut net = NeuralNetwork::new(&config).unwrap();
//!
//! for _ in 0..10 {
//!     let loss = net.step(&[dec!(1), dec!(0)], &[dec!(1)]).unwrap();
//!     let _ = net.tape().data(loss).unwrap();
//! }
//!
//! assert_eq!(net.phase(), Phase::Static);
//! assert_eq!(net.steps(), 10);
//! ```

mod config;
mod error;
pub mod hooks;
pub mod layers;
pub mod loss;
mod network;
pub mod optim;
mod shared;

// Re-exports for convenience
pub use config::NetworkConfig;
pub use error::{Error, Result};
pub use hooks::{MetricsHooks, NoopHooks, StepHooks, StepMetrics, StepReport, TracingHooks};
pub use layers::{Layer, Mlp, Neuron};
pub use loss::{mse_loss, Loss, MeanSquaredError};
pub use network::{NeuralNetwork, Phase, PhaseWatch, Stage};
pub use optim::{Optimizer, Sgd};
pub use shared::SharedNetwork;
