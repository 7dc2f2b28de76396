//! Network building blocks: neurons, dense layers, and the multi-layer perceptron.

mod layer;
mod mlp;
mod neuron;

pub use layer::Layer;
pub use mlp::Mlp;
pub use neuron::Neuron;

use dg_core::Decimal;
use rand::Rng;

/// Uniform draw from [-1, 1) with six decimal places.
///
/// Drawn as an integer count of millionths so the decimal is exact and
/// reproducible for a seeded generator.
pub fn uniform_unit<R: Rng + ?Sized>(rng: &mut R) -> Decimal {
    Decimal::new(rng.gen_range(-1_000_000i64..1_000_000), 6)
}
