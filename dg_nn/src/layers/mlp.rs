//! Multi-layer perceptron.

use dg_core::{Tape, Value};
use rand::Rng;

use super::Layer;
use crate::error::{Error, Result};

/// Layers applied in sequence; layer `i`'s output count is layer `i + 1`'s degree.
#[derive(Debug, Clone)]
pub struct Mlp {
    layers: Vec<Layer>,
    input_shape: usize,
}

impl Mlp {
    /// Build an MLP taking `input_shape` values, with one layer per entry of
    /// `shape` giving that layer's output count.
    pub fn new<R: Rng + ?Sized>(
        tape: &mut Tape,
        input_shape: usize,
        shape: &[usize],
        rng: &mut R,
    ) -> Self {
        let mut inputs = input_shape;
        let layers = shape
            .iter()
            .enumerate()
            .map(|(i, &outputs)| {
                let layer = Layer::new(tape, inputs, outputs, i, rng);
                inputs = outputs;
                layer
            })
            .collect();

        Mlp {
            layers,
            input_shape,
        }
    }

    /// Assemble an MLP from existing layers, checking that they chain.
    pub fn from_layers(input_shape: usize, layers: Vec<Layer>) -> Result<Self> {
        let mut expected = input_shape;
        for layer in &layers {
            if layer.input_degree() != expected {
                return Err(Error::DimensionMismatch {
                    expected,
                    got: layer.input_degree(),
                });
            }
            expected = layer.output_count();
        }
        Ok(Mlp {
            layers,
            input_shape,
        })
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn input_shape(&self) -> usize {
        self.input_shape
    }

    /// Width of the final layer (the input width for an empty network).
    pub fn output_shape(&self) -> usize {
        self.layers
            .last()
            .map_or(self.input_shape, Layer::output_count)
    }

    /// Fold the inputs through every layer; the last layer's outputs are the prediction.
    pub fn forward(&self, tape: &mut Tape, inputs: &[Value]) -> Result<Vec<Value>> {
        let mut out = inputs.to_vec();
        for layer in &self.layers {
            out = layer.forward(tape, &out)?;
        }
        Ok(out)
    }

    /// Every weight and bias: layer order, then neuron order, weights before bias.
    pub fn parameters(&self) -> Vec<Value> {
        self.layers.iter().flat_map(Layer::parameters).collect()
    }
}
