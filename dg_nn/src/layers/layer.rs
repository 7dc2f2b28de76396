//! Dense layer of neurons sharing the same inputs.

use dg_core::{Tape, Value};
use rand::Rng;

use super::Neuron;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Layer {
    neurons: Vec<Neuron>,
    index: usize,
}

impl Layer {
    /// Create a layer of `outputs` neurons, each taking `inputs` values.
    pub fn new<R: Rng + ?Sized>(
        tape: &mut Tape,
        inputs: usize,
        outputs: usize,
        index: usize,
        rng: &mut R,
    ) -> Self {
        let neurons = (0..outputs)
            .map(|n| Neuron::new(tape, inputs, index, n, rng))
            .collect();
        Layer { neurons, index }
    }

    /// Assemble a layer from existing neurons, which must all share one degree.
    pub fn from_neurons(index: usize, neurons: Vec<Neuron>) -> Result<Self> {
        let Some(first) = neurons.first() else {
            return Err(Error::InvalidConfig(format!("layer {index} has no neurons")));
        };
        let degree = first.degree();
        if let Some(odd) = neurons.iter().find(|n| n.degree() != degree) {
            return Err(Error::DimensionMismatch {
                expected: degree,
                got: odd.degree(),
            });
        }
        Ok(Layer { neurons, index })
    }

    /// Position of the layer in its network.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn neurons(&self) -> &[Neuron] {
        &self.neurons
    }

    /// Number of inputs every neuron accepts.
    pub fn input_degree(&self) -> usize {
        self.neurons.first().map_or(0, Neuron::degree)
    }

    /// Number of outputs, one per neuron.
    pub fn output_count(&self) -> usize {
        self.neurons.len()
    }

    /// Apply every neuron to the same inputs, preserving neuron order.
    pub fn forward(&self, tape: &mut Tape, inputs: &[Value]) -> Result<Vec<Value>> {
        self.neurons
            .iter()
            .map(|n| n.forward(tape, inputs))
            .collect()
    }

    /// Parameters neuron by neuron.
    pub fn parameters(&self) -> Vec<Value> {
        self.neurons.iter().flat_map(Neuron::parameters).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rust_decimal_macros::dec;

    #[test]
    fn test_layer_shape() {
        let mut tape = Tape::new();
        let mut rng = StdRng::seed_from_u64(1);
        let layer = Layer::new(&mut tape, 3, 2, 0, &mut rng);

        assert_eq!(layer.input_degree(), 3);
        assert_eq!(layer.output_count(), 2);
        // 2 neurons * (3 weights + 1 bias)
        assert_eq!(layer.parameters().len(), 8);

        let x: Vec<Value> = (0..3).map(|i| tape.input(dec!(1), format!("x{i}"))).collect();
        let out = layer.forward(&mut tape, &x).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_layer_forward_preserves_order() {
        let mut tape = Tape::new();
        let neurons = vec![
            Neuron::from_parameters(&mut tape, &[dec!(1)], dec!(0), 0, 0),
            Neuron::from_parameters(&mut tape, &[dec!(2)], dec!(0), 0, 1),
            Neuron::from_parameters(&mut tape, &[dec!(3)], dec!(0), 0, 2),
        ];
        let layer = Layer::from_neurons(0, neurons).unwrap();
        let x = [tape.input(dec!(1.5), "x0")];

        let out = layer.forward(&mut tape, &x).unwrap();
        let data: Vec<_> = out.iter().map(|&v| tape.data(v).unwrap()).collect();
        assert_eq!(data, vec![dec!(1.5), dec!(3.0), dec!(4.5)]);
    }

    #[test]
    fn test_from_neurons_validates() {
        let mut tape = Tape::new();
        let neurons = vec![
            Neuron::from_parameters(&mut tape, &[dec!(1)], dec!(0), 0, 0),
            Neuron::from_parameters(&mut tape, &[dec!(1), dec!(1)], dec!(0), 0, 1),
        ];
        assert!(matches!(
            Layer::from_neurons(0, neurons),
            Err(Error::DimensionMismatch { expected: 1, got: 2 })
        ));
        assert!(matches!(
            Layer::from_neurons(0, Vec::new()),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_wrong_input_count() {
        let mut tape = Tape::new();
        let mut rng = StdRng::seed_from_u64(1);
        let layer = Layer::new(&mut tape, 2, 2, 0, &mut rng);
        let x = [tape.input(dec!(1), "x0")];

        assert_eq!(
            layer.forward(&mut tape, &x),
            Err(Error::DimensionMismatch { expected: 2, got: 1 })
        );
    }
}
