//! A single ReLU unit.

use dg_core::{Context, Decimal, Kind, Tape, Value};
use rand::Rng;

use super::uniform_unit;
use crate::error::{Error, Result};

/// A neuron: `relu(b + Σ w_i * x_i)`.
///
/// Weights and bias are leaves on the tape the neuron was built on and live as
/// long as that tape's parameter prefix.
#[derive(Debug, Clone)]
pub struct Neuron {
    weights: Vec<Value>,
    bias: Value,
}

impl Neuron {
    /// Create a neuron of the given degree with weights and bias drawn
    /// uniformly from [-1, 1).
    pub fn new<R: Rng + ?Sized>(
        tape: &mut Tape,
        degree: usize,
        layer: usize,
        index: usize,
        rng: &mut R,
    ) -> Self {
        let weights: Vec<Decimal> = (0..degree).map(|_| uniform_unit(rng)).collect();
        let bias = uniform_unit(rng);
        Neuron::from_parameters(tape, &weights, bias, layer, index)
    }

    /// Create a neuron with explicit parameter values.
    pub fn from_parameters(
        tape: &mut Tape,
        weights: &[Decimal],
        bias: Decimal,
        layer: usize,
        index: usize,
    ) -> Self {
        let weights = weights
            .iter()
            .enumerate()
            .map(|(i, &w)| {
                let context = Context::neuron(layer, index).with_label(format!("w{i}"));
                tape.leaf(w, Kind::Weight, context)
            })
            .collect();
        let bias = tape.leaf(
            bias,
            Kind::Bias,
            Context::neuron(layer, index).with_label("b"),
        );

        Neuron { weights, bias }
    }

    /// Number of inputs the neuron accepts.
    pub fn degree(&self) -> usize {
        self.weights.len()
    }

    pub fn weights(&self) -> &[Value] {
        &self.weights
    }

    pub fn bias(&self) -> Value {
        self.bias
    }

    /// Forward pass. Fails with [`Error::DimensionMismatch`] before touching
    /// the tape when `inputs` does not match the degree.
    pub fn forward(&self, tape: &mut Tape, inputs: &[Value]) -> Result<Value> {
        if inputs.len() != self.degree() {
            return Err(Error::DimensionMismatch {
                expected: self.degree(),
                got: inputs.len(),
            });
        }

        // b + w * x
        let mut sum = self.bias;
        for (&w, &x) in self.weights.iter().zip(inputs) {
            let product = tape.mul(w, x)?;
            sum = tape.add(sum, product)?;
        }

        Ok(tape.relu(sum)?)
    }

    /// Weights in order, then the bias.
    pub fn parameters(&self) -> Vec<Value> {
        let mut params = Vec::with_capacity(self.weights.len() + 1);
        params.extend_from_slice(&self.weights);
        params.push(self.bias);
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rust_decimal_macros::dec;

    #[test]
    fn test_neuron_forward() {
        let mut tape = Tape::new();
        let neuron = Neuron::from_parameters(&mut tape, &[dec!(0.5), dec!(-1)], dec!(0.25), 0, 0);
        let x = [tape.input(dec!(2), "x0"), tape.input(dec!(0.5), "x1")];

        // 0.25 + 0.5*2 - 1*0.5 = 0.75
        let out = neuron.forward(&mut tape, &x).unwrap();
        assert_eq!(tape.data(out).unwrap(), dec!(0.75));
    }

    #[test]
    fn test_neuron_relu_clamps() {
        let mut tape = Tape::new();
        let neuron = Neuron::from_parameters(&mut tape, &[dec!(-1)], dec!(0), 0, 0);
        let x = [tape.input(dec!(3), "x0")];

        let out = neuron.forward(&mut tape, &x).unwrap();
        assert_eq!(tape.data(out).unwrap(), dec!(0));

        tape.backward(out).unwrap();
        assert_eq!(tape.grad(neuron.weights()[0]).unwrap(), dec!(0));
        assert_eq!(tape.grad(neuron.bias()).unwrap(), dec!(0));
    }

    #[test]
    fn test_neuron_backward() {
        let mut tape = Tape::new();
        let neuron = Neuron::from_parameters(&mut tape, &[dec!(1), dec!(2)], dec!(1), 0, 0);
        let x = [tape.input(dec!(3), "x0"), tape.input(dec!(4), "x1")];

        let out = neuron.forward(&mut tape, &x).unwrap();
        tape.backward(out).unwrap();

        // d/dw_i = x_i, d/db = 1, d/dx_i = w_i
        assert_eq!(
            tape.grads(&neuron.parameters()).unwrap(),
            vec![dec!(3), dec!(4), dec!(1)]
        );
        assert_eq!(tape.grads(&x).unwrap(), vec![dec!(1), dec!(2)]);
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut tape = Tape::new();
        let neuron = Neuron::from_parameters(&mut tape, &[dec!(1), dec!(2)], dec!(1), 0, 0);
        let x = [tape.input(dec!(3), "x0")];
        let before = tape.len();

        assert_eq!(
            neuron.forward(&mut tape, &x),
            Err(Error::DimensionMismatch { expected: 2, got: 1 })
        );
        assert_eq!(tape.len(), before);
    }

    #[test]
    fn test_random_init_in_range_and_tagged() {
        let mut tape = Tape::new();
        let mut rng = StdRng::seed_from_u64(7);
        let neuron = Neuron::new(&mut tape, 4, 1, 3, &mut rng);

        assert_eq!(neuron.degree(), 4);
        for p in neuron.parameters() {
            let node = tape.node(p).unwrap();
            assert!(node.data() >= dec!(-1) && node.data() < dec!(1));
            assert!(node.kind().is_parameter());
            assert_eq!(node.context().layer, Some(1));
            assert_eq!(node.context().neuron, Some(3));
        }
        assert_eq!(tape.node(neuron.bias()).unwrap().kind(), Kind::Bias);
    }
}
