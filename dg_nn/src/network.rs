//! The training phase controller.
//!
//! A [`NeuralNetwork`] owns an [`Mlp`], the tape its parameters live on, and
//! the loss and optimizer strategies. One training step walks the phases
//!
//! ```text
//! Static -> Forward -> Backward -> Optimize -> Static
//! ```
//!
//! and every stage checks the phase it requires before doing anything, so an
//! out-of-order call fails with [`Error::InvalidPhaseTransition`] and leaves
//! the network untouched.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dg_core::{Checkpoint, Context, Decimal, Kind, Tape, Value};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use crate::config::NetworkConfig;
use crate::error::{Error, Result};
use crate::hooks::{NoopHooks, StepHooks, StepReport};
use crate::layers::{Layer, Mlp};
use crate::loss::{Loss, MeanSquaredError};
use crate::optim::{self, Optimizer, Sgd};

// ============================================================================
// Phase
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Phase {
    #[default]
    Static = 0,
    Forward = 1,
    Backward = 2,
    Optimize = 3,
}

impl Phase {
    fn from_u8(raw: u8) -> Phase {
        match raw {
            1 => Phase::Forward,
            2 => Phase::Backward,
            3 => Phase::Optimize,
            _ => Phase::Static,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Static => "static",
            Phase::Forward => "forward",
            Phase::Backward => "backward",
            Phase::Optimize => "optimize",
        };
        f.write_str(name)
    }
}

/// The part of a training step an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Forward,
    Loss,
    Backward,
    Optimize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Forward => "forward",
            Stage::Loss => "loss",
            Stage::Backward => "backward",
            Stage::Optimize => "optimize",
        };
        f.write_str(name)
    }
}

/// Read-only view of a network's phase, usable without access to the network.
#[derive(Debug, Clone)]
pub struct PhaseWatch(Arc<AtomicU8>);

impl PhaseWatch {
    pub fn get(&self) -> Phase {
        Phase::from_u8(self.0.load(Ordering::Acquire))
    }
}

// ============================================================================
// Neural Network
// ============================================================================

pub struct NeuralNetwork {
    tape: Tape,
    mlp: Mlp,
    parameters: Vec<Value>,
    /// End of the parameter prefix of `tape`.
    checkpoint: Checkpoint,
    optimizer: Box<dyn Optimizer + Send>,
    loss: Box<dyn Loss + Send>,
    hooks: Box<dyn StepHooks>,
    phase: Arc<AtomicU8>,
    output: Vec<Value>,
    steps: u64,
}

impl NeuralNetwork {
    /// Build a randomly initialized network trained by SGD on mean squared error.
    pub fn new(config: &NetworkConfig) -> Result<Self> {
        Self::with_strategies(
            config,
            Sgd::new(config.learning_rate),
            MeanSquaredError,
        )
    }

    /// Build a randomly initialized network with custom strategies.
    pub fn with_strategies<O, L>(config: &NetworkConfig, optimizer: O, loss: L) -> Result<Self>
    where
        O: Optimizer + Send + 'static,
        L: Loss + Send + 'static,
    {
        config.validate()?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut tape = Tape::new();
        let mlp = Mlp::new(&mut tape, config.input_shape, &config.shape, &mut rng);

        debug!(
            input_shape = config.input_shape,
            shape = ?config.shape,
            seed = ?config.seed,
            "network initialized"
        );
        Self::from_parts(tape, mlp, optimizer, loss)
    }

    /// Wrap an MLP whose parameters were built on `tape`.
    ///
    /// Every node on `tape` at this point is treated as long-lived; nodes
    /// created later are discarded at the start of each forward stage.
    pub fn from_parts<O, L>(tape: Tape, mlp: Mlp, optimizer: O, loss: L) -> Result<Self>
    where
        O: Optimizer + Send + 'static,
        L: Loss + Send + 'static,
    {
        let parameters = mlp.parameters();
        for &p in &parameters {
            tape.node(p)?;
        }

        Ok(NeuralNetwork {
            checkpoint: tape.checkpoint(),
            tape,
            mlp,
            parameters,
            optimizer: Box::new(optimizer),
            loss: Box::new(loss),
            hooks: Box::new(NoopHooks),
            phase: Arc::new(AtomicU8::new(Phase::Static as u8)),
            output: Vec::new(),
            steps: 0,
        })
    }

    pub fn with_hooks(mut self, hooks: impl StepHooks + 'static) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    // === Accessors ===

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn phase_watch(&self) -> PhaseWatch {
        PhaseWatch(Arc::clone(&self.phase))
    }

    /// Every weight and bias in layer, neuron, weights-then-bias order.
    pub fn parameters(&self) -> &[Value] {
        &self.parameters
    }

    pub fn input_shape(&self) -> usize {
        self.mlp.input_shape()
    }

    pub fn output_shape(&self) -> usize {
        self.mlp.output_shape()
    }

    pub fn layers(&self) -> &[Layer] {
        self.mlp.layers()
    }

    pub fn tape(&self) -> &Tape {
        &self.tape
    }

    /// Output of the most recent forward stage; empty after a reset.
    pub fn output(&self) -> &[Value] {
        &self.output
    }

    /// Number of completed steps.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn learning_rate(&self) -> Option<Decimal> {
        self.optimizer.learning_rate()
    }

    // === Stages ===

    /// Discard the previous step's graph, zero the parameter gradients, and
    /// evaluate the MLP on `inputs`.
    pub fn forward(&mut self, inputs: &[Decimal]) -> Result<Vec<Value>> {
        self.require(Phase::Static)?;
        if inputs.len() != self.input_shape() {
            return Err(Error::DimensionMismatch {
                expected: self.input_shape(),
                got: inputs.len(),
            });
        }

        self.discard_graph();
        optim::zero_grad(&mut self.tape, &self.parameters)?;

        let x: Vec<Value> = inputs
            .iter()
            .enumerate()
            .map(|(i, &d)| self.tape.input(d, format!("x{i}")))
            .collect();
        let output = self.mlp.forward(&mut self.tape, &x)?;

        self.output.clone_from(&output);
        self.enter(Phase::Forward);
        Ok(output)
    }

    /// Reduce the cached output and `expectation` to a loss node.
    /// Does not change the phase.
    pub fn loss(&mut self, expectation: &[Decimal]) -> Result<Value> {
        self.require(Phase::Forward)?;
        if self.output.is_empty() {
            return Err(Error::EmptyOutput);
        }
        if self.output.len() != expectation.len() {
            return Err(Error::ShapeMismatch {
                expected: self.output.len(),
                got: expectation.len(),
            });
        }

        let y: Vec<Value> = expectation
            .iter()
            .enumerate()
            .map(|(i, &d)| {
                self.tape
                    .leaf(d, Kind::Expectation, Context::labelled(format!("y{i}")))
            })
            .collect();
        self.loss.loss(&mut self.tape, &self.output, &y)
    }

    /// Backpropagate from `loss`.
    pub fn backward(&mut self, loss: Value) -> Result<()> {
        self.require(Phase::Forward)?;
        let visited = self.tape.backward(loss)?;
        debug!(visited, root = %self.tape.node(loss)?, "backward pass");
        self.enter(Phase::Backward);
        Ok(())
    }

    /// Apply the optimizer to the parameters and return to `Static`.
    pub fn optimize(&mut self) -> Result<()> {
        self.require(Phase::Backward)?;
        self.enter(Phase::Optimize);
        self.optimizer.optimize(&mut self.tape, &self.parameters)?;
        self.enter(Phase::Static);
        Ok(())
    }

    /// Run one training step: forward, loss, backward, optimize.
    ///
    /// Returns the loss node, valid until the next forward stage. On failure
    /// the error names the stage, the phase stays at the last one entered,
    /// and parameters are unchanged unless the optimizer itself completed.
    /// Call [`NeuralNetwork::reset`] to retry.
    pub fn step(&mut self, input: &[Decimal], expectation: &[Decimal]) -> Result<Value> {
        self.require(Phase::Static)?;

        let index = self.steps + 1;
        let started = Instant::now();
        match self.run_step(input, expectation) {
            Ok((loss, data)) => {
                self.steps = index;
                let report = StepReport {
                    step: index,
                    loss: data,
                    latency: started.elapsed(),
                    learning_rate: self.learning_rate(),
                };
                debug!(step = index, loss = %data, latency = ?report.latency, "step completed");
                self.hooks.on_step(&report);
                Ok(loss)
            }
            Err(err) => {
                let stage = match &err {
                    Error::Step { stage, .. } => *stage,
                    _ => Stage::Forward,
                };
                debug!(step = index, %stage, error = %err, phase = %self.phase(), "step failed");
                self.hooks.on_step_failed(index, stage, &err);
                Err(err)
            }
        }
    }

    /// Drop the transient graph and cached output and return to `Static`.
    /// Parameter data is kept.
    pub fn reset(&mut self) {
        self.discard_graph();
        if self.phase() != Phase::Static {
            self.enter(Phase::Static);
        }
    }

    /// Evaluate the network without training. The phase is `Static` again on return.
    pub fn predict(&mut self, inputs: &[Decimal]) -> Result<Vec<Decimal>> {
        let output = self.forward(inputs)?;
        let data = self.tape.datas(&output);
        self.reset();
        Ok(data?)
    }

    // === Internals ===

    fn run_step(&mut self, input: &[Decimal], expectation: &[Decimal]) -> Result<(Value, Decimal)> {
        self.forward(input).map_err(|e| e.at(Stage::Forward))?;
        let loss = self.loss(expectation).map_err(|e| e.at(Stage::Loss))?;
        let data = self
            .tape
            .data(loss)
            .map_err(|e| Error::from(e).at(Stage::Loss))?;
        self.backward(loss).map_err(|e| e.at(Stage::Backward))?;
        self.optimize().map_err(|e| e.at(Stage::Optimize))?;
        Ok((loss, data))
    }

    fn require(&self, expected: Phase) -> Result<()> {
        let current = self.phase();
        if current != expected {
            return Err(Error::InvalidPhaseTransition { current, expected });
        }
        Ok(())
    }

    fn enter(&mut self, to: Phase) {
        let from = Phase::from_u8(self.phase.swap(to as u8, Ordering::AcqRel));
        debug!(%from, %to, "phase transition");
        self.hooks.on_phase(from, to);
    }

    fn discard_graph(&mut self) {
        self.tape.rewind(self.checkpoint);
        self.output.clear();
    }
}

impl fmt::Debug for NeuralNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NeuralNetwork")
            .field("mlp", &self.mlp)
            .field("phase", &self.phase())
            .field("steps", &self.steps)
            .field("tape_len", &self.tape.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::MetricsHooks;
    use crate::layers::Neuron;
    use rust_decimal_macros::dec;

    /// 2 -> 1 network: relu(0.1 + 0.5 x0 - 0.25 x1), SGD at 0.1.
    fn tiny() -> NeuralNetwork {
        let mut tape = Tape::new();
        let n = Neuron::from_parameters(&mut tape, &[dec!(0.5), dec!(-0.25)], dec!(0.1), 0, 0);
        let layer = Layer::from_neurons(0, vec![n]).unwrap();
        let mlp = Mlp::from_layers(2, vec![layer]).unwrap();
        NeuralNetwork::from_parts(tape, mlp, Sgd::new(dec!(0.1)), MeanSquaredError).unwrap()
    }

    fn data(net: &NeuralNetwork) -> Vec<Decimal> {
        net.parameters()
            .iter()
            .map(|&p| net.tape().data(p).unwrap())
            .collect()
    }

    #[test]
    fn test_backward_before_forward() {
        let mut net = tiny();
        let p = net.parameters()[0];

        assert_eq!(
            net.backward(p),
            Err(Error::InvalidPhaseTransition {
                current: Phase::Static,
                expected: Phase::Forward,
            })
        );
        assert_eq!(net.phase(), Phase::Static);
        assert_eq!(
            net.optimize(),
            Err(Error::InvalidPhaseTransition {
                current: Phase::Static,
                expected: Phase::Backward,
            })
        );
    }

    #[test]
    fn test_stages_walk_the_phases() {
        let mut net = tiny();

        let out = net.forward(&[dec!(2), dec!(4)]).unwrap();
        assert_eq!(net.phase(), Phase::Forward);
        assert_eq!(net.tape().data(out[0]).unwrap(), dec!(0.1));
        assert!(net.forward(&[dec!(2), dec!(4)]).is_err());

        let loss = net.loss(&[dec!(1)]).unwrap();
        assert_eq!(net.phase(), Phase::Forward);
        assert_eq!(net.tape().data(loss).unwrap(), dec!(0.81));

        net.backward(loss).unwrap();
        assert_eq!(net.phase(), Phase::Backward);
        // dL/dout = 2 * (0.1 - 1) = -1.8
        assert_eq!(
            net.tape().grads(net.parameters()).unwrap(),
            vec![dec!(-3.6), dec!(-7.2), dec!(-1.8)]
        );

        net.optimize().unwrap();
        assert_eq!(net.phase(), Phase::Static);
        assert_eq!(data(&net), vec![dec!(0.86), dec!(0.47), dec!(0.28)]);
    }

    #[test]
    fn test_step() {
        let mut net = tiny();
        let loss = net.step(&[dec!(2), dec!(4)], &[dec!(1)]).unwrap();

        assert_eq!(net.tape().data(loss).unwrap(), dec!(0.81));
        assert_eq!(net.phase(), Phase::Static);
        assert_eq!(net.steps(), 1);
        assert_eq!(data(&net), vec![dec!(0.86), dec!(0.47), dec!(0.28)]);
    }

    #[test]
    fn test_gradients_do_not_accumulate_across_steps() {
        let mut net = tiny();
        net.step(&[dec!(2), dec!(4)], &[dec!(1)]).unwrap();
        let first = net.parameters()[0];
        net.step(&[dec!(2), dec!(4)], &[dec!(1)]).unwrap();

        // out = 0.28 + 0.86*2 + 0.47*4 = 3.88, dL/dout = 5.76
        assert_eq!(
            net.tape().grads(net.parameters()).unwrap(),
            vec![dec!(11.52), dec!(23.04), dec!(5.76)]
        );
        assert_eq!(net.parameters()[0], first);
    }

    #[test]
    fn test_old_loss_handle_is_discarded() {
        let mut net = tiny();
        let loss = net.step(&[dec!(2), dec!(4)], &[dec!(1)]).unwrap();
        let len = net.tape().len();
        net.step(&[dec!(2), dec!(4)], &[dec!(1)]).unwrap();

        assert_eq!(net.tape().len(), len);
        assert!(matches!(
            net.tape().data(loss),
            Err(dg_core::Error::UnknownValue { .. })
        ));
    }

    #[test]
    fn test_failed_backward_keeps_forward_phase() {
        let mut net = tiny();
        let stale = net.step(&[dec!(2), dec!(4)], &[dec!(1)]).unwrap();
        let before = data(&net);

        net.forward(&[dec!(2), dec!(4)]).unwrap();
        assert!(matches!(
            net.backward(stale),
            Err(Error::Core(dg_core::Error::UnknownValue { .. }))
        ));
        assert_eq!(net.phase(), Phase::Forward);
        assert_eq!(data(&net), before);

        net.reset();
        assert_eq!(net.phase(), Phase::Static);
        let loss = net.step(&[dec!(2), dec!(4)], &[dec!(1)]).unwrap();
        assert!(net.tape().data(loss).is_ok());
        assert_eq!(net.steps(), 2);
    }

    #[test]
    fn test_failed_step_keeps_parameters() {
        let mut net = tiny();
        let before = data(&net);

        let err = net.step(&[dec!(2), dec!(4)], &[dec!(1), dec!(2)]).unwrap_err();
        assert_eq!(
            err,
            Error::Step {
                stage: Stage::Loss,
                source: Box::new(Error::ShapeMismatch { expected: 1, got: 2 }),
            }
        );
        assert_eq!(net.phase(), Phase::Forward);
        assert_eq!(data(&net), before);

        // Rejected until reset
        assert!(matches!(
            net.step(&[dec!(2), dec!(4)], &[dec!(1)]),
            Err(Error::InvalidPhaseTransition {
                current: Phase::Forward,
                expected: Phase::Static,
            })
        ));

        net.reset();
        assert_eq!(net.phase(), Phase::Static);
        assert!(net.output().is_empty());
        assert!(net.step(&[dec!(2), dec!(4)], &[dec!(1)]).is_ok());
        assert_eq!(net.steps(), 1);
    }

    #[test]
    fn test_wrong_input_width() {
        let mut net = tiny();
        let len = net.tape().len();

        let err = net.step(&[dec!(1)], &[dec!(1)]).unwrap_err();
        assert_eq!(
            err.root_cause(),
            &Error::DimensionMismatch { expected: 2, got: 1 }
        );
        assert_eq!(net.phase(), Phase::Static);
        assert_eq!(net.tape().len(), len);
    }

    #[test]
    fn test_division_by_zero_is_recoverable() {
        let mut tape = Tape::new();
        let n = Neuron::from_parameters(&mut tape, &[dec!(1)], dec!(0), 0, 0);
        let mlp = Mlp::from_layers(1, vec![Layer::from_neurons(0, vec![n]).unwrap()]).unwrap();
        let ratio = |tape: &mut Tape, out: &[Value], exp: &[Value]| -> Result<Value> {
            Ok(tape.div(out[0], exp[0])?)
        };
        let mut net = NeuralNetwork::from_parts(tape, mlp, Sgd::default(), ratio).unwrap();

        let err = net.step(&[dec!(3)], &[dec!(0)]).unwrap_err();
        assert_eq!(
            err.root_cause(),
            &Error::Core(dg_core::Error::DivisionByZero)
        );

        net.reset();
        let loss = net.step(&[dec!(3)], &[dec!(2)]).unwrap();
        assert_eq!(net.tape().data(loss).unwrap(), dec!(1.5));
    }

    #[test]
    fn test_predict_leaves_network_static() {
        let mut net = tiny();
        let out = net.predict(&[dec!(2), dec!(4)]).unwrap();

        assert_eq!(out, vec![dec!(0.1)]);
        assert_eq!(net.phase(), Phase::Static);
        assert_eq!(net.steps(), 0);
    }

    #[test]
    fn test_shapes_and_parameters() {
        let config = NetworkConfig::new(3, [3, 3, 3]).with_seed(1);
        let net = NeuralNetwork::new(&config).unwrap();

        assert_eq!(net.input_shape(), 3);
        assert_eq!(net.output_shape(), 3);
        assert_eq!(net.layers().len(), 3);
        assert_eq!(net.parameters().len(), 36);
        assert_eq!(net.parameters(), net.parameters());
        assert_eq!(net.learning_rate(), Some(dec!(0.01)));

        // Same seed, same initial weights
        let twin = NeuralNetwork::new(&config).unwrap();
        assert_eq!(data(&net), data(&twin));
    }

    #[test]
    fn test_hooks_observe_step() {
        let metrics = MetricsHooks::new();
        let watch;
        {
            let mut net = tiny().with_hooks(metrics.clone());
            watch = net.phase_watch();
            net.step(&[dec!(2), dec!(4)], &[dec!(1)]).unwrap();
            let _ = net.step(&[dec!(2), dec!(4)], &[]);
        }

        let snap = metrics.snapshot();
        assert_eq!(snap.steps, 1);
        assert_eq!(snap.failed_steps, 1);
        assert_eq!(snap.last_loss, Some(dec!(0.81)));
        assert_eq!(snap.learning_rate, Some(dec!(0.1)));
        assert_eq!(snap.phase, Phase::Forward);
        assert_eq!(watch.get(), Phase::Forward);
    }
}
