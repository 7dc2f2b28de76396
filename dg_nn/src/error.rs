//! Error type for network composition and training steps.

use thiserror::Error;

use crate::network::{Phase, Stage};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// A neuron received a different number of inputs than its degree.
    #[error("dimension mismatch: expected {expected} inputs, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Loss output and expectation differ in length.
    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: usize, got: usize },

    #[error("empty output")]
    EmptyOutput,

    /// An operation was called in the wrong phase, or while another step
    /// held the network.
    #[error("invalid phase transition: operation requires {expected}, network is in {current}")]
    InvalidPhaseTransition { current: Phase, expected: Phase },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A training step failed; `stage` names the part that failed.
    #[error("step failed during {stage}: {source}")]
    Step {
        stage: Stage,
        #[source]
        source: Box<Error>,
    },

    #[error(transparent)]
    Core(#[from] dg_core::Error),
}

impl Error {
    /// The innermost error, looking through [`Error::Step`].
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Step { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub(crate) fn at(self, stage: Stage) -> Error {
        Error::Step {
            stage,
            source: Box::new(self),
        }
    }
}
