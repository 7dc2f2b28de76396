//! Error type for the autodiff engine.

use thiserror::Error;

use crate::node::NodeId;

/// Result alias used throughout `dg_core`.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures raised while building or differentiating a computation graph.
///
/// None of these abort the process; a failed operation leaves the tape as it
/// was before the call.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// The divisor of a `Div`, or the base of a negative power, was zero.
    #[error("division by zero")]
    DivisionByZero,

    /// The result of an operation does not fit in a decimal.
    #[error("arithmetic overflow in {op}")]
    Arithmetic { op: &'static str },

    /// The handle refers to a node that no longer lives on the tape
    /// (it belonged to a graph that has since been rewound).
    #[error("unknown value {id}")]
    UnknownValue { id: NodeId },

    /// Only leaf nodes may have their data replaced.
    #[error("value {id} is not a leaf")]
    NotALeaf { id: NodeId },

    /// A grapher was used before `reset_graph` was called on it.
    #[error("graph not initialized")]
    GraphNotInitialized,

    /// A grapher implementation failed to accept or render the graph.
    #[error("grapher: {0}")]
    Grapher(String),
}
