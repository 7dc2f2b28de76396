//! # dg_core - Scalar Reverse-mode Automatic Differentiation in Decimal Arithmetic
//!
//! This crate provides a reverse-mode autodiff engine over decimal scalars. Every
//! operation records a node on a [`Tape`]; [`Tape::backward`] then walks the
//! recorded graph from a scalar root and accumulates the gradient of that root
//! with respect to every node it depends on.
//!
//! ## Quick Start
//!
//! ```
//! use dg_core::Tape;
//! use rust_decimal_macros::dec;
//!
//! let mut tape = Tape::new();
//! let x = tape.input(dec!(2), "x");
//! let y = tape.input(dec!(3), "y");
//!
//! // z = x * y + x^2
//! let xy = tape.mul(x, y)?;
//! let x2 = tape.pow(x, dec!(2))?;
//! let z = tape.add(xy, x2)?;
//! assert_eq!(tape.data(z)?, dec!(10));
//!
//! tape.backward(z)?;
//! // dz/dx = y + 2x = 7, dz/dy = x = 2
//! assert_eq!(tape.grad(x)?, dec!(7));
//! assert_eq!(tape.grad(y)?, dec!(2));
//! # Ok::<(), dg_core::Error>(())
//! ```
//!
//! ## Supported Operations
//!
//! | Operation | Forward | Local gradients |
//! |-----------|---------|-----------------|
//! | [`Tape::add`] | a + b | 1, 1 |
//! | [`Tape::sub`] | a - b | 1, -1 |
//! | [`Tape::mul`] | a * b | b, a |
//! | [`Tape::div`] | a / b | 1/b, -a/b² |
//! | [`Tape::pow`] | a^c (c constant) | c·a^(c-1) |
//! | [`Tape::relu`] | max(0, a) | 1 if active, else 0 |
//!
//! ## Architecture
//!
//! - **[`Tape`]**: arena of nodes addressed by dense index. Long-lived leaves go
//!   first; transient graphs are appended and dropped with [`Tape::rewind`].
//! - **[`Value`]**: copyable handle to a node; stale handles are rejected.
//! - **[`Op`]**: operation tag; a single dispatch computes its local gradients.
//! - **[`graph`]**: read-only presentation walk feeding a [`Grapher`].
//! - **[`finite_diff_grad`]**: numerical derivatives for validating gradients.

mod backward;
mod error;
mod finite_diff;
pub mod graph;
mod node;
mod ops;

pub use backward::backward;
pub use error::{Error, Result};
pub use finite_diff::{finite_diff_grad, max_grad_error};
pub use graph::{build_graph, collect_graph, layers_spec, GraphEdge, GraphNode, Grapher, NodeKind};
pub use node::{Checkpoint, Context, Kind, Node, NodeId, Op, Tape, Value};
pub use ops::checked_pow;

pub use rust_decimal::Decimal;
