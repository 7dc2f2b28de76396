//! Core data structures for the computation graph.
//!
//! Nodes live in a [`Tape`], an arena addressed by dense index. A [`Value`] is a
//! copyable handle carrying that index together with the node's process-unique
//! [`NodeId`], so a handle that outlives its graph is reported as unknown instead
//! of silently resolving to whichever node reused the slot.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::ops;

/// Global counter for generating unique node IDs.
/// Uses AtomicU64 so tapes on different threads never hand out the same id.
static NODE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_node_id() -> NodeId {
    NodeId(NODE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// Process-unique, monotonically increasing identifier of a node. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u64);

impl NodeId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The operation that produced a node. Selects the local gradient rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    /// A leaf: parameter, input or constant. No gradient rule.
    Leaf,
    /// Addition: args[0] + args[1]
    Add,
    /// Subtraction: args[0] - args[1]
    Sub,
    /// Multiplication: args[0] * args[1]
    Mul,
    /// Division: args[0] / args[1]
    Div,
    /// Power with constant exponent: args[0]^exponent
    Pow { exponent: Decimal },
    /// Rectified linear unit: max(0, args[0])
    Relu,
}

impl Op {
    /// Short symbol used when presenting the graph.
    pub fn symbol(&self) -> &'static str {
        match self {
            Op::Leaf => "noop",
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Pow { .. } => "**",
            Op::Relu => "relu",
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Op::Leaf)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Pow { exponent } => write!(f, "**{exponent}"),
            op => f.write_str(op.symbol()),
        }
    }
}

/// What role a node plays in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Input,
    Expectation,
    Weight,
    Bias,
    Constant,
    Computed,
}

impl Kind {
    /// Trainable leaves, the only nodes an optimizer should touch.
    pub fn is_parameter(self) -> bool {
        matches!(self, Kind::Weight | Kind::Bias)
    }
}

/// Descriptive tags used for diagnostics and for grouping nodes when the
/// graph is rendered. Never affects arithmetic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    pub label: Option<String>,
    pub layer: Option<usize>,
    pub neuron: Option<usize>,
}

impl Context {
    pub fn labelled(label: impl Into<String>) -> Self {
        Context {
            label: Some(label.into()),
            ..Context::default()
        }
    }

    pub fn neuron(layer: usize, neuron: usize) -> Self {
        Context {
            label: None,
            layer: Some(layer),
            neuron: Some(neuron),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Context of a computed node: the deepest layer of its operands and the
    /// first neuron tag found. Labels belong to leaves and are not inherited.
    fn merge(a: &Context, b: &Context) -> Context {
        let layer = match (a.layer, b.layer) {
            (Some(x), Some(y)) => Some(x.max(y)),
            (x, y) => x.or(y),
        };
        Context {
            label: None,
            layer,
            neuron: a.neuron.or(b.neuron),
        }
    }
}

/// Handle to a node on a [`Tape`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Value {
    index: usize,
    id: NodeId,
}

impl Value {
    /// The node's process-unique identifier.
    pub fn id(self) -> NodeId {
        self.id
    }

    /// Dense position of the node on its tape.
    pub fn index(self) -> usize {
        self.index
    }
}

/// A node of the computation graph.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) data: Decimal,
    pub(crate) grad: Decimal,
    pub(crate) op: Op,
    pub(crate) kind: Kind,
    /// Argument slots in call order; `a.add(a)` stores `a` twice.
    pub(crate) args: Vec<usize>,
    /// Distinct predecessors in first-seen order.
    pub(crate) operands: Vec<usize>,
    pub(crate) context: Context,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn data(&self) -> Decimal {
        self.data
    }

    pub fn grad(&self) -> Decimal {
        self.grad
    }

    pub fn op(&self) -> Op {
        self.op
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn is_leaf(&self) -> bool {
        self.op.is_leaf()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Value: {:.3}, Op: {}, Grad: {:.3}",
            self.data, self.op, self.grad
        )
    }
}

/// Marks a tape length to rewind to once a transient graph is no longer needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(usize);

/// Arena holding every node of a computation graph.
///
/// Long-lived leaves (parameters) are pushed first; each forward pass appends
/// its transient nodes after them and is discarded with [`Tape::rewind`].
#[derive(Debug, Clone, Default)]
pub struct Tape {
    pub(crate) nodes: Vec<Node>,
}

impl Tape {
    pub fn new() -> Self {
        Tape { nodes: Vec::new() }
    }

    /// Number of nodes currently on the tape.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Create a leaf node.
    pub fn leaf(&mut self, data: Decimal, kind: Kind, context: Context) -> Value {
        self.push_node(Node {
            id: next_node_id(),
            data,
            grad: Decimal::ZERO,
            op: Op::Leaf,
            kind,
            args: Vec::new(),
            operands: Vec::new(),
            context,
        })
    }

    /// Create a labelled input leaf.
    pub fn input(&mut self, data: Decimal, label: impl Into<String>) -> Value {
        self.leaf(data, Kind::Input, Context::labelled(label))
    }

    /// Create an unlabelled constant leaf.
    pub fn constant(&mut self, data: Decimal) -> Value {
        self.leaf(data, Kind::Constant, Context::default())
    }

    /// Resolve a handle, failing if it does not belong to the current graph.
    pub fn node(&self, value: Value) -> Result<&Node> {
        match self.nodes.get(value.index) {
            Some(node) if node.id == value.id => Ok(node),
            _ => Err(Error::UnknownValue { id: value.id }),
        }
    }

    pub fn data(&self, value: Value) -> Result<Decimal> {
        self.node(value).map(Node::data)
    }

    pub fn grad(&self, value: Value) -> Result<Decimal> {
        self.node(value).map(Node::grad)
    }

    /// Data of several values, in the order given.
    pub fn datas(&self, values: &[Value]) -> Result<Vec<Decimal>> {
        values.iter().map(|&v| self.data(v)).collect()
    }

    /// Gradients of several values, in the order given.
    pub fn grads(&self, values: &[Value]) -> Result<Vec<Decimal>> {
        values.iter().map(|&v| self.grad(v)).collect()
    }

    /// Distinct direct predecessors of a node.
    pub fn operands(&self, value: Value) -> Result<Vec<Value>> {
        let node = self.node(value)?;
        Ok(node.operands.iter().map(|&i| self.handle(i)).collect())
    }

    /// Replace the data of a leaf. Computed nodes are immutable.
    pub fn set_data(&mut self, value: Value, data: Decimal) -> Result<()> {
        let index = self.checked_index(value)?;
        let node = &mut self.nodes[index];
        if !node.is_leaf() {
            return Err(Error::NotALeaf { id: node.id });
        }
        node.data = data;
        Ok(())
    }

    pub fn zero_grad(&mut self, value: Value) -> Result<()> {
        let index = self.checked_index(value)?;
        self.nodes[index].grad = Decimal::ZERO;
        Ok(())
    }

    /// Current end of the tape.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.nodes.len())
    }

    /// Drop every node created after `checkpoint`. Handles to them become unknown.
    pub fn rewind(&mut self, checkpoint: Checkpoint) {
        self.nodes.truncate(checkpoint.0);
    }

    // === Operations ===

    pub fn add(&mut self, a: Value, b: Value) -> Result<Value> {
        let (x, y) = (self.data(a)?, self.data(b)?);
        let data = x.checked_add(y).ok_or(Error::Arithmetic { op: "add" })?;
        Ok(self.push_op(Op::Add, data, &[a, b]))
    }

    pub fn sub(&mut self, a: Value, b: Value) -> Result<Value> {
        let (x, y) = (self.data(a)?, self.data(b)?);
        let data = x.checked_sub(y).ok_or(Error::Arithmetic { op: "sub" })?;
        Ok(self.push_op(Op::Sub, data, &[a, b]))
    }

    pub fn mul(&mut self, a: Value, b: Value) -> Result<Value> {
        let (x, y) = (self.data(a)?, self.data(b)?);
        let data = x.checked_mul(y).ok_or(Error::Arithmetic { op: "mul" })?;
        Ok(self.push_op(Op::Mul, data, &[a, b]))
    }

    /// `a / b`. Fails with [`Error::DivisionByZero`] without touching the tape
    /// when `b` is zero.
    pub fn div(&mut self, a: Value, b: Value) -> Result<Value> {
        let (x, y) = (self.data(a)?, self.data(b)?);
        if y.is_zero() {
            return Err(Error::DivisionByZero);
        }
        let data = x.checked_div(y).ok_or(Error::Arithmetic { op: "div" })?;
        Ok(self.push_op(Op::Div, data, &[a, b]))
    }

    /// `a ^ exponent` for a constant exponent.
    pub fn pow(&mut self, a: Value, exponent: Decimal) -> Result<Value> {
        let data = ops::checked_pow(self.data(a)?, exponent)?;
        Ok(self.push_op(Op::Pow { exponent }, data, &[a]))
    }

    pub fn relu(&mut self, a: Value) -> Result<Value> {
        let data = self.data(a)?.max(Decimal::ZERO);
        Ok(self.push_op(Op::Relu, data, &[a]))
    }

    /// Left fold of `add` over `values`; a zero constant when empty.
    pub fn sum(&mut self, values: &[Value]) -> Result<Value> {
        let Some((&first, rest)) = values.split_first() else {
            return Ok(self.constant(Decimal::ZERO));
        };
        let mut acc = first;
        for &v in rest {
            acc = self.add(acc, v)?;
        }
        Ok(acc)
    }

    /// Run the reverse pass from `root`. Returns the number of nodes visited.
    pub fn backward(&mut self, root: Value) -> Result<usize> {
        crate::backward::backward(self, root)
    }

    // === Internals ===

    pub(crate) fn handle(&self, index: usize) -> Value {
        Value {
            index,
            id: self.nodes[index].id,
        }
    }

    pub(crate) fn checked_index(&self, value: Value) -> Result<usize> {
        self.node(value).map(|_| value.index)
    }

    pub(crate) fn accumulate_grad(&mut self, index: usize, delta: Decimal) -> Result<()> {
        let node = &mut self.nodes[index];
        node.grad = node
            .grad
            .checked_add(delta)
            .ok_or(Error::Arithmetic { op: "grad" })?;
        Ok(())
    }

    fn push_node(&mut self, node: Node) -> Value {
        let id = node.id;
        self.nodes.push(node);
        Value {
            index: self.nodes.len() - 1,
            id,
        }
    }

    /// Push a computed node. Callers have already resolved every argument.
    fn push_op(&mut self, op: Op, data: Decimal, args: &[Value]) -> Value {
        let mut operands: Vec<usize> = Vec::with_capacity(args.len());
        for arg in args {
            if !operands.contains(&arg.index) {
                operands.push(arg.index);
            }
        }

        let context = match args {
            [a] => Context::merge(&self.nodes[a.index].context, &Context::default()),
            [a, b] => Context::merge(&self.nodes[a.index].context, &self.nodes[b.index].context),
            _ => Context::default(),
        };

        self.push_node(Node {
            id: next_node_id(),
            data,
            grad: Decimal::ZERO,
            op,
            kind: Kind::Computed,
            args: args.iter().map(|a| a.index).collect(),
            operands,
            context,
        })
    }
}
