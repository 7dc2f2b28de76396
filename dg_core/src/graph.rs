//! Presentation of a finished computation graph.
//!
//! [`build_graph`] walks a graph read-only from its root and feeds a
//! [`Grapher`] with deduplicated nodes and edges. Every computed node gets a
//! synthetic operator node between itself and its operands, so data and
//! operations render distinctly:
//!
//! ```text
//! operand ──▶ (op) ──▶ result
//! ```
//!
//! Layout, styling and serving the rendered output are the grapher's business.

use std::collections::HashSet;

use rust_decimal::Decimal;

use crate::error::Result;
use crate::node::{Kind, Node, Tape, Value};

/// Presentation category of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Input,
    Expectation,
    Weight,
    Bias,
    Constant,
    Value,
    Operator,
}

impl From<Kind> for NodeKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Input => NodeKind::Input,
            Kind::Expectation => NodeKind::Expectation,
            Kind::Weight => NodeKind::Weight,
            Kind::Bias => NodeKind::Bias,
            Kind::Constant => NodeKind::Constant,
            Kind::Computed => NodeKind::Value,
        }
    }
}

/// A node as handed to a [`Grapher`].
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub id: String,
    pub data: Decimal,
    pub grad: Decimal,
    /// Symbol of the operation that produced the value ("noop" for leaves).
    pub operation: String,
    pub label: String,
    pub kind: NodeKind,
    pub layer: Option<usize>,
}

/// An edge as handed to a [`Grapher`]; `id` is `"{from}:{to}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GraphEdge {
    pub id: String,
}

/// Sink for a presented graph, implemented by rendering collaborators.
pub trait Grapher {
    /// Discard everything added so far and start an empty graph.
    fn reset_graph(&mut self) -> Result<()>;

    fn add_node(&mut self, node: &GraphNode) -> Result<()>;

    /// Add a directed edge; data flows from `from` to `to`.
    fn add_edge(&mut self, from: &GraphNode, to: &GraphNode, edge: &GraphEdge) -> Result<()>;

    /// Render the current graph into the grapher's output format.
    fn render(&mut self) -> Result<Vec<u8>>;
}

/// Deduplicated nodes and edges reachable from a root, in discovery order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphView {
    pub nodes: Vec<GraphNode>,
    /// `(from, to)` positions into `nodes`.
    pub edges: Vec<(usize, usize)>,
}

impl GraphView {
    pub fn edge(&self, i: usize) -> (&GraphNode, &GraphNode) {
        let (from, to) = self.edges[i];
        (&self.nodes[from], &self.nodes[to])
    }
}

/// Walk the graph under `root` without mutating it.
///
/// Calling this twice on the same tape yields identical views.
pub fn collect_graph(tape: &Tape, root: Value) -> Result<GraphView> {
    tape.node(root)?;

    let mut view = GraphView::default();
    let mut seen: HashSet<usize> = HashSet::new();
    let mut positions: Vec<Option<usize>> = vec![None; tape.len()];
    let mut stack = vec![root.index()];

    while let Some(index) = stack.pop() {
        if !seen.insert(index) {
            continue;
        }
        let node = &tape.nodes[index];
        let value_pos = position_of(tape, &mut view, &mut positions, index);

        // Operands feed the operator node, which feeds the value
        let target = if node.is_leaf() {
            value_pos
        } else {
            let op_pos = view.nodes.len();
            view.nodes.push(operator_node(node));
            view.edges.push((op_pos, value_pos));
            op_pos
        };

        for &operand in &node.operands {
            let operand_pos = position_of(tape, &mut view, &mut positions, operand);
            view.edges.push((operand_pos, target));
        }
        for &operand in node.operands.iter().rev() {
            if !seen.contains(&operand) {
                stack.push(operand);
            }
        }
    }

    Ok(view)
}

/// Reset `grapher` and populate it with the graph under `root`.
pub fn build_graph<G: Grapher + ?Sized>(grapher: &mut G, tape: &Tape, root: Value) -> Result<()> {
    let view = collect_graph(tape, root)?;

    grapher.reset_graph()?;
    for node in &view.nodes {
        grapher.add_node(node)?;
    }
    for i in 0..view.edges.len() {
        let (from, to) = view.edge(i);
        let edge = GraphEdge {
            id: format!("{}:{}", from.id, to.id),
        };
        grapher.add_edge(from, to, &edge)?;
    }

    tracing::debug!(
        nodes = view.nodes.len(),
        edges = view.edges.len(),
        "built presentation graph"
    );
    Ok(())
}

/// Layer names `"0:1:...:n-1"` for renderers that group nodes by layer.
pub fn layers_spec(layers: usize) -> String {
    (0..layers)
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(":")
}

fn position_of(
    tape: &Tape,
    view: &mut GraphView,
    positions: &mut [Option<usize>],
    index: usize,
) -> usize {
    if let Some(pos) = positions[index] {
        return pos;
    }
    let pos = view.nodes.len();
    view.nodes.push(value_node(&tape.nodes[index]));
    positions[index] = Some(pos);
    pos
}

fn value_node(node: &Node) -> GraphNode {
    GraphNode {
        id: node.id().to_string(),
        data: node.data(),
        grad: node.grad(),
        operation: node.op().symbol().to_string(),
        label: node.context().label.clone().unwrap_or_default(),
        kind: node.kind().into(),
        layer: node.context().layer,
    }
}

fn operator_node(node: &Node) -> GraphNode {
    GraphNode {
        id: format!("{}{}", node.id(), node.op().symbol()),
        kind: NodeKind::Operator,
        label: node.op().to_string(),
        ..value_node(node)
    }
}
