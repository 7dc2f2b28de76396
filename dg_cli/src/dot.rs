//! Graphviz DOT rendering of a computation graph.
//!
//! [`DotGrapher`] collects the presented graph into a petgraph `DiGraph` and
//! renders it with `petgraph::dot`.

use std::collections::{HashMap, HashSet};
use std::fmt;

use dg_core::graph::{GraphEdge, GraphNode, Grapher, NodeKind};
use dg_core::{Error, Result};
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};

/// Node weight; its `Display` is the label Graphviz shows.
#[derive(Debug, Clone)]
pub struct DotNode(pub GraphNode);

impl fmt::Display for DotNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = &self.0;
        match node.kind {
            NodeKind::Operator => f.write_str(&node.operation),
            _ if node.label.is_empty() => {
                write!(f, "data {} | grad {}", node.data, node.grad)
            }
            _ => write!(f, "{} | data {} | grad {}", node.label, node.data, node.grad),
        }
    }
}

#[derive(Debug, Default)]
struct Canvas {
    graph: DiGraph<DotNode, String>,
    nodes: HashMap<String, NodeIndex>,
    edges: HashSet<String>,
}

impl Canvas {
    fn insert(&mut self, node: &GraphNode) -> NodeIndex {
        if let Some(&ix) = self.nodes.get(&node.id) {
            return ix;
        }
        let ix = self.graph.add_node(DotNode(node.clone()));
        self.nodes.insert(node.id.clone(), ix);
        ix
    }
}

/// Grapher producing a Graphviz `digraph`.
///
/// Nodes and edges are deduplicated by id, and both ends of an edge must
/// already be added. Adding anything before [`Grapher::reset_graph`] fails
/// with [`Error::GraphNotInitialized`].
#[derive(Debug, Default)]
pub struct DotGrapher {
    canvas: Option<Canvas>,
}

impl DotGrapher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes in the current graph.
    pub fn node_count(&self) -> usize {
        self.canvas.as_ref().map_or(0, |c| c.graph.node_count())
    }

    /// Number of edges in the current graph.
    pub fn edge_count(&self) -> usize {
        self.canvas.as_ref().map_or(0, |c| c.graph.edge_count())
    }

    fn canvas(&mut self) -> Result<&mut Canvas> {
        self.canvas.as_mut().ok_or(Error::GraphNotInitialized)
    }
}

impl Grapher for DotGrapher {
    fn reset_graph(&mut self) -> Result<()> {
        self.canvas = Some(Canvas::default());
        Ok(())
    }

    fn add_node(&mut self, node: &GraphNode) -> Result<()> {
        self.canvas()?.insert(node);
        Ok(())
    }

    fn add_edge(&mut self, from: &GraphNode, to: &GraphNode, edge: &GraphEdge) -> Result<()> {
        let canvas = self.canvas()?;
        if !canvas.edges.insert(edge.id.clone()) {
            return Ok(());
        }
        let (Some(&a), Some(&b)) = (canvas.nodes.get(&from.id), canvas.nodes.get(&to.id)) else {
            canvas.edges.remove(&edge.id);
            return Err(Error::Grapher(format!(
                "edge {} joins a node that was never added",
                edge.id
            )));
        };
        canvas.graph.add_edge(a, b, edge.id.clone());
        Ok(())
    }

    fn render(&mut self) -> Result<Vec<u8>> {
        let canvas = self.canvas()?;
        let dot = Dot::with_attr_getters(
            &canvas.graph,
            &[Config::EdgeNoLabel],
            &|_, _| String::new(),
            &|_, (_, node)| node_attributes(&node.0),
        );
        Ok(format!("{dot}").into_bytes())
    }
}

fn node_attributes(node: &GraphNode) -> String {
    let (shape, color) = match node.kind {
        NodeKind::Operator => ("circle", "white"),
        NodeKind::Input => ("box", "lightblue"),
        NodeKind::Expectation => ("box", "khaki"),
        NodeKind::Weight => ("box", "palegreen"),
        NodeKind::Bias => ("box", "darkseagreen"),
        NodeKind::Constant => ("box", "lightgrey"),
        NodeKind::Value => ("box", "white"),
    };
    let mut attrs = format!("shape = {shape} style = filled fillcolor = {color}");
    if let Some(layer) = node.layer {
        attrs.push_str(&format!(" group = \"layer{layer}\""));
    }
    attrs
}
