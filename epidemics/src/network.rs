//! Contact network abstraction.
//!
//! The simulation only needs to know who can infect whom and, for weighted
//! rates, a numeric attribute per edge or node. [`ContactNetwork`] captures
//! exactly that. It is implemented for any [`petgraph::Graph`] whose node
//! and edge payloads implement [`Attributed`], and for [`Graph`], a thin
//! wrapper over a petgraph graph that adds labelled nodes, a runtime
//! directed/undirected switch and an edge-list parser.
//!
//! # Invariants
//!
//! - Nodes are dense indices `0..node_count()`.
//! - For undirected graphs `successors(n)` and `predecessors(n)` yield the
//!   same nodes.
//! - The network is never mutated while a simulation borrows it.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::{Direction, EdgeType};

use crate::error::EpidemicError;

/// Index of a node in a contact network.
pub type NodeId = usize;

/// Attribute name a bare `f64` payload answers to.
pub const WEIGHT: &str = "weight";

/// Read-only view of a contact network.
pub trait ContactNetwork {
    /// Number of nodes.
    fn node_count(&self) -> usize;

    /// Nodes that `node` can transmit to.
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_;

    /// Nodes that can transmit to `node`.
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_;

    /// Numeric attribute `name` of the edge `source -> target`, if present.
    fn edge_attribute(&self, source: NodeId, target: NodeId, name: &str) -> Option<f64>;

    /// Numeric attribute `name` of `node`, if present.
    fn node_attribute(&self, node: NodeId, name: &str) -> Option<f64>;
}

/// Node or edge payload that can be asked for a named numeric attribute.
pub trait Attributed {
    fn attribute(&self, name: &str) -> Option<f64>;
}

impl Attributed for () {
    fn attribute(&self, _name: &str) -> Option<f64> {
        None
    }
}

impl Attributed for f64 {
    fn attribute(&self, name: &str) -> Option<f64> {
        (name == WEIGHT).then_some(*self)
    }
}

/// Named numeric attributes of a node or edge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    values: HashMap<String, f64>,
}

impl Attributes {
    /// Set `name` to `value`, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }
}

impl Attributed for Attributes {
    fn attribute(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }
}

impl<N: Attributed, E: Attributed, Ty: EdgeType> ContactNetwork for petgraph::Graph<N, E, Ty> {
    fn node_count(&self) -> usize {
        Self::node_count(self)
    }

    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.neighbors_directed(NodeIndex::new(node), Direction::Outgoing)
            .map(NodeIndex::index)
    }

    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.neighbors_directed(NodeIndex::new(node), Direction::Incoming)
            .map(NodeIndex::index)
    }

    fn edge_attribute(&self, source: NodeId, target: NodeId, name: &str) -> Option<f64> {
        let edge = self.find_edge(NodeIndex::new(source), NodeIndex::new(target))?;
        self.edge_weight(edge)?.attribute(name)
    }

    fn node_attribute(&self, node: NodeId, name: &str) -> Option<f64> {
        self.node_weight(NodeIndex::new(node))?.attribute(name)
    }
}

/// Labelled contact network, directed or undirected at runtime.
///
/// Edges are stored once in a directed petgraph graph; an undirected
/// [`Graph`] reads them in both directions. Self loops are rejected and
/// adding an existing edge again is a no-op, so every pair of nodes has at
/// most one edge.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    inner: DiGraph<Attributes, Attributes>,
    directed: bool,
    labels: Vec<String>,
    nodes_by_label: HashMap<String, NodeId>,
}

impl Graph {
    /// Attribute name used for the optional third column of an edge list.
    pub const EDGE_LIST_WEIGHT: &'static str = WEIGHT;

    /// Create an undirected graph with `node_count` isolated nodes labelled
    /// `0..node_count`.
    #[must_use]
    pub fn undirected(node_count: usize) -> Self {
        Self::with_nodes(node_count, false)
    }

    /// Create a directed graph with `node_count` isolated nodes labelled
    /// `0..node_count`.
    #[must_use]
    pub fn directed(node_count: usize) -> Self {
        Self::with_nodes(node_count, true)
    }

    fn empty(directed: bool) -> Self {
        Self {
            directed,
            ..Self::default()
        }
    }

    fn with_nodes(node_count: usize, directed: bool) -> Self {
        let mut graph = Self::empty(directed);
        for node in 0..node_count {
            graph.add_labelled_node(&node.to_string());
        }
        graph
    }

    /// Build a graph from a list of edges between nodes `0..node_count`.
    pub fn from_edges(
        node_count: usize,
        directed: bool,
        edges: &[(NodeId, NodeId)],
    ) -> Result<Self, EpidemicError> {
        let mut graph = Self::with_nodes(node_count, directed);
        for &(source, target) in edges {
            graph.add_edge(source, target)?;
        }
        Ok(graph)
    }

    /// Parse a whitespace separated edge list.
    ///
    /// Each non-empty line is `source target [weight]`; text after `#` is
    /// ignored. Node labels are arbitrary tokens and get dense ids in order
    /// of first appearance. A weight, when present, is stored as the
    /// [`Self::EDGE_LIST_WEIGHT`] edge attribute.
    pub fn parse_edge_list(text: &str, directed: bool) -> Result<Self, EpidemicError> {
        let mut graph = Self::empty(directed);

        for (line_index, raw_line) in text.lines().enumerate() {
            let line = raw_line.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }
            let line_number = line_index + 1;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if !(2..=3).contains(&fields.len()) {
                return Err(EpidemicError::configuration(
                    "edge_list",
                    format!("line {line_number}: expected 2 or 3 fields, found {}", fields.len()),
                ));
            }
            let weight = match fields.get(2) {
                Some(field) => Some(field.parse::<f64>().map_err(|_| {
                    EpidemicError::configuration(
                        "edge_list",
                        format!("line {line_number}: '{field}' is not a number"),
                    )
                })?),
                None => None,
            };
            let source = graph.add_labelled_node(fields[0]);
            let target = graph.add_labelled_node(fields[1]);
            graph.add_edge(source, target).map_err(|_| {
                EpidemicError::configuration(
                    "edge_list",
                    format!("line {line_number}: self loop on '{}'", fields[0]),
                )
            })?;
            if let Some(weight) = weight {
                graph.set_edge_attribute(source, target, Self::EDGE_LIST_WEIGHT, weight)?;
            }
        }
        Ok(graph)
    }

    /// Id of the node labelled `label`, adding the node if it is new.
    pub fn add_labelled_node(&mut self, label: &str) -> NodeId {
        if let Some(&node) = self.nodes_by_label.get(label) {
            return node;
        }
        let node = self.inner.add_node(Attributes::default()).index();
        self.labels.push(label.to_string());
        self.nodes_by_label.insert(label.to_string(), node);
        node
    }

    /// Id of the node labelled `label`.
    #[must_use]
    pub fn node(&self, label: &str) -> Option<NodeId> {
        self.nodes_by_label.get(label).copied()
    }

    /// Label of `node`.
    #[must_use]
    pub fn label(&self, node: NodeId) -> Option<&str> {
        self.labels.get(node).map(String::as_str)
    }

    /// Whether edges are directed.
    #[must_use]
    pub const fn is_directed(&self) -> bool {
        self.directed
    }

    /// Number of edges (each undirected edge counted once).
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Add an edge. Adding an existing edge again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if either endpoint is out of range or
    /// the edge is a self loop.
    pub fn add_edge(&mut self, source: NodeId, target: NodeId) -> Result<(), EpidemicError> {
        self.check_node(source)?;
        self.check_node(target)?;
        if source == target {
            return Err(EpidemicError::configuration(
                "edge",
                format!("self loop on node {source} is not allowed"),
            ));
        }
        if self.find_edge(source, target).is_none() {
            self.inner.add_edge(
                NodeIndex::new(source),
                NodeIndex::new(target),
                Attributes::default(),
            );
        }
        Ok(())
    }

    /// Set a numeric attribute on an existing edge.
    pub fn set_edge_attribute(
        &mut self,
        source: NodeId,
        target: NodeId,
        name: &str,
        value: f64,
    ) -> Result<(), EpidemicError> {
        self.check_node(source)?;
        self.check_node(target)?;
        let attributes = self
            .find_edge(source, target)
            .and_then(|edge| self.inner.edge_weight_mut(edge))
            .ok_or_else(|| {
                EpidemicError::configuration("edge", format!("no edge {source} -> {target}"))
            })?;
        attributes.insert(name, value);
        Ok(())
    }

    /// Set a numeric attribute on a node.
    pub fn set_node_attribute(
        &mut self,
        node: NodeId,
        name: &str,
        value: f64,
    ) -> Result<(), EpidemicError> {
        self.check_node(node)?;
        if let Some(attributes) = self.inner.node_weight_mut(NodeIndex::new(node)) {
            attributes.insert(name, value);
        }
        Ok(())
    }

    fn find_edge(&self, source: NodeId, target: NodeId) -> Option<petgraph::graph::EdgeIndex> {
        let (source, target) = (NodeIndex::new(source), NodeIndex::new(target));
        if self.directed {
            self.inner.find_edge(source, target)
        } else {
            self.inner
                .find_edge_undirected(source, target)
                .map(|(edge, _)| edge)
        }
    }

    fn check_node(&self, node: NodeId) -> Result<(), EpidemicError> {
        if node < self.labels.len() {
            Ok(())
        } else {
            Err(EpidemicError::configuration(
                "node",
                format!("node {node} out of range (graph has {} nodes)", self.labels.len()),
            ))
        }
    }

    fn neighbours(&self, node: NodeId, direction: Direction) -> impl Iterator<Item = NodeId> + '_ {
        let node = NodeIndex::new(node);
        let neighbours = if self.directed {
            self.inner.neighbors_directed(node, direction)
        } else {
            self.inner.neighbors_undirected(node)
        };
        neighbours.map(NodeIndex::index)
    }
}

impl ContactNetwork for Graph {
    fn node_count(&self) -> usize {
        self.labels.len()
    }

    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.neighbours(node, Direction::Outgoing)
    }

    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.neighbours(node, Direction::Incoming)
    }

    fn edge_attribute(&self, source: NodeId, target: NodeId, name: &str) -> Option<f64> {
        let edge = self.find_edge(source, target)?;
        self.inner.edge_weight(edge)?.attribute(name)
    }

    fn node_attribute(&self, node: NodeId, name: &str) -> Option<f64> {
        self.inner.node_weight(NodeIndex::new(node))?.attribute(name)
    }
}
