//! Graph Model
//! Nodes, edges and the invariants that tie them together

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;


/// Length of generated identifiers (hex characters taken from a v4 UUID)
const GENERATED_ID_LEN: usize = 9;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Invalid edge: node '{0}' does not exist")]
    InvalidEdge(NodeId),
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),
    #[error("Unknown edge: {0}")]
    UnknownEdge(EdgeId),
    #[error("Label must not be empty")]
    EmptyLabel,
}

pub type GraphResult<T> = Result<T, GraphError>;

fn generated_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(GENERATED_ID_LEN);
    id
}

// ============================================================================
// IDENTIFIERS
// ============================================================================

/// Opaque node identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Opaque edge identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(String);

impl EdgeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EdgeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

// ============================================================================
// NODES
// ============================================================================

/// Shape category of a node
///
/// The wire names follow the canvas library the documents were first written
/// with, so the aliases accept its built-in `input`/`output`/`default` types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    /// Start or end terminal (circle)
    #[serde(alias = "start_end", alias = "input", alias = "output")]
    StartEnd,
    /// Process step (rounded rectangle)
    #[serde(alias = "default")]
    Process,
    /// Decision point (diamond)
    Decision,
    /// Input/output operation (parallelogram)
    #[serde(alias = "input_output")]
    InputOutput,
    /// Free-standing annotation (dashed box)
    Text,
}

impl NodeKind {
    pub const ALL: [NodeKind; 5] = [
        NodeKind::StartEnd,
        NodeKind::Process,
        NodeKind::Decision,
        NodeKind::InputOutput,
        NodeKind::Text,
    ];

    /// Label given to freshly placed nodes
    pub fn default_label(self) -> &'static str {
        match self {
            NodeKind::StartEnd => "Start",
            NodeKind::Process => "Process",
            NodeKind::Decision => "Decision?",
            NodeKind::InputOutput => "Input/Output",
            NodeKind::Text => "Text",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            NodeKind::StartEnd => "Start/End",
            NodeKind::Process => "Process",
            NodeKind::Decision => "Decision",
            NodeKind::InputOutput => "Input/Output",
            NodeKind::Text => "Text",
        }
    }

    /// Name used in the `type` field of exchanged documents
    pub fn wire_name(self) -> &'static str {
        match self {
            NodeKind::StartEnd => "startEnd",
            NodeKind::Process => "process",
            NodeKind::Decision => "decision",
            NodeKind::InputOutput => "inputOutput",
            NodeKind::Text => "text",
        }
    }

    /// Keyboard shortcut selecting the placement tool for this kind
    pub fn shortcut(self) -> char {
        match self {
            NodeKind::StartEnd => 'S',
            NodeKind::Process => 'P',
            NodeKind::Decision => 'D',
            NodeKind::InputOutput => 'I',
            NodeKind::Text => 'T',
        }
    }

    pub fn from_shortcut(c: char) -> Option<Self> {
        let upper = c.to_ascii_uppercase();
        Self::ALL.into_iter().find(|kind| kind.shortcut() == upper)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Canvas coordinate (top-left anchored)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Both coordinates are finite; anything else cannot be written back as JSON
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn distance(self, other: Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Node payload; unknown keys are carried through untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub label: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodeData {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            extra: Map::new(),
        }
    }
}

/// A shape on the canvas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub position: Position,
    pub data: NodeData,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Node {
    pub fn new(id: NodeId, kind: NodeKind, position: Position, label: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            position,
            data: NodeData::new(label),
            extra: Map::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.data.label
    }
}

// ============================================================================
// EDGES
// ============================================================================

/// A directed connector between two nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Edge {
    pub fn new(id: EdgeId, source: NodeId, target: NodeId) -> Self {
        Self {
            id,
            source,
            target,
            label: None,
            extra: Map::new(),
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }

    pub fn touches(&self, node: &NodeId) -> bool {
        &self.source == node || &self.target == node
    }
}

// ============================================================================
// SELECTION
// ============================================================================

/// The set of nodes and edges the user currently has selected
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selection {
    pub nodes: BTreeSet<NodeId>,
    pub edges: BTreeSet<EdgeId>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
    }

    pub fn only_node(id: NodeId) -> Self {
        let mut selection = Self::default();
        selection.nodes.insert(id);
        selection
    }

    pub fn only_edge(id: EdgeId) -> Self {
        let mut selection = Self::default();
        selection.edges.insert(id);
        selection
    }

    /// Drop ids that no longer exist in `graph`
    pub fn retain_existing(&mut self, graph: &Graph) {
        self.nodes.retain(|id| graph.contains_node(id));
        self.edges.retain(|id| graph.edge(id).is_some());
    }
}

// ============================================================================
// GRAPH
// ============================================================================

/// Counts reported by a removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Removed {
    pub nodes: usize,
    pub edges: usize,
}

impl Removed {
    pub fn is_empty(&self) -> bool {
        self.nodes == 0 && self.edges == 0
    }
}

/// The node/edge aggregate. Vector order is render order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// The graph a new editor starts with: a single start node
    pub fn starter() -> Self {
        Self {
            nodes: vec![Node::new(
                NodeId::new("1"),
                NodeKind::StartEnd,
                Position::new(250.0, 5.0),
                NodeKind::StartEnd.default_label(),
            )],
            edges: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn edge(&self, id: &EdgeId) -> Option<&Edge> {
        self.edges.iter().find(|e| &e.id == id)
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Look up a node by the raw text a user typed
    pub fn find_node(&self, raw: &str) -> Option<&Node> {
        let raw = raw.trim();
        self.nodes.iter().find(|n| n.id.as_str() == raw)
    }

    pub fn nodes_by_id(&self) -> HashMap<&NodeId, &Node> {
        self.nodes.iter().map(|n| (&n.id, n)).collect()
    }

    pub fn edges_touching<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.touches(id))
    }

    pub fn fresh_node_id(&self) -> NodeId {
        loop {
            let id = NodeId::new(generated_id());
            if !self.contains_node(&id) {
                return id;
            }
        }
    }

    pub fn fresh_edge_id(&self) -> EdgeId {
        loop {
            let id = EdgeId::new(generated_id());
            if self.edge(&id).is_none() {
                return id;
            }
        }
    }

    /// Append a node of `kind` with its default label
    pub fn add_node(&mut self, kind: NodeKind, position: Position) -> Node {
        let node = Node::new(self.fresh_node_id(), kind, position, kind.default_label());
        self.nodes.push(node.clone());
        node
    }

    pub fn move_node(&mut self, id: &NodeId, position: Position) -> GraphResult<()> {
        let node = self
            .nodes
            .iter_mut()
            .find(|n| &n.id == id)
            .ok_or_else(|| GraphError::UnknownNode(id.clone()))?;
        node.position = position;
        Ok(())
    }

    /// Replace a node's label. Blank input leaves the label unchanged.
    pub fn relabel_node(&mut self, id: &NodeId, label: &str) -> GraphResult<()> {
        let label = label.trim();
        if label.is_empty() {
            return Err(GraphError::EmptyLabel);
        }
        let node = self
            .nodes
            .iter_mut()
            .find(|n| &n.id == id)
            .ok_or_else(|| GraphError::UnknownNode(id.clone()))?;
        node.data.label = label.to_string();
        Ok(())
    }

    /// Remove nodes together with every edge attached to them
    pub fn remove_nodes(&mut self, ids: &HashSet<NodeId>) -> Removed {
        let nodes_before = self.nodes.len();
        let edges_before = self.edges.len();

        self.nodes.retain(|n| !ids.contains(&n.id));
        self.edges
            .retain(|e| !ids.contains(&e.source) && !ids.contains(&e.target));

        Removed {
            nodes: nodes_before - self.nodes.len(),
            edges: edges_before - self.edges.len(),
        }
    }

    /// Connect `source` to `target`. Self-loops and parallel edges are allowed.
    pub fn add_edge(&mut self, source: &NodeId, target: &NodeId) -> GraphResult<Edge> {
        for endpoint in [source, target] {
            if !self.contains_node(endpoint) {
                return Err(GraphError::InvalidEdge(endpoint.clone()));
            }
        }

        let edge = Edge::new(self.fresh_edge_id(), source.clone(), target.clone());
        self.edges.push(edge.clone());
        Ok(edge)
    }

    pub fn remove_edges(&mut self, ids: &HashSet<EdgeId>) -> usize {
        let before = self.edges.len();
        self.edges.retain(|e| !ids.contains(&e.id));
        before - self.edges.len()
    }

    /// Set an edge label; blank input clears it
    pub fn relabel_edge(&mut self, id: &EdgeId, label: &str) -> GraphResult<()> {
        let edge = self
            .edges
            .iter_mut()
            .find(|e| &e.id == id)
            .ok_or_else(|| GraphError::UnknownEdge(id.clone()))?;
        let label = label.trim();
        edge.label = (!label.is_empty()).then(|| label.to_string());
        Ok(())
    }

    /// Check identifier uniqueness and edge endpoints
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        let mut node_ids = HashSet::new();
        for node in &self.nodes {
            if !node_ids.insert(&node.id) {
                errors.push(format!("Duplicate node id '{}'", node.id));
            }
            if !node.position.is_finite() {
                errors.push(format!("Node '{}' has a non-finite position", node.id));
            }
        }

        let mut edge_ids = HashSet::new();
        for edge in &self.edges {
            if !edge_ids.insert(&edge.id) {
                errors.push(format!("Duplicate edge id '{}'", edge.id));
            }
            if !node_ids.contains(&edge.source) {
                errors.push(format!(
                    "Edge '{}' source node '{}' not found",
                    edge.id, edge.source
                ));
            }
            if !node_ids.contains(&edge.target) {
                errors.push(format!(
                    "Edge '{}' target node '{}' not found",
                    edge.id, edge.target
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
