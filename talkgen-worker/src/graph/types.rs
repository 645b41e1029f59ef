//! Node graph data model
//!
//! Every node input is either a literal value or a port reference to another
//! node's output. The distinction is carried in the type, so wiring can be
//! checked without guessing from the shape of a JSON value.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use super::validate::{self, GraphIntegrityError};

/// Node identifier, unique within a graph
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
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

/// "Use output `output` of node `node`"
///
/// Serialized as a two-element array `["node_id", output]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PortRef(pub NodeId, pub u32);

impl PortRef {
    pub fn new(node: impl Into<NodeId>, output: u32) -> Self {
        Self(node.into(), output)
    }

    pub fn node(&self) -> &NodeId {
        &self.0
    }

    pub fn output(&self) -> u32 {
        self.1
    }
}

/// Literal input value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Literal {
    Str(String),
    UInt(u64),
    Float(f64),
    Bool(bool),
}

/// A node input: data or wiring
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InputValue {
    Literal(Literal),
    Port(PortRef),
}

impl InputValue {
    pub fn as_port(&self) -> Option<&PortRef> {
        match self {
            InputValue::Port(port) => Some(port),
            InputValue::Literal(_) => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            InputValue::Literal(literal) => Some(literal),
            InputValue::Port(_) => None,
        }
    }
}

impl From<PortRef> for InputValue {
    fn from(port: PortRef) -> Self {
        InputValue::Port(port)
    }
}

impl From<&str> for InputValue {
    fn from(value: &str) -> Self {
        InputValue::Literal(Literal::Str(value.to_string()))
    }
}

impl From<String> for InputValue {
    fn from(value: String) -> Self {
        InputValue::Literal(Literal::Str(value))
    }
}

impl From<&String> for InputValue {
    fn from(value: &String) -> Self {
        InputValue::Literal(Literal::Str(value.clone()))
    }
}

impl From<u32> for InputValue {
    fn from(value: u32) -> Self {
        InputValue::Literal(Literal::UInt(u64::from(value)))
    }
}

impl From<u64> for InputValue {
    fn from(value: u64) -> Self {
        InputValue::Literal(Literal::UInt(value))
    }
}

impl From<f64> for InputValue {
    fn from(value: f64) -> Self {
        InputValue::Literal(Literal::Float(value))
    }
}

impl From<bool> for InputValue {
    fn from(value: bool) -> Self {
        InputValue::Literal(Literal::Bool(value))
    }
}

/// One processing node
///
/// Serializes to the engine wire shape `{ "inputs": {...}, "kind": "..." }`;
/// the id becomes the key of the enclosing map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    #[serde(skip)]
    id: NodeId,
    inputs: BTreeMap<String, InputValue>,
    kind: String,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            inputs: BTreeMap::new(),
            kind: kind.into(),
        }
    }

    /// Add an input (literal or port reference)
    pub fn with(mut self, name: &str, value: impl Into<InputValue>) -> Self {
        self.inputs.insert(name.to_string(), value.into());
        self
    }

    /// Add a port reference input
    pub fn with_port(self, name: &str, node: &str, output: u32) -> Self {
        self.with(name, PortRef::new(node, output))
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn inputs(&self) -> &BTreeMap<String, InputValue> {
        &self.inputs
    }

    pub fn input(&self, name: &str) -> Option<&InputValue> {
        self.inputs.get(name)
    }

    /// Port references among this node's inputs, keyed by input name
    pub fn ports(&self) -> impl Iterator<Item = (&str, &PortRef)> {
        self.inputs
            .iter()
            .filter_map(|(name, value)| value.as_port().map(|port| (name.as_str(), port)))
    }
}

/// Immutable node graph submitted as one job
///
/// Only obtainable through [`Graph::new`], which validates referential
/// integrity and acyclicity.
#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    client_id: String,
    nodes: BTreeMap<NodeId, Node>,
}

impl Graph {
    /// Assemble and validate a graph
    ///
    /// Fails on duplicate ids, dangling or self references, and cycles.
    pub fn new(
        client_id: impl Into<String>,
        nodes: impl IntoIterator<Item = Node>,
    ) -> Result<Self, GraphIntegrityError> {
        let mut by_id = BTreeMap::new();
        for node in nodes {
            if by_id.contains_key(node.id()) {
                return Err(GraphIntegrityError::DuplicateNode(node.id().clone()));
            }
            by_id.insert(node.id().clone(), node);
        }

        validate::validate_nodes(&by_id)?;

        Ok(Self {
            client_id: client_id.into(),
            nodes: by_id,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn nodes(&self) -> &BTreeMap<NodeId, Node> {
        &self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(&NodeId::from(id))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every port reference as `(source node, input name, target)`
    pub fn port_references(&self) -> Vec<(&NodeId, &str, &PortRef)> {
        self.nodes
            .values()
            .flat_map(|node| node.ports().map(move |(name, port)| (node.id(), name, port)))
            .collect()
    }

    /// Node ids ordered so every node comes after the nodes it references
    pub fn topological_order(&self) -> Vec<NodeId> {
        // Validated at construction, so the sort cannot fail here
        validate::topological_order(&self.nodes).unwrap_or_default()
    }
}
