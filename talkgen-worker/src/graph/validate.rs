//! Graph integrity checks
//!
//! A graph is valid when every port reference names a node in the same graph,
//! no node references itself, and the reference graph has no cycle.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use super::types::{Node, NodeId};

/// Structural defects in a node graph
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphIntegrityError {
    #[error("Duplicate node id: {0}")]
    DuplicateNode(NodeId),

    #[error("Node {node} input {input:?} references missing node {target}")]
    DanglingReference {
        node: NodeId,
        input: String,
        target: NodeId,
    },

    #[error("Node {node} input {input:?} references itself")]
    SelfReference { node: NodeId, input: String },

    #[error("Reference cycle through node {0}")]
    Cycle(NodeId),
}

/// Check references and acyclicity for a set of nodes keyed by id
pub fn validate_nodes(nodes: &BTreeMap<NodeId, Node>) -> Result<(), GraphIntegrityError> {
    for node in nodes.values() {
        for (input, port) in node.ports() {
            if port.node() == node.id() {
                return Err(GraphIntegrityError::SelfReference {
                    node: node.id().clone(),
                    input: input.to_string(),
                });
            }
            if !nodes.contains_key(port.node()) {
                return Err(GraphIntegrityError::DanglingReference {
                    node: node.id().clone(),
                    input: input.to_string(),
                    target: port.node().clone(),
                });
            }
        }
    }

    topological_order(nodes).map(|_| ())
}

/// Order node ids so that referenced nodes come first
///
/// Assumes references resolve; a dangling reference is reported as such.
pub fn topological_order(
    nodes: &BTreeMap<NodeId, Node>,
) -> Result<Vec<NodeId>, GraphIntegrityError> {
    let mut dag: DiGraph<&NodeId, ()> = DiGraph::with_capacity(nodes.len(), nodes.len());
    let index: HashMap<&NodeId, NodeIndex> =
        nodes.keys().map(|id| (id, dag.add_node(id))).collect();

    for node in nodes.values() {
        let target = index[node.id()];
        for (input, port) in node.ports() {
            let source = index.get(port.node()).copied().ok_or_else(|| {
                GraphIntegrityError::DanglingReference {
                    node: node.id().clone(),
                    input: input.to_string(),
                    target: port.node().clone(),
                }
            })?;
            // Edge points from producer to consumer
            dag.add_edge(source, target, ());
        }
    }

    toposort(&dag, None)
        .map(|order| order.into_iter().map(|ix| dag[ix].clone()).collect())
        .map_err(|cycle| GraphIntegrityError::Cycle(dag[cycle.node_id()].clone()))
}
