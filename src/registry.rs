//! Node storage keyed by stable id

use crate::node::{Node, NodeId};
use std::collections::BTreeMap;

/// Owns every live node. Pure storage and lookup; no routing policy.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: BTreeMap<NodeId, Node>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, returning the node it replaced if the id was taken
    pub fn insert(&mut self, node: Node) -> Option<Node> {
        self.nodes.insert(node.id(), node)
    }

    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        self.nodes.remove(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ids in ascending order
    pub fn ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Nodes with an edge into `id`
    pub fn incoming(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|node| node.has_edge_to(id))
            .map(Node::id)
            .collect()
    }
}
