//! Path — a sequence of alternating nodes and relationships.

use serde::{Deserialize, Serialize};
use super::{Node, Relationship};

/// A path in the graph: node -[rel]-> node -[rel]-> node ...
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    /// Nodes along the path. Always has one more element than `relationships`.
    pub nodes: Vec<Node>,
    /// Relationships connecting consecutive nodes.
    pub relationships: Vec<Relationship>,
}

impl Path {
    pub fn single(node: Node) -> Self {
        Self { nodes: vec![node], relationships: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }

    pub fn start(&self) -> &Node {
        self.nodes.first().expect("Path always has at least one node")
    }

    pub fn end(&self) -> &Node {
        self.nodes.last().expect("Path always has at least one node")
    }

    /// Extend path with a relationship and its target node.
    pub fn append(&mut self, rel: Relationship, node: Node) {
        self.relationships.push(rel);
        self.nodes.push(node);
    }

    /// Returns an iterator over (node, relationship, node) triples along the path.
    pub fn triples(&self) -> impl Iterator<Item = (&Node, &Relationship, &Node)> {
        self.relationships.iter().enumerate().map(move |(i, rel)| {
            (&self.nodes[i], rel, &self.nodes[i + 1])
        })
    }

    /// Reverse the path direction.
    pub fn reverse(&mut self) {
        self.nodes.reverse();
        self.relationships.reverse();
    }

    /// Check if a node (by id) exists anywhere in the path.
    pub fn contains_node(&self, id: crate::model::NodeId) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    /// Check if a relationship (by id) exists in the path.
    pub fn contains_relationship(&self, id: crate::model::RelId) -> bool {
        self.relationships.iter().any(|r| r.id == id)
    }

    /// Get a node at a specific position in the path (0-indexed).
    pub fn node_at(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    /// Get a relationship at a specific position in the path (0-indexed).
    pub fn relationship_at(&self, index: usize) -> Option<&Relationship> {
        self.relationships.get(index)
    }

    /// Return all distinct node IDs in the path.
    pub fn node_ids(&self) -> Vec<crate::model::NodeId> {
        self.nodes.iter().map(|n| n.id).collect()
    }

    /// Return all relationship IDs in the path.
    pub fn relationship_ids(&self) -> Vec<crate::model::RelId> {
        self.relationships.iter().map(|r| r.id).collect()
    }
}
