//! In-memory storage backend — the reference implementation of
//! `StorageBackend`.
//!
//! ## Limitations
//!
//! - **No write-ahead log**: every call commits immediately. There is
//!   nothing to roll back, so a pipeline error partway through a write
//!   leaves earlier writes in this call visible.
//! - **Per-collection locking only**: a multi-step mutation (e.g. `CREATE`
//!   then `SET`) is not atomic across the two calls, only within each.
//! - **No real property indexes**: `create_index` records the index so
//!   `capabilities()` can report it, but `nodes_by_property` always scans
//!   the label's nodes.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use parking_lot::RwLock;
use async_trait::async_trait;

use crate::model::*;
use crate::index::IndexType;
use crate::{Error, Result};
use super::{BackendCapabilities, StorageBackend};

/// In-memory property graph storage.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    nodes: RwLock<HashMap<NodeId, Node>>,
    relationships: RwLock<HashMap<RelId, Relationship>>,
    /// node_id -> list of relationship IDs touching it (either direction)
    adjacency: RwLock<HashMap<NodeId, Vec<RelId>>>,
    /// label -> node IDs with that label
    label_index: RwLock<HashMap<String, Vec<NodeId>>>,
    /// (label, property) pairs an index has been declared over
    indexed_properties: RwLock<HashSet<(String, String)>>,
    next_node_id: AtomicU64,
    next_rel_id: AtomicU64,
}

impl Default for MemoryBackend {
    fn default() -> Self { Self::new() }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                nodes: RwLock::new(HashMap::new()),
                relationships: RwLock::new(HashMap::new()),
                adjacency: RwLock::new(HashMap::new()),
                label_index: RwLock::new(HashMap::new()),
                indexed_properties: RwLock::new(HashSet::new()),
                next_node_id: AtomicU64::new(1),
                next_rel_id: AtomicU64::new(1),
            }),
        }
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn create_node(&self, labels: &[&str], props: PropertyMap) -> Result<NodeId> {
        let id = NodeId(self.inner.next_node_id.fetch_add(1, Ordering::Relaxed));
        let node = Node {
            id,
            labels: labels.iter().map(|l| l.to_string()).collect(),
            properties: props,
            embedding: None,
        };

        {
            let mut idx = self.inner.label_index.write();
            for label in &node.labels {
                idx.entry(label.clone()).or_default().push(id);
            }
        }

        self.inner.nodes.write().insert(id, node);
        self.inner.adjacency.write().insert(id, Vec::new());

        Ok(id)
    }

    async fn get_node(&self, id: NodeId) -> Result<Option<Node>> {
        Ok(self.inner.nodes.read().get(&id).cloned())
    }

    async fn delete_node(&self, id: NodeId) -> Result<bool> {
        {
            let adj = self.inner.adjacency.read();
            if let Some(rels) = adj.get(&id) {
                if !rels.is_empty() {
                    return Err(Error::ConstraintViolation(format!(
                        "cannot delete node {id} with {} relationships; detach delete or remove them first",
                        rels.len()
                    )));
                }
            }
        }

        let removed = self.inner.nodes.write().remove(&id);
        self.inner.adjacency.write().remove(&id);

        if let Some(node) = &removed {
            let mut idx = self.inner.label_index.write();
            for label in &node.labels {
                if let Some(ids) = idx.get_mut(label) {
                    ids.retain(|nid| *nid != id);
                }
            }
        }

        Ok(removed.is_some())
    }

    async fn update_node_properties(&self, id: NodeId, props: PropertyMap) -> Result<()> {
        let mut nodes = self.inner.nodes.write();
        let node = nodes.get_mut(&id).ok_or_else(|| Error::StorageError(format!("node {id} not found")))?;
        for (k, v) in props {
            node.properties.insert(k, v);
        }
        Ok(())
    }

    async fn set_node_property(&self, id: NodeId, key: &str, val: Value) -> Result<()> {
        let mut nodes = self.inner.nodes.write();
        let node = nodes.get_mut(&id).ok_or_else(|| Error::StorageError(format!("node {id} not found")))?;
        node.properties.insert(key.to_string(), val);
        Ok(())
    }

    async fn remove_node_property(&self, id: NodeId, key: &str) -> Result<()> {
        let mut nodes = self.inner.nodes.write();
        let node = nodes.get_mut(&id).ok_or_else(|| Error::StorageError(format!("node {id} not found")))?;
        node.properties.shift_remove(key);
        Ok(())
    }

    async fn add_label(&self, id: NodeId, label: &str) -> Result<()> {
        let mut nodes = self.inner.nodes.write();
        let node = nodes.get_mut(&id).ok_or_else(|| Error::StorageError(format!("node {id} not found")))?;
        if !node.labels.iter().any(|l| l == label) {
            node.labels.push(label.to_string());
            drop(nodes);
            self.inner.label_index.write().entry(label.to_string()).or_default().push(id);
        }
        Ok(())
    }

    async fn remove_label(&self, id: NodeId, label: &str) -> Result<()> {
        let mut nodes = self.inner.nodes.write();
        let node = nodes.get_mut(&id).ok_or_else(|| Error::StorageError(format!("node {id} not found")))?;
        node.labels.retain(|l| l != label);
        drop(nodes);
        if let Some(ids) = self.inner.label_index.write().get_mut(label) {
            ids.retain(|nid| *nid != id);
        }
        Ok(())
    }

    async fn create_edge(
        &self,
        src: NodeId,
        dst: NodeId,
        rel_type: &str,
        props: PropertyMap,
    ) -> Result<RelId> {
        {
            let nodes = self.inner.nodes.read();
            if !nodes.contains_key(&src) {
                return Err(Error::StorageError(format!("source node {src} not found")));
            }
            if !nodes.contains_key(&dst) {
                return Err(Error::StorageError(format!("target node {dst} not found")));
            }
        }

        let id = RelId(self.inner.next_rel_id.fetch_add(1, Ordering::Relaxed));
        let rel = Relationship {
            id,
            src,
            dst,
            rel_type: rel_type.to_string(),
            properties: props,
        };

        self.inner.relationships.write().insert(id, rel);

        let mut adj = self.inner.adjacency.write();
        adj.entry(src).or_default().push(id);
        if src != dst {
            adj.entry(dst).or_default().push(id);
        }

        Ok(id)
    }

    async fn get_edge(&self, id: RelId) -> Result<Option<Relationship>> {
        Ok(self.inner.relationships.read().get(&id).cloned())
    }

    async fn delete_edge(&self, id: RelId) -> Result<bool> {
        let removed = self.inner.relationships.write().remove(&id);
        if let Some(rel) = &removed {
            let mut adj = self.inner.adjacency.write();
            if let Some(rels) = adj.get_mut(&rel.src) {
                rels.retain(|rid| *rid != id);
            }
            if rel.src != rel.dst {
                if let Some(rels) = adj.get_mut(&rel.dst) {
                    rels.retain(|rid| *rid != id);
                }
            }
        }
        Ok(removed.is_some())
    }

    async fn set_relationship_property(&self, id: RelId, key: &str, val: Value) -> Result<()> {
        let mut rels = self.inner.relationships.write();
        let rel = rels.get_mut(&id).ok_or_else(|| Error::StorageError(format!("relationship {id} not found")))?;
        rel.properties.insert(key.to_string(), val);
        Ok(())
    }

    async fn remove_relationship_property(&self, id: RelId, key: &str) -> Result<()> {
        let mut rels = self.inner.relationships.write();
        let rel = rels.get_mut(&id).ok_or_else(|| Error::StorageError(format!("relationship {id} not found")))?;
        rel.properties.shift_remove(key);
        Ok(())
    }

    async fn get_outgoing_edges(&self, node: NodeId, rel_type: Option<&str>) -> Result<Vec<Relationship>> {
        let adj = self.inner.adjacency.read();
        let rels = self.inner.relationships.read();
        let ids = adj.get(&node).cloned().unwrap_or_default();
        Ok(ids
            .into_iter()
            .filter_map(|rid| rels.get(&rid).cloned())
            .filter(|r| r.src == node)
            .filter(|r| rel_type.is_none_or(|t| r.rel_type == t))
            .collect())
    }

    async fn get_incoming_edges(&self, node: NodeId, rel_type: Option<&str>) -> Result<Vec<Relationship>> {
        let adj = self.inner.adjacency.read();
        let rels = self.inner.relationships.read();
        let ids = adj.get(&node).cloned().unwrap_or_default();
        Ok(ids
            .into_iter()
            .filter_map(|rid| rels.get(&rid).cloned())
            .filter(|r| r.dst == node)
            .filter(|r| rel_type.is_none_or(|t| r.rel_type == t))
            .collect())
    }

    async fn get_all_nodes(&self) -> Result<Vec<Node>> {
        Ok(self.inner.nodes.read().values().cloned().collect())
    }

    async fn get_nodes_by_label(&self, label: &str) -> Result<Vec<Node>> {
        let idx = self.inner.label_index.read();
        let nodes = self.inner.nodes.read();
        let ids = idx.get(label).cloned().unwrap_or_default();
        Ok(ids.iter().filter_map(|id| nodes.get(id).cloned()).collect())
    }

    async fn nodes_by_property(&self, label: &str, key: &str, value: &Value) -> Result<Vec<Node>> {
        let idx = self.inner.label_index.read();
        let nodes = self.inner.nodes.read();
        let ids = idx.get(label).cloned().unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|id| nodes.get(id))
            .filter(|n| n.get(key) == Some(value))
            .cloned()
            .collect())
    }

    async fn create_index(&self, label: &str, property: &str, _index_type: IndexType) -> Result<()> {
        self.inner
            .indexed_properties
            .write()
            .insert((label.to_string(), property.to_string()));
        Ok(())
    }

    async fn drop_index(&self, label: &str, property: &str) -> Result<()> {
        self.inner
            .indexed_properties
            .write()
            .remove(&(label.to_string(), property.to_string()));
        Ok(())
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            supports_property_index: true,
            supports_fulltext_index: false,
            indexed_properties: self.inner.indexed_properties.read().iter().cloned().collect(),
        }
    }
}
