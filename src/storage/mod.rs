//! # Storage Backend Trait
//!
//! This is the contract between the executor and any storage engine. Every
//! method is independently atomic — there is no transaction object, no
//! cross-call isolation stronger than read-your-own-writes. The clause
//! pipeline calls straight through this trait; it is the only thing the
//! executor knows about how nodes and relationships are actually kept.
//!
//! ## Implementations
//!
//! | Backend | Module | Description |
//! |---------|--------|-------------|
//! | `MemoryBackend` | `memory` | In-memory, reference implementation |

pub mod memory;

use async_trait::async_trait;
use crate::model::*;
use crate::index::IndexType;
use crate::Result;

pub use memory::MemoryBackend;

/// What a backend can do — the traversal engine's anchor-selection step
/// uses this to decide whether a property lookup is index-backed or must
/// fall back to a label scan.
#[derive(Debug, Clone, Default)]
pub struct BackendCapabilities {
    pub supports_property_index: bool,
    pub supports_fulltext_index: bool,
    pub indexed_properties: Vec<(String, String)>,
}

/// The universal storage contract. Any backend that implements this trait
/// can serve as the storage layer for the executor.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    // ========================================================================
    // Node CRUD
    // ========================================================================

    async fn create_node(&self, labels: &[&str], props: PropertyMap) -> Result<NodeId>;

    async fn get_node(&self, id: NodeId) -> Result<Option<Node>>;

    /// Delete a node. Returns true if it existed. Fails if the node still
    /// has relationships — callers wanting `DETACH DELETE` must delete the
    /// relationships first.
    async fn delete_node(&self, id: NodeId) -> Result<bool>;

    async fn update_node_properties(&self, id: NodeId, props: PropertyMap) -> Result<()>;

    async fn set_node_property(&self, id: NodeId, key: &str, val: Value) -> Result<()>;

    async fn remove_node_property(&self, id: NodeId, key: &str) -> Result<()>;

    async fn add_label(&self, id: NodeId, label: &str) -> Result<()>;

    async fn remove_label(&self, id: NodeId, label: &str) -> Result<()>;

    /// Delete a node and all its relationships. Default: fetch both
    /// directions' relationships, delete each, then delete the node.
    async fn detach_delete_node(&self, id: NodeId) -> Result<bool> {
        let out = self.get_outgoing_edges(id, None).await?;
        let inc = self.get_incoming_edges(id, None).await?;
        for rel in out.into_iter().chain(inc) {
            self.delete_edge(rel.id).await?;
        }
        self.delete_node(id).await
    }

    // ========================================================================
    // Relationship CRUD
    // ========================================================================

    async fn create_edge(
        &self,
        src: NodeId,
        dst: NodeId,
        rel_type: &str,
        props: PropertyMap,
    ) -> Result<RelId>;

    async fn get_edge(&self, id: RelId) -> Result<Option<Relationship>>;

    async fn delete_edge(&self, id: RelId) -> Result<bool>;

    async fn set_relationship_property(&self, id: RelId, key: &str, val: Value) -> Result<()>;

    async fn remove_relationship_property(&self, id: RelId, key: &str) -> Result<()>;

    // ========================================================================
    // Traversal
    // ========================================================================

    async fn get_outgoing_edges(
        &self,
        node: NodeId,
        rel_type: Option<&str>,
    ) -> Result<Vec<Relationship>>;

    async fn get_incoming_edges(
        &self,
        node: NodeId,
        rel_type: Option<&str>,
    ) -> Result<Vec<Relationship>>;

    // ========================================================================
    // Scan
    // ========================================================================

    async fn get_all_nodes(&self) -> Result<Vec<Node>>;

    async fn get_nodes_by_label(&self, label: &str) -> Result<Vec<Node>>;

    /// Find nodes by label + property value. Index-backed when
    /// `capabilities()` reports one for this (label, key) pair, otherwise a
    /// full scan of the label's nodes.
    async fn nodes_by_property(&self, label: &str, key: &str, value: &Value) -> Result<Vec<Node>>;

    // ========================================================================
    // Index
    // ========================================================================

    async fn create_index(&self, label: &str, property: &str, index_type: IndexType) -> Result<()>;

    async fn drop_index(&self, label: &str, property: &str) -> Result<()>;

    // ========================================================================
    // Capability negotiation
    // ========================================================================

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::default()
    }
}
