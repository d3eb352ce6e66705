//! Edge storage.
//!
//! The edge relation is the only persisted state. Backends implement
//! [`EdgeStore`]; the graph service only ever talks to the trait.

mod disk;
mod memory;

pub use disk::SledEdgeStore;
pub use memory::MemoryEdgeStore;

use crate::closure;
use crate::config::{Backend, StoreConfig};
use crate::error::GraphResult;
use async_trait::async_trait;
use lineage_core::{Direction, Edge, Node};
use std::sync::Arc;

/// A durable, queryable relation of directed edges.
///
/// Identical tuples are stored once: inserting an edge that already exists
/// fails with [`GraphError::DuplicateEdge`](crate::GraphError::DuplicateEdge).
#[async_trait]
pub trait EdgeStore: Send + Sync {
    /// Inserts one edge.
    async fn insert_edge(&self, edge: &Edge) -> GraphResult<()>;

    /// Deletes the edge matching all four fields and returns how many rows
    /// went away. Deleting a missing edge returns `Ok(0)`.
    async fn delete_edge(&self, edge: &Edge) -> GraphResult<u64>;

    /// Every stored edge whose near endpoint has id `id`: edges leaving
    /// `id` for [`Direction::Forward`], edges entering it for
    /// [`Direction::Backward`]. Rows come back whole so callers can see the
    /// type `id` was stored with on each of them.
    async fn query_edges(&self, id: &str, direction: Direction) -> GraphResult<Vec<Edge>>;

    /// Every type `id` has been stored with, on either side of an edge.
    async fn node_types(&self, id: &str) -> GraphResult<Vec<String>>;

    /// Number of stored edges.
    async fn edge_count(&self) -> GraphResult<usize>;

    /// Targets of every edge whose source id is `source_id`.
    async fn query_by_source(&self, source_id: &str) -> GraphResult<Vec<Node>> {
        let edges = self.query_edges(source_id, Direction::Forward).await?;
        Ok(edges.into_iter().map(|e| e.target).collect())
    }

    /// Sources of every edge whose target id is `target_id`.
    async fn query_by_target(&self, target_id: &str) -> GraphResult<Vec<Node>> {
        let edges = self.query_edges(target_id, Direction::Backward).await?;
        Ok(edges.into_iter().map(|e| e.source).collect())
    }

    /// Full closure reachable from `seed_id`.
    ///
    /// With `stop_at`, nodes of that type are returned but not walked past.
    /// The default issues one point lookup per expanded node; backends that
    /// can do better override it. Fails with a type conflict if an id turns
    /// up under two types on any row the walk reads.
    async fn query_recursive(
        &self,
        seed_id: &str,
        direction: Direction,
        stop_at: Option<&str>,
    ) -> GraphResult<Vec<Node>> {
        closure::walk(self, seed_id, direction, stop_at).await
    }
}

/// Opens the backend described by `config`.
pub fn open_store(config: &StoreConfig) -> GraphResult<Arc<dyn EdgeStore>> {
    match config.backend {
        Backend::Sled => Ok(Arc::new(SledEdgeStore::open(&config.path, &config.relation)?)),
        Backend::Memory => Ok(Arc::new(MemoryEdgeStore::new())),
    }
}
