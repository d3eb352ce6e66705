//! Lineage Graph - Edge storage and traversal
//!
//! This crate persists a directed graph as a flat relation of
//! `(source_id, source_type, target_id, target_type)` edges and answers
//! traversal questions over it: children, parents, all descendants, all
//! ascendants, and the first descendants of a given type.
//!
//! # Architecture
//!
//! - [`EdgeStore`] is the only stateful piece. [`SledEdgeStore`] keeps the
//!   relation on disk, [`MemoryEdgeStore`] keeps it in a petgraph graph.
//! - [`GraphService`] is stateless: every call becomes one or more store
//!   lookups and returns a deduplicated node list.
//! - Closures are breadth-first with a visited set, so they terminate on
//!   cycles and expand a shared node once however many paths reach it.
//!
//! # Example
//!
//! ```no_run
//! use lineage_core::Node;
//! use lineage_graph::{GraphService, SledEdgeStore};
//! use std::sync::Arc;
//!
//! # async fn demo() -> lineage_graph::GraphResult<()> {
//! let store = SledEdgeStore::open(".lineage/db", "edge")?;
//! let service = GraphService::new(Arc::new(store));
//!
//! service.add_edge(Node::new("p1", "P"), Node::new("s1", "S")).await?;
//! let below = service.descendants("p1").await?;
//! # Ok(())
//! # }
//! ```

pub mod closure;
pub mod config;
mod error;
mod service;
mod store;

pub use config::{
    Backend, ConfigError, DuplicatePolicy, LineageConfig, ServerSettings, StoreConfig,
};
pub use error::{ErrorKind, GraphError, GraphResult, Operation, Stage};
pub use service::{GraphService, GraphStats, ServiceOptions};
pub use store::{open_store, EdgeStore, MemoryEdgeStore, SledEdgeStore};
