//! The graph service.
//!
//! A thin, stateless layer over an [`EdgeStore`]. Each call is independent:
//! it issues one or more store queries, deduplicates, and returns. Calls may
//! run concurrently; nothing is shared between them except the store.

use crate::config::DuplicatePolicy;
use crate::error::{GraphError, GraphResult, Operation};
use crate::store::EdgeStore;
use lineage_core::{Direction, Edge, Node};
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Per-service behaviour knobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceOptions {
    /// Deadline applied to every call. `None` waits indefinitely.
    pub query_timeout: Option<Duration>,
    /// How `add_edge` treats an edge that is already stored.
    pub duplicates: DuplicatePolicy,
}

/// Summary returned by [`GraphService::stats`].
#[derive(Debug, Clone, Serialize)]
pub struct GraphStats {
    pub edge_count: usize,
}

/// Traversal and mutation over the edge relation.
#[derive(Clone)]
pub struct GraphService {
    store: Arc<dyn EdgeStore>,
    options: ServiceOptions,
}

impl GraphService {
    /// Creates a service with default options.
    pub fn new(store: Arc<dyn EdgeStore>) -> Self {
        Self::with_options(store, ServiceOptions::default())
    }

    pub fn with_options(store: Arc<dyn EdgeStore>, options: ServiceOptions) -> Self {
        Self { store, options }
    }

    /// Immediate targets of edges leaving `node_id`.
    pub async fn children(&self, node_id: &str) -> GraphResult<Vec<Node>> {
        self.run(Operation::Children, node_id, async move {
            let nodes = self.store.query_by_source(node_id).await?;
            Ok(dedup(nodes))
        })
        .await
    }

    /// Immediate sources of edges entering `node_id`.
    pub async fn parents(&self, node_id: &str) -> GraphResult<Vec<Node>> {
        self.run(Operation::Parents, node_id, async move {
            let nodes = self.store.query_by_target(node_id).await?;
            Ok(dedup(nodes))
        })
        .await
    }

    /// Every node reachable from `node_id` along one or more edges.
    ///
    /// `node_id` itself is included only when a cycle leads back to it.
    pub async fn descendants(&self, node_id: &str) -> GraphResult<Vec<Node>> {
        self.closure(Operation::Descendants, node_id, Direction::Forward, None)
            .await
    }

    /// Every node from which `node_id` is reachable.
    pub async fn ascendants(&self, node_id: &str) -> GraphResult<Vec<Node>> {
        self.closure(Operation::Ascendants, node_id, Direction::Backward, None)
            .await
    }

    /// The nearest descendants of type `node_type` along each branch.
    ///
    /// A matching node is returned and the walk does not continue below it,
    /// so a match hidden behind another match is never returned. The scan
    /// starts at the children: the seed is not returned for matching the
    /// type itself.
    pub async fn first_descendants_of_type(
        &self,
        node_id: &str,
        node_type: &str,
    ) -> GraphResult<Vec<Node>> {
        self.closure(
            Operation::FirstDescendantsOfType,
            node_id,
            Direction::Forward,
            Some(node_type),
        )
        .await
    }

    /// Stores the edge `source -> target`.
    ///
    /// Fails with a type conflict if either id is already stored under a
    /// different type. An edge that already exists is handled according to
    /// [`ServiceOptions::duplicates`].
    pub async fn add_edge(&self, source: Node, target: Node) -> GraphResult<()> {
        let label = source.id.clone();
        self.run(Operation::AddEdge, &label, async move {
            if source.id == target.id && source.node_type != target.node_type {
                return Err(GraphError::TypeConflict {
                    id: source.id.clone(),
                    existing: source.node_type.clone(),
                    found: target.node_type.clone(),
                });
            }
            self.check_recorded_type(&source).await?;
            self.check_recorded_type(&target).await?;

            let edge = Edge::new(source, target);
            match self.store.insert_edge(&edge).await {
                Ok(()) => {
                    debug!("Added edge {}", edge);
                    Ok(())
                }
                Err(GraphError::DuplicateEdge(_))
                    if self.options.duplicates == DuplicatePolicy::Ignore =>
                {
                    debug!("Edge {} already present, ignoring", edge);
                    Ok(())
                }
                Err(e) => Err(e),
            }
        })
        .await
    }

    /// Deletes the edge `source -> target`. Deleting a missing edge succeeds.
    pub async fn remove_edge(&self, source: Node, target: Node) -> GraphResult<()> {
        let label = source.id.clone();
        self.run(Operation::RemoveEdge, &label, async move {
            let edge = Edge::new(source, target);
            let removed = self.store.delete_edge(&edge).await?;
            debug!("Removed {} row(s) for {}", removed, edge);
            Ok(())
        })
        .await
    }

    /// Size of the stored relation.
    pub async fn stats(&self) -> GraphResult<GraphStats> {
        self.run(Operation::Stats, "", async move {
            Ok(GraphStats {
                edge_count: self.store.edge_count().await?,
            })
        })
        .await
    }

    async fn closure(
        &self,
        operation: Operation,
        node_id: &str,
        direction: Direction,
        stop_at: Option<&str>,
    ) -> GraphResult<Vec<Node>> {
        let nodes = self
            .run(operation, node_id, async move {
                self.store.query_recursive(node_id, direction, stop_at).await
            })
            .await?;

        debug!("{} of {}: {} nodes", operation, node_id, nodes.len());
        Ok(nodes)
    }

    async fn check_recorded_type(&self, node: &Node) -> GraphResult<()> {
        let recorded = self.store.node_types(&node.id).await?;
        match recorded.into_iter().find(|t| t != &node.node_type) {
            Some(existing) => {
                warn!(
                    "Refusing edge: node {} is stored as {}, not {}",
                    node.id, existing, node.node_type
                );
                Err(GraphError::TypeConflict {
                    id: node.id.clone(),
                    existing,
                    found: node.node_type.clone(),
                })
            }
            None => Ok(()),
        }
    }

    /// Runs one call under the configured deadline and tags any error with
    /// the operation.
    async fn run<T, F>(&self, operation: Operation, node_id: &str, call: F) -> GraphResult<T>
    where
        F: Future<Output = GraphResult<T>>,
    {
        let result = match self.options.query_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("{} on {} timed out after {:?}", operation, node_id, limit);
                    Err(GraphError::Timeout(limit))
                }
            },
            None => call.await,
        };

        result.map_err(|e| e.during(operation))
    }
}

/// Removes repeated `(id, type)` pairs, keeping first occurrences in order.
fn dedup(nodes: Vec<Node>) -> Vec<Node> {
    let mut seen = HashSet::with_capacity(nodes.len());
    nodes
        .into_iter()
        .filter(|node| seen.insert(node.clone()))
        .collect()
}
