//! In-process edge relation.
//!
//! Edges live in a petgraph `StableDiGraph` with an index from node id to
//! graph indexes. The graph is only a cache shape for the edge set: a node
//! index exists while at least one edge references it and is dropped with
//! its last edge.

use crate::closure;
use crate::error::{GraphError, GraphResult};
use crate::store::EdgeStore;
use async_trait::async_trait;
use lineage_core::{Direction, Edge, Node};
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct EdgeGraph {
    graph: StableDiGraph<Node, ()>,

    /// Maps each `(id, type)` node to its graph index.
    node_index: HashMap<Node, NodeIndex>,

    /// Maps ids to every graph index carrying that id.
    id_index: HashMap<String, Vec<NodeIndex>>,
}

impl EdgeGraph {
    fn intern(&mut self, node: &Node) -> NodeIndex {
        if let Some(&index) = self.node_index.get(node) {
            return index;
        }

        let index = self.graph.add_node(node.clone());
        self.node_index.insert(node.clone(), index);
        self.id_index.entry(node.id.clone()).or_default().push(index);
        index
    }

    fn insert(&mut self, edge: &Edge) -> GraphResult<()> {
        let from = self.intern(&edge.source);
        let to = self.intern(&edge.target);

        if self.graph.find_edge(from, to).is_some() {
            return Err(GraphError::DuplicateEdge(edge.clone()));
        }
        self.graph.add_edge(from, to, ());
        Ok(())
    }

    fn remove(&mut self, edge: &Edge) -> u64 {
        let (Some(&from), Some(&to)) = (
            self.node_index.get(&edge.source),
            self.node_index.get(&edge.target),
        ) else {
            return 0;
        };

        let Some(edge_index) = self.graph.find_edge(from, to) else {
            return 0;
        };
        self.graph.remove_edge(edge_index);

        self.release_if_unreferenced(from);
        if to != from {
            self.release_if_unreferenced(to);
        }
        1
    }

    fn release_if_unreferenced(&mut self, index: NodeIndex) {
        if self.graph.neighbors_undirected(index).next().is_some() {
            return;
        }

        if let Some(node) = self.graph.remove_node(index) {
            self.node_index.remove(&node);
            if let Some(indexes) = self.id_index.get_mut(&node.id) {
                indexes.retain(|&i| i != index);
                if indexes.is_empty() {
                    self.id_index.remove(&node.id);
                }
            }
        }
    }

    /// Edges at every node carrying `id`, in insertion order per node.
    fn edges(&self, id: &str, direction: Direction) -> Vec<Edge> {
        let flow = match direction {
            Direction::Forward => petgraph::Direction::Outgoing,
            Direction::Backward => petgraph::Direction::Incoming,
        };

        let Some(indexes) = self.id_index.get(id) else {
            return Vec::new();
        };

        let mut edges = Vec::new();
        for &index in indexes {
            let Some(near) = self.graph.node_weight(index) else {
                continue;
            };

            // petgraph yields the most recently added edge first
            let mut step: Vec<Edge> = self
                .graph
                .neighbors_directed(index, flow)
                .filter_map(|n| self.graph.node_weight(n))
                .map(|far| match direction {
                    Direction::Forward => Edge::new(near.clone(), far.clone()),
                    Direction::Backward => Edge::new(far.clone(), near.clone()),
                })
                .collect();
            step.reverse();
            edges.extend(step);
        }
        edges
    }

    fn node_types(&self, id: &str) -> Vec<String> {
        let types: BTreeSet<String> = self
            .id_index
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|&index| self.graph.node_weight(index))
            .map(|node| node.node_type.clone())
            .collect();
        types.into_iter().collect()
    }
}

/// Edge relation held in memory.
///
/// Closure queries run under a single read guard and therefore see one
/// consistent edge set, unlike the per-level lookups of the default walk.
/// The guard is held across the yields between levels, so a timed out or
/// dropped query releases it at the next level boundary.
#[derive(Debug, Default)]
pub struct MemoryEdgeStore {
    inner: RwLock<EdgeGraph>,
}

impl MemoryEdgeStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `edges`; repeated tuples are stored once.
    pub fn with_edges(edges: impl IntoIterator<Item = Edge>) -> Self {
        let mut graph = EdgeGraph::default();
        for edge in edges {
            match graph.insert(&edge) {
                Ok(()) => {}
                // Duplicates collapse into the existing edge.
                Err(GraphError::DuplicateEdge(_)) => {}
                Err(e) => warn!("Skipping edge {}: {}", edge, e),
            }
        }
        Self {
            inner: RwLock::new(graph),
        }
    }

    /// Number of distinct `(id, type)` nodes currently referenced by edges.
    pub async fn node_count(&self) -> usize {
        self.inner.read().await.graph.node_count()
    }
}

#[async_trait]
impl EdgeStore for MemoryEdgeStore {
    async fn insert_edge(&self, edge: &Edge) -> GraphResult<()> {
        self.inner.write().await.insert(edge)?;
        debug!("Inserted {} in memory", edge);
        Ok(())
    }

    async fn delete_edge(&self, edge: &Edge) -> GraphResult<u64> {
        Ok(self.inner.write().await.remove(edge))
    }

    async fn query_edges(&self, id: &str, direction: Direction) -> GraphResult<Vec<Edge>> {
        Ok(self.inner.read().await.edges(id, direction))
    }

    async fn node_types(&self, id: &str) -> GraphResult<Vec<String>> {
        Ok(self.inner.read().await.node_types(id))
    }

    async fn edge_count(&self) -> GraphResult<usize> {
        Ok(self.inner.read().await.graph.edge_count())
    }

    async fn query_recursive(
        &self,
        seed_id: &str,
        direction: Direction,
        stop_at: Option<&str>,
    ) -> GraphResult<Vec<Node>> {
        let graph = self.inner.read().await;
        closure::walk_with(seed_id, direction, stop_at, |id| {
            Ok(graph.edges(id, direction))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(s: &str, st: &str, t: &str, tt: &str) -> Edge {
        Edge::new(Node::new(s, st), Node::new(t, tt))
    }

    #[tokio::test]
    async fn test_neighbours_in_insertion_order() {
        let store = MemoryEdgeStore::new();
        store.insert_edge(&edge("p", "P", "a", "S")).await.unwrap();
        store.insert_edge(&edge("p", "P", "b", "S")).await.unwrap();
        store.insert_edge(&edge("p", "P", "c", "S")).await.unwrap();

        let ids: Vec<_> = store
            .query_by_source("p")
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_rejected() {
        let store = MemoryEdgeStore::new();
        let e = edge("a", "A", "b", "B");
        store.insert_edge(&e).await.unwrap();

        let err = store.insert_edge(&e).await.unwrap_err();
        assert!(matches!(err, GraphError::DuplicateEdge(_)));
        assert_eq!(store.edge_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_with_edges_collapses_duplicates() {
        let store = MemoryEdgeStore::with_edges(vec![
            edge("a", "A", "b", "B"),
            edge("a", "A", "b", "B"),
        ]);
        assert_eq!(store.edge_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_nodes_disappear_with_last_edge() {
        let store = MemoryEdgeStore::with_edges(vec![
            edge("a", "A", "b", "B"),
            edge("b", "B", "c", "C"),
        ]);
        assert_eq!(store.node_count().await, 3);

        assert_eq!(store.delete_edge(&edge("b", "B", "c", "C")).await.unwrap(), 1);
        assert_eq!(store.node_count().await, 2);
        assert!(store.node_types("c").await.unwrap().is_empty());

        assert_eq!(store.delete_edge(&edge("a", "A", "b", "B")).await.unwrap(), 1);
        assert_eq!(store.node_count().await, 0);
    }

    #[tokio::test]
    async fn test_delete_missing_edge_is_zero() {
        let store = MemoryEdgeStore::with_edges(vec![edge("a", "A", "b", "B")]);
        assert_eq!(store.delete_edge(&edge("a", "A", "x", "X")).await.unwrap(), 0);
        assert_eq!(store.delete_edge(&edge("b", "B", "a", "A")).await.unwrap(), 0);
        assert_eq!(store.edge_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_self_loop_removal() {
        let store = MemoryEdgeStore::with_edges(vec![edge("a", "A", "a", "A")]);
        assert_eq!(store.query_by_source("a").await.unwrap(), vec![Node::new("a", "A")]);

        assert_eq!(store.delete_edge(&edge("a", "A", "a", "A")).await.unwrap(), 1);
        assert_eq!(store.node_count().await, 0);
    }

    #[tokio::test]
    async fn test_backward_edges_keep_orientation() {
        let store = MemoryEdgeStore::with_edges(vec![
            edge("p", "P", "s", "S"),
            edge("q", "P", "s", "S"),
        ]);

        assert_eq!(
            store.query_edges("s", Direction::Backward).await.unwrap(),
            vec![edge("p", "P", "s", "S"), edge("q", "P", "s", "S")]
        );
    }

    #[tokio::test]
    async fn test_native_closure_reports_conflict_on_expanded_node() {
        let store = MemoryEdgeStore::with_edges(vec![
            edge("a", "A", "y", "B"),
            edge("y", "Q", "z", "Z"),
        ]);

        let err = store
            .query_recursive("a", Direction::Forward, None)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::TypeConflict { .. }));
    }

    #[tokio::test]
    async fn test_native_closure_can_be_cancelled() {
        let store = MemoryEdgeStore::with_edges((0..50).map(|i| {
            edge(&format!("v{i}"), "V", &format!("v{}", i + 1), "V")
        }));

        let outcome = tokio::time::timeout(
            std::time::Duration::ZERO,
            store.query_recursive("v0", Direction::Forward, None),
        )
        .await;
        assert!(outcome.is_err());

        // the read guard was released with the dropped walk
        store.insert_edge(&edge("x", "X", "y", "Y")).await.unwrap();
    }

    #[tokio::test]
    async fn test_native_closure_matches_default_walk() {
        let store = MemoryEdgeStore::with_edges(vec![
            edge("p1", "P", "s1", "S"),
            edge("s1", "S", "j1", "J"),
            edge("j1", "J", "c1", "C"),
            edge("c1", "C", "p1", "P"),
        ]);

        let native = store
            .query_recursive("p1", Direction::Forward, None)
            .await
            .unwrap();
        let stepped = closure::walk(&store, "p1", Direction::Forward, None)
            .await
            .unwrap();
        assert_eq!(native, stepped);
        assert_eq!(native.len(), 4);
    }
}
