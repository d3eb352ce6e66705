//! Transitive closure over the edge relation.
//!
//! The walk is breadth-first and level by level. Every discovered node is
//! recorded as visited before it can be queued, so a node reached by many
//! paths (a diamond, or a wide fan-in onto a shared ancestor chain) is
//! expanded once, and cycles terminate.
//!
//! Each expansion reads whole edge rows, not just the far endpoints, so the
//! type of the near endpoint is checked too. An id stored under two types is
//! reported as a type conflict wherever the walk meets it.
//!
//! [`ClosureWalk`] is only the bookkeeping; it never talks to a store. The
//! async [`walk`] drives it with one store lookup per expanded id, and
//! in-process backends drive it with a synchronous lookup through
//! [`walk_with`]. Both yield to the runtime between levels.

use crate::error::{GraphError, GraphResult};
use crate::store::EdgeStore;
use lineage_core::{Direction, Edge, Node};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// State of one closure computation.
#[derive(Debug)]
pub struct ClosureWalk {
    direction: Direction,
    /// When set, nodes of this type are emitted and not expanded.
    stop_at: Option<String>,
    /// Nodes already discovered, keyed on `(id, type)`.
    visited: HashSet<Node>,
    /// Ids already queued for expansion, seed included.
    expanded: HashSet<String>,
    /// The one type each id has been seen with.
    types: HashMap<String, String>,
    /// Ids to expand on the next level.
    frontier: Vec<String>,
    result: Vec<Node>,
    depth: usize,
}

impl ClosureWalk {
    /// Starts a walk at `seed_id`.
    ///
    /// The seed itself is expanded but not emitted. It only shows up in the
    /// result if a cycle leads back to it.
    pub fn new(seed_id: &str, direction: Direction, stop_at: Option<&str>) -> Self {
        let mut expanded = HashSet::new();
        expanded.insert(seed_id.to_string());

        Self {
            direction,
            stop_at: stop_at.map(str::to_string),
            visited: HashSet::new(),
            expanded,
            types: HashMap::new(),
            frontier: vec![seed_id.to_string()],
            result: Vec::new(),
            depth: 0,
        }
    }

    /// True once there is nothing left to expand.
    pub fn is_done(&self) -> bool {
        self.frontier.is_empty()
    }

    /// Number of levels handed out so far.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Takes the ids of the next level to expand.
    pub fn take_level(&mut self) -> Vec<String> {
        self.depth += 1;
        std::mem::take(&mut self.frontier)
    }

    /// Feeds the edge rows read for one expanded id back into the walk.
    pub fn absorb(&mut self, edges: impl IntoIterator<Item = Edge>) -> GraphResult<()> {
        for edge in edges {
            self.check_type(edge.near_end(self.direction))?;

            let node = edge.far_end(self.direction);
            self.check_type(node)?;

            if self.visited.contains(node) {
                continue;
            }
            self.visited.insert(node.clone());

            let stops_here = self.stop_at.as_deref().map(|t| node.is_type(t));

            match stops_here {
                Some(true) => self.result.push(node.clone()),
                Some(false) => self.enqueue(&node.id),
                None => {
                    self.enqueue(&node.id);
                    self.result.push(node.clone());
                }
            }
        }
        Ok(())
    }

    /// Consumes the walk and returns the nodes in discovery order.
    pub fn finish(self) -> Vec<Node> {
        self.result
    }

    fn enqueue(&mut self, id: &str) {
        if self.expanded.insert(id.to_string()) {
            self.frontier.push(id.to_string());
        }
    }

    fn check_type(&mut self, node: &Node) -> GraphResult<()> {
        match self.types.get(&node.id) {
            Some(existing) if existing != &node.node_type => {
                warn!(
                    "node {} seen as both {} and {}",
                    node.id, existing, node.node_type
                );
                Err(GraphError::TypeConflict {
                    id: node.id.clone(),
                    existing: existing.clone(),
                    found: node.node_type.clone(),
                })
            }
            Some(_) => Ok(()),
            None => {
                self.types.insert(node.id.clone(), node.node_type.clone());
                Ok(())
            }
        }
    }
}

/// Computes a closure against a store, one lookup per expanded id.
///
/// No snapshot is held: edges written while the walk runs may or may not
/// be seen.
pub async fn walk<S: EdgeStore + ?Sized>(
    store: &S,
    seed_id: &str,
    direction: Direction,
    stop_at: Option<&str>,
) -> GraphResult<Vec<Node>> {
    let mut closure = ClosureWalk::new(seed_id, direction, stop_at);

    while !closure.is_done() {
        for id in closure.take_level() {
            let edges = store.query_edges(&id, direction).await?;
            closure.absorb(edges)?;
        }
        tokio::task::yield_now().await;
    }

    debug!(
        "{} closure from {} finished after {} levels",
        direction,
        seed_id,
        closure.depth()
    );
    Ok(closure.finish())
}

/// Computes a closure with a synchronous edge lookup.
///
/// Yields between levels so that a surrounding timeout or a dropped future
/// stops the walk even when every lookup completes immediately.
pub async fn walk_with<F>(
    seed_id: &str,
    direction: Direction,
    stop_at: Option<&str>,
    mut edges: F,
) -> GraphResult<Vec<Node>>
where
    F: FnMut(&str) -> GraphResult<Vec<Edge>>,
{
    let mut closure = ClosureWalk::new(seed_id, direction, stop_at);

    while !closure.is_done() {
        for id in closure.take_level() {
            closure.absorb(edges(&id)?)?;
        }
        tokio::task::yield_now().await;
    }

    Ok(closure.finish())
}
