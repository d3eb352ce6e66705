//! Sled-backed edge relation.
//!
//! A relation named `edge` lives in two trees of one sled database:
//!
//! - `edge.by_source`: key `source.id, source.type, target.id, target.type`
//! - `edge.by_target`: key `target.id, target.type, source.id, source.type`
//!
//! Each key segment is a big-endian `u32` length followed by the bytes, so a
//! prefix scan on one encoded id returns exactly the edges touching that id.
//! The value in both trees is the bincode-encoded [`Edge`]. Keying on the
//! full tuple gives the relation set semantics.
//!
//! A write succeeds once its transaction commits. The flush that follows
//! is best effort: a failed flush is logged, not returned, since the rows
//! are already visible and a caller retrying would only hit a duplicate.

use crate::error::{GraphError, GraphResult, Stage};
use crate::store::EdgeStore;
use async_trait::async_trait;
use lineage_core::{Direction, Edge, Node};
use sled::transaction::{
    abort, ConflictableTransactionResult, TransactionError, Transactional,
};
use sled::{Db, Tree};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// Transaction abort reason for an insert that finds the tuple present.
#[derive(Debug)]
struct AlreadyPresent;

/// Edge relation persisted in a sled database.
///
/// Cloning is cheap and shares the open database. The database is released
/// when the last clone drops.
#[derive(Clone)]
pub struct SledEdgeStore {
    db: Db,
    relation: String,
    by_source: Tree,
    by_target: Tree,
}

impl SledEdgeStore {
    /// Opens or creates the relation `relation` in the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P, relation: &str) -> GraphResult<Self> {
        let path = path.as_ref();
        let connection_error =
            |e: sled::Error| GraphError::Connection(format!("{}: {}", path.display(), e));

        let db = sled::open(path).map_err(connection_error)?;
        let by_source = db
            .open_tree(format!("{relation}.by_source"))
            .map_err(connection_error)?;
        let by_target = db
            .open_tree(format!("{relation}.by_target"))
            .map_err(connection_error)?;

        info!("Opened edge relation {} at {}", relation, path.display());

        Ok(Self {
            db,
            relation: relation.to_string(),
            by_source,
            by_target,
        })
    }

    /// Name of the relation this store reads and writes.
    pub fn relation(&self) -> &str {
        &self.relation
    }

    /// Flushes pending writes to disk.
    ///
    /// sled's flush blocks the calling thread, so it runs on the blocking
    /// pool.
    pub async fn flush(&self) -> GraphResult<()> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || db.flush())
            .await
            .map_err(|e| GraphError::persistence(Stage::Execute, e))?
            .map_err(|e| GraphError::persistence(Stage::Execute, e))?;
        Ok(())
    }

    /// Decodes every row stored under `id` in `tree`.
    ///
    /// `key_id` picks the field of the decoded edge that must match the
    /// scanned id; a row that decodes to a different id is treated as
    /// corrupt.
    fn scan(&self, tree: &Tree, id: &str, key_id: fn(&Edge) -> &str) -> GraphResult<Vec<Edge>> {
        let prefix = id_prefix(id).map_err(|e| GraphError::query(Stage::Prepare, e))?;

        let mut edges = Vec::new();
        for row in tree.scan_prefix(prefix) {
            let (_, value) = row.map_err(|e| GraphError::query(Stage::Execute, e))?;
            let edge: Edge = bincode::deserialize(&value)
                .map_err(|e| GraphError::Scan(format!("{}: {}", self.relation, e)))?;

            if key_id(&edge) != id {
                return Err(GraphError::Scan(format!(
                    "{}: row under {:?} decodes to edge {}",
                    self.relation, id, edge
                )));
            }
            edges.push(edge);
        }
        Ok(edges)
    }
}

#[async_trait]
impl EdgeStore for SledEdgeStore {
    async fn insert_edge(&self, edge: &Edge) -> GraphResult<()> {
        let (forward, backward, value) =
            encode_row(edge).map_err(|e| GraphError::persistence(Stage::Prepare, e))?;

        let outcome = (&self.by_source, &self.by_target).transaction(
            |(fwd, bwd)| -> ConflictableTransactionResult<(), AlreadyPresent> {
                if fwd.get(forward.as_slice())?.is_some() {
                    return abort(AlreadyPresent);
                }
                fwd.insert(forward.as_slice(), value.as_slice())?;
                bwd.insert(backward.as_slice(), value.as_slice())?;
                Ok(())
            },
        );

        match outcome {
            Ok(()) => {}
            Err(TransactionError::Abort(AlreadyPresent)) => {
                return Err(GraphError::DuplicateEdge(edge.clone()));
            }
            Err(TransactionError::Storage(e)) => {
                return Err(GraphError::persistence(Stage::Execute, e));
            }
        }

        settle(self.flush().await, edge);
        debug!("Inserted {} into {}", edge, self.relation);
        Ok(())
    }

    async fn delete_edge(&self, edge: &Edge) -> GraphResult<u64> {
        let (forward, backward, _) =
            encode_row(edge).map_err(|e| GraphError::persistence(Stage::Prepare, e))?;

        let removed = (&self.by_source, &self.by_target)
            .transaction(|(fwd, bwd)| -> ConflictableTransactionResult<u64, ()> {
                let removed = fwd.remove(forward.as_slice())?;
                bwd.remove(backward.as_slice())?;
                Ok(u64::from(removed.is_some()))
            })
            .map_err(|e| match e {
                TransactionError::Storage(e) => GraphError::persistence(Stage::Execute, e),
                TransactionError::Abort(()) => {
                    GraphError::persistence(Stage::Execute, "delete transaction aborted")
                }
            })?;

        if removed > 0 {
            settle(self.flush().await, edge);
        }
        debug!("Deleted {} row(s) for {} from {}", removed, edge, self.relation);
        Ok(removed)
    }

    async fn query_edges(&self, id: &str, direction: Direction) -> GraphResult<Vec<Edge>> {
        match direction {
            Direction::Forward => self.scan(&self.by_source, id, edge_source_id),
            Direction::Backward => self.scan(&self.by_target, id, edge_target_id),
        }
    }

    async fn node_types(&self, id: &str) -> GraphResult<Vec<String>> {
        let mut types = BTreeSet::new();
        for edge in self.scan(&self.by_source, id, edge_source_id)? {
            types.insert(edge.source.node_type);
        }
        for edge in self.scan(&self.by_target, id, edge_target_id)? {
            types.insert(edge.target.node_type);
        }
        Ok(types.into_iter().collect())
    }

    async fn edge_count(&self) -> GraphResult<usize> {
        Ok(self.by_source.len())
    }
}

/// Logs a flush that failed after its write committed.
fn settle(flushed: GraphResult<()>, edge: &Edge) {
    if let Err(e) = flushed {
        warn!("Committed {} but flush failed: {}", edge, e);
    }
}

fn edge_source_id(edge: &Edge) -> &str {
    &edge.source.id
}

fn edge_target_id(edge: &Edge) -> &str {
    &edge.target.id
}

/// Appends one length-prefixed segment.
fn push_segment(key: &mut Vec<u8>, segment: &str) -> Result<(), String> {
    let len = u32::try_from(segment.len())
        .map_err(|_| format!("key segment of {} bytes is too long", segment.len()))?;
    key.extend_from_slice(&len.to_be_bytes());
    key.extend_from_slice(segment.as_bytes());
    Ok(())
}

fn id_prefix(id: &str) -> Result<Vec<u8>, String> {
    let mut key = Vec::with_capacity(4 + id.len());
    push_segment(&mut key, id)?;
    Ok(key)
}

fn node_pair_key(first: &Node, second: &Node) -> Result<Vec<u8>, String> {
    let mut key = Vec::new();
    push_segment(&mut key, &first.id)?;
    push_segment(&mut key, &first.node_type)?;
    push_segment(&mut key, &second.id)?;
    push_segment(&mut key, &second.node_type)?;
    Ok(key)
}

/// Builds the forward key, backward key and value for one edge.
fn encode_row(edge: &Edge) -> Result<(Vec<u8>, Vec<u8>, Vec<u8>), String> {
    let forward = node_pair_key(&edge.source, &edge.target)?;
    let backward = node_pair_key(&edge.target, &edge.source)?;
    let value = bincode::serialize(edge).map_err(|e| e.to_string())?;
    Ok((forward, backward, value))
}
