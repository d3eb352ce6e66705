//! Error types for edge storage and graph traversal.

use lineage_core::Edge;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Where in a store round-trip an error happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Building keys or a transaction before touching the store.
    Prepare,
    /// Running the read or write against the store.
    Execute,
    /// Decoding returned rows into nodes.
    Scan,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Prepare => "prepare",
            Stage::Execute => "execute",
            Stage::Scan => "scan",
        };
        write!(f, "{}", s)
    }
}

/// The graph service call an error came out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Children,
    Parents,
    Descendants,
    Ascendants,
    FirstDescendantsOfType,
    AddEdge,
    RemoveEdge,
    Stats,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Children => "children",
            Operation::Parents => "parents",
            Operation::Descendants => "descendants",
            Operation::Ascendants => "ascendants",
            Operation::FirstDescendantsOfType => "first_descendants_of_type",
            Operation::AddEdge => "add_edge",
            Operation::RemoveEdge => "remove_edge",
            Operation::Stats => "stats",
        };
        write!(f, "{}", s)
    }
}

/// Coarse classification of a [`GraphError`], independent of context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Store unreachable or could not be opened.
    Connection,
    /// A write failed; nothing was changed.
    Persistence,
    /// A read could not be executed.
    Query,
    /// A stored row could not be decoded.
    Scan,
    /// The same node id was recorded under two types.
    Integrity,
    /// The call ran past its deadline.
    Timeout,
}

/// Errors that can occur in edge storage and traversal.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("persistence error during {stage}: {message}")]
    Persistence { stage: Stage, message: String },

    #[error("edge already exists: {0}")]
    DuplicateEdge(Edge),

    #[error("query error during {stage}: {message}")]
    Query { stage: Stage, message: String },

    #[error("scan error: {0}")]
    Scan(String),

    #[error("node {id} recorded as type {existing:?}, got {found:?}")]
    TypeConflict {
        id: String,
        existing: String,
        found: String,
    },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("{operation}: {source}")]
    Operation {
        operation: Operation,
        #[source]
        source: Box<GraphError>,
    },
}

impl GraphError {
    /// Returns the kind of the innermost error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GraphError::Connection(_) => ErrorKind::Connection,
            GraphError::Persistence { .. } | GraphError::DuplicateEdge(_) => {
                ErrorKind::Persistence
            }
            GraphError::Query { .. } => ErrorKind::Query,
            GraphError::Scan(_) => ErrorKind::Scan,
            GraphError::TypeConflict { .. } => ErrorKind::Integrity,
            GraphError::Timeout(_) => ErrorKind::Timeout,
            GraphError::Operation { source, .. } => source.kind(),
        }
    }

    /// Returns the operation this error was raised in, if it has been tagged.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            GraphError::Operation { operation, .. } => Some(*operation),
            _ => None,
        }
    }

    /// Strips the operation context and returns the underlying error.
    pub fn root(&self) -> &GraphError {
        match self {
            GraphError::Operation { source, .. } => source.root(),
            other => other,
        }
    }

    /// Tags this error with the operation that produced it.
    ///
    /// An already tagged error keeps its original operation.
    pub fn during(self, operation: Operation) -> Self {
        match self {
            tagged @ GraphError::Operation { .. } => tagged,
            other => GraphError::Operation {
                operation,
                source: Box::new(other),
            },
        }
    }

    pub(crate) fn persistence(stage: Stage, err: impl fmt::Display) -> Self {
        GraphError::Persistence {
            stage,
            message: err.to_string(),
        }
    }

    pub(crate) fn query(stage: Stage, err: impl fmt::Display) -> Self {
        GraphError::Query {
            stage,
            message: err.to_string(),
        }
    }
}

/// Result type for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;
