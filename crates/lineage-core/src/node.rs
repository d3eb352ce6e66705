//! Node identity.
//!
//! Nodes are compared on both fields. The same id under two different
//! types is two different nodes as far as equality goes; the graph layer
//! treats that situation as an integrity violation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A vertex of the graph, identified by its id and its type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Node {
    /// Caller-chosen identifier, usually a UUID.
    pub id: String,

    /// Free-form type label such as "P" or "Person".
    #[serde(rename = "type")]
    pub node_type: String,
}

impl Node {
    /// Creates a node from its id and type.
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
        }
    }

    /// Returns true if this node carries the given type label.
    pub fn is_type(&self, node_type: &str) -> bool {
        self.node_type == node_type
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id, self.node_type)
    }
}

/// Error returned when a node cannot be parsed from `ID:TYPE` text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeParseError {
    #[error("expected ID:TYPE, got {0:?}")]
    MissingSeparator(String),
    #[error("node id is empty in {0:?}")]
    EmptyId(String),
    #[error("node type is empty in {0:?}")]
    EmptyType(String),
}

impl FromStr for Node {
    type Err = NodeParseError;

    /// Parses `ID:TYPE`, splitting on the last colon so ids may contain colons.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, node_type) = s
            .rsplit_once(':')
            .ok_or_else(|| NodeParseError::MissingSeparator(s.to_string()))?;

        if id.is_empty() {
            return Err(NodeParseError::EmptyId(s.to_string()));
        }
        if node_type.is_empty() {
            return Err(NodeParseError::EmptyType(s.to_string()));
        }

        Ok(Node::new(id, node_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_node() {
        let node: Node = "c1:C".parse().unwrap();
        assert_eq!(node, Node::new("c1", "C"));
    }

    #[test]
    fn test_parse_splits_on_last_colon() {
        let node: Node = "urn:family:42:Person".parse().unwrap();
        assert_eq!(node.id, "urn:family:42");
        assert_eq!(node.node_type, "Person");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            "nocolon".parse::<Node>(),
            Err(NodeParseError::MissingSeparator(_))
        ));
        assert!(matches!(":P".parse::<Node>(), Err(NodeParseError::EmptyId(_))));
        assert!(matches!("p1:".parse::<Node>(), Err(NodeParseError::EmptyType(_))));
    }

    #[test]
    fn test_equality_needs_both_fields() {
        assert_ne!(Node::new("x", "A"), Node::new("x", "B"));
        assert_eq!(Node::new("x", "A"), Node::new("x", "A"));
    }

    #[test]
    fn test_serde_uses_type_key() {
        let json = serde_json::to_value(Node::new("j1", "J")).unwrap();
        assert_eq!(json, serde_json::json!({ "id": "j1", "type": "J" }));

        let back: Node = serde_json::from_value(json).unwrap();
        assert!(back.is_type("J"));
    }
}
