//! Edge types for the lineage graph.
//!
//! An edge is a plain value: two edges with the same endpoints are the
//! same edge. Edges are the only thing that gets persisted.

use crate::node::Node;
use serde::{Deserialize, Serialize};

/// Which way a traversal follows edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Source to target: children, descendants.
    Forward,

    /// Target to source: parents, ascendants.
    Backward,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
        };
        write!(f, "{}", s)
    }
}

/// A directed edge from `source` to `target`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: Node,
    pub target: Node,
}

impl Edge {
    /// Creates a new edge.
    pub fn new(source: Node, target: Node) -> Self {
        Self { source, target }
    }

    /// The endpoint a traversal arrives at when following this edge.
    pub fn far_end(&self, direction: Direction) -> &Node {
        match direction {
            Direction::Forward => &self.target,
            Direction::Backward => &self.source,
        }
    }

    /// The endpoint a traversal leaves from when following this edge.
    pub fn near_end(&self, direction: Direction) -> &Node {
        match direction {
            Direction::Forward => &self.source,
            Direction::Backward => &self.target,
        }
    }
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_far_end() {
        let edge = Edge::new(Node::new("p1", "P"), Node::new("s1", "S"));
        assert_eq!(edge.far_end(Direction::Forward).id, "s1");
        assert_eq!(edge.far_end(Direction::Backward).id, "p1");
    }

    #[test]
    fn test_near_end() {
        let edge = Edge::new(Node::new("p1", "P"), Node::new("s1", "S"));
        assert_eq!(edge.near_end(Direction::Forward), &Node::new("p1", "P"));
        assert_eq!(edge.near_end(Direction::Backward), &Node::new("s1", "S"));
    }

    #[test]
    fn test_display() {
        let edge = Edge::new(Node::new("a", "A"), Node::new("b", "B"));
        assert_eq!(edge.to_string(), "a:A -> b:B");
        assert_eq!(Direction::Backward.to_string(), "backward");
    }
}
