//! Lineage Core - Graph value types
//!
//! This crate defines the values everything else in Lineage passes around.
//! A node has no record of its own: it is an `(id, type)` pair that exists
//! only as an endpoint of at least one stored edge.
//!
//! # Example
//!
//! ```
//! use lineage_core::{Edge, Node};
//!
//! let parent: Node = "p1:P".parse().unwrap();
//! let child = Node::new("s1", "S");
//!
//! let edge = Edge::new(parent, child);
//! assert_eq!(edge.to_string(), "p1:P -> s1:S");
//! ```

mod edge;
mod node;

pub use edge::{Direction, Edge};
pub use node::{Node, NodeParseError};
