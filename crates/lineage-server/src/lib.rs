//! Lineage Server - WebSocket JSON-RPC front end
//!
//! Exposes the graph service over JSON-RPC 2.0 on a WebSocket:
//!
//! | Method | Params |
//! |---|---|
//! | `graph.info` | none |
//! | `graph.children`, `graph.parents` | `{ "id" }` |
//! | `graph.descendants`, `graph.ascendants` | `{ "id" }` |
//! | `graph.firstDescendantsOfType` | `{ "id", "type" }` |
//! | `edge.add`, `edge.remove` | `{ "source": Node, "target": Node }` |
//!
//! Each connection runs on its own task against one shared service.

mod handlers;
mod protocol;
mod server;

pub use handlers::SharedService;
pub use protocol::{EdgeParams, NodeParams, Request, Response, RpcError, TypedNodeParams};
pub use server::{process_message, LineageServer, ServerConfig};
