//! Request handlers for protocol methods.
//!
//! Each handler implements one method and turns service errors into
//! JSON-RPC error responses.

use crate::protocol::{EdgeParams, NodeParams, Response, TypedNodeParams};
use lineage_core::Node;
use lineage_graph::{GraphResult, GraphService};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Service shared by every connection.
pub type SharedService = Arc<GraphService>;

#[derive(Serialize)]
struct NodesResult {
    nodes: Vec<Node>,
    count: usize,
    #[serde(rename = "queryTime")]
    query_time: u64,
}

fn nodes_response(id: Option<Value>, start: Instant, result: GraphResult<Vec<Node>>) -> Response {
    match result {
        Ok(nodes) => Response::success(
            id,
            NodesResult {
                count: nodes.len(),
                nodes,
                query_time: start.elapsed().as_millis() as u64,
            },
        ),
        Err(e) => Response::graph_error(id, &e),
    }
}

/// Handles the graph.info method.
pub async fn handle_info(service: SharedService, id: Option<Value>) -> Response {
    match service.stats().await {
        Ok(stats) => Response::success(
            id,
            json!({
                "edgeCount": stats.edge_count,
                "version": env!("CARGO_PKG_VERSION"),
            }),
        ),
        Err(e) => Response::graph_error(id, &e),
    }
}

/// Handles the graph.children method.
pub async fn handle_children(service: SharedService, id: Option<Value>, params: NodeParams) -> Response {
    let start = Instant::now();
    debug!("Children of {}", params.id);
    nodes_response(id, start, service.children(&params.id).await)
}

/// Handles the graph.parents method.
pub async fn handle_parents(service: SharedService, id: Option<Value>, params: NodeParams) -> Response {
    let start = Instant::now();
    debug!("Parents of {}", params.id);
    nodes_response(id, start, service.parents(&params.id).await)
}

/// Handles the graph.descendants method.
pub async fn handle_descendants(
    service: SharedService,
    id: Option<Value>,
    params: NodeParams,
) -> Response {
    let start = Instant::now();
    debug!("Descendants of {}", params.id);
    nodes_response(id, start, service.descendants(&params.id).await)
}

/// Handles the graph.ascendants method.
pub async fn handle_ascendants(
    service: SharedService,
    id: Option<Value>,
    params: NodeParams,
) -> Response {
    let start = Instant::now();
    debug!("Ascendants of {}", params.id);
    nodes_response(id, start, service.ascendants(&params.id).await)
}

/// Handles the graph.firstDescendantsOfType method.
pub async fn handle_first_descendants_of_type(
    service: SharedService,
    id: Option<Value>,
    params: TypedNodeParams,
) -> Response {
    let start = Instant::now();
    debug!("First {} descendants of {}", params.node_type, params.id);
    nodes_response(
        id,
        start,
        service
            .first_descendants_of_type(&params.id, &params.node_type)
            .await,
    )
}

/// Handles the edge.add method.
pub async fn handle_add_edge(service: SharedService, id: Option<Value>, params: EdgeParams) -> Response {
    match service.add_edge(params.source, params.target).await {
        Ok(()) => Response::success(id, json!({ "ok": true })),
        Err(e) => Response::graph_error(id, &e),
    }
}

/// Handles the edge.remove method.
pub async fn handle_remove_edge(
    service: SharedService,
    id: Option<Value>,
    params: EdgeParams,
) -> Response {
    match service.remove_edge(params.source, params.target).await {
        Ok(()) => Response::success(id, json!({ "ok": true })),
        Err(e) => Response::graph_error(id, &e),
    }
}
