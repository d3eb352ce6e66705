//! JSON-RPC 2.0 message types.

use lineage_core::Node;
use lineage_graph::{ErrorKind, GraphError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const PARSE_ERROR: i32 = -32700;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;

/// An incoming request.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    pub id: Option<Value>,
}

fn default_version() -> String {
    "2.0".to_string()
}

/// An outgoing response. Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Response {
    pub fn success<T: Serialize>(id: Option<Value>, result: T) -> Self {
        match serde_json::to_value(result) {
            Ok(value) => Self {
                jsonrpc: "2.0",
                result: Some(value),
                error: None,
                id,
            },
            Err(e) => Self::error(id, -32603, format!("failed to encode result: {}", e)),
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
                data: None,
            }),
            id,
        }
    }

    pub fn parse_error() -> Self {
        Self::error(None, PARSE_ERROR, "Parse error")
    }

    pub fn method_not_found(id: Option<Value>, method: &str) -> Self {
        Self::error(id, METHOD_NOT_FOUND, format!("Method not found: {}", method))
    }

    pub fn invalid_params(id: Option<Value>, message: impl Into<String>) -> Self {
        Self::error(id, INVALID_PARAMS, message)
    }

    /// Maps a service error onto a response, one code per error kind.
    pub fn graph_error(id: Option<Value>, err: &GraphError) -> Self {
        let code = match err.kind() {
            ErrorKind::Connection => -32010,
            ErrorKind::Persistence => -32011,
            ErrorKind::Query => -32012,
            ErrorKind::Scan => -32013,
            ErrorKind::Integrity => -32014,
            ErrorKind::Timeout => -32015,
        };

        let mut response = Self::error(id, code, err.to_string());
        if let (Some(error), Some(operation)) = (response.error.as_mut(), err.operation()) {
            error.data = Some(json!({ "operation": operation.to_string() }));
        }
        response
    }
}

/// Params for calls that take one node id.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeParams {
    pub id: String,
}

/// Params for `graph.firstDescendantsOfType`.
#[derive(Debug, Clone, Deserialize)]
pub struct TypedNodeParams {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
}

/// Params for `edge.add` and `edge.remove`.
#[derive(Debug, Clone, Deserialize)]
pub struct EdgeParams {
    pub source: Node,
    pub target: Node,
}
