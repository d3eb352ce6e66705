//! WebSocket server implementation.
//!
//! Handles client connections and routes messages to handlers.

use crate::handlers::{
    handle_add_edge, handle_ascendants, handle_children, handle_descendants,
    handle_first_descendants_of_type, handle_info, handle_parents, handle_remove_edge,
    SharedService,
};
use crate::protocol::{EdgeParams, NodeParams, Request, Response, TypedNodeParams};
use futures_util::{SinkExt, StreamExt};
use lineage_graph::{GraphService, ServerSettings};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from(&ServerSettings::default())
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            addr: settings.addr,
        }
    }
}

/// The Lineage WebSocket server.
pub struct LineageServer {
    config: ServerConfig,
    service: SharedService,
}

impl LineageServer {
    /// Creates a new server over the given service.
    pub fn new(service: GraphService, config: ServerConfig) -> Self {
        Self {
            config,
            service: Arc::new(service),
        }
    }

    /// Runs the server, accepting connections forever.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the server until `shutdown` completes.
    ///
    /// Connections already accepted keep running on their own tasks.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(&self.config.addr).await?;
        info!("Lineage server listening on {}", listener.local_addr()?);

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Lineage server shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        debug!("New connection from {}", addr);
                        let service = self.service.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, addr, service).await {
                                error!("Connection error from {}: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Accept error: {}", e);
                    }
                }
            }
        }
    }
}

/// Handles a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    service: SharedService,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = accept_async(stream).await?;
    info!("WebSocket connection established with {}", addr);

    let (mut write, mut read) = ws_stream.split();

    while let Some(msg) = read.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(e) => {
                warn!("Message error from {}: {}", addr, e);
                break;
            }
        };

        if msg.is_close() {
            debug!("Client {} disconnected", addr);
            break;
        }

        if msg.is_ping() {
            write.send(Message::Pong(msg.into_data())).await?;
            continue;
        }

        if msg.is_text() {
            let text = msg.to_text().unwrap_or("");
            let response = process_message(text, service.clone()).await;
            let json = serde_json::to_string(&response)?;
            write.send(Message::Text(json)).await?;
        }
    }

    info!("Connection closed: {}", addr);
    Ok(())
}

fn parse_params<P: DeserializeOwned>(params: Value) -> Result<P, String> {
    serde_json::from_value(params).map_err(|e| e.to_string())
}

/// Processes a JSON-RPC message and returns a response.
pub async fn process_message(text: &str, service: SharedService) -> Response {
    let request: Request = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(_) => return Response::parse_error(),
    };

    let id = request.id.clone();
    let method = request.method.as_str();

    debug!("Processing method: {}", method);

    match method {
        "graph.info" => handle_info(service, id).await,

        "graph.children" => match parse_params::<NodeParams>(request.params) {
            Ok(params) => handle_children(service, id, params).await,
            Err(e) => Response::invalid_params(id, e),
        },

        "graph.parents" => match parse_params::<NodeParams>(request.params) {
            Ok(params) => handle_parents(service, id, params).await,
            Err(e) => Response::invalid_params(id, e),
        },

        "graph.descendants" => match parse_params::<NodeParams>(request.params) {
            Ok(params) => handle_descendants(service, id, params).await,
            Err(e) => Response::invalid_params(id, e),
        },

        "graph.ascendants" => match parse_params::<NodeParams>(request.params) {
            Ok(params) => handle_ascendants(service, id, params).await,
            Err(e) => Response::invalid_params(id, e),
        },

        "graph.firstDescendantsOfType" => match parse_params::<TypedNodeParams>(request.params) {
            Ok(params) => handle_first_descendants_of_type(service, id, params).await,
            Err(e) => Response::invalid_params(id, e),
        },

        "edge.add" => match parse_params::<EdgeParams>(request.params) {
            Ok(params) => handle_add_edge(service, id, params).await,
            Err(e) => Response::invalid_params(id, e),
        },

        "edge.remove" => match parse_params::<EdgeParams>(request.params) {
            Ok(params) => handle_remove_edge(service, id, params).await,
            Err(e) => Response::invalid_params(id, e),
        },

        _ => Response::method_not_found(id, method),
    }
}
