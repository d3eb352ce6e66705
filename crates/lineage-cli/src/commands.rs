//! CLI command implementations.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use lineage_core::Node;
use lineage_graph::{open_store, Backend, GraphService, LineageConfig};
use lineage_server::{LineageServer, ServerConfig};
use std::net::SocketAddr;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Which traversal a listing command runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Traversal {
    Children,
    Parents,
    Descendants,
    Ascendants,
    FirstOfType(String),
}

impl Traversal {
    fn describe(&self, id: &str) -> String {
        match self {
            Traversal::Children => format!("children of {id}"),
            Traversal::Parents => format!("parents of {id}"),
            Traversal::Descendants => format!("descendants of {id}"),
            Traversal::Ascendants => format!("ascendants of {id}"),
            Traversal::FirstOfType(node_type) => format!("first {node_type} descendants of {id}"),
        }
    }
}

/// Initialize Lineage in a directory.
pub fn init(path: &Path) -> Result<()> {
    let config_path = LineageConfig::default_path(path);

    if config_path.exists() {
        println!("{} Already initialized", "✓".green());
        return Ok(());
    }

    LineageConfig::default().save(&config_path)?;

    println!("{} Initialized Lineage in {}", "✓".green(), path.display());
    println!("  Run {} to load an example forest", "lineage seed".cyan());

    Ok(())
}

fn open_service(config_path: &Path) -> Result<(LineageConfig, GraphService)> {
    let config = LineageConfig::load(config_path)?;
    let store = open_store(&config.store)?;
    let service = GraphService::with_options(store, config.service_options());
    Ok((config, service))
}

/// Add an edge.
pub async fn add(config_path: &Path, source: Node, target: Node) -> Result<()> {
    let (_, service) = open_service(config_path)?;
    let line = format!("{} -> {}", source, target);

    service.add_edge(source, target).await?;
    println!("{} Added {}", "✓".green(), line.cyan());

    Ok(())
}

/// Remove an edge. Removing an edge that is not stored is not an error.
pub async fn remove(config_path: &Path, source: Node, target: Node) -> Result<()> {
    let (_, service) = open_service(config_path)?;
    let line = format!("{} -> {}", source, target);

    service.remove_edge(source, target).await?;
    println!("{} Removed {}", "✓".green(), line.cyan());

    Ok(())
}

/// Run a traversal and print the nodes it returns.
pub async fn traverse(config_path: &Path, traversal: Traversal, id: &str, json: bool) -> Result<()> {
    let (_, service) = open_service(config_path)?;

    let nodes = match &traversal {
        Traversal::Children => service.children(id).await?,
        Traversal::Parents => service.parents(id).await?,
        Traversal::Descendants => service.descendants(id).await?,
        Traversal::Ascendants => service.ascendants(id).await?,
        Traversal::FirstOfType(node_type) => {
            service.first_descendants_of_type(id, node_type).await?
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&nodes)?);
        return Ok(());
    }

    if nodes.is_empty() {
        println!("No {} found", traversal.describe(id));
        return Ok(());
    }

    println!("Found {}:\n", traversal.describe(id));
    print_nodes(&nodes);

    Ok(())
}

fn print_nodes(nodes: &[Node]) {
    for (i, node) in nodes.iter().enumerate() {
        println!(
            "  {} {} {}",
            format!("{:>3}", i + 1).dimmed(),
            node.id.cyan(),
            node.node_type.yellow()
        );
    }
}

/// The example forest with fresh ids, plus the ids of `p1`, `p2`, `c1`
/// and `c2`:
///
/// ```text
/// p1 -> s1..s10 -> j1 -> c1
/// p1 -> s11 -> j2 -> c1
/// p1 -> s12 -> j3 -> c2
/// p2 -> s13 -> j3 -> c2
/// ```
fn example_forest() -> (Vec<(Node, Node)>, [Node; 4]) {
    let node = |node_type: &str| Node::new(Uuid::new_v4().to_string(), node_type);

    let (p1, p2) = (node("P"), node("P"));
    let (c1, c2) = (node("C"), node("C"));
    let (j1, j2, j3) = (node("J"), node("J"), node("J"));

    let mut edges = vec![(j1.clone(), c1.clone())];
    for _ in 1..=10 {
        let s = node("S");
        edges.push((s.clone(), j1.clone()));
        edges.push((p1.clone(), s));
    }

    let (s11, s12, s13) = (node("S"), node("S"), node("S"));
    edges.extend([
        (j2.clone(), c1.clone()),
        (s11.clone(), j2),
        (p1.clone(), s11),
        (j3.clone(), c2.clone()),
        (s12.clone(), j3.clone()),
        (p1.clone(), s12),
        (s13.clone(), j3),
        (p2.clone(), s13),
    ]);

    (edges, [p1, p2, c1, c2])
}

/// Load the example forest and print the descendants of its first root.
pub async fn seed(config_path: &Path) -> Result<()> {
    let (_, service) = open_service(config_path)?;
    let (edges, [p1, p2, c1, c2]) = example_forest();

    let progress = ProgressBar::new(edges.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar().template("{bar:30.cyan/blue} {pos}/{len} {msg}")?,
    );
    progress.set_message("Adding edges...");

    for (source, target) in edges {
        service.add_edge(source, target).await?;
        progress.inc(1);
    }
    progress.finish_and_clear();

    println!(
        "{} Seeded {} edges",
        "✓".green(),
        service.stats().await?.edge_count.to_string().cyan()
    );
    for (label, node) in [("p1", &p1), ("p2", &p2), ("c1", &c1), ("c2", &c2)] {
        println!("  {} {}", label.yellow(), node.id);
    }

    let nodes = service.descendants(&p1.id).await?;
    println!("\nDescendants of p1 ({}):\n", nodes.len());
    print_nodes(&nodes);

    Ok(())
}

/// Show store location and statistics.
pub async fn status(config_path: &Path) -> Result<()> {
    let (config, service) = open_service(config_path)?;
    let stats = service.stats().await?;

    println!("{}", "Lineage Status".cyan().bold());
    println!();
    println!("  Config:     {}", config_path.display());
    match config.store.backend {
        Backend::Sled => println!("  Backend:    sled ({})", config.store.path.display()),
        Backend::Memory => println!("  Backend:    memory"),
    }
    println!("  Relation:   {}", config.store.relation);
    println!("  Edges:      {}", stats.edge_count.to_string().cyan());
    match config.query_timeout_ms {
        Some(ms) => println!("  Timeout:    {}ms", ms),
        None => println!("  Timeout:    none"),
    }

    Ok(())
}

/// Start the Lineage server.
pub async fn serve(config_path: &Path, addr: Option<SocketAddr>) -> Result<()> {
    println!("{}", "Starting Lineage server...".cyan());

    let (config, service) = open_service(config_path)?;
    let mut server_config = ServerConfig::from(&config.server);
    if let Some(addr) = addr {
        server_config.addr = addr;
    }
    let addr = server_config.addr;

    let server = LineageServer::new(service, server_config);
    info!(relation = %config.store.relation, "serving {}", addr);

    println!("{} Listening on ws://{}", "✓".green(), addr);
    println!("  Press {} to stop", "Ctrl+C".cyan());

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .map_err(|e| e.to_string())?;

    println!("{} Stopped", "✓".green());
    Ok(())
}
