//! Lineage CLI - Command-line interface for Lineage
//!
//! Adds and removes edges, runs traversals against the configured store,
//! seeds example data and serves the graph over WebSocket.

use clap::{Parser, Subcommand};
use colored::Colorize;
use lineage_core::Node;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::Traversal;

#[derive(Parser)]
#[command(name = "lineage")]
#[command(author = "Lineage Contributors")]
#[command(version)]
#[command(about = "Typed directed graphs over a flat edge relation", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to .lineage/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize Lineage in a directory
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Add the edge SOURCE -> TARGET (nodes are written ID:TYPE)
    Add { source: Node, target: Node },

    /// Remove the edge SOURCE -> TARGET
    Remove { source: Node, target: Node },

    /// List the immediate children of a node
    Children {
        id: String,

        /// Output as JSON instead of formatted text
        #[arg(long)]
        json: bool,
    },

    /// List the immediate parents of a node
    Parents {
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// List every node reachable from a node
    Descendants {
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// List every node a node is reachable from
    Ascendants {
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// List the nearest descendants of a type along each branch
    FirstOfType {
        id: String,

        /// The node type to stop at
        node_type: String,

        #[arg(long)]
        json: bool,
    },

    /// Load an example family forest and print its descendants
    Seed,

    /// Show store location and statistics
    Status,

    /// Start the JSON-RPC WebSocket server
    Serve {
        /// Address to listen on (overrides the config file)
        #[arg(short, long)]
        addr: Option<SocketAddr>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let config_path = cli
        .config
        .unwrap_or_else(|| lineage_graph::LineageConfig::default_path(std::path::Path::new(".")));

    let result = match cli.command {
        Commands::Init { path } => commands::init(&path),
        Commands::Add { source, target } => commands::add(&config_path, source, target).await,
        Commands::Remove { source, target } => {
            commands::remove(&config_path, source, target).await
        }
        Commands::Children { id, json } => {
            commands::traverse(&config_path, Traversal::Children, &id, json).await
        }
        Commands::Parents { id, json } => {
            commands::traverse(&config_path, Traversal::Parents, &id, json).await
        }
        Commands::Descendants { id, json } => {
            commands::traverse(&config_path, Traversal::Descendants, &id, json).await
        }
        Commands::Ascendants { id, json } => {
            commands::traverse(&config_path, Traversal::Ascendants, &id, json).await
        }
        Commands::FirstOfType {
            id,
            node_type,
            json,
        } => {
            commands::traverse(&config_path, Traversal::FirstOfType(node_type), &id, json).await
        }
        Commands::Seed => commands::seed(&config_path).await,
        Commands::Status => commands::status(&config_path).await,
        Commands::Serve { addr } => commands::serve(&config_path, addr).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
