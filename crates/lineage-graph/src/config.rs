//! Configuration for the store, the service and the server.
//!
//! Lives in `.lineage/config.json`. Every field has a default, so a missing
//! file or a partial one is fine.

use crate::service::ServiceOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Directory holding the config file and, by default, the database.
pub const CONFIG_DIR: &str = ".lineage";

/// Name of the config file inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid relation name {0:?}: use letters, digits and underscores")]
    InvalidRelation(String),
}

/// Which edge store backend to open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    #[default]
    Sled,
    Memory,
}

/// What `add_edge` does when the exact edge is already stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Fail with a duplicate edge error.
    #[default]
    Reject,
    /// Succeed without writing anything.
    Ignore,
}

/// Where edges are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: Backend,
    /// Database directory for the sled backend. A relative path is taken
    /// relative to the directory holding the config file.
    pub path: PathBuf,
    /// Logical relation (table) name.
    pub relation: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Sled,
            path: PathBuf::from("db"),
            relation: "edge".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 7440)),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineageConfig {
    pub store: StoreConfig,
    /// Deadline for a single service call, in milliseconds.
    pub query_timeout_ms: Option<u64>,
    pub duplicate_edges: DuplicatePolicy,
    pub server: ServerSettings,
}

impl LineageConfig {
    /// Default location of the config file under `root`.
    pub fn default_path(root: &Path) -> PathBuf {
        root.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Loads and validates the config at `path`, falling back to defaults
    /// when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = match fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        config.validate()?;
        if let Some(base) = path.parent() {
            if config.store.path.is_relative() {
                config.store.path = base.join(&config.store.path);
            }
        }
        Ok(config)
    }

    /// Writes the config as pretty JSON, creating the parent directory.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let text = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, text).map_err(io_error)
    }

    /// Checks values serde cannot check on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let relation = &self.store.relation;
        let valid = !relation.is_empty()
            && relation
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');

        if !valid {
            return Err(ConfigError::InvalidRelation(relation.clone()));
        }
        Ok(())
    }

    /// Options for [`GraphService`](crate::GraphService) derived from this config.
    pub fn service_options(&self) -> ServiceOptions {
        ServiceOptions {
            query_timeout: self.query_timeout_ms.map(Duration::from_millis),
            duplicates: self.duplicate_edges,
        }
    }
}
