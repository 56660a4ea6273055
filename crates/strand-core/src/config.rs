//! Configuration management for Strand.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`STRAND__` prefix, `__` separator)
//! 2. Config file (`strand.toml` by default)
//! 3. Defaults

use serde::Deserialize;

use crate::error::Result;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct StrandConfig {
    #[serde(default)]
    pub neo4j: Neo4jSettings,

    #[serde(default)]
    pub mapping: MappingSettings,
}

/// Connection settings for a Neo4j server.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Neo4jSettings {
    #[serde(default = "default_uri")]
    pub uri: String,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default = "default_password")]
    pub password: String,

    /// Target database. Empty means the server default.
    #[serde(default)]
    pub database: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,
}

/// Options for the object-graph mapping layer.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MappingSettings {
    /// Save collections of eligible entities with a single UNWIND statement.
    #[serde(default = "default_true")]
    pub batch_saves: bool,

    /// Log every rendered statement at debug level.
    #[serde(default)]
    pub log_statements: bool,
}

fn default_uri() -> String {
    "bolt://localhost:7687".to_string()
}

fn default_user() -> String {
    "neo4j".to_string()
}

fn default_password() -> String {
    "strand-dev".to_string()
}

fn default_max_connections() -> u32 {
    16
}

fn default_fetch_size() -> usize {
    256
}

fn default_true() -> bool {
    true
}

impl Default for Neo4jSettings {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            user: default_user(),
            password: default_password(),
            database: String::new(),
            max_connections: default_max_connections(),
            fetch_size: default_fetch_size(),
        }
    }
}

impl Default for MappingSettings {
    fn default() -> Self {
        Self {
            batch_saves: default_true(),
            log_statements: false,
        }
    }
}

impl StrandConfig {
    /// Load configuration from `{file_prefix}.toml` (optional) and the environment.
    pub fn load(file_prefix: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("STRAND")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(cfg.try_deserialize()?)
    }

    /// The configured database, `None` for the server default.
    pub fn database(&self) -> Option<&str> {
        if self.neo4j.database.is_empty() {
            None
        } else {
            Some(&self.neo4j.database)
        }
    }
}
