//! Configuration file handling
//!
//! The configuration is a single JSON object. Every field has a default,
//! so `{}` is a valid file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::arm::PROVIDER_NAMESPACE;
use crate::crud::DEFAULT_PAGE_SIZE;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Database holding every container
    #[serde(default = "default_database_name")]
    pub database_name: String,

    /// Container for resources and operations
    #[serde(default = "default_resources_container")]
    pub resources_container: String,

    /// Container for lease locks; needs a default TTL
    #[serde(default = "default_locks_container")]
    pub locks_container: String,

    /// Must name the provider this crate serves
    #[serde(default = "default_provider_namespace")]
    pub provider_namespace: String,

    /// Items per store page when listing without a page size hint.
    /// 0 falls back to the built-in default.
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    /// Lease length in seconds
    #[serde(default = "default_lock_ttl_seconds")]
    pub lock_ttl_seconds: i64,

    /// Lock owner name; the host name when absent
    #[serde(default)]
    pub lock_owner: Option<String>,

    /// Directory of JSON documents to preload into an in-memory store
    #[serde(default)]
    pub fixtures_dir: Option<PathBuf>,
}

fn default_database_name() -> String {
    "Resources".to_string()
}
fn default_resources_container() -> String {
    "Resources".to_string()
}
fn default_locks_container() -> String {
    "Locks".to_string()
}
fn default_provider_namespace() -> String {
    PROVIDER_NAMESPACE.to_string()
}
fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}
fn default_lock_ttl_seconds() -> i64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_name: default_database_name(),
            resources_container: default_resources_container(),
            locks_container: default_locks_container(),
            provider_namespace: default_provider_namespace(),
            default_page_size: default_page_size(),
            lock_ttl_seconds: default_lock_ttl_seconds(),
            lock_owner: None,
            fixtures_dir: None,
        }
    }
}

impl Config {
    /// Load and validate configuration from file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.database_name.trim().is_empty() {
            return Err(ConfigError::Invalid("database_name must not be empty".into()));
        }
        if self.resources_container.trim().is_empty() || self.locks_container.trim().is_empty() {
            return Err(ConfigError::Invalid("container names must not be empty".into()));
        }
        if self.resources_container.eq_ignore_ascii_case(&self.locks_container) {
            return Err(ConfigError::Invalid(
                "locks must live in their own container".into(),
            ));
        }
        if !self.provider_namespace.eq_ignore_ascii_case(PROVIDER_NAMESPACE) {
            return Err(ConfigError::Invalid(format!(
                "provider_namespace '{}' is not served here; expected '{}'",
                self.provider_namespace, PROVIDER_NAMESPACE
            )));
        }
        if self.lock_ttl_seconds <= 0 {
            return Err(ConfigError::Invalid("lock_ttl_seconds must be > 0".into()));
        }
        Ok(())
    }

    /// Page size to hand the engines, if any
    pub fn page_size(&self) -> Option<usize> {
        Some(self.default_page_size).filter(|n| *n > 0)
    }

    /// `database/container` label for the resources store
    pub fn resources_label(&self) -> String {
        format!("{}/{}", self.database_name, self.resources_container)
    }

    /// `database/container` label for the lock store
    pub fn locks_label(&self) -> String {
        format!("{}/{}", self.database_name, self.locks_container)
    }

    pub fn lock_owner(&self) -> String {
        self.lock_owner
            .clone()
            .or_else(|| std::env::var("HOSTNAME").ok())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "rpdb".to_string())
    }
}
