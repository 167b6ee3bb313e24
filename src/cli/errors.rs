//! CLI-specific error types

use std::io;

use thiserror::Error;

use crate::config::ConfigError;
use crate::errors::DbError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("Failed to load fixtures: {0}")]
    Fixtures(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Usage(String),
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        CliError::Usage(msg.into())
    }

    /// Stable code for the JSON error response
    pub fn code(&self) -> &'static str {
        match self {
            CliError::Config(_) => "RPDB_CLI_CONFIG_ERROR",
            CliError::Db(e) => match e.status_code() {
                404 => "RPDB_NOT_FOUND",
                409 => "RPDB_CONFLICT",
                412 => "RPDB_PRECONDITION_FAILED",
                400 => "RPDB_INVALID_ARGUMENT",
                503 => "RPDB_UNAVAILABLE",
                _ => "RPDB_INTERNAL",
            },
            CliError::Fixtures(_) => "RPDB_CLI_FIXTURES_ERROR",
            CliError::Io(_) | CliError::Json(_) => "RPDB_CLI_IO_ERROR",
            CliError::Usage(_) => "RPDB_CLI_USAGE",
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
