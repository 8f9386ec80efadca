//! Error handling module
//!
//! Provides the fatal error taxonomy for a deployment run. Anything that
//! lands here aborts the current phase and every later one; verification
//! gaps are reported through `models::VerificationGap` instead.

use crate::config::ConfigError;
use thiserror::Error;

/// Deployment-wide error type
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Script {script} failed: {message}")]
    ScriptExecution { script: String, message: String },

    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error("Procedure {name}() failed: {message}")]
    Procedure { name: String, message: String },

    #[error("{stage} failed: {message}")]
    StageFailed { stage: &'static str, message: String },

    #[error("Database error: {}", pg_message(.0))]
    Database(#[from] tokio_postgres::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Report error: {0}")]
    Report(#[from] serde_json::Error),
}

/// Result type alias used across the crate
pub type DeployResult<T> = Result<T, DeployError>;

/// Server-side message when the error came back from Postgres, otherwise the driver's own text.
pub fn pg_message(err: &tokio_postgres::Error) -> String {
    match err.as_db_error() {
        Some(db) => match db.detail() {
            Some(detail) => format!("{} ({})", db.message(), detail),
            None => db.message().to_string(),
        },
        None => err.to_string(),
    }
}

/// Helper function to create a not found error
pub fn not_found_error(msg: impl Into<String>) -> DeployError {
    DeployError::ResourceNotFound(msg.into())
}

/// Helper function to create a mapping error
pub fn mapping_error(msg: impl Into<String>) -> DeployError {
    DeployError::Mapping(msg.into())
}
