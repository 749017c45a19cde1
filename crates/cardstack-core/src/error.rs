//! Error types for cardstack-core

use thiserror::Error;

/// Result type alias using cardstack-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in cardstack-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database handle has been closed (or was never opened)
    #[error("Database is not open")]
    NotOpen,

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Entity not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote store operation failed (transient, retried by the sync manager)
    #[error("Remote store error: {0}")]
    Remote(String),
}
