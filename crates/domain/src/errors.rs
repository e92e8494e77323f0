//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Aqademiq
#[derive(Error, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum AqademiqError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Remote write failed: {0}")]
    RemoteWrite(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AqademiqError {
    /// True when the error indicates a systemic persistence failure.
    ///
    /// Batch runners abort on these: every subsequent classification depends
    /// on the mapping store, so retrying the next item would fail the same
    /// way.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// Result type alias for Aqademiq operations
pub type Result<T> = std::result::Result<T, AqademiqError>;
