//! Error types for the ceremony node

use ethdkg_tasks::{ChainError, TaskError};
use thiserror::Error;

/// Result type alias for node operations
pub type Result<T> = std::result::Result<T, NodeError>;

/// Errors that can occur while running a ceremony
#[derive(Debug, Error)]
pub enum NodeError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Contract read failed
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    /// Task or actor failure
    #[error("Task error: {0}")]
    Task(#[from] TaskError),
}

impl From<serde_json::Error> for NodeError {
    fn from(e: serde_json::Error) -> Self {
        NodeError::Serialization(e.to_string())
    }
}
