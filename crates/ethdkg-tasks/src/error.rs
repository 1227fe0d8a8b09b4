//! Error types for ceremony tasks

use ethdkg_crypto::CryptoError;
use ethdkg_math::MathError;
use thiserror::Error;

use crate::chain::ChainError;

/// Result type for task operations
pub type Result<T> = std::result::Result<T, TaskError>;

/// Errors that can occur while running a ceremony task
#[derive(Debug, Error)]
pub enum TaskError {
    /// The round or phase moved on; drop the task
    #[error("Can not continue distributed key generation: {0}")]
    CanNotContinue(String),

    /// Chain read or submission failed
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    /// Threshold math failed
    #[error("Math error: {0}")]
    Math(#[from] MathError),

    /// Curve primitive failed on local material
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// The transaction was mined but did not succeed
    #[error("Transaction failed: {0}")]
    TxFailed(String),

    /// Another validator is allowed to act at this height
    #[error("Not leading at this height")]
    NotLeading,

    /// Local state lacks something the task needs
    #[error("Missing data: {0}")]
    MissingData(String),

    /// Scheduled ranges must be non-empty and not partially overlap
    #[error("Invalid schedule range [{start}, {end})")]
    InvalidSchedule { start: u64, end: u64 },
}

impl TaskError {
    /// `false` for errors that mean the task must be abandoned
    pub fn is_retryable(&self) -> bool {
        match self {
            TaskError::CanNotContinue(_) | TaskError::InvalidSchedule { .. } => false,
            TaskError::Chain(ChainError::Cancelled) => false,
            TaskError::Chain(_) => true,
            TaskError::Math(MathError::Internal(_)) => false,
            TaskError::Math(_) => true,
            TaskError::Crypto(_) => false,
            TaskError::TxFailed(_) | TaskError::NotLeading | TaskError::MissingData(_) => true,
        }
    }
}
