//! Error types for BN254 primitives

use thiserror::Error;

/// Result type for curve primitives
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors that can occur in curve and hashing primitives
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Hash-to-curve landed on the identity, the generator or its negation
    #[error("Hash-to-curve produced a point that is unsafe to sign")]
    DangerousPoint,

    /// A mapped point failed the curve equation
    #[error("Invalid curve point: {0}")]
    InvalidPoint(String),

    /// Slices that must be parallel have different lengths
    #[error("Mismatched slices: {left} != {right}")]
    MismatchedSlices { left: usize, right: usize },

    /// Not enough signatures to interpolate the group signature
    #[error("Below threshold: need more than {threshold} values, got {got}")]
    BelowThreshold { threshold: usize, got: usize },

    /// Two interpolation points share an index
    #[error("Duplicate interpolation index: {0}")]
    DuplicateIndex(u64),

    /// Interpolation point at zero
    #[error("Interpolation indices must be non-zero")]
    ZeroIndex,

    /// DLEQ proof failed to verify
    #[error("Invalid DLEQ proof")]
    InvalidDleqProof,

    /// Random scalar generation produced zero
    #[error("Random number generation failed: {0}")]
    Randomness(String),

    /// Point or scalar (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<ark_serialize::SerializationError> for CryptoError {
    fn from(e: ark_serialize::SerializationError) -> Self {
        CryptoError::Serialization(e.to_string())
    }
}
