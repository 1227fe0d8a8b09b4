//! Error types for threshold math

use ethdkg_crypto::CryptoError;
use thiserror::Error;

/// Result type for threshold math
pub type Result<T> = std::result::Result<T, MathError>;

/// Errors that can occur in threshold math
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MathError {
    /// Fewer participants than the protocol supports
    #[error("Invalid user count: need at least {min}, got {got}")]
    InvalidUserCount { min: usize, got: usize },

    /// An inverse did not multiply back to one
    #[error("Inverse check failed for {0}")]
    InverseCheckFailed(u64),

    /// Some participants have not published a transport key
    #[error("Only have {have} of {need} public keys")]
    MissingPublicKeys { have: usize, need: usize },

    /// A participant has no registered transport key
    #[error("Missing public key for participant {0}")]
    MissingPublicKey(u64),

    /// No transport private key to work with
    #[error("Missing transport private key")]
    MissingTransportKey,

    /// No secret value (first private coefficient)
    #[error("Missing secret value, aka private coefficient[0]")]
    MissingSecretValue,

    /// Base-1 index out of range
    #[error("Invalid index: {0}")]
    InvalidIndex(u64),

    /// Commitment vector has the wrong length
    #[error("Invalid commitments: expected {expected}, got {got}")]
    InvalidCommitments { expected: usize, got: usize },

    /// Encrypted share vector has the wrong length
    #[error("Invalid encrypted shares: expected {expected}, got {got}")]
    InvalidEncryptedShares { expected: usize, got: usize },

    /// Private polynomial has the wrong degree
    #[error("Invalid private coefficients: expected {expected}, got {got}")]
    InvalidPrivateCoefficients { expected: usize, got: usize },

    /// Parallel inputs have different lengths
    #[error("Mismatched inputs: {0}")]
    Mismatched(String),

    /// Freshly generated material failed its own consistency check
    #[error("Internal consistency check failed: {0}")]
    Internal(String),

    /// Aggregated key shares do not pair up
    #[error("Invalid pairing for master public key")]
    InvalidMasterPublicKey,

    /// Not enough usable group signatures to search for a witness set
    #[error("Not enough signers: {present} present, need {required}")]
    NotEnoughSigners { present: usize, required: usize },

    /// Every subset was tried and none produced a valid group signature
    #[error("No subset of signers produced a valid group signature")]
    NoValidSignerSet,

    /// The subset search hit its configured cap
    #[error("Signer search exhausted after {examined} subsets")]
    SearchExhausted { examined: usize },

    /// Curve primitive error
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}
