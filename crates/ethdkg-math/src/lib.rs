//! ETHDKG Math - Threshold cryptography for the key generation ceremony
//!
//! This crate holds the pure, chain-agnostic math each participant runs:
//! verifiable secret sharing, key shares and the master public key, group
//! keys, and the categorization of published group signatures.

pub mod categorize;
pub mod combinations;
pub mod error;
pub mod keys;
pub mod shares;
pub mod threshold;

pub use categorize::{categorize_group_signers, CategorizeOptions, GroupSigner, SignerCategories};
pub use combinations::{binomial, NChooseK};
pub use error::{MathError, Result};
pub use keys::{
    generate_group_keys, generate_key_share, generate_master_public_key, h1_base,
    verify_gpkj_against_commitments, verify_key_share, GroupKeys, KeyShare, H1_BASE_MESSAGE,
    INITIAL_MESSAGE,
};
pub use shares::{
    compute_distributed_shares_hash, decrypt_share_for, encrypted_share_position,
    evaluate_commitments, evaluate_polynomial, generate_shares, generate_transport_keys,
    share_matches_commitments, verify_distributed_shares, DistributedSharesHash, GeneratedShares,
    IssuedShares, ShareCheck, ShareRecipient,
};
pub use threshold::{inverse_array_for_user_count, threshold_for_user_count, MIN_PARTICIPANTS};
