//! ETHDKG Crypto - BN254 primitives shared by the ceremony
//!
//! Everything here must agree bit-for-bit with the on-chain verifier:
//! keccak-256 as the hash, the Fouque-Tibouchi map for hash-to-G1, the
//! EVM word encodings, the Diffie-Hellman share cipher and the DLEQ proofs
//! used in accusations.

pub mod bls;
pub mod cipher;
pub mod dleq;
pub mod encoding;
pub mod error;
pub mod hash;

pub use ark_bn254::{Fq, Fr, G1Affine, G1Projective, G2Affine, G2Projective};

pub use bls::{
    aggregate_signatures, aggregate_signatures_with_inverse, lagrange_coefficient,
    lagrange_interpolate_g1, pairing_check, sign, verify,
};
pub use cipher::{decrypt, decrypt_with_shared_secret, encrypt, shared_secret};
pub use dleq::{dleq_prove, dleq_verify, DleqProof};
pub use encoding::{
    fr_to_u256, fr_to_word, g1_to_bytes, g2_to_bytes, serde_ark, u256_to_fr, u64_to_word,
};
pub use error::{CryptoError, Result};
pub use hash::{hash_to_base, hash_to_g1, is_safe_signing_point, keccak256, keccak256_concat};

use ark_ec::{AffineRepr, CurveGroup};

/// `g1^s`
pub fn g1_mul(scalar: &Fr) -> G1Affine {
    (G1Affine::generator() * scalar).into_affine()
}

/// `h2^s`
pub fn g2_mul(scalar: &Fr) -> G2Affine {
    (G2Affine::generator() * scalar).into_affine()
}
