//! Discrete-log-equality proofs over G1
//!
//! Proves `y1 = x1^alpha` and `y2 = x2^alpha` without revealing `alpha`.
//! The challenge is the raw keccak output (a full `uint256`), compared
//! verbatim on verification; only the response is reduced mod the order.

use alloy_primitives::B256;
use ark_bn254::{Fr, G1Affine};
use ark_ec::CurveGroup;
use ark_ff::{PrimeField, Zero};
use ark_std::UniformRand;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::encoding::g1_to_bytes;
use crate::error::{CryptoError, Result};
use crate::hash::keccak256_concat;

/// Proof `(c, r)` with `r = w - alpha * c`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DleqProof {
    /// Challenge `c = keccak(x1 || y1 || x2 || y2 || t1 || t2)`
    pub challenge: B256,

    /// Response `r`
    #[serde(with = "crate::encoding::serde_ark")]
    pub response: Fr,
}

/// Prove that `(x1, y1)` and `(x2, y2)` share the discrete log `alpha`
pub fn dleq_prove<R: RngCore + CryptoRng>(
    x1: &G1Affine,
    y1: &G1Affine,
    x2: &G1Affine,
    y2: &G1Affine,
    alpha: &Fr,
    rng: &mut R,
) -> Result<DleqProof> {
    let w = Fr::rand(rng);
    if w.is_zero() {
        return Err(CryptoError::Randomness(
            "zero nonce drawn for DLEQ proof".to_string(),
        ));
    }
    let t1 = (*x1 * w).into_affine();
    let t2 = (*x2 * w).into_affine();

    let challenge = challenge_hash(x1, y1, x2, y2, &t1, &t2);
    let c = Fr::from_be_bytes_mod_order(challenge.as_slice());
    Ok(DleqProof {
        challenge,
        response: w - *alpha * c,
    })
}

/// Verify a proof produced by [`dleq_prove`]
pub fn dleq_verify(
    x1: &G1Affine,
    y1: &G1Affine,
    x2: &G1Affine,
    y2: &G1Affine,
    proof: &DleqProof,
) -> Result<()> {
    let c = Fr::from_be_bytes_mod_order(proof.challenge.as_slice());
    let t1 = (*x1 * proof.response + *y1 * c).into_affine();
    let t2 = (*x2 * proof.response + *y2 * c).into_affine();

    if challenge_hash(x1, y1, x2, y2, &t1, &t2) != proof.challenge {
        return Err(CryptoError::InvalidDleqProof);
    }
    Ok(())
}

fn challenge_hash(
    x1: &G1Affine,
    y1: &G1Affine,
    x2: &G1Affine,
    y2: &G1Affine,
    t1: &G1Affine,
    t2: &G1Affine,
) -> B256 {
    let encoded = [x1, y1, x2, y2, t1, t2].map(g1_to_bytes);
    B256::from(keccak256_concat(encoded.iter().map(|bytes| &bytes[..])))
}
