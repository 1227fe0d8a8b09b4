//! One-time-pad encryption of secret shares
//!
//! The pad is `keccak(x(sk * pk) || uint256(index))`: the x-coordinate of
//! the Diffie-Hellman point between the sender's and receiver's transport
//! keys, bound to the receiver's base-1 index so a pad is never reused.
//! Encryption and decryption are the same XOR.

use alloy_primitives::U256;
use ark_bn254::{Fr, G1Affine};
use ark_ec::{AffineRepr, CurveGroup};

use crate::encoding::{fq_to_word, fr_to_u256, u64_to_word, WORD_SIZE};
use crate::hash::keccak256_concat;

/// Diffie-Hellman point between a private key and a peer public key
pub fn shared_secret(private_key: &Fr, public_key: &G1Affine) -> G1Affine {
    (*public_key * private_key).into_affine()
}

/// Encrypt `secret` for the holder of `public_key` sitting at `index`
pub fn encrypt(secret: &Fr, private_key: &Fr, public_key: &G1Affine, index: u64) -> U256 {
    let shared = shared_secret(private_key, public_key);
    fr_to_u256(secret) ^ one_time_pad(&shared, index)
}

/// Decrypt a share sent by the holder of `public_key` to us at `index`
pub fn decrypt(encrypted: &U256, private_key: &Fr, public_key: &G1Affine, index: u64) -> U256 {
    let shared = shared_secret(private_key, public_key);
    decrypt_with_shared_secret(encrypted, &shared, index)
}

/// Decrypt with an already known shared secret, as a dispute verifier does
pub fn decrypt_with_shared_secret(encrypted: &U256, shared: &G1Affine, index: u64) -> U256 {
    *encrypted ^ one_time_pad(shared, index)
}

fn one_time_pad(shared: &G1Affine, index: u64) -> U256 {
    let x = shared
        .xy()
        .map(|(x, _)| fq_to_word(x))
        .unwrap_or([0u8; WORD_SIZE]);
    let pad = keccak256_concat([&x[..], &u64_to_word(index)[..]]);
    U256::from_be_bytes(pad)
}
