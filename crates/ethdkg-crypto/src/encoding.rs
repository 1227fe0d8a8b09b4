//! EVM word encodings for curve points and scalars
//!
//! The contract side sees G1 points as `uint256[2]` and G2 points as
//! `uint256[4]` in precompile order, so anything we hash or compare against
//! on-chain data goes through these helpers.

use alloy_primitives::U256;
use ark_bn254::{Fq, Fq2, Fr, G1Affine, G2Affine};
use ark_ec::AffineRepr;
use ark_ff::{BigInteger, PrimeField};

/// Size of one EVM word
pub const WORD_SIZE: usize = 32;

/// Big-endian 32-byte encoding of a base field element
pub fn fq_to_word(value: &Fq) -> [u8; WORD_SIZE] {
    to_word(value.into_bigint().to_bytes_be())
}

/// Big-endian 32-byte encoding of a scalar
pub fn fr_to_word(value: &Fr) -> [u8; WORD_SIZE] {
    to_word(value.into_bigint().to_bytes_be())
}

/// Scalar as a `uint256`
pub fn fr_to_u256(value: &Fr) -> U256 {
    U256::from_be_bytes(fr_to_word(value))
}

/// `uint256` reduced into the scalar field
pub fn u256_to_fr(value: &U256) -> Fr {
    Fr::from_be_bytes_mod_order(&value.to_be_bytes::<WORD_SIZE>())
}

/// `uint64` widened to a big-endian `uint256`
pub fn u64_to_word(value: u64) -> [u8; WORD_SIZE] {
    let mut word = [0u8; WORD_SIZE];
    word[WORD_SIZE - 8..].copy_from_slice(&value.to_be_bytes());
    word
}

/// G1 point as `x || y`; the identity encodes as 64 zero bytes
pub fn g1_to_bytes(point: &G1Affine) -> [u8; 2 * WORD_SIZE] {
    let mut out = [0u8; 2 * WORD_SIZE];
    if let Some((x, y)) = point.xy() {
        out[..WORD_SIZE].copy_from_slice(&fq_to_word(x));
        out[WORD_SIZE..].copy_from_slice(&fq_to_word(y));
    }
    out
}

/// G2 point as `x.im || x.re || y.im || y.re`, the EVM precompile order
pub fn g2_to_bytes(point: &G2Affine) -> [u8; 4 * WORD_SIZE] {
    let mut out = [0u8; 4 * WORD_SIZE];
    if let Some((x, y)) = point.xy() {
        write_fq2(&mut out[..2 * WORD_SIZE], x);
        write_fq2(&mut out[2 * WORD_SIZE..], y);
    }
    out
}

fn write_fq2(out: &mut [u8], value: &Fq2) {
    out[..WORD_SIZE].copy_from_slice(&fq_to_word(&value.c1));
    out[WORD_SIZE..].copy_from_slice(&fq_to_word(&value.c0));
}

fn to_word(bytes: Vec<u8>) -> [u8; WORD_SIZE] {
    let mut word = [0u8; WORD_SIZE];
    let offset = WORD_SIZE.saturating_sub(bytes.len());
    let start = bytes.len().saturating_sub(WORD_SIZE);
    word[offset..].copy_from_slice(&bytes[start..]);
    word
}

/// Serde adapter for arkworks types, stored as hex of the compressed encoding
///
/// Works for any `CanonicalSerialize` type, including `Option<_>` and `Vec<_>`
/// of points and scalars:
///
/// ```ignore
/// #[serde(with = "ethdkg_crypto::serde_ark")]
/// pub public_key: Option<G1Affine>,
/// ```
pub mod serde_ark {
    use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
    use serde::de::Error as _;
    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: CanonicalSerialize,
        S: Serializer,
    {
        let mut bytes = Vec::with_capacity(value.compressed_size());
        value
            .serialize_compressed(&mut bytes)
            .map_err(S::Error::custom)?;
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: CanonicalDeserialize,
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(encoded).map_err(D::Error::custom)?;
        T::deserialize_compressed(bytes.as_slice()).map_err(D::Error::custom)
    }
}
