//! Property-based tests for ethdkg-crypto using proptest
//!
//! These tests verify invariants that should hold for all valid inputs.

use ark_ff::PrimeField;
use ethdkg_crypto::{
    decrypt, dleq_prove, dleq_verify, encrypt, g1_mul, g2_mul, hash_to_g1,
    is_safe_signing_point, keccak256, sign, u256_to_fr, verify, Fr,
};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

// ============================================
// Arbitrary Implementations
// ============================================

fn arb_scalar() -> impl Strategy<Value = Fr> {
    any::<[u8; 32]>()
        .prop_map(|bytes| Fr::from_be_bytes_mod_order(&bytes))
        .prop_filter("non-zero scalar", |s| *s != Fr::from(0u64))
}

fn arb_index() -> impl Strategy<Value = u64> {
    1u64..=256
}

// ============================================
// Property Tests
// ============================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn share_cipher_roundtrip(
        sender in arb_scalar(),
        receiver in arb_scalar(),
        secret in arb_scalar(),
        index in arb_index(),
    ) {
        let encrypted = encrypt(&secret, &sender, &g1_mul(&receiver), index);
        let decrypted = decrypt(&encrypted, &receiver, &g1_mul(&sender), index);
        prop_assert_eq!(u256_to_fr(&decrypted), secret);
    }

    #[test]
    fn dleq_proof_verifies(alpha in arb_scalar(), base in arb_scalar(), seed in any::<u64>()) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let x1 = g1_mul(&Fr::from(1u64));
        let x2 = g1_mul(&base);
        let y1 = g1_mul(&alpha);
        let y2 = g1_mul(&(base * alpha));

        let proof = dleq_prove(&x1, &y1, &x2, &y2, &alpha, &mut rng).unwrap();
        prop_assert!(dleq_verify(&x1, &y1, &x2, &y2, &proof).is_ok());
    }

    #[test]
    fn hash_to_g1_is_safe(msg in proptest::collection::vec(any::<u8>(), 0..64)) {
        let point = hash_to_g1(&msg).unwrap();
        prop_assert!(point.is_on_curve());
        prop_assert!(is_safe_signing_point(&point));
    }

    #[test]
    fn signature_binds_message(sk in arb_scalar(), msg in any::<[u8; 16]>()) {
        let sig = sign(&msg, &sk).unwrap();
        prop_assert!(verify(&msg, &sig, &g2_mul(&sk)).unwrap());

        let other = keccak256(msg);
        prop_assert!(!verify(&other, &sig, &g2_mul(&sk)).unwrap());
    }
}
