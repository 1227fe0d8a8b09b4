//! Property-based tests for ethdkg-math using proptest
//!
//! These tests verify invariants that should hold for all valid inputs.

use ark_ff::One;
use ethdkg_crypto::{Fr, G1Affine};
use ethdkg_math::{
    binomial, encrypted_share_position, generate_shares, generate_transport_keys, inverse_array_for_user_count,
    threshold_for_user_count, verify_distributed_shares, IssuedShares, NChooseK, ShareRecipient,
    MIN_PARTICIPANTS,
};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

// ============================================
// Arbitrary Implementations
// ============================================

fn arb_user_count() -> impl Strategy<Value = usize> {
    MIN_PARTICIPANTS..=8
}

fn committee_keys(rng: &mut ChaCha20Rng, n: usize) -> Vec<(Fr, G1Affine)> {
    (0..n).map(|_| generate_transport_keys(rng)).collect()
}

fn recipients(keys: &[(Fr, G1Affine)]) -> Vec<ShareRecipient> {
    keys.iter()
        .enumerate()
        .map(|(i, (_, pk))| ShareRecipient { index: i as u64 + 1, public_key: Some(*pk) })
        .collect()
}

fn arb_subset_shape() -> impl Strategy<Value = (usize, usize)> {
    (0usize..=10).prop_flat_map(|n| (Just(n), 0..=n))
}

// ============================================
// Threshold Properties
// ============================================

proptest! {
    #[test]
    fn threshold_tolerates_a_third(n in MIN_PARTICIPANTS..10_000usize) {
        let t = threshold_for_user_count(n);
        prop_assert!(t < n);
        prop_assert!(3 * (t + 1) > 2 * n);
    }

    #[test]
    fn inverses_multiply_to_one(n in MIN_PARTICIPANTS..64usize) {
        let inverses = inverse_array_for_user_count(n).unwrap();
        prop_assert_eq!(inverses.len(), n - 1);
        for (i, inverse) in inverses.iter().enumerate() {
            prop_assert_eq!(Fr::from(i as u64 + 1) * inverse, Fr::one());
        }
    }

    #[test]
    fn subset_count_matches_binomial((n, k) in arb_subset_shape()) {
        prop_assert_eq!(NChooseK::new(n, k).count() as u128, binomial(n, k));
    }
}

// ============================================
// Secret Sharing Properties
// ============================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn every_share_verifies(n in arb_user_count(), seed in any::<u64>(), issuer in 0usize..8) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let keys = committee_keys(&mut rng, n);
        let recipients = recipients(&keys);

        let issuer = issuer % n;
        let shares = generate_shares(&mut rng, &keys[issuer].0, &recipients).unwrap();
        prop_assert_eq!(shares.encrypted_shares.len(), n - 1);
        let issued = IssuedShares {
            index: issuer as u64 + 1,
            public_key: Some(&keys[issuer].1),
            commitments: &shares.commitments,
            encrypted_shares: &shares.encrypted_shares,
        };

        for receiver in (0..n).filter(|&r| r != issuer) {
            let check = verify_distributed_shares(receiver as u64 + 1, &keys[receiver].0, n, &issued).unwrap();
            prop_assert!(check.present);
            prop_assert!(check.valid, "issuer {} receiver {}", issuer + 1, receiver + 1);
        }
    }

    #[test]
    fn tampered_share_is_caught(
        n in arb_user_count(),
        seed in any::<u64>(),
        issuer in 0usize..8,
        receiver_offset in 0usize..7,
    ) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let keys = committee_keys(&mut rng, n);
        let recipients = recipients(&keys);

        let issuer = issuer % n;
        let receiver = (issuer + 1 + receiver_offset % (n - 1)) % n;
        let shares = generate_shares(&mut rng, &keys[issuer].0, &recipients).unwrap();

        let position = encrypted_share_position(issuer as u64 + 1, receiver as u64 + 1);
        let mut encrypted = shares.encrypted_shares.clone();
        encrypted[position] ^= alloy_primitives::U256::from(1u64);
        let issued = IssuedShares {
            index: issuer as u64 + 1,
            public_key: Some(&keys[issuer].1),
            commitments: &shares.commitments,
            encrypted_shares: &encrypted,
        };

        let check = verify_distributed_shares(receiver as u64 + 1, &keys[receiver].0, n, &issued).unwrap();
        prop_assert!(check.present);
        prop_assert!(!check.valid);

        // Everyone else still holds a valid share
        for other in (0..n).filter(|&r| r != issuer && r != receiver) {
            let check = verify_distributed_shares(other as u64 + 1, &keys[other].0, n, &issued).unwrap();
            prop_assert!(check.valid);
        }
    }
}
