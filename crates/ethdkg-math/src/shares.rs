//! Verifiable secret sharing
//!
//! Each participant picks a random polynomial of degree `t`, publishes
//! `g1^c` for every coefficient and sends every other participant `j` the
//! evaluation `f(j)` encrypted under their transport key. Evaluation points
//! are the participants' base-1 indices.

use alloy_primitives::{B256, U256};
use ark_bn254::{Fr, G1Affine, G1Projective};
use ark_ec::CurveGroup;
use ark_ff::Zero;
use ark_std::UniformRand;
use ethdkg_crypto::{
    decrypt, encrypt, g1_mul, g1_to_bytes, keccak256, keccak256_concat, u256_to_fr,
};
use rand::{CryptoRng, RngCore};
use zeroize::Zeroize;

use crate::error::{MathError, Result};
use crate::threshold::{threshold_for_user_count, MIN_PARTICIPANTS};

/// A participant's transport key as seen by a share issuer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShareRecipient {
    /// Base-1 index
    pub index: u64,

    /// Registered transport public key, if any
    pub public_key: Option<G1Affine>,
}

/// What one participant distributed, as read back from chain events
#[derive(Debug, Clone, Copy)]
pub struct IssuedShares<'a> {
    /// Issuer's base-1 index
    pub index: u64,

    /// Issuer's transport public key
    pub public_key: Option<&'a G1Affine>,

    /// Public polynomial commitments, `threshold + 1` of them
    pub commitments: &'a [G1Affine],

    /// One encrypted share per other participant, ordered by index
    pub encrypted_shares: &'a [U256],
}

/// Output of [`generate_shares`]
#[derive(Debug, Clone)]
pub struct GeneratedShares {
    /// Shares for every other participant, ordered by index
    pub encrypted_shares: Vec<U256>,

    /// Private polynomial; the constant term is the secret value
    pub private_coefficients: Vec<Fr>,

    /// `g1^c` for each private coefficient
    pub commitments: Vec<G1Affine>,
}

impl Drop for GeneratedShares {
    fn drop(&mut self) {
        self.private_coefficients.zeroize();
    }
}

/// Result of checking one issuer's share against its commitments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShareCheck {
    /// The share lies on the committed polynomial
    pub valid: bool,

    /// The issuer has distributed anything at all
    pub present: bool,
}

/// Hashes binding a participant's distributed shares on-chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistributedSharesHash {
    /// `keccak(encrypted_shares_hash || commitments_hash)`
    pub distributed: B256,

    /// `keccak` of the packed encrypted shares
    pub encrypted_shares: B256,

    /// `keccak` of the packed commitments
    pub commitments: B256,
}

/// Random per-round transport key pair
pub fn generate_transport_keys<R: RngCore + CryptoRng>(rng: &mut R) -> (Fr, G1Affine) {
    let private_key = Fr::rand(rng);
    (private_key, g1_mul(&private_key))
}

/// Evaluate a private polynomial at `x`
pub fn evaluate_polynomial(coefficients: &[Fr], x: u64) -> Fr {
    let x = Fr::from(x);
    coefficients
        .iter()
        .rev()
        .fold(Fr::zero(), |acc, coefficient| acc * x + coefficient)
}

/// Evaluate the committed polynomial "in the exponent": `g1^f(x)`
pub fn evaluate_commitments(commitments: &[G1Affine], x: u64) -> G1Affine {
    let x = Fr::from(x);
    let mut power = Fr::from(1u64);
    let mut acc = G1Projective::zero();
    for commitment in commitments {
        acc += *commitment * power;
        power *= x;
    }
    acc.into_affine()
}

/// `true` when `share` lies on the polynomial committed to by `commitments`
pub fn share_matches_commitments(share: &Fr, index: u64, commitments: &[G1Affine]) -> bool {
    g1_mul(share) == evaluate_commitments(commitments, index)
}

/// Build a polynomial, its commitments and an encrypted share for everyone else
///
/// `recipients` is the full committee ordered by index, including ourselves;
/// our own slot is recognized by its public key and skipped.
pub fn generate_shares<R: RngCore + CryptoRng>(
    rng: &mut R,
    transport_private_key: &Fr,
    recipients: &[ShareRecipient],
) -> Result<GeneratedShares> {
    let n = recipients.len();
    let threshold = threshold_for_user_count(n);

    let public_keys: Vec<(u64, G1Affine)> = recipients
        .iter()
        .filter_map(|r| r.public_key.map(|pk| (r.index, pk)))
        .collect();
    if public_keys.len() != n {
        return Err(MathError::MissingPublicKeys {
            have: public_keys.len(),
            need: n,
        });
    }

    let private_coefficients: Vec<Fr> = (0..=threshold).map(|_| Fr::rand(rng)).collect();
    let commitments = private_coefficients.iter().map(g1_mul).collect();

    let own_public_key = g1_mul(transport_private_key);
    let encrypted_shares = public_keys
        .iter()
        .filter(|(_, pk)| *pk != own_public_key)
        .map(|(index, pk)| {
            let share = evaluate_polynomial(&private_coefficients, *index);
            encrypt(&share, transport_private_key, pk, *index)
        })
        .collect();

    Ok(GeneratedShares {
        encrypted_shares,
        private_coefficients,
        commitments,
    })
}

/// Position of the share addressed to `receiver` inside `issuer`'s list
pub fn encrypted_share_position(issuer: u64, receiver: u64) -> usize {
    let position = receiver.saturating_sub(1);
    if issuer < receiver {
        position.saturating_sub(1) as usize
    } else {
        position as usize
    }
}

/// Decrypt the share `issuer` sent to us
pub fn decrypt_share_for(
    issuer: &IssuedShares<'_>,
    receiver_index: u64,
    transport_private_key: &Fr,
) -> Result<Fr> {
    let public_key = issuer
        .public_key
        .ok_or(MathError::MissingPublicKey(issuer.index))?;
    let position = encrypted_share_position(issuer.index, receiver_index);
    let encrypted = issuer.encrypted_shares.get(position).ok_or(
        MathError::InvalidEncryptedShares {
            expected: position + 1,
            got: issuer.encrypted_shares.len(),
        },
    )?;
    let secret = decrypt(encrypted, transport_private_key, public_key, receiver_index);
    Ok(u256_to_fr(&secret))
}

/// Check the share `issuer` sent us against their commitments
///
/// `present` is false while the issuer has published nothing; that is not
/// yet a fault. Malformed publications are errors since the contract should
/// never have accepted them.
pub fn verify_distributed_shares(
    my_index: u64,
    transport_private_key: &Fr,
    number_of_validators: usize,
    issuer: &IssuedShares<'_>,
) -> Result<ShareCheck> {
    if issuer.index == my_index {
        return Ok(ShareCheck {
            valid: true,
            present: true,
        });
    }

    let n = number_of_validators;
    if n < MIN_PARTICIPANTS {
        return Err(MathError::InvalidUserCount {
            min: MIN_PARTICIPANTS,
            got: n,
        });
    }
    if issuer.commitments.is_empty() && issuer.encrypted_shares.is_empty() {
        return Ok(ShareCheck {
            valid: false,
            present: false,
        });
    }

    let threshold = threshold_for_user_count(n);
    if issuer.commitments.len() != threshold + 1 {
        return Err(MathError::InvalidCommitments {
            expected: threshold + 1,
            got: issuer.commitments.len(),
        });
    }
    if issuer.encrypted_shares.len() != n - 1 {
        return Err(MathError::InvalidEncryptedShares {
            expected: n - 1,
            got: issuer.encrypted_shares.len(),
        });
    }

    let secret = decrypt_share_for(issuer, my_index, transport_private_key)?;
    Ok(ShareCheck {
        valid: share_matches_commitments(&secret, my_index, issuer.commitments),
        present: true,
    })
}

/// Hash binding encrypted shares and commitments, as stored by the contract
pub fn compute_distributed_shares_hash(
    encrypted_shares: &[U256],
    commitments: &[G1Affine],
) -> DistributedSharesHash {
    let shares_bytes: Vec<u8> = encrypted_shares
        .iter()
        .flat_map(|share| share.to_be_bytes::<32>())
        .collect();
    let commitment_bytes: Vec<u8> = commitments.iter().flat_map(g1_to_bytes).collect();

    let encrypted_shares_hash = keccak256(&shares_bytes);
    let commitments_hash = keccak256(&commitment_bytes);
    let distributed = keccak256_concat([&encrypted_shares_hash[..], &commitments_hash[..]]);

    DistributedSharesHash {
        distributed: B256::from(distributed),
        encrypted_shares: B256::from(encrypted_shares_hash),
        commitments: B256::from(commitments_hash),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    struct Node {
        index: u64,
        private_key: Fr,
        public_key: G1Affine,
    }

    fn committee(rng: &mut ChaCha20Rng, n: u64) -> Vec<Node> {
        (1..=n)
            .map(|index| {
                let (private_key, public_key) = generate_transport_keys(rng);
                Node {
                    index,
                    private_key,
                    public_key,
                }
            })
            .collect()
    }

    fn recipients(nodes: &[Node]) -> Vec<ShareRecipient> {
        nodes
            .iter()
            .map(|node| ShareRecipient {
                index: node.index,
                public_key: Some(node.public_key),
            })
            .collect()
    }

    #[test]
    fn test_polynomial_evaluation() {
        // f(x) = 3 + 2x + x^2
        let coefficients = [Fr::from(3u64), Fr::from(2u64), Fr::from(1u64)];
        assert_eq!(evaluate_polynomial(&coefficients, 0), Fr::from(3u64));
        assert_eq!(evaluate_polynomial(&coefficients, 2), Fr::from(11u64));

        let commitments: Vec<G1Affine> = coefficients.iter().map(g1_mul).collect();
        assert_eq!(evaluate_commitments(&commitments, 2), g1_mul(&Fr::from(11u64)));
    }

    #[test]
    fn test_share_positions() {
        // Issuer 1 skips itself, so receiver 2 is at position 0
        assert_eq!(encrypted_share_position(1, 2), 0);
        assert_eq!(encrypted_share_position(3, 2), 1);
        assert_eq!(encrypted_share_position(2, 1), 0);
        assert_eq!(encrypted_share_position(1, 4), 2);
    }

    #[test]
    fn test_generate_shares_shapes() {
        let mut rng = ChaCha20Rng::seed_from_u64(21);
        let nodes = committee(&mut rng, 5);
        let shares = generate_shares(&mut rng, &nodes[0].private_key, &recipients(&nodes)).unwrap();

        assert_eq!(shares.encrypted_shares.len(), 4);
        assert_eq!(shares.private_coefficients.len(), 4);
        assert_eq!(shares.commitments.len(), 4);
        assert_eq!(shares.commitments[0], g1_mul(&shares.private_coefficients[0]));
    }

    #[test]
    fn test_generate_shares_missing_key() {
        let mut rng = ChaCha20Rng::seed_from_u64(22);
        let nodes = committee(&mut rng, 4);
        let mut recipients = recipients(&nodes);
        recipients[2].public_key = None;

        let result = generate_shares(&mut rng, &nodes[0].private_key, &recipients);
        assert_eq!(result.err(), Some(MathError::MissingPublicKeys { have: 3, need: 4 }));
    }

    #[test]
    fn test_verify_self_and_absent() {
        let mut rng = ChaCha20Rng::seed_from_u64(23);
        let nodes = committee(&mut rng, 4);

        let own = IssuedShares {
            index: 1,
            public_key: Some(&nodes[0].public_key),
            commitments: &[],
            encrypted_shares: &[],
        };
        let check = verify_distributed_shares(1, &nodes[0].private_key, 4, &own).unwrap();
        assert_eq!(check, ShareCheck { valid: true, present: true });

        let absent = IssuedShares { index: 2, ..own };
        let check = verify_distributed_shares(1, &nodes[0].private_key, 4, &absent).unwrap();
        assert!(!check.present);
    }

    #[test]
    fn test_verify_rejects_small_committee() {
        let mut rng = ChaCha20Rng::seed_from_u64(24);
        let nodes = committee(&mut rng, 3);
        let issuer = IssuedShares {
            index: 2,
            public_key: Some(&nodes[1].public_key),
            commitments: &[],
            encrypted_shares: &[],
        };
        assert!(verify_distributed_shares(1, &nodes[0].private_key, 3, &issuer).is_err());
    }

    #[test]
    fn test_verify_rejects_wrong_lengths() {
        let mut rng = ChaCha20Rng::seed_from_u64(25);
        let nodes = committee(&mut rng, 4);
        let shares = generate_shares(&mut rng, &nodes[1].private_key, &recipients(&nodes)).unwrap();

        let issuer = IssuedShares {
            index: 2,
            public_key: Some(&nodes[1].public_key),
            commitments: &shares.commitments[..2],
            encrypted_shares: &shares.encrypted_shares,
        };
        assert_eq!(
            verify_distributed_shares(1, &nodes[0].private_key, 4, &issuer),
            Err(MathError::InvalidCommitments { expected: 3, got: 2 })
        );
    }

    #[test]
    fn test_distributed_shares_hash_is_binding() {
        let shares = [U256::from(1u64), U256::from(2u64)];
        let commitments = [g1_mul(&Fr::from(3u64))];
        let hash = compute_distributed_shares_hash(&shares, &commitments);

        let expected = keccak256_concat([
            hash.encrypted_shares.as_slice(),
            hash.commitments.as_slice(),
        ]);
        assert_eq!(hash.distributed, B256::from(expected));

        let other = compute_distributed_shares_hash(&[U256::from(1u64)], &commitments);
        assert_ne!(hash.distributed, other.distributed);
    }
}
