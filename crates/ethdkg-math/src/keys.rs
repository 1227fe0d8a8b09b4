//! Key shares, the master public key and group keys

use ark_bn254::{Fr, G1Affine, G1Projective, G2Affine, G2Projective};
use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::Zero;
use ethdkg_crypto::{
    dleq_prove, dleq_verify, g1_mul, g2_mul, hash_to_g1, pairing_check, sign, verify, DleqProof,
};
use rand::{CryptoRng, RngCore};
use tracing::debug;

use crate::error::{MathError, Result};
use crate::shares::{decrypt_share_for, evaluate_polynomial, IssuedShares};
use crate::threshold::threshold_for_user_count;

/// Message hashed to the G1 base used for key shares
pub const H1_BASE_MESSAGE: &[u8] = b"MadHive Rocks!";

/// Message every participant signs with its group secret share
pub const INITIAL_MESSAGE: &[u8] = b"Cryptography is great";

/// A participant's contribution to the master public key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyShare {
    /// `h1^s` where `h1 = H(H1_BASE_MESSAGE)`
    pub g1: G1Affine,

    /// DLEQ proof that `g1` and `g1_base^s` share the exponent
    pub g1_proof: DleqProof,

    /// `h2^s`
    pub g2: G2Affine,
}

/// A participant's share of the group key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupKeys {
    /// `gsk_j`
    pub private_key: Fr,

    /// `gpk_j = h2^gsk_j`
    pub public_key: G2Affine,

    /// `H(INITIAL_MESSAGE)^gsk_j`
    pub signature: G1Affine,
}

/// The G1 base point for key shares
pub fn h1_base() -> Result<G1Affine> {
    Ok(hash_to_g1(H1_BASE_MESSAGE)?)
}

/// Build and self-check the key share for `secret_value`
///
/// Failure of either self-check means local state is corrupt; it is reported
/// as [`MathError::Internal`] rather than retried.
pub fn generate_key_share<R: RngCore + CryptoRng>(
    rng: &mut R,
    secret_value: Option<&Fr>,
) -> Result<KeyShare> {
    let secret = secret_value.ok_or(MathError::MissingSecretValue)?;
    let h1 = h1_base()?;

    let g1 = (h1 * secret).into_affine();
    let g2 = g2_mul(secret);
    if !pairing_check(&[g1, h1], &[-G2Affine::generator(), g2])? {
        return Err(MathError::Internal("key shares not a valid pair".to_string()));
    }

    let g1_base = G1Affine::generator();
    let g1_value = g1_mul(secret);
    let g1_proof = dleq_prove(&h1, &g1, &g1_base, &g1_value, secret, rng)?;
    dleq_verify(&h1, &g1, &g1_base, &g1_value, &g1_proof)
        .map_err(|e| MathError::Internal(format!("key share proof: {}", e)))?;

    Ok(KeyShare { g1, g1_proof, g2 })
}

/// Check a published key share against the issuer's first commitment `g1^s`
pub fn verify_key_share(share: &KeyShare, first_commitment: &G1Affine) -> Result<bool> {
    let h1 = h1_base()?;
    if !pairing_check(&[share.g1, h1], &[-G2Affine::generator(), share.g2])? {
        return Ok(false);
    }
    let g1_base = G1Affine::generator();
    Ok(dleq_verify(&h1, &share.g1, &g1_base, first_commitment, &share.g1_proof).is_ok())
}

/// Sum every participant's key shares into the master public key
pub fn generate_master_public_key(
    key_shares_g1: &[G1Affine],
    key_shares_g2: &[G2Affine],
) -> Result<G2Affine> {
    if key_shares_g1.len() != key_shares_g2.len() {
        return Err(MathError::Mismatched(format!(
            "{} G1 key shares, {} G2 key shares",
            key_shares_g1.len(),
            key_shares_g2.len()
        )));
    }

    let mpk_g1 = key_shares_g1
        .iter()
        .fold(G1Projective::zero(), |acc, share| acc + share)
        .into_affine();
    let mpk_g2 = key_shares_g2
        .iter()
        .fold(G2Projective::zero(), |acc, share| acc + share)
        .into_affine();

    if !pairing_check(&[mpk_g1, h1_base()?], &[-G2Affine::generator(), mpk_g2])? {
        return Err(MathError::InvalidMasterPublicKey);
    }
    Ok(mpk_g2)
}

/// Derive our group secret share from every share addressed to `index`
///
/// `issuers` is the whole committee ordered by index, ourselves included.
pub fn generate_group_keys(
    transport_private_key: Option<&Fr>,
    private_coefficients: &[Fr],
    index: u64,
    number_of_validators: usize,
    issuers: &[IssuedShares<'_>],
) -> Result<GroupKeys> {
    let transport_private_key = transport_private_key.ok_or(MathError::MissingTransportKey)?;
    if index == 0 {
        return Err(MathError::InvalidIndex(index));
    }
    let threshold = threshold_for_user_count(number_of_validators);
    if private_coefficients.len() != threshold + 1 {
        return Err(MathError::InvalidPrivateCoefficients {
            expected: threshold + 1,
            got: private_coefficients.len(),
        });
    }
    if issuers.len() != number_of_validators {
        return Err(MathError::Mismatched(format!(
            "{} share issuers for {} validators",
            issuers.len(),
            number_of_validators
        )));
    }

    let mut private_key = evaluate_polynomial(private_coefficients, index);
    for issuer in issuers.iter().filter(|issuer| issuer.index != index) {
        private_key += decrypt_share_for(issuer, index, transport_private_key)?;
    }
    debug!(index, issuers = issuers.len(), "Derived group secret share");

    let public_key = g2_mul(&private_key);
    let signature = sign(INITIAL_MESSAGE, &private_key)?;
    if !verify(INITIAL_MESSAGE, &signature, &public_key)? {
        return Err(MathError::Internal(
            "group signature does not verify against gpkj".to_string(),
        ));
    }

    Ok(GroupKeys {
        private_key,
        public_key,
        signature,
    })
}

/// Check `gpkj` against everyone's commitments, as the bad-gpkj accusation does
///
/// `gpkj* = sum_k (sum_i C_ik) * j^k` must satisfy `e(gpkj*, -h2) e(g1, gpkj) = 1`.
pub fn verify_gpkj_against_commitments(
    index: u64,
    gpkj: &G2Affine,
    all_commitments: &[&[G1Affine]],
) -> Result<bool> {
    let degree = all_commitments.first().map(|c| c.len()).unwrap_or(0);
    if degree == 0 || all_commitments.iter().any(|c| c.len() != degree) {
        return Err(MathError::InvalidCommitments {
            expected: degree,
            got: all_commitments
                .iter()
                .map(|c| c.len())
                .find(|len| *len != degree)
                .unwrap_or(0),
        });
    }

    let j = Fr::from(index);
    let mut power = Fr::from(1u64);
    let mut gpkj_star = G1Projective::zero();
    for k in 0..degree {
        let summed = all_commitments
            .iter()
            .fold(G1Projective::zero(), |acc, commitments| acc + commitments[k]);
        gpkj_star += summed * power;
        power *= j;
    }

    Ok(pairing_check(
        &[gpkj_star.into_affine(), G1Affine::generator()],
        &[-G2Affine::generator(), *gpkj],
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shares::{generate_shares, generate_transport_keys, ShareRecipient};
    use ark_std::UniformRand;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_key_share_requires_secret() {
        let mut rng = ChaCha20Rng::seed_from_u64(31);
        assert_eq!(
            generate_key_share(&mut rng, None),
            Err(MathError::MissingSecretValue)
        );
    }

    #[test]
    fn test_key_share_self_checks() {
        let mut rng = ChaCha20Rng::seed_from_u64(32);
        let secret = Fr::rand(&mut rng);
        let share = generate_key_share(&mut rng, Some(&secret)).unwrap();

        assert_eq!(share.g2, g2_mul(&secret));
        assert!(verify_key_share(&share, &g1_mul(&secret)).unwrap());
        assert!(!verify_key_share(&share, &g1_mul(&(secret + Fr::from(1u64)))).unwrap());
    }

    #[test]
    fn test_master_public_key() {
        let mut rng = ChaCha20Rng::seed_from_u64(33);
        let secrets: Vec<Fr> = (0..4).map(|_| Fr::rand(&mut rng)).collect();
        let shares: Vec<KeyShare> = secrets
            .iter()
            .map(|s| generate_key_share(&mut rng, Some(s)).unwrap())
            .collect();

        let g1s: Vec<G1Affine> = shares.iter().map(|s| s.g1).collect();
        let g2s: Vec<G2Affine> = shares.iter().map(|s| s.g2).collect();
        let mpk = generate_master_public_key(&g1s, &g2s).unwrap();

        let total: Fr = secrets.iter().sum();
        assert_eq!(mpk, g2_mul(&total));
    }

    #[test]
    fn test_master_public_key_mismatched() {
        let g1s = [G1Affine::generator()];
        assert!(matches!(
            generate_master_public_key(&g1s, &[]),
            Err(MathError::Mismatched(_))
        ));
    }

    #[test]
    fn test_master_public_key_inconsistent_pair() {
        let mut rng = ChaCha20Rng::seed_from_u64(34);
        let a = generate_key_share(&mut rng, Some(&Fr::from(3u64))).unwrap();
        let b = generate_key_share(&mut rng, Some(&Fr::from(4u64))).unwrap();
        assert_eq!(
            generate_master_public_key(&[a.g1, b.g1], &[a.g2, a.g2]),
            Err(MathError::InvalidMasterPublicKey)
        );
    }

    #[test]
    fn test_group_keys_and_commitment_check() {
        let mut rng = ChaCha20Rng::seed_from_u64(35);
        let n = 4usize;
        let keys: Vec<(Fr, G1Affine)> =
            (0..n).map(|_| generate_transport_keys(&mut rng)).collect();
        let recipients: Vec<ShareRecipient> = keys
            .iter()
            .enumerate()
            .map(|(i, (_, pk))| ShareRecipient {
                index: i as u64 + 1,
                public_key: Some(*pk),
            })
            .collect();
        let generated: Vec<_> = keys
            .iter()
            .map(|(sk, _)| generate_shares(&mut rng, sk, &recipients).unwrap())
            .collect();

        let issuers: Vec<IssuedShares<'_>> = generated
            .iter()
            .enumerate()
            .map(|(i, g)| IssuedShares {
                index: i as u64 + 1,
                public_key: Some(&keys[i].1),
                commitments: &g.commitments,
                encrypted_shares: &g.encrypted_shares,
            })
            .collect();
        let all_commitments: Vec<&[G1Affine]> =
            generated.iter().map(|g| g.commitments.as_slice()).collect();

        for (i, (sk, _)) in keys.iter().enumerate() {
            let index = i as u64 + 1;
            let group = generate_group_keys(
                Some(sk),
                &generated[i].private_coefficients,
                index,
                n,
                &issuers,
            )
            .unwrap();
            let gpkj = group.public_key;
            assert!(verify_gpkj_against_commitments(index, &gpkj, &all_commitments).unwrap());
            assert!(!verify_gpkj_against_commitments(index + 1, &gpkj, &all_commitments).unwrap());
        }
    }

    #[test]
    fn test_group_keys_validation() {
        let coefficients = [Fr::from(1u64); 3];
        assert_eq!(
            generate_group_keys(None, &coefficients, 1, 4, &[]),
            Err(MathError::MissingTransportKey)
        );
        assert_eq!(
            generate_group_keys(Some(&Fr::from(1u64)), &coefficients, 0, 4, &[]),
            Err(MathError::InvalidIndex(0))
        );
        assert!(matches!(
            generate_group_keys(Some(&Fr::from(1u64)), &coefficients[..2], 1, 4, &[]),
            Err(MathError::InvalidPrivateCoefficients { expected: 3, got: 2 })
        ));
        assert!(matches!(
            generate_group_keys(Some(&Fr::from(1u64)), &coefficients, 1, 4, &[]),
            Err(MathError::Mismatched(_))
        ));
    }
}
