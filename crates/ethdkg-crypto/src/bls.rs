//! BLS signatures over BN254 and threshold aggregation
//!
//! Signatures live in G1 (`H(msg)^sk`), public keys in G2 (`h2^sk`).
//! Group signatures are recovered by Lagrange interpolation at zero over
//! the signers' base-1 indices.

use ark_bn254::{Bn254, Fr, G1Affine, G1Projective, G2Affine};
use ark_ec::pairing::Pairing;
use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::{Field, One, Zero};

use crate::error::{CryptoError, Result};
use crate::hash::hash_to_g1;

/// `true` when `prod e(g1s[i], g2s[i]) == 1`
pub fn pairing_check(g1s: &[G1Affine], g2s: &[G2Affine]) -> Result<bool> {
    if g1s.len() != g2s.len() {
        return Err(CryptoError::MismatchedSlices {
            left: g1s.len(),
            right: g2s.len(),
        });
    }
    let result = Bn254::multi_pairing(g1s.iter().copied(), g2s.iter().copied());
    Ok(result.0.is_one())
}

/// Sign `msg` with `private_key`
pub fn sign(msg: &[u8], private_key: &Fr) -> Result<G1Affine> {
    let hashed = hash_to_g1(msg)?;
    Ok((hashed * private_key).into_affine())
}

/// Verify `signature` on `msg` against `public_key`
///
/// An invalid signature is `Ok(false)`; an error means the message itself
/// cannot be signed safely.
pub fn verify(msg: &[u8], signature: &G1Affine, public_key: &G2Affine) -> Result<bool> {
    let hashed = hash_to_g1(msg)?;
    let neg_h2 = -G2Affine::generator();
    pairing_check(&[*signature, hashed], &[neg_h2, *public_key])
}

/// Lagrange coefficient `R_j = prod_{k != j} k / (k - j)` over `indices`
///
/// When `inverses` holds `1/m` for `m = 1..n-1` the divisions come from the
/// table; differences outside it fall back to a field inversion.
pub fn lagrange_coefficient(indices: &[u64], j: u64, inverses: Option<&[Fr]>) -> Result<Fr> {
    let mut coefficient = Fr::one();
    for &k in indices {
        if k == j {
            continue;
        }
        let distance = k.abs_diff(j);
        let inverse = match inverses.and_then(|table| table.get((distance - 1) as usize)) {
            Some(inverse) => *inverse,
            None => Fr::from(distance)
                .inverse()
                .ok_or(CryptoError::DuplicateIndex(k))?,
        };
        let partial = Fr::from(k) * inverse;
        coefficient *= if k > j { partial } else { -partial };
    }
    Ok(coefficient)
}

/// Interpolate the G1 value at zero from the first `threshold + 1` points
pub fn lagrange_interpolate_g1(
    points: &[G1Affine],
    indices: &[u64],
    threshold: usize,
    inverses: Option<&[Fr]>,
) -> Result<G1Affine> {
    if points.len() != indices.len() {
        return Err(CryptoError::MismatchedSlices {
            left: points.len(),
            right: indices.len(),
        });
    }
    let used = indices.len().min(threshold + 1);
    let indices = &indices[..used];
    check_indices(indices)?;

    let mut acc = G1Projective::zero();
    for (point, &j) in points.iter().zip(indices) {
        acc += *point * lagrange_coefficient(indices, j, inverses)?;
    }
    Ok(acc.into_affine())
}

/// Combine more than `threshold` signature shares into the group signature
pub fn aggregate_signatures(
    signatures: &[G1Affine],
    indices: &[u64],
    threshold: usize,
) -> Result<G1Affine> {
    aggregate_signatures_with_inverse(signatures, indices, threshold, None)
}

/// [`aggregate_signatures`] using a precomputed inverse table
pub fn aggregate_signatures_with_inverse(
    signatures: &[G1Affine],
    indices: &[u64],
    threshold: usize,
    inverses: Option<&[Fr]>,
) -> Result<G1Affine> {
    if signatures.len() != indices.len() {
        return Err(CryptoError::MismatchedSlices {
            left: signatures.len(),
            right: indices.len(),
        });
    }
    if signatures.len() <= threshold {
        return Err(CryptoError::BelowThreshold {
            threshold,
            got: signatures.len(),
        });
    }
    lagrange_interpolate_g1(signatures, indices, threshold, inverses)
}

fn check_indices(indices: &[u64]) -> Result<()> {
    for (pos, &index) in indices.iter().enumerate() {
        if index == 0 {
            return Err(CryptoError::ZeroIndex);
        }
        if indices[..pos].contains(&index) {
            return Err(CryptoError::DuplicateIndex(index));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_std::UniformRand;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    const MSG: &[u8] = b"Cryptography is great";

    fn g2(s: &Fr) -> G2Affine {
        (G2Affine::generator() * s).into_affine()
    }

    /// Shares of `secret` on a random polynomial of degree `threshold`
    fn shamir(rng: &mut ChaCha20Rng, secret: Fr, threshold: usize, n: u64) -> Vec<Fr> {
        let mut coefficients = vec![secret];
        coefficients.extend((0..threshold).map(|_| Fr::rand(rng)));
        (1..=n)
            .map(|x| {
                coefficients
                    .iter()
                    .rev()
                    .fold(Fr::zero(), |acc, c| acc * Fr::from(x) + c)
            })
            .collect()
    }

    #[test]
    fn test_sign_verify() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let sk = Fr::rand(&mut rng);
        let sig = sign(MSG, &sk).unwrap();
        assert!(verify(MSG, &sig, &g2(&sk)).unwrap());
        assert!(!verify(b"other message", &sig, &g2(&sk)).unwrap());
        assert!(!verify(MSG, &sig, &g2(&(sk + Fr::one()))).unwrap());
    }

    #[test]
    fn test_pairing_check_length_mismatch() {
        let result = pairing_check(&[G1Affine::generator()], &[]);
        assert!(matches!(result, Err(CryptoError::MismatchedSlices { .. })));
    }

    #[test]
    fn test_lagrange_coefficients_sum_to_one() {
        let indices = [1u64, 2, 4, 7];
        let total: Fr = indices
            .iter()
            .map(|j| lagrange_coefficient(&indices, *j, None).unwrap())
            .sum();
        assert_eq!(total, Fr::one());
    }

    #[test]
    fn test_inverse_table_matches_field_inverse() {
        let table: Vec<Fr> = (1..6u64).map(|m| Fr::from(m).inverse().unwrap()).collect();
        let indices = [2u64, 3, 5, 6];
        for j in indices {
            assert_eq!(
                lagrange_coefficient(&indices, j, Some(&table)).unwrap(),
                lagrange_coefficient(&indices, j, None).unwrap()
            );
        }
    }

    #[test]
    fn test_aggregate_recovers_group_signature() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let secret = Fr::rand(&mut rng);
        let threshold = 2;
        let shares = shamir(&mut rng, secret, threshold, 5);

        let sigs: Vec<G1Affine> = shares.iter().map(|s| sign(MSG, s).unwrap()).collect();
        let group_sig = aggregate_signatures(&sigs[1..4], &[2, 3, 4], threshold).unwrap();
        assert_eq!(group_sig, sign(MSG, &secret).unwrap());
        assert!(verify(MSG, &group_sig, &g2(&secret)).unwrap());

        // Extra shares beyond threshold + 1 are ignored
        let all = aggregate_signatures(&sigs, &[1, 2, 3, 4, 5], threshold).unwrap();
        assert_eq!(all, group_sig);
    }

    #[test]
    fn test_aggregate_below_threshold() {
        let sig = sign(MSG, &Fr::from(5u64)).unwrap();
        let result = aggregate_signatures(&[sig, sig], &[1, 2], 2);
        assert!(matches!(result, Err(CryptoError::BelowThreshold { .. })));
    }

    #[test]
    fn test_interpolation_rejects_bad_indices() {
        let p = G1Affine::generator();
        assert!(matches!(
            lagrange_interpolate_g1(&[p, p], &[1, 1], 1, None),
            Err(CryptoError::DuplicateIndex(1))
        ));
        assert!(matches!(
            lagrange_interpolate_g1(&[p, p], &[0, 1], 1, None),
            Err(CryptoError::ZeroIndex)
        ));
    }
}
