//! Threshold and inverse-table helpers

use ark_bn254::Fr;
use ark_ff::{Field, One};

use crate::error::{MathError, Result};

/// Smallest committee the ceremony accepts
pub const MIN_PARTICIPANTS: usize = 4;

/// Threshold `t` for `n` participants
///
/// `t + 1` shares reconstruct the group secret, and `t` is the smallest value
/// with `t + 1 > 2n / 3`.
pub fn threshold_for_user_count(n: usize) -> usize {
    let k = n / 3;
    let threshold = 2 * k;
    if n - 3 * k == 2 {
        threshold + 1
    } else {
        threshold
    }
}

/// Inverses of `1..n-1` mod the group order
///
/// Published on-chain so the contract can replace modular inversion with
/// multiplication when checking Lagrange interpolations.
pub fn inverse_array_for_user_count(n: usize) -> Result<Vec<Fr>> {
    if n < MIN_PARTICIPANTS {
        return Err(MathError::InvalidUserCount {
            min: MIN_PARTICIPANTS,
            got: n,
        });
    }

    (1..n as u64)
        .map(|m| {
            let value = Fr::from(m);
            let inverse = value.inverse().ok_or(MathError::InverseCheckFailed(m))?;
            if value * inverse != Fr::one() {
                return Err(MathError::InverseCheckFailed(m));
            }
            Ok(inverse)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_table() {
        let expected = [(4, 2), (5, 3), (6, 4), (7, 4), (8, 5), (9, 6)];
        for (n, t) in expected {
            assert_eq!(threshold_for_user_count(n), t, "n = {}", n);
        }
    }

    #[test]
    fn test_threshold_is_bft() {
        for n in MIN_PARTICIPANTS..200 {
            let t = threshold_for_user_count(n);
            assert!(3 * (t + 1) > 2 * n, "n = {}", n);
            assert!(3 * t <= 2 * n, "n = {}", n);
        }
    }

    #[test]
    fn test_inverse_array() {
        let inverses = inverse_array_for_user_count(7).unwrap();
        assert_eq!(inverses.len(), 6);
        for (i, inverse) in inverses.iter().enumerate() {
            assert_eq!(Fr::from(i as u64 + 1) * inverse, Fr::one());
        }
    }

    #[test]
    fn test_inverse_array_too_small() {
        for n in 0..MIN_PARTICIPANTS {
            assert_eq!(
                inverse_array_for_user_count(n),
                Err(MathError::InvalidUserCount { min: 4, got: n })
            );
        }
    }
}
