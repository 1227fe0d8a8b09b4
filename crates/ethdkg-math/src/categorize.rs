//! Sorting published group keys into honest, dishonest and missing
//!
//! Every signer publishes `gpk_j` and `sig_j = H(m)^gsk_j`. A signer whose
//! signature does not verify under its own key is dishonest outright. For
//! the rest we look for `threshold + 1` signers whose interpolated group
//! signature verifies under the master public key; that witness set is
//! honest, and each remaining signer is honest exactly when adding it to the
//! witness set keeps the interpolation valid.
//!
//! The witness search enumerates subsets, which is `C(n, t + 1)` pairings in
//! the worst case. [`CategorizeOptions::max_subsets`] bounds it.

use alloy_primitives::Address;
use ark_bn254::{Fr, G1Affine, G2Affine};
use ark_ec::AffineRepr;
use ethdkg_crypto::{lagrange_interpolate_g1, verify};
use tracing::{debug, info, warn};

use crate::combinations::NChooseK;
use crate::error::{MathError, Result};

/// One participant's published group key material
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupSigner {
    /// Participant address
    pub address: Address,

    /// Base-1 index
    pub index: u64,

    /// Published `gpk_j`, `None` when nothing was submitted
    pub public_key: Option<G2Affine>,

    /// Published signature on the initial message
    pub signature: Option<G1Affine>,
}

impl GroupSigner {
    /// Nothing (or only zero points) was published
    pub fn is_missing(&self) -> bool {
        let key_missing = self.public_key.map_or(true, |pk| pk.is_zero());
        let sig_missing = self.signature.map_or(true, |sig| sig.is_zero());
        key_missing || sig_missing
    }
}

/// Knobs for [`categorize_group_signers`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategorizeOptions {
    /// Give up after trying this many candidate witness sets
    pub max_subsets: Option<usize>,
}

/// Addresses by category, each in input order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignerCategories {
    pub honest: Vec<Address>,
    pub dishonest: Vec<Address>,
    pub missing: Vec<Address>,
}

/// Categorize every signer against the master public key
///
/// `inverses` is the round's table of `1/m`, used for the Lagrange weights.
pub fn categorize_group_signers(
    message: &[u8],
    master_public_key: &G2Affine,
    signers: &[GroupSigner],
    threshold: usize,
    inverses: &[Fr],
    options: CategorizeOptions,
) -> Result<SignerCategories> {
    let mut categories = SignerCategories::default();
    let mut candidates = Vec::new();

    for signer in signers {
        if signer.is_missing() {
            categories.missing.push(signer.address);
            continue;
        }
        if signs_for_itself(message, signer)? {
            candidates.push(*signer);
        } else {
            warn!(index = signer.index, "Group signature does not verify under its gpkj");
            categories.dishonest.push(signer.address);
        }
    }

    if candidates.is_empty() && categories.dishonest.is_empty() {
        return Ok(categories);
    }

    let required = threshold + 1;
    if candidates.len() < required {
        return Err(MathError::NotEnoughSigners {
            present: candidates.len(),
            required,
        });
    }

    let verifier = GroupVerifier {
        message,
        master_public_key,
        threshold,
        inverses,
    };

    let mut search = NChooseK::new(candidates.len(), required).with_optional_limit(options.max_subsets);
    let witness = loop {
        let Some(subset) = search.next() else {
            if search.limit_reached() {
                return Err(MathError::SearchExhausted {
                    examined: search.produced(),
                });
            }
            return Err(MathError::NoValidSignerSet);
        };
        let members: Vec<GroupSigner> = subset.iter().map(|&i| candidates[i]).collect();
        if verifier.verifies(&members)? {
            break subset;
        }
    };
    debug!(examined = search.produced(), "Found witness set for group signature");

    let witness_members: Vec<GroupSigner> = witness.iter().map(|&i| candidates[i]).collect();
    let unknown: Vec<GroupSigner> = (0..candidates.len())
        .filter(|i| !witness.contains(i))
        .map(|i| candidates[i])
        .collect();

    let mut honest: Vec<Address> = witness_members.iter().map(|s| s.address).collect();
    let everyone: Vec<GroupSigner> = witness_members.iter().chain(&unknown).copied().collect();

    if unknown.is_empty() || verifier.verifies(&everyone)? {
        honest.extend(unknown.iter().map(|s| s.address));
    } else {
        for signer in &unknown {
            let mut extended = witness_members.clone();
            extended.push(*signer);
            if verifier.verifies(&extended)? {
                honest.push(signer.address);
            } else {
                categories.dishonest.push(signer.address);
            }
        }
    }

    // Restore input order
    categories.honest = signers
        .iter()
        .map(|s| s.address)
        .filter(|a| honest.contains(a))
        .collect();
    categories.dishonest = signers
        .iter()
        .map(|s| s.address)
        .filter(|a| categories.dishonest.contains(a))
        .collect();

    info!(
        honest = categories.honest.len(),
        dishonest = categories.dishonest.len(),
        missing = categories.missing.len(),
        "Categorized group signers"
    );
    Ok(categories)
}

fn signs_for_itself(message: &[u8], signer: &GroupSigner) -> Result<bool> {
    match (signer.signature, signer.public_key) {
        (Some(sig), Some(pk)) => Ok(verify(message, &sig, &pk)?),
        _ => Ok(false),
    }
}

struct GroupVerifier<'a> {
    message: &'a [u8],
    master_public_key: &'a G2Affine,
    threshold: usize,
    inverses: &'a [Fr],
}

impl GroupVerifier<'_> {
    /// Interpolate over every member and check against the master key
    ///
    /// Unusable index sets (duplicates, zero) simply do not verify.
    fn verifies(&self, members: &[GroupSigner]) -> Result<bool> {
        debug_assert!(members.len() > self.threshold);
        let signatures: Vec<G1Affine> = members.iter().filter_map(|s| s.signature).collect();
        let indices: Vec<u64> = members.iter().map(|s| s.index).collect();

        let group_signature = match lagrange_interpolate_g1(
            &signatures,
            &indices,
            members.len() - 1,
            Some(self.inverses),
        ) {
            Ok(signature) => signature,
            Err(_) => return Ok(false),
        };
        Ok(verify(self.message, &group_signature, self.master_public_key)?)
    }
}
