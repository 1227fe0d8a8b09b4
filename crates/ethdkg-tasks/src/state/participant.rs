//! Remote participant data, as learned from chain events

use alloy_primitives::{Address, B256, U256};
use ark_bn254::{G1Affine, G2Affine};
use ethdkg_crypto::{serde_ark, DleqProof};
use ethdkg_math::{GroupSigner, IssuedShares, KeyShare};
use serde::{Deserialize, Serialize};

use super::Phase;

/// One registered participant of the current round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Validator address
    pub address: Address,

    /// Base-1 registration index
    pub index: u64,

    /// Transport public key
    #[serde(with = "serde_ark")]
    pub public_key: G1Affine,

    /// Round the data belongs to
    pub nonce: u64,

    /// Last phase this participant completed
    pub phase: Phase,

    /// Public polynomial commitments
    #[serde(with = "serde_ark")]
    pub commitments: Vec<G1Affine>,

    /// Encrypted shares for every other participant
    pub encrypted_shares: Vec<U256>,

    /// Hash binding shares and commitments, zero until distributed
    pub distributed_shares_hash: B256,

    #[serde(with = "serde_ark")]
    pub key_share_g1: Option<G1Affine>,

    pub key_share_g1_proof: Option<DleqProof>,

    #[serde(with = "serde_ark")]
    pub key_share_g2: Option<G2Affine>,

    /// Share of the group public key
    #[serde(with = "serde_ark")]
    pub gpkj: Option<G2Affine>,

    /// Signature on the initial message under `gpkj`
    #[serde(with = "serde_ark")]
    pub gpkj_signature: Option<G1Affine>,
}

impl Participant {
    /// Freshly registered participant
    pub fn registered(address: Address, index: u64, nonce: u64, public_key: G1Affine) -> Self {
        Self {
            address,
            index,
            public_key,
            nonce,
            phase: Phase::RegistrationOpen,
            commitments: Vec::new(),
            encrypted_shares: Vec::new(),
            distributed_shares_hash: B256::ZERO,
            key_share_g1: None,
            key_share_g1_proof: None,
            key_share_g2: None,
            gpkj: None,
            gpkj_signature: None,
        }
    }

    /// Shares as the math library reads them
    pub fn issued_shares(&self) -> IssuedShares<'_> {
        IssuedShares {
            index: self.index,
            public_key: Some(&self.public_key),
            commitments: &self.commitments,
            encrypted_shares: &self.encrypted_shares,
        }
    }

    /// Published key share, if all three parts are present
    pub fn key_share(&self) -> Option<KeyShare> {
        Some(KeyShare {
            g1: self.key_share_g1?,
            g1_proof: self.key_share_g1_proof?,
            g2: self.key_share_g2?,
        })
    }

    /// Published group key material
    pub fn group_signer(&self) -> GroupSigner {
        GroupSigner {
            address: self.address,
            index: self.index,
            public_key: self.gpkj,
            signature: self.gpkj_signature,
        }
    }

    pub fn has_distributed_shares(&self) -> bool {
        self.distributed_shares_hash != B256::ZERO
    }
}
