//! Decoded contract events

use alloy_primitives::{Address, U256};
use ark_bn254::{G1Affine, G2Affine};
use ethdkg_crypto::DleqProof;

/// Domain events emitted by the ETHDKG contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DkgEvent {
    /// A new round started
    RegistrationOpened {
        start_block: u64,
        number_validators: usize,
        nonce: u64,
        phase_length: u64,
        confirmation_length: u64,
    },

    AddressRegistered {
        account: Address,
        index: u64,
        nonce: u64,
        public_key: G1Affine,
    },

    /// Every validator registered
    RegistrationComplete { block: u64, nonce: u64 },

    SharesDistributed {
        account: Address,
        index: u64,
        nonce: u64,
        encrypted_shares: Vec<U256>,
        commitments: Vec<G1Affine>,
    },

    ShareDistributionComplete { block: u64, nonce: u64 },

    KeyShareSubmitted {
        account: Address,
        index: u64,
        nonce: u64,
        key_share_g1: G1Affine,
        key_share_g1_proof: DleqProof,
        key_share_g2: G2Affine,
    },

    KeyShareSubmissionComplete { block: u64, nonce: u64 },

    /// The master public key was accepted
    MPKSet {
        block: u64,
        nonce: u64,
        master_public_key: G2Affine,
    },

    GPKJSubmitted {
        account: Address,
        index: u64,
        nonce: u64,
        gpkj: G2Affine,
        signature: G1Affine,
    },

    GPKJSubmissionComplete { block: u64, nonce: u64 },

    /// A participant joined the validator set with its group key share
    ValidatorMemberAdded {
        account: Address,
        index: u64,
        nonce: u64,
        share: G2Affine,
    },

    /// The ceremony finished
    ValidatorSetCompleted {
        block: u64,
        nonce: u64,
        validator_count: usize,
        master_public_key: G2Affine,
    },
}

impl DkgEvent {
    /// Round the event belongs to
    pub fn nonce(&self) -> u64 {
        match self {
            DkgEvent::RegistrationOpened { nonce, .. }
            | DkgEvent::AddressRegistered { nonce, .. }
            | DkgEvent::RegistrationComplete { nonce, .. }
            | DkgEvent::SharesDistributed { nonce, .. }
            | DkgEvent::ShareDistributionComplete { nonce, .. }
            | DkgEvent::KeyShareSubmitted { nonce, .. }
            | DkgEvent::KeyShareSubmissionComplete { nonce, .. }
            | DkgEvent::MPKSet { nonce, .. }
            | DkgEvent::GPKJSubmitted { nonce, .. }
            | DkgEvent::GPKJSubmissionComplete { nonce, .. }
            | DkgEvent::ValidatorMemberAdded { nonce, .. }
            | DkgEvent::ValidatorSetCompleted { nonce, .. } => *nonce,
        }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            DkgEvent::RegistrationOpened { .. } => "RegistrationOpened",
            DkgEvent::AddressRegistered { .. } => "AddressRegistered",
            DkgEvent::RegistrationComplete { .. } => "RegistrationComplete",
            DkgEvent::SharesDistributed { .. } => "SharesDistributed",
            DkgEvent::ShareDistributionComplete { .. } => "ShareDistributionComplete",
            DkgEvent::KeyShareSubmitted { .. } => "KeyShareSubmitted",
            DkgEvent::KeyShareSubmissionComplete { .. } => "KeyShareSubmissionComplete",
            DkgEvent::MPKSet { .. } => "MPKSet",
            DkgEvent::GPKJSubmitted { .. } => "GPKJSubmitted",
            DkgEvent::GPKJSubmissionComplete { .. } => "GPKJSubmissionComplete",
            DkgEvent::ValidatorMemberAdded { .. } => "ValidatorMemberAdded",
            DkgEvent::ValidatorSetCompleted { .. } => "ValidatorSetCompleted",
        }
    }

    pub fn is_registration_opened(&self) -> bool {
        matches!(self, DkgEvent::RegistrationOpened { .. })
    }
}
