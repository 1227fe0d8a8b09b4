//! Per-round ceremony state of the local validator

use alloy_primitives::Address;
use ark_bn254::{Fr, G1Affine, G2Affine};
use ethdkg_crypto::serde_ark;
use ethdkg_math::{compute_distributed_shares_hash, threshold_for_user_count};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, info, warn};
use zeroize::Zeroize;

use super::{DkgEvent, Participant, Phase};

/// Everything the local validator knows about one ceremony round
///
/// Owned by exactly one [`CeremonyActor`](crate::actor::CeremonyActor);
/// tasks borrow it mutably for the length of a lifecycle call. Secret
/// material is wiped on drop.
#[derive(Clone, Serialize, Deserialize)]
pub struct DkgState {
    /// Local validator address
    pub account: Address,

    /// Base-1 registration index, zero until registered
    pub index: u64,

    /// Validator pool at registration time
    pub validator_addresses: Vec<Address>,

    pub number_of_validators: usize,

    /// Round counter, zero before the first round opened
    pub nonce: u64,

    pub phase: Phase,
    pub phase_start: u64,
    pub phase_length: u64,
    pub confirmation_length: u64,

    /// Ephemeral key used only to encrypt shares
    #[serde(with = "serde_ark")]
    pub transport_private_key: Option<Fr>,

    #[serde(with = "serde_ark")]
    pub transport_public_key: Option<G1Affine>,

    /// First private coefficient
    #[serde(with = "serde_ark")]
    pub secret_value: Option<Fr>,

    #[serde(with = "serde_ark")]
    pub private_coefficients: Vec<Fr>,

    pub validator_threshold: usize,

    #[serde(with = "serde_ark")]
    pub master_public_key: Option<G2Affine>,

    /// Local share of the group secret, `gsk_j`
    #[serde(with = "serde_ark")]
    pub group_private_key: Option<Fr>,

    #[serde(with = "serde_ark")]
    pub group_public_key: Option<G2Affine>,

    #[serde(with = "serde_ark")]
    pub group_signature: Option<G1Affine>,

    /// Registered participants, including ourselves
    pub participants: BTreeMap<Address, Participant>,

    /// Issuers whose share to us failed verification
    pub bad_shares: BTreeSet<Address>,

    pub honest_validators: Vec<Address>,
    pub dishonest_validators: Vec<Address>,
    pub missing_validators: Vec<Address>,

    /// `1/m mod r` for `m` in `1..n`
    #[serde(with = "serde_ark")]
    pub inverse: Vec<Fr>,

    /// The validator set was completed on-chain
    pub complete: bool,
}

impl DkgState {
    /// Empty state for `account`, waiting for a round to open
    pub fn new(account: Address) -> Self {
        Self {
            account,
            index: 0,
            validator_addresses: Vec::new(),
            number_of_validators: 0,
            nonce: 0,
            phase: Phase::RegistrationOpen,
            phase_start: 0,
            phase_length: 0,
            confirmation_length: 0,
            transport_private_key: None,
            transport_public_key: None,
            secret_value: None,
            private_coefficients: Vec::new(),
            validator_threshold: 0,
            master_public_key: None,
            group_private_key: None,
            group_public_key: None,
            group_signature: None,
            participants: BTreeMap::new(),
            bad_shares: BTreeSet::new(),
            honest_validators: Vec::new(),
            dishonest_validators: Vec::new(),
            missing_validators: Vec::new(),
            inverse: Vec::new(),
            complete: false,
        }
    }

    /// Participants ordered by index
    pub fn sorted_participants(&self) -> Vec<&Participant> {
        let mut list: Vec<&Participant> = self.participants.values().collect();
        list.sort_by_key(|p| p.index);
        list
    }

    pub fn participant(&self, address: &Address) -> Option<&Participant> {
        self.participants.get(address)
    }

    /// Our own participant entry
    pub fn me(&self) -> Option<&Participant> {
        self.participants.get(&self.account)
    }

    pub fn me_mut(&mut self) -> Option<&mut Participant> {
        self.participants.get_mut(&self.account)
    }

    /// End of the window that opened at `phase_start`, `offset` windows later
    pub fn window_end(&self, offset: u64) -> u64 {
        self.phase_start + (offset + 1) * self.phase_length
    }

    /// Fold a chain event into the state
    ///
    /// Returns `false` when the event was ignored: it belongs to another
    /// round or refers to an unknown participant.
    pub fn apply(&mut self, event: &DkgEvent) -> bool {
        let fresh_round = event.is_registration_opened() && self.nonce == 0;
        if event.nonce() != self.nonce && !fresh_round {
            debug!(
                event = event.name(),
                nonce = event.nonce(),
                current = self.nonce,
                "Ignoring event for another round"
            );
            return false;
        }

        match event {
            DkgEvent::RegistrationOpened {
                start_block,
                number_validators,
                nonce,
                phase_length,
                confirmation_length,
            } => {
                self.nonce = *nonce;
                self.phase = Phase::RegistrationOpen;
                self.phase_start = *start_block;
                self.phase_length = *phase_length;
                self.confirmation_length = *confirmation_length;
                self.number_of_validators = *number_validators;
                self.validator_threshold = threshold_for_user_count(*number_validators);
                info!(nonce, start_block, number_validators, "Registration opened");
            }
            DkgEvent::AddressRegistered {
                account,
                index,
                nonce,
                public_key,
            } => {
                self.participants.insert(
                    *account,
                    Participant::registered(*account, *index, *nonce, *public_key),
                );
                if *account == self.account {
                    self.index = *index;
                }
            }
            DkgEvent::RegistrationComplete { block, .. } => {
                self.enter_phase(Phase::ShareDistribution, block + self.confirmation_length);
            }
            DkgEvent::SharesDistributed {
                account,
                encrypted_shares,
                commitments,
                ..
            } => {
                let Some(participant) = self.participants.get_mut(account) else {
                    warn!(%account, "Shares distributed by unknown participant");
                    return false;
                };
                let hash = compute_distributed_shares_hash(encrypted_shares, commitments);
                participant.phase = Phase::ShareDistribution;
                participant.distributed_shares_hash = hash.distributed;
                participant.commitments = commitments.clone();
                participant.encrypted_shares = encrypted_shares.clone();
            }
            DkgEvent::ShareDistributionComplete { block, .. } => {
                self.enter_phase(Phase::DisputeShareDistribution, block + self.confirmation_length);
            }
            DkgEvent::KeyShareSubmitted {
                account,
                key_share_g1,
                key_share_g1_proof,
                key_share_g2,
                ..
            } => {
                let Some(participant) = self.participants.get_mut(account) else {
                    warn!(%account, "Key share from unknown participant");
                    return false;
                };
                participant.phase = Phase::KeyShareSubmission;
                participant.key_share_g1 = Some(*key_share_g1);
                participant.key_share_g1_proof = Some(*key_share_g1_proof);
                participant.key_share_g2 = Some(*key_share_g2);
                self.phase = self.phase.max(Phase::KeyShareSubmission);
            }
            DkgEvent::KeyShareSubmissionComplete { block, .. } => {
                self.enter_phase(Phase::MPKSubmission, block + self.confirmation_length);
            }
            DkgEvent::MPKSet {
                block,
                master_public_key,
                ..
            } => {
                self.master_public_key = Some(*master_public_key);
                self.enter_phase(Phase::GPKJSubmission, *block);
            }
            DkgEvent::GPKJSubmitted {
                account,
                gpkj,
                signature,
                ..
            } => {
                let Some(participant) = self.participants.get_mut(account) else {
                    warn!(%account, "gpkj from unknown participant");
                    return false;
                };
                participant.phase = Phase::GPKJSubmission;
                participant.gpkj = Some(*gpkj);
                participant.gpkj_signature = Some(*signature);
            }
            DkgEvent::GPKJSubmissionComplete { block, .. } => {
                self.enter_phase(Phase::DisputeGPKJSubmission, block + self.confirmation_length);
            }
            DkgEvent::ValidatorMemberAdded { account, share, .. } => {
                if *account == self.account && self.group_public_key != Some(*share) {
                    warn!("Validator set holds a different gpkj than ours");
                }
                if let Some(participant) = self.participants.get_mut(account) {
                    participant.gpkj = Some(*share);
                }
            }
            DkgEvent::ValidatorSetCompleted {
                master_public_key,
                validator_count,
                ..
            } => {
                self.master_public_key = Some(*master_public_key);
                self.phase = Phase::Completion;
                self.complete = true;
                info!(nonce = self.nonce, validator_count, "Validator set completed");
            }
        }
        true
    }

    fn enter_phase(&mut self, phase: Phase, start: u64) {
        if phase < self.phase {
            warn!(%phase, current = %self.phase, "Refusing to move phase backwards");
            return;
        }
        debug!(%phase, start, "Entering phase");
        self.phase = phase;
        self.phase_start = start;
    }
}

impl Drop for DkgState {
    fn drop(&mut self) {
        self.transport_private_key.zeroize();
        self.secret_value.zeroize();
        self.private_coefficients.zeroize();
        self.group_private_key.zeroize();
    }
}

impl fmt::Debug for DkgState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DkgState")
            .field("account", &self.account)
            .field("index", &self.index)
            .field("nonce", &self.nonce)
            .field("phase", &self.phase)
            .field("phase_start", &self.phase_start)
            .field("participants", &self.participants.len())
            .field("bad_shares", &self.bad_shares)
            .field("complete", &self.complete)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethdkg_crypto::g1_mul;

    fn opened(nonce: u64) -> DkgEvent {
        DkgEvent::RegistrationOpened {
            start_block: 100,
            number_validators: 4,
            nonce,
            phase_length: 10,
            confirmation_length: 2,
        }
    }

    fn registered(byte: u8, index: u64, nonce: u64) -> DkgEvent {
        DkgEvent::AddressRegistered {
            account: Address::with_last_byte(byte),
            index,
            nonce,
            public_key: g1_mul(&Fr::from(index)),
        }
    }

    #[test]
    fn test_registration_flow() {
        let mut state = DkgState::new(Address::with_last_byte(2));
        assert!(state.apply(&opened(1)));
        assert_eq!(state.validator_threshold, 2);

        for (byte, index) in [(3, 1), (2, 2), (1, 3)] {
            assert!(state.apply(&registered(byte, index, 1)));
        }
        assert_eq!(state.index, 2);

        let indices: Vec<u64> = state.sorted_participants().iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);

        assert!(state.apply(&DkgEvent::RegistrationComplete { block: 105, nonce: 1 }));
        assert_eq!(state.phase, Phase::ShareDistribution);
        assert_eq!(state.phase_start, 107);
    }

    #[test]
    fn test_other_round_ignored() {
        let mut state = DkgState::new(Address::with_last_byte(1));
        state.apply(&opened(3));
        assert!(!state.apply(&registered(1, 1, 2)));
        assert!(!state.apply(&opened(4)));
        assert!(state.participants.is_empty());
        assert_eq!(state.nonce, 3);
    }

    #[test]
    fn test_mpk_set_starts_immediately() {
        let mut state = DkgState::new(Address::with_last_byte(1));
        state.apply(&opened(1));
        state.phase = Phase::MPKSubmission;
        let mpk = ethdkg_crypto::g2_mul(&Fr::from(9u64));
        state.apply(&DkgEvent::MPKSet {
            block: 140,
            nonce: 1,
            master_public_key: mpk,
        });
        assert_eq!(state.phase, Phase::GPKJSubmission);
        assert_eq!(state.phase_start, 140);
        assert_eq!(state.master_public_key, Some(mpk));
    }

    #[test]
    fn test_phase_never_moves_back() {
        let mut state = DkgState::new(Address::with_last_byte(1));
        state.apply(&opened(1));
        state.apply(&DkgEvent::ShareDistributionComplete { block: 120, nonce: 1 });
        state.apply(&DkgEvent::RegistrationComplete { block: 130, nonce: 1 });
        assert_eq!(state.phase, Phase::DisputeShareDistribution);
        assert_eq!(state.phase_start, 122);
    }

    #[test]
    fn test_json_roundtrip() {
        let mut state = DkgState::new(Address::with_last_byte(7));
        state.apply(&opened(1));
        state.apply(&registered(7, 1, 1));
        state.transport_private_key = Some(Fr::from(5u64));
        state.private_coefficients = vec![Fr::from(1u64), Fr::from(2u64)];

        let json = serde_json::to_string(&state).unwrap();
        let restored: DkgState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.transport_private_key, state.transport_private_key);
        assert_eq!(restored.private_coefficients, state.private_coefficients);
        assert_eq!(restored.participants, state.participants);
    }
}
