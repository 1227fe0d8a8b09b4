//! In-process model of the ETHDKG and validator pool contracts
//!
//! Phase windows are gated by an explicit block height, every submission is
//! checked the way the contract checks it, and accusations are verified
//! cryptographically before the accused is removed from the pool. A call
//! that would revert is rejected at submission, as gas estimation would.

use alloy_primitives::{Address, B256, U256};
use ark_bn254::{G1Affine, G2Affine};
use ark_ec::{AffineRepr, CurveGroup};
use async_trait::async_trait;
use ethdkg_crypto::{
    decrypt_with_shared_secret, dleq_verify, g1_to_bytes, g2_to_bytes, keccak256,
    keccak256_concat, pairing_check, u256_to_fr, u64_to_word, verify, DleqProof,
};
use ethdkg_math::{
    compute_distributed_shares_hash, encrypted_share_position, h1_base,
    share_matches_commitments, threshold_for_user_count, verify_gpkj_against_commitments,
    verify_key_share, KeyShare, INITIAL_MESSAGE,
};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    ChainError, DkgCall, EthDkgChain, ParticipantState, Receipt, ReceiptStatus, Result, TxHandle,
};
use crate::state::{DkgEvent, Phase};

type Revert = std::result::Result<Vec<DkgEvent>, String>;

fn require(condition: bool, reason: &str) -> std::result::Result<(), String> {
    if condition {
        Ok(())
    } else {
        Err(reason.to_string())
    }
}

/// Shared, in-memory ETHDKG contract
pub struct InMemoryEthDkg {
    inner: Mutex<Contract>,
}

struct Contract {
    height: u64,
    phase_length: u64,
    confirmation_length: u64,
    nonce: u64,
    phase: Phase,
    phase_start: u64,
    validators: Vec<Address>,
    number_of_validators: usize,
    participants: BTreeMap<Address, ParticipantState>,
    phase_submissions: usize,
    bad_participants: u64,
    master_public_key: Option<G2Affine>,
    master_public_key_hash: B256,
    events: Vec<DkgEvent>,
    receipts: HashMap<TxHandle, Receipt>,
    tx_count: u64,
    failing_receipts: usize,
}

impl InMemoryEthDkg {
    /// Contract with `validators` in the pool and no round open yet
    pub fn new(validators: Vec<Address>, phase_length: u64, confirmation_length: u64) -> Self {
        Self {
            inner: Mutex::new(Contract {
                height: 1,
                phase_length,
                confirmation_length,
                nonce: 0,
                phase: Phase::Completion,
                phase_start: 0,
                validators,
                number_of_validators: 0,
                participants: BTreeMap::new(),
                phase_submissions: 0,
                bad_participants: 0,
                master_public_key: None,
                master_public_key_hash: B256::ZERO,
                events: Vec::new(),
                receipts: HashMap::new(),
                tx_count: 0,
                failing_receipts: 0,
            }),
        }
    }

    /// Open a new round with the current pool, as `initializeETHDKG` does
    pub async fn initialize_round(&self) -> DkgEvent {
        let mut contract = self.inner.lock().await;
        contract.nonce += 1;
        contract.phase = Phase::RegistrationOpen;
        contract.phase_start = contract.height;
        contract.number_of_validators = contract.validators.len();
        contract.participants.clear();
        contract.phase_submissions = 0;
        contract.bad_participants = 0;
        contract.master_public_key = None;
        contract.master_public_key_hash = B256::ZERO;

        let event = DkgEvent::RegistrationOpened {
            start_block: contract.height,
            number_validators: contract.number_of_validators,
            nonce: contract.nonce,
            phase_length: contract.phase_length,
            confirmation_length: contract.confirmation_length,
        };
        contract.events.push(event.clone());
        info!(nonce = contract.nonce, validators = contract.number_of_validators, "ETHDKG initialized");
        event
    }

    /// Mine `blocks` empty blocks
    pub async fn advance_blocks(&self, blocks: u64) -> u64 {
        let mut contract = self.inner.lock().await;
        contract.height += blocks;
        contract.height
    }

    /// Every event emitted after the first `cursor` ones
    pub async fn events_since(&self, cursor: usize) -> Vec<DkgEvent> {
        let contract = self.inner.lock().await;
        contract.events.iter().skip(cursor).cloned().collect()
    }

    /// Mine the next `count` submissions with a failed status and no effect
    pub async fn fail_next_receipts(&self, count: usize) {
        self.inner.lock().await.failing_receipts = count;
    }

    pub async fn master_public_key(&self) -> Option<G2Affine> {
        self.inner.lock().await.master_public_key
    }

    pub async fn nonce(&self) -> u64 {
        self.inner.lock().await.nonce
    }
}

impl Contract {
    fn window_open(&self, phase: Phase, offset: u64) -> bool {
        let start = self.phase_start + offset * self.phase_length;
        self.phase == phase && self.height >= start && self.height < start + self.phase_length
    }

    fn threshold(&self) -> usize {
        threshold_for_user_count(self.number_of_validators)
    }

    fn is_validator(&self, account: &Address) -> bool {
        self.validators.contains(account)
    }

    fn current(&self, account: &Address) -> Option<&ParticipantState> {
        self.participants
            .get(account)
            .filter(|p| p.nonce == self.nonce)
    }

    fn slash(&mut self, account: &Address) {
        self.validators.retain(|v| v != account);
        self.bad_participants += 1;
        warn!(%account, "Participant penalized and removed from the pool");
    }

    /// Move to `phase` once every participant acted in the current one
    fn count_submission(&mut self, next: Phase, confirm: bool) -> bool {
        self.phase_submissions += 1;
        if self.phase_submissions < self.number_of_validators {
            return false;
        }
        self.phase_submissions = 0;
        self.phase = next;
        self.phase_start = self.height + if confirm { self.confirmation_length } else { 0 };
        true
    }

    fn execute(&mut self, from: Address, call: DkgCall) -> Revert {
        match call {
            DkgCall::Register { public_key } => self.register(from, public_key),
            DkgCall::AccuseNotRegistered { accused } => self.accuse_not_registered(&accused),
            DkgCall::DistributeShares {
                encrypted_shares,
                commitments,
            } => self.distribute_shares(from, encrypted_shares, commitments),
            DkgCall::AccuseDidNotDistributeShares { accused } => {
                self.accuse_did_not_distribute_shares(&accused)
            }
            DkgCall::AccuseDistributedBadShares {
                accused,
                encrypted_shares,
                commitments,
                shared_key,
                shared_key_proof,
            } => self.accuse_distributed_bad_shares(
                from,
                accused,
                &encrypted_shares,
                &commitments,
                &shared_key,
                &shared_key_proof,
            ),
            DkgCall::SubmitKeyShare {
                key_share_g1,
                key_share_g1_proof,
                key_share_g2,
            } => self.submit_key_share(
                from,
                KeyShare {
                    g1: key_share_g1,
                    g1_proof: key_share_g1_proof,
                    g2: key_share_g2,
                },
            ),
            DkgCall::AccuseDidNotSubmitKeyShares { accused } => {
                self.accuse_did_not_submit_key_shares(&accused)
            }
            DkgCall::SubmitMasterPublicKey { master_public_key } => {
                self.submit_master_public_key(master_public_key)
            }
            DkgCall::SubmitGpkj { gpkj, signature } => self.submit_gpkj(from, gpkj, signature),
            DkgCall::AccuseDidNotSubmitGpkj { accused } => self.accuse_did_not_submit_gpkj(&accused),
            DkgCall::AccuseSubmittedBadGpkj {
                validators,
                encrypted_shares_hashes,
                commitments,
                accused,
            } => self.accuse_submitted_bad_gpkj(
                &validators,
                &encrypted_shares_hashes,
                &commitments,
                accused,
            ),
            DkgCall::Complete => self.complete(),
        }
    }

    fn register(&mut self, from: Address, public_key: G1Affine) -> Revert {
        require(self.window_open(Phase::RegistrationOpen, 0), "registration is not open")?;
        require(self.is_validator(&from), "only validators can register")?;
        require(
            !public_key.is_zero() && public_key.is_on_curve(),
            "public key is not a valid curve point",
        )?;
        require(self.current(&from).is_none(), "participant is already registered")?;

        let index = self.phase_submissions as u64 + 1;
        self.participants.insert(
            from,
            ParticipantState {
                index,
                nonce: self.nonce,
                phase: Some(Phase::RegistrationOpen),
                public_key: Some(public_key),
                ..ParticipantState::default()
            },
        );

        let mut events = vec![DkgEvent::AddressRegistered {
            account: from,
            index,
            nonce: self.nonce,
            public_key,
        }];
        if self.count_submission(Phase::ShareDistribution, true) {
            events.push(DkgEvent::RegistrationComplete {
                block: self.height,
                nonce: self.nonce,
            });
        }
        Ok(events)
    }

    fn accuse_not_registered(&mut self, accused: &[Address]) -> Revert {
        require(
            self.window_open(Phase::RegistrationOpen, 1),
            "accusation window for missing registrations is not open",
        )?;
        for account in accused {
            require(self.is_validator(account), "accused participant is not a validator")?;
            require(self.current(account).is_none(), "accused participant is registered")?;
        }
        for account in accused {
            self.slash(account);
        }
        Ok(Vec::new())
    }

    fn distribute_shares(
        &mut self,
        from: Address,
        encrypted_shares: Vec<U256>,
        commitments: Vec<G1Affine>,
    ) -> Revert {
        require(
            self.window_open(Phase::ShareDistribution, 0),
            "share distribution is not open",
        )?;
        let participant = self.current(&from).ok_or("participant is not registered")?;
        require(
            participant.phase == Some(Phase::RegistrationOpen),
            "participant already distributed shares",
        )?;
        require(
            encrypted_shares.len() == self.number_of_validators - 1,
            "invalid number of encrypted shares",
        )?;
        require(
            commitments.len() == self.threshold() + 1,
            "invalid number of commitments",
        )?;
        require(
            commitments.iter().all(|c| !c.is_zero() && c.is_on_curve()),
            "commitment is not a valid curve point",
        )?;

        let hash = compute_distributed_shares_hash(&encrypted_shares, &commitments);
        let nonce = self.nonce;
        let index = participant.index;
        if let Some(participant) = self.participants.get_mut(&from) {
            participant.phase = Some(Phase::ShareDistribution);
            participant.distributed_shares_hash = hash.distributed;
            participant.commitments_first_coefficient = Some(commitments[0]);
        }

        let mut events = vec![DkgEvent::SharesDistributed {
            account: from,
            index,
            nonce,
            encrypted_shares,
            commitments,
        }];
        if self.count_submission(Phase::DisputeShareDistribution, true) {
            events.push(DkgEvent::ShareDistributionComplete {
                block: self.height,
                nonce,
            });
        }
        Ok(events)
    }

    fn accuse_did_not_distribute_shares(&mut self, accused: &[Address]) -> Revert {
        require(
            self.window_open(Phase::ShareDistribution, 1),
            "accusation window for missing shares is not open",
        )?;
        for account in accused {
            require(self.is_validator(account), "accused participant is not a validator")?;
            let participant = self
                .current(account)
                .ok_or("accused participant is not registered")?;
            require(
                participant.phase != Some(Phase::ShareDistribution)
                    || participant.distributed_shares_hash == B256::ZERO,
                "accused participant distributed shares",
            )?;
        }
        for account in accused {
            self.slash(account);
        }
        Ok(Vec::new())
    }

    fn accuse_distributed_bad_shares(
        &mut self,
        from: Address,
        accused: Address,
        encrypted_shares: &[U256],
        commitments: &[G1Affine],
        shared_key: &G1Affine,
        shared_key_proof: &DleqProof,
    ) -> Revert {
        require(
            self.window_open(Phase::DisputeShareDistribution, 0),
            "share dispute is not open",
        )?;
        require(self.is_validator(&accused), "accused participant is not a validator")?;
        let issuer = self
            .current(&accused)
            .ok_or("accused participant is not registered")?;
        let disputer = self.current(&from).ok_or("disputer is not registered")?;
        require(
            issuer.distributed_shares_hash
                == compute_distributed_shares_hash(encrypted_shares, commitments).distributed,
            "submitted shares and commitments do not match the distributed hash",
        )?;

        let (Some(issuer_key), Some(disputer_key)) = (issuer.public_key, disputer.public_key) else {
            return Err("missing transport key".to_string());
        };
        require(
            dleq_verify(
                &G1Affine::generator(),
                &disputer_key,
                &issuer_key,
                shared_key,
                shared_key_proof,
            )
            .is_ok(),
            "invalid shared key proof",
        )?;

        let position = encrypted_share_position(issuer.index, disputer.index);
        let encrypted = encrypted_shares
            .get(position)
            .ok_or("no share for the disputer")?;
        let share = u256_to_fr(&decrypt_with_shared_secret(encrypted, shared_key, disputer.index));
        require(
            !share_matches_commitments(&share, disputer.index, commitments),
            "the disputed share is valid",
        )?;

        self.slash(&accused);
        Ok(Vec::new())
    }

    fn key_share_window_open(&self, offset: u64) -> bool {
        self.window_open(Phase::KeyShareSubmission, offset)
            || self.window_open(Phase::DisputeShareDistribution, offset + 1)
    }

    fn submit_key_share(&mut self, from: Address, share: KeyShare) -> Revert {
        require(self.key_share_window_open(0), "key share submission is not open")?;
        let participant = self.current(&from).ok_or("participant is not registered")?;
        require(
            participant.phase == Some(Phase::ShareDistribution),
            "participant cannot submit a key share now",
        )?;
        let first_commitment = participant
            .commitments_first_coefficient
            .ok_or("participant has no commitments")?;
        require(
            verify_key_share(&share, &first_commitment).unwrap_or(false),
            "invalid key share",
        )?;

        let index = participant.index;
        if let Some(participant) = self.participants.get_mut(&from) {
            participant.phase = Some(Phase::KeyShareSubmission);
            participant.key_share_g1 = Some(share.g1);
            participant.key_share_g1_proof = Some(share.g1_proof);
            participant.key_share_g2 = Some(share.g2);
        }
        if self.phase == Phase::DisputeShareDistribution {
            // The key share window follows the dispute window
            self.phase = Phase::KeyShareSubmission;
            self.phase_start += self.phase_length;
        }

        let mut events = vec![DkgEvent::KeyShareSubmitted {
            account: from,
            index,
            nonce: self.nonce,
            key_share_g1: share.g1,
            key_share_g1_proof: share.g1_proof,
            key_share_g2: share.g2,
        }];
        if self.count_submission(Phase::MPKSubmission, true) {
            events.push(DkgEvent::KeyShareSubmissionComplete {
                block: self.height,
                nonce: self.nonce,
            });
        }
        Ok(events)
    }

    fn accuse_did_not_submit_key_shares(&mut self, accused: &[Address]) -> Revert {
        require(
            self.key_share_window_open(1),
            "accusation window for missing key shares is not open",
        )?;
        for account in accused {
            require(self.is_validator(account), "accused participant is not a validator")?;
            let participant = self
                .current(account)
                .ok_or("accused participant is not registered")?;
            require(
                participant.phase != Some(Phase::KeyShareSubmission),
                "accused participant submitted a key share",
            )?;
        }
        for account in accused {
            self.slash(account);
        }
        Ok(Vec::new())
    }

    fn submit_master_public_key(&mut self, master_public_key: G2Affine) -> Revert {
        require(
            self.window_open(Phase::MPKSubmission, 0),
            "master public key submission is not open",
        )?;
        let mpk_g1 = self
            .participants
            .values()
            .filter(|p| p.nonce == self.nonce)
            .filter_map(|p| p.key_share_g1)
            .fold(G1Affine::zero().into_group(), |acc, share| acc + share)
            .into_affine();
        let h1 = h1_base().map_err(|e| e.to_string())?;
        require(
            pairing_check(&[mpk_g1, h1], &[-G2Affine::generator(), master_public_key])
                .unwrap_or(false),
            "master public key does not match the key shares",
        )?;

        self.master_public_key = Some(master_public_key);
        self.master_public_key_hash = B256::from(keccak256(g2_to_bytes(&master_public_key)));
        self.phase = Phase::GPKJSubmission;
        self.phase_start = self.height;
        self.phase_submissions = 0;
        Ok(vec![DkgEvent::MPKSet {
            block: self.height,
            nonce: self.nonce,
            master_public_key,
        }])
    }

    fn submit_gpkj(&mut self, from: Address, gpkj: G2Affine, signature: G1Affine) -> Revert {
        require(self.window_open(Phase::GPKJSubmission, 0), "gpkj submission is not open")?;
        let participant = self.current(&from).ok_or("participant is not registered")?;
        require(
            participant.phase == Some(Phase::KeyShareSubmission),
            "participant cannot submit a gpkj now",
        )?;
        require(!gpkj.is_zero(), "gpkj is zero")?;
        require(
            verify(INITIAL_MESSAGE, &signature, &gpkj).unwrap_or(false),
            "signature does not verify under gpkj",
        )?;

        let index = participant.index;
        if let Some(participant) = self.participants.get_mut(&from) {
            participant.phase = Some(Phase::GPKJSubmission);
            participant.gpkj = Some(gpkj);
        }
        let mut events = vec![DkgEvent::GPKJSubmitted {
            account: from,
            index,
            nonce: self.nonce,
            gpkj,
            signature,
        }];
        if self.count_submission(Phase::DisputeGPKJSubmission, true) {
            events.push(DkgEvent::GPKJSubmissionComplete {
                block: self.height,
                nonce: self.nonce,
            });
        }
        Ok(events)
    }

    fn accuse_did_not_submit_gpkj(&mut self, accused: &[Address]) -> Revert {
        require(
            self.window_open(Phase::GPKJSubmission, 1),
            "accusation window for missing gpkj is not open",
        )?;
        for account in accused {
            require(self.is_validator(account), "accused participant is not a validator")?;
            let participant = self
                .current(account)
                .ok_or("accused participant is not registered")?;
            require(
                participant.phase != Some(Phase::GPKJSubmission) || participant.gpkj.is_none(),
                "accused participant submitted a gpkj",
            )?;
        }
        for account in accused {
            self.slash(account);
        }
        Ok(Vec::new())
    }

    fn accuse_submitted_bad_gpkj(
        &mut self,
        validators: &[Address],
        encrypted_shares_hashes: &[B256],
        commitments: &[Vec<G1Affine>],
        accused: Address,
    ) -> Revert {
        require(
            self.window_open(Phase::DisputeGPKJSubmission, 0),
            "gpkj dispute is not open",
        )?;
        require(self.is_validator(&accused), "accused participant is not a validator")?;
        require(
            validators.len() == self.number_of_validators
                && encrypted_shares_hashes.len() == validators.len()
                && commitments.len() == validators.len(),
            "every participant must be included",
        )?;

        let mut seen = Vec::with_capacity(validators.len());
        for ((account, shares_hash), participant_commitments) in validators
            .iter()
            .zip(encrypted_shares_hashes)
            .zip(commitments)
        {
            require(!seen.contains(account), "duplicate participant")?;
            seen.push(*account);
            let participant = self
                .current(account)
                .ok_or("participant is not registered")?;
            let commitment_bytes: Vec<u8> =
                participant_commitments.iter().flat_map(g1_to_bytes).collect();
            let commitments_hash = keccak256(&commitment_bytes);
            let distributed = keccak256_concat([shares_hash.as_slice(), &commitments_hash[..]]);
            require(
                participant.distributed_shares_hash == B256::from(distributed),
                "shares hash and commitments do not match",
            )?;
        }

        let dishonest = self
            .current(&accused)
            .ok_or("accused participant is not registered")?;
        let gpkj = dishonest.gpkj.ok_or("accused participant has no gpkj")?;
        let all_commitments: Vec<&[G1Affine]> = commitments.iter().map(Vec::as_slice).collect();
        require(
            !verify_gpkj_against_commitments(dishonest.index, &gpkj, &all_commitments)
                .unwrap_or(true),
            "the accused gpkj is valid",
        )?;

        self.slash(&accused);
        Ok(Vec::new())
    }

    fn complete(&mut self) -> Revert {
        require(
            self.window_open(Phase::DisputeGPKJSubmission, 1),
            "completion is not open",
        )?;
        require(self.bad_participants == 0, "the round has bad participants")?;
        let master_public_key = self
            .master_public_key
            .ok_or("master public key is not set")?;

        self.phase = Phase::Completion;
        let nonce = self.nonce;
        let mut members: Vec<(&Address, &ParticipantState)> = self
            .participants
            .iter()
            .filter(|(_, p)| p.nonce == nonce)
            .collect();
        members.sort_by_key(|(_, p)| p.index);

        let mut events: Vec<DkgEvent> = members
            .iter()
            .filter_map(|(account, p)| {
                p.gpkj.map(|share| DkgEvent::ValidatorMemberAdded {
                    account: **account,
                    index: p.index,
                    nonce,
                    share,
                })
            })
            .collect();
        events.push(DkgEvent::ValidatorSetCompleted {
            block: self.height,
            nonce,
            validator_count: members.len(),
            master_public_key,
        });
        Ok(events)
    }

    fn next_tx(&mut self) -> TxHandle {
        self.tx_count += 1;
        TxHandle(B256::from(keccak256(u64_to_word(self.tx_count))))
    }
}

#[async_trait]
impl EthDkgChain for InMemoryEthDkg {
    async fn current_height(&self) -> Result<u64> {
        Ok(self.inner.lock().await.height)
    }

    async fn block_hash(&self, height: u64) -> Result<B256> {
        let contract = self.inner.lock().await;
        if height > contract.height {
            return Err(ChainError::Rpc(format!("block {} is in the future", height)));
        }
        Ok(B256::from(keccak256_concat([
            b"block".as_slice(),
            &u64_to_word(height)[..],
        ])))
    }

    async fn submit(&self, from: Address, call: DkgCall) -> Result<TxHandle> {
        let mut contract = self.inner.lock().await;
        let name = call.name();
        let tx = contract.next_tx();
        let block = contract.height;

        if contract.failing_receipts > 0 {
            contract.failing_receipts -= 1;
            debug!(%from, call = name, "Mining failed transaction");
            contract.receipts.insert(
                tx,
                Receipt {
                    status: ReceiptStatus::Failed("execution failed".to_string()),
                    block,
                    logs: Vec::new(),
                },
            );
            return Ok(tx);
        }

        let logs = contract.execute(from, call).map_err(|reason| {
            debug!(%from, call = name, %reason, "Call reverted");
            ChainError::Reverted(reason)
        })?;
        debug!(%from, call = name, events = logs.len(), "Transaction mined");
        contract.events.extend(logs.iter().cloned());
        contract.receipts.insert(
            tx,
            Receipt {
                status: ReceiptStatus::Success,
                block,
                logs,
            },
        );
        Ok(tx)
    }

    async fn await_receipt(&self, tx: TxHandle, cancel: &CancellationToken) -> Result<Receipt> {
        if cancel.is_cancelled() {
            return Err(ChainError::Cancelled);
        }
        let contract = self.inner.lock().await;
        contract
            .receipts
            .get(&tx)
            .cloned()
            .ok_or(ChainError::UnknownTx(tx.0))
    }

    async fn phase(&self) -> Result<Phase> {
        Ok(self.inner.lock().await.phase)
    }

    async fn bad_participants(&self) -> Result<u64> {
        Ok(self.inner.lock().await.bad_participants)
    }

    async fn participant_state(&self, account: Address) -> Result<ParticipantState> {
        let contract = self.inner.lock().await;
        Ok(contract.participants.get(&account).cloned().unwrap_or_default())
    }

    async fn is_master_public_key_set(&self) -> Result<bool> {
        Ok(self.inner.lock().await.master_public_key.is_some())
    }

    async fn master_public_key_hash(&self) -> Result<B256> {
        Ok(self.inner.lock().await.master_public_key_hash)
    }

    async fn validator_addresses(&self) -> Result<Vec<Address>> {
        Ok(self.inner.lock().await.validators.clone())
    }

    async fn is_validator(&self, account: Address) -> Result<bool> {
        Ok(self.inner.lock().await.is_validator(&account))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::Fr;
    use ethdkg_crypto::g1_mul;

    fn validators(n: u8) -> Vec<Address> {
        (1..=n).map(Address::with_last_byte).collect()
    }

    async fn register_all(chain: &InMemoryEthDkg, accounts: &[Address]) {
        for (i, account) in accounts.iter().enumerate() {
            let public_key = g1_mul(&Fr::from(i as u64 + 10));
            chain
                .submit(*account, DkgCall::Register { public_key })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_registration_completes_phase() {
        let accounts = validators(4);
        let chain = InMemoryEthDkg::new(accounts.clone(), 10, 2);
        chain.initialize_round().await;
        register_all(&chain, &accounts).await;

        assert_eq!(chain.phase().await.unwrap(), Phase::ShareDistribution);
        let events = chain.events_since(0).await;
        assert_eq!(events.len(), 6);
        assert!(matches!(events[5], DkgEvent::RegistrationComplete { block: 1, nonce: 1 }));

        let state = chain.participant_state(accounts[2]).await.unwrap();
        assert_eq!(state.index, 3);
        assert_eq!(state.nonce, 1);
    }

    #[tokio::test]
    async fn test_registration_window_closes() {
        let accounts = validators(4);
        let chain = InMemoryEthDkg::new(accounts.clone(), 10, 2);
        chain.initialize_round().await;
        chain.advance_blocks(10).await;

        let result = chain
            .submit(accounts[0], DkgCall::Register { public_key: g1_mul(&Fr::from(3u64)) })
            .await;
        assert!(matches!(result, Err(ChainError::Reverted(_))));
    }

    #[tokio::test]
    async fn test_missing_registration_accusation() {
        let accounts = validators(5);
        let chain = InMemoryEthDkg::new(accounts.clone(), 10, 2);
        chain.initialize_round().await;
        register_all(&chain, &accounts[..4]).await;

        let accuse = DkgCall::AccuseNotRegistered { accused: vec![accounts[4]] };
        let early = chain.submit(accounts[0], accuse.clone()).await;
        assert!(matches!(early, Err(ChainError::Reverted(_))));

        chain.advance_blocks(10).await;
        chain.submit(accounts[0], accuse.clone()).await.unwrap();
        assert_eq!(chain.bad_participants().await.unwrap(), 1);
        assert!(!chain.is_validator(accounts[4]).await.unwrap());

        // Second accuser loses the race
        let duplicate = chain.submit(accounts[1], accuse).await;
        assert!(matches!(duplicate, Err(ChainError::Reverted(_))));
        assert_eq!(chain.bad_participants().await.unwrap(), 1);

        let registered = DkgCall::AccuseNotRegistered { accused: vec![accounts[1]] };
        assert!(chain.submit(accounts[0], registered).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_receipt_has_no_effect() {
        let accounts = validators(4);
        let chain = InMemoryEthDkg::new(accounts.clone(), 10, 2);
        chain.initialize_round().await;
        chain.fail_next_receipts(1).await;

        let tx = chain
            .submit(accounts[0], DkgCall::Register { public_key: g1_mul(&Fr::from(3u64)) })
            .await
            .unwrap();
        let receipt = chain.await_receipt(tx, &CancellationToken::new()).await.unwrap();
        assert!(matches!(receipt.status, ReceiptStatus::Failed(_)));
        assert_eq!(chain.participant_state(accounts[0]).await.unwrap().nonce, 0);
    }

    #[tokio::test]
    async fn test_cancelled_wait() {
        let chain = InMemoryEthDkg::new(validators(4), 10, 2);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = chain.await_receipt(TxHandle(B256::ZERO), &cancel).await;
        assert_eq!(result, Err(ChainError::Cancelled));
    }
}
