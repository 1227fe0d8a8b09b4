//! Accusations against invalid group key shares
//!
//! Published gpkj and signatures are categorized against the master public
//! key. Each dishonest signer is accused with every participant's shares
//! hash and commitments, from which the contract recomputes the expected
//! gpkj.

use alloy_primitives::{Address, B256};
use ark_bn254::G1Affine;
use async_trait::async_trait;
use ethdkg_math::{
    categorize_group_signers, compute_distributed_shares_hash, inverse_array_for_user_count,
    CategorizeOptions, GroupSigner, INITIAL_MESSAGE,
};
use tracing::{info, warn};

use super::{is_revert, still_validators};
use crate::chain::DkgCall;
use crate::error::{Result, TaskError};
use crate::retry::general_should_retry;
use crate::state::{DkgState, Phase};
use crate::task::{
    require_phase, submit_and_wait, CeremonySnapshot, DkgTask, TaskContext, TaskKind, TaskWindow,
};

pub struct DisputeGpkjTask {
    window: TaskWindow,
    success: bool,
}

impl DisputeGpkjTask {
    pub fn new(window: TaskWindow) -> Self {
        Self {
            window,
            success: false,
        }
    }

    async fn accuse(&self, ctx: &TaskContext, state: &DkgState, accused: Address) -> Result<()> {
        let participants = state.sorted_participants();
        let validators: Vec<Address> = participants.iter().map(|p| p.address).collect();
        let encrypted_shares_hashes: Vec<B256> = participants
            .iter()
            .map(|p| compute_distributed_shares_hash(&p.encrypted_shares, &p.commitments).encrypted_shares)
            .collect();
        let commitments: Vec<Vec<G1Affine>> =
            participants.iter().map(|p| p.commitments.clone()).collect();

        let call = DkgCall::AccuseSubmittedBadGpkj {
            validators,
            encrypted_shares_hashes,
            commitments,
            accused,
        };
        match submit_and_wait(ctx, state.account, call).await {
            Ok(_) => {
                warn!(%accused, "Accused participant of submitting a bad gpkj");
                Ok(())
            }
            Err(e) if is_revert(&e) => {
                if ctx.chain.is_validator(accused).await? {
                    return Err(e);
                }
                info!(%accused, "Bad gpkj submitter already penalized");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl DkgTask for DisputeGpkjTask {
    fn kind(&self) -> TaskKind {
        TaskKind::DisputeGpkj
    }

    fn window(&self) -> TaskWindow {
        self.window
    }

    async fn initialize(&mut self, ctx: &TaskContext, snapshot: CeremonySnapshot<'_>) -> Result<()> {
        let state = snapshot.current()?;
        require_phase(
            state,
            &[Phase::GPKJSubmission, Phase::DisputeGPKJSubmission],
        )?;
        let master_public_key = state
            .master_public_key
            .ok_or_else(|| TaskError::MissingData("master public key".to_string()))?;
        if state.inverse.is_empty() {
            state.inverse = inverse_array_for_user_count(state.number_of_validators)?;
        }

        let signers: Vec<GroupSigner> = state
            .sorted_participants()
            .iter()
            .map(|p| p.group_signer())
            .collect();
        let options = CategorizeOptions {
            max_subsets: ctx.config.categorize_max_subsets,
        };
        let categories = categorize_group_signers(
            INITIAL_MESSAGE,
            &master_public_key,
            &signers,
            state.validator_threshold,
            &state.inverse,
            options,
        )?;

        info!(
            honest = categories.honest.len(),
            dishonest = categories.dishonest.len(),
            missing = categories.missing.len(),
            "Categorized group signers"
        );
        state.honest_validators = categories.honest;
        state.dishonest_validators = categories.dishonest;
        state.missing_validators = categories.missing;
        Ok(())
    }

    async fn do_work(&mut self, ctx: &TaskContext, state: &mut DkgState) -> Result<()> {
        let pending = still_validators(ctx, state.dishonest_validators.iter()).await?;
        let mut last_error = None;
        for accused in pending {
            if let Err(e) = self.accuse(ctx, state, accused).await {
                warn!(%accused, error = %e, "gpkj dispute failed");
                last_error = Some(e);
            }
        }
        match last_error {
            Some(e) => Err(e),
            None => {
                self.success = true;
                Ok(())
            }
        }
    }

    async fn should_retry(&self, ctx: &TaskContext, state: &DkgState) -> bool {
        if !general_should_retry(ctx, state, &self.window).await {
            return false;
        }
        match still_validators(ctx, state.dishonest_validators.iter()).await {
            Ok(pending) => !pending.is_empty(),
            Err(_) => true,
        }
    }

    fn success(&self) -> bool {
        self.success
    }
}
