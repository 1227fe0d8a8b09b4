//! Verifiable secret sharing of the local secret

use async_trait::async_trait;
use ethdkg_math::{compute_distributed_shares_hash, generate_shares, ShareRecipient};
use rand::rngs::OsRng;
use tracing::info;

use crate::chain::DkgCall;
use crate::error::{Result, TaskError};
use crate::retry::general_should_retry;
use crate::state::{DkgState, Phase};
use crate::task::{
    require_phase, submit_and_wait, CeremonySnapshot, DkgTask, TaskContext, TaskKind, TaskWindow,
};

/// Distributes encrypted shares and commitments of a fresh polynomial
pub struct ShareDistributionTask {
    window: TaskWindow,
    success: bool,
}

impl ShareDistributionTask {
    pub fn new(window: TaskWindow) -> Self {
        Self {
            window,
            success: false,
        }
    }
}

/// Hash of the shares we hold for ourselves
fn local_shares_hash(state: &DkgState) -> Option<alloy_primitives::B256> {
    let me = state.me()?;
    if me.commitments.is_empty() {
        return None;
    }
    Some(compute_distributed_shares_hash(&me.encrypted_shares, &me.commitments).distributed)
}

#[async_trait]
impl DkgTask for ShareDistributionTask {
    fn kind(&self) -> TaskKind {
        TaskKind::ShareDistribution
    }

    fn window(&self) -> TaskWindow {
        self.window
    }

    async fn initialize(&mut self, _ctx: &TaskContext, snapshot: CeremonySnapshot<'_>) -> Result<()> {
        let state = snapshot.current()?;
        require_phase(state, &[Phase::ShareDistribution])?;
        if !state.private_coefficients.is_empty() {
            return Ok(());
        }

        let recipients: Vec<ShareRecipient> = state
            .sorted_participants()
            .iter()
            .map(|p| ShareRecipient {
                index: p.index,
                public_key: Some(p.public_key),
            })
            .collect();
        if recipients.len() != state.number_of_validators {
            return Err(TaskError::CanNotContinue(format!(
                "{} of {} validators registered",
                recipients.len(),
                state.number_of_validators
            )));
        }

        let private_key = state
            .transport_private_key
            .ok_or_else(|| TaskError::MissingData("transport private key".to_string()))?;
        let generated = generate_shares(&mut OsRng, &private_key, &recipients)?;

        state.secret_value = generated.private_coefficients.first().copied();
        state.private_coefficients = generated.private_coefficients.clone();
        let me = state
            .me_mut()
            .ok_or_else(|| TaskError::MissingData("own registration".to_string()))?;
        me.encrypted_shares = generated.encrypted_shares.clone();
        me.commitments = generated.commitments.clone();
        Ok(())
    }

    async fn do_work(&mut self, ctx: &TaskContext, state: &mut DkgState) -> Result<()> {
        let local_hash = local_shares_hash(state)
            .ok_or_else(|| TaskError::MissingData("generated shares".to_string()))?;
        let onchain = ctx.chain.participant_state(state.account).await?;
        if onchain.nonce == state.nonce && onchain.distributed_shares_hash == local_hash {
            self.success = true;
            return Ok(());
        }

        let me = state
            .me()
            .ok_or_else(|| TaskError::MissingData("own registration".to_string()))?;
        let call = DkgCall::DistributeShares {
            encrypted_shares: me.encrypted_shares.clone(),
            commitments: me.commitments.clone(),
        };
        submit_and_wait(ctx, state.account, call).await?;
        info!(nonce = state.nonce, hash = %local_hash, "Distributed shares");
        self.success = true;
        Ok(())
    }

    async fn should_retry(&self, ctx: &TaskContext, state: &DkgState) -> bool {
        if !general_should_retry(ctx, state, &self.window).await {
            return false;
        }
        let Some(local_hash) = local_shares_hash(state) else {
            return true;
        };
        match ctx.chain.participant_state(state.account).await {
            Ok(onchain) => {
                onchain.nonce != self.window.nonce || onchain.distributed_shares_hash != local_hash
            }
            Err(_) => true,
        }
    }

    fn success(&self) -> bool {
        self.success
    }
}
