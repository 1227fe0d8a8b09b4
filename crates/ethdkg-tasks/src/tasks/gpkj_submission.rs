//! Group key share submission

use async_trait::async_trait;
use ethdkg_math::{generate_group_keys, inverse_array_for_user_count, IssuedShares};
use tracing::info;

use crate::chain::DkgCall;
use crate::error::{Result, TaskError};
use crate::retry::general_should_retry;
use crate::state::{DkgState, Phase};
use crate::task::{
    require_phase, submit_and_wait, CeremonySnapshot, DkgTask, TaskContext, TaskKind, TaskWindow,
};

/// Derives `gsk_j` from the shares we received and publishes `gpk_j`
pub struct GpkjSubmissionTask {
    window: TaskWindow,
    success: bool,
}

impl GpkjSubmissionTask {
    pub fn new(window: TaskWindow) -> Self {
        Self {
            window,
            success: false,
        }
    }
}

#[async_trait]
impl DkgTask for GpkjSubmissionTask {
    fn kind(&self) -> TaskKind {
        TaskKind::GpkjSubmission
    }

    fn window(&self) -> TaskWindow {
        self.window
    }

    async fn initialize(&mut self, _ctx: &TaskContext, snapshot: CeremonySnapshot<'_>) -> Result<()> {
        let state = snapshot.current()?;
        require_phase(state, &[Phase::GPKJSubmission])?;

        if state.inverse.is_empty() {
            state.inverse = inverse_array_for_user_count(state.number_of_validators)?;
        }
        if state.group_private_key.is_some() {
            return Ok(());
        }

        let issuers: Vec<IssuedShares<'_>> = state
            .sorted_participants()
            .into_iter()
            .map(|p| p.issued_shares())
            .collect();
        let keys = generate_group_keys(
            state.transport_private_key.as_ref(),
            &state.private_coefficients,
            state.index,
            state.number_of_validators,
            &issuers,
        )?;

        state.group_private_key = Some(keys.private_key);
        state.group_public_key = Some(keys.public_key);
        state.group_signature = Some(keys.signature);
        Ok(())
    }

    async fn do_work(&mut self, ctx: &TaskContext, state: &mut DkgState) -> Result<()> {
        let (Some(gpkj), Some(signature)) = (state.group_public_key, state.group_signature) else {
            return Err(TaskError::MissingData("group keys".to_string()));
        };

        let onchain = ctx.chain.participant_state(state.account).await?;
        if onchain.nonce == state.nonce && onchain.gpkj == Some(gpkj) {
            self.success = true;
            return Ok(());
        }

        submit_and_wait(ctx, state.account, DkgCall::SubmitGpkj { gpkj, signature }).await?;
        info!(nonce = state.nonce, index = state.index, "Submitted gpkj");
        self.success = true;
        Ok(())
    }

    async fn should_retry(&self, ctx: &TaskContext, state: &DkgState) -> bool {
        if !general_should_retry(ctx, state, &self.window).await {
            return false;
        }
        match ctx.chain.participant_state(state.account).await {
            Ok(onchain) => {
                onchain.nonce != self.window.nonce
                    || onchain.gpkj.is_none()
                    || onchain.gpkj != state.group_public_key
            }
            Err(_) => true,
        }
    }

    fn success(&self) -> bool {
        self.success
    }
}
