//! Key share submission

use async_trait::async_trait;
use ethdkg_math::{generate_key_share, KeyShare};
use rand::rngs::OsRng;
use tracing::info;

use crate::chain::DkgCall;
use crate::error::{Result, TaskError};
use crate::retry::general_should_retry;
use crate::state::{DkgState, Phase};
use crate::task::{
    require_phase, submit_and_wait, CeremonySnapshot, DkgTask, TaskContext, TaskKind, TaskWindow,
};

/// Publishes `h1^s`, its DLEQ proof and `h2^s` for our secret value `s`
pub struct KeyShareSubmissionTask {
    window: TaskWindow,
    success: bool,
}

impl KeyShareSubmissionTask {
    pub fn new(window: TaskWindow) -> Self {
        Self {
            window,
            success: false,
        }
    }
}

fn local_key_share(state: &DkgState) -> Result<KeyShare> {
    state
        .me()
        .and_then(|me| me.key_share())
        .ok_or_else(|| TaskError::MissingData("key share".to_string()))
}

#[async_trait]
impl DkgTask for KeyShareSubmissionTask {
    fn kind(&self) -> TaskKind {
        TaskKind::KeyShareSubmission
    }

    fn window(&self) -> TaskWindow {
        self.window
    }

    async fn initialize(&mut self, _ctx: &TaskContext, snapshot: CeremonySnapshot<'_>) -> Result<()> {
        let state = snapshot.current()?;
        require_phase(
            state,
            &[Phase::DisputeShareDistribution, Phase::KeyShareSubmission],
        )?;
        if local_key_share(state).is_ok() {
            return Ok(());
        }

        let share = generate_key_share(&mut OsRng, state.secret_value.as_ref())?;
        let me = state
            .me_mut()
            .ok_or_else(|| TaskError::MissingData("own registration".to_string()))?;
        me.key_share_g1 = Some(share.g1);
        me.key_share_g1_proof = Some(share.g1_proof);
        me.key_share_g2 = Some(share.g2);
        Ok(())
    }

    async fn do_work(&mut self, ctx: &TaskContext, state: &mut DkgState) -> Result<()> {
        let share = local_key_share(state)?;
        let onchain = ctx.chain.participant_state(state.account).await?;
        if onchain.nonce == state.nonce && onchain.key_share_g1 == Some(share.g1) {
            self.success = true;
            return Ok(());
        }

        let call = DkgCall::SubmitKeyShare {
            key_share_g1: share.g1,
            key_share_g1_proof: share.g1_proof,
            key_share_g2: share.g2,
        };
        submit_and_wait(ctx, state.account, call).await?;
        info!(nonce = state.nonce, "Submitted key share");
        self.success = true;
        Ok(())
    }

    async fn should_retry(&self, ctx: &TaskContext, state: &DkgState) -> bool {
        if !general_should_retry(ctx, state, &self.window).await {
            return false;
        }
        let Ok(share) = local_key_share(state) else {
            return true;
        };
        match ctx.chain.participant_state(state.account).await {
            Ok(onchain) => {
                onchain.nonce != self.window.nonce || onchain.key_share_g1 != Some(share.g1)
            }
            Err(_) => true,
        }
    }

    fn success(&self) -> bool {
        self.success
    }
}
