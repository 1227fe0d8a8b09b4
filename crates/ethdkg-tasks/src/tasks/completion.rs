//! Completion of the round by the elected leader

use async_trait::async_trait;
use tracing::info;

use crate::chain::DkgCall;
use crate::error::{Result, TaskError};
use crate::leader::is_leading;
use crate::retry::general_should_retry;
use crate::state::{DkgState, Phase};
use crate::task::{
    require_phase, submit_and_wait, CeremonySnapshot, DkgTask, TaskContext, TaskKind, TaskWindow,
};

pub struct CompletionTask {
    window: TaskWindow,
    success: bool,
}

impl CompletionTask {
    pub fn new(window: TaskWindow) -> Self {
        Self {
            window,
            success: false,
        }
    }
}

#[async_trait]
impl DkgTask for CompletionTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Completion
    }

    fn window(&self) -> TaskWindow {
        self.window
    }

    async fn initialize(&mut self, _ctx: &TaskContext, snapshot: CeremonySnapshot<'_>) -> Result<()> {
        let state = snapshot.current()?;
        require_phase(state, &[Phase::DisputeGPKJSubmission])
    }

    async fn do_work(&mut self, ctx: &TaskContext, state: &mut DkgState) -> Result<()> {
        if ctx.chain.phase().await? == Phase::Completion {
            info!("Round already completed");
            return Ok(());
        }
        if !is_leading(ctx, state, &self.window).await? {
            return Err(TaskError::NotLeading);
        }

        submit_and_wait(ctx, state.account, DkgCall::Complete).await?;
        info!(nonce = state.nonce, "Completed ETHDKG round");
        self.success = true;
        Ok(())
    }

    async fn should_retry(&self, ctx: &TaskContext, state: &DkgState) -> bool {
        if !general_should_retry(ctx, state, &self.window).await {
            return false;
        }
        match ctx.chain.phase().await {
            Ok(phase) => phase != Phase::Completion,
            Err(_) => true,
        }
    }

    fn do_done(&mut self, state: &mut DkgState) {
        if self.success {
            state.complete = true;
        }
        info!(success = self.success, complete = state.complete, "Completion task done");
    }

    fn success(&self) -> bool {
        self.success
    }
}
