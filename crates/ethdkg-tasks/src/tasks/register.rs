//! Registration of the local transport key

use async_trait::async_trait;
use ethdkg_math::generate_transport_keys;
use rand::rngs::OsRng;
use tracing::info;

use crate::chain::DkgCall;
use crate::error::{Result, TaskError};
use crate::retry::general_should_retry;
use crate::state::{DkgState, Phase};
use crate::task::{
    require_phase, submit_and_wait, CeremonySnapshot, DkgTask, TaskContext, TaskKind, TaskWindow,
};

/// Registers a fresh transport public key for the round
pub struct RegisterTask {
    window: TaskWindow,
    success: bool,
}

impl RegisterTask {
    pub fn new(window: TaskWindow) -> Self {
        Self {
            window,
            success: false,
        }
    }
}

#[async_trait]
impl DkgTask for RegisterTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Register
    }

    fn window(&self) -> TaskWindow {
        self.window
    }

    async fn initialize(&mut self, ctx: &TaskContext, snapshot: CeremonySnapshot<'_>) -> Result<()> {
        let state = snapshot.current()?;
        require_phase(state, &[Phase::RegistrationOpen])?;

        state.validator_addresses = ctx.chain.validator_addresses().await?;
        if !state.validator_addresses.contains(&state.account) {
            return Err(TaskError::CanNotContinue(format!(
                "{} is not in the validator pool",
                state.account
            )));
        }

        if state.transport_private_key.is_none() {
            let (private_key, public_key) = generate_transport_keys(&mut OsRng);
            state.transport_private_key = Some(private_key);
            state.transport_public_key = Some(public_key);
        }
        Ok(())
    }

    async fn do_work(&mut self, ctx: &TaskContext, state: &mut DkgState) -> Result<()> {
        let public_key = state
            .transport_public_key
            .ok_or_else(|| TaskError::MissingData("transport public key".to_string()))?;

        let registered = ctx.chain.participant_state(state.account).await?;
        if registered.nonce == state.nonce && registered.public_key == Some(public_key) {
            self.success = true;
            return Ok(());
        }

        submit_and_wait(ctx, state.account, DkgCall::Register { public_key }).await?;
        info!(nonce = state.nonce, "Registered transport key");
        self.success = true;
        Ok(())
    }

    async fn should_retry(&self, ctx: &TaskContext, state: &DkgState) -> bool {
        if !general_should_retry(ctx, state, &self.window).await {
            return false;
        }
        match ctx.chain.participant_state(state.account).await {
            Ok(registered) => {
                registered.nonce != self.window.nonce
                    || registered.public_key != state.transport_public_key
            }
            Err(_) => true,
        }
    }

    fn success(&self) -> bool {
        self.success
    }
}
