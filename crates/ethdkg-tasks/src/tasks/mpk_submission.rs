//! Master public key submission
//!
//! Every validator computes the master public key, but only the elected
//! leader submits it. Validators that find it already set are done without
//! having succeeded.

use alloy_primitives::B256;
use ark_bn254::{G1Affine, G2Affine};
use async_trait::async_trait;
use ethdkg_crypto::{g2_to_bytes, keccak256};
use ethdkg_math::generate_master_public_key;
use tracing::{info, warn};

use crate::chain::DkgCall;
use crate::error::{Result, TaskError};
use crate::leader::is_leading;
use crate::retry::general_should_retry;
use crate::state::{DkgState, Phase};
use crate::task::{
    require_phase, submit_and_wait, CeremonySnapshot, DkgTask, TaskContext, TaskKind, TaskWindow,
};

pub struct MpkSubmissionTask {
    window: TaskWindow,
    success: bool,
}

impl MpkSubmissionTask {
    pub fn new(window: TaskWindow) -> Self {
        Self {
            window,
            success: false,
        }
    }
}

#[async_trait]
impl DkgTask for MpkSubmissionTask {
    fn kind(&self) -> TaskKind {
        TaskKind::MpkSubmission
    }

    fn window(&self) -> TaskWindow {
        self.window
    }

    async fn initialize(&mut self, _ctx: &TaskContext, snapshot: CeremonySnapshot<'_>) -> Result<()> {
        let state = snapshot.current()?;
        require_phase(state, &[Phase::MPKSubmission])?;

        let participants = state.sorted_participants();
        let mut shares_g1: Vec<G1Affine> = Vec::with_capacity(participants.len());
        let mut shares_g2: Vec<G2Affine> = Vec::with_capacity(participants.len());
        for participant in &participants {
            let share = participant.key_share().ok_or_else(|| {
                TaskError::MissingData(format!("key share of participant {}", participant.index))
            })?;
            shares_g1.push(share.g1);
            shares_g2.push(share.g2);
        }

        let master_public_key = generate_master_public_key(&shares_g1, &shares_g2)?;
        state.master_public_key = Some(master_public_key);
        Ok(())
    }

    async fn do_work(&mut self, ctx: &TaskContext, state: &mut DkgState) -> Result<()> {
        let master_public_key = state
            .master_public_key
            .ok_or_else(|| TaskError::MissingData("master public key".to_string()))?;

        if ctx.chain.is_master_public_key_set().await? {
            let expected = B256::from(keccak256(g2_to_bytes(&master_public_key)));
            if ctx.chain.master_public_key_hash().await? != expected {
                warn!("On-chain master public key differs from ours");
            }
            info!("Master public key already set");
            return Ok(());
        }

        if !is_leading(ctx, state, &self.window).await? {
            return Err(TaskError::NotLeading);
        }

        let call = DkgCall::SubmitMasterPublicKey { master_public_key };
        submit_and_wait(ctx, state.account, call).await?;
        info!(nonce = state.nonce, "Submitted master public key");
        self.success = true;
        Ok(())
    }

    async fn should_retry(&self, ctx: &TaskContext, state: &DkgState) -> bool {
        if !general_should_retry(ctx, state, &self.window).await {
            return false;
        }
        match ctx.chain.is_master_public_key_set().await {
            Ok(set) => !set,
            Err(_) => true,
        }
    }

    fn success(&self) -> bool {
        self.success
    }
}
