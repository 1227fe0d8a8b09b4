//! Disputes of shares that do not match their commitments
//!
//! Every share addressed to us is decrypted and checked. For each bad one we
//! reveal the Diffie-Hellman key shared with the issuer, with a DLEQ proof
//! that it was derived from our registered transport key, so the contract
//! can decrypt and check the share itself.

use alloy_primitives::Address;
use ark_bn254::G1Affine;
use ark_ec::AffineRepr;
use async_trait::async_trait;
use ethdkg_crypto::{dleq_prove, shared_secret};
use ethdkg_math::verify_distributed_shares;
use rand::rngs::OsRng;
use tracing::{info, warn};

use super::{is_revert, still_validators};
use crate::chain::DkgCall;
use crate::error::{Result, TaskError};
use crate::retry::general_should_retry;
use crate::state::{DkgState, Phase};
use crate::task::{
    require_phase, submit_and_wait, CeremonySnapshot, DkgTask, TaskContext, TaskKind, TaskWindow,
};

pub struct DisputeShareDistributionTask {
    window: TaskWindow,
    success: bool,
}

impl DisputeShareDistributionTask {
    pub fn new(window: TaskWindow) -> Self {
        Self {
            window,
            success: false,
        }
    }

    async fn accuse(&self, ctx: &TaskContext, state: &DkgState, accused: Address) -> Result<()> {
        let private_key = state
            .transport_private_key
            .ok_or_else(|| TaskError::MissingData("transport private key".to_string()))?;
        let public_key = state
            .transport_public_key
            .ok_or_else(|| TaskError::MissingData("transport public key".to_string()))?;
        let issuer = state
            .participant(&accused)
            .ok_or_else(|| TaskError::MissingData(format!("participant {}", accused)))?;

        let shared_key = shared_secret(&private_key, &issuer.public_key);
        let shared_key_proof = dleq_prove(
            &G1Affine::generator(),
            &public_key,
            &issuer.public_key,
            &shared_key,
            &private_key,
            &mut OsRng,
        )?;

        let call = DkgCall::AccuseDistributedBadShares {
            accused,
            encrypted_shares: issuer.encrypted_shares.clone(),
            commitments: issuer.commitments.clone(),
            shared_key,
            shared_key_proof,
        };
        match submit_and_wait(ctx, state.account, call).await {
            Ok(_) => {
                warn!(%accused, "Accused participant of distributing bad shares");
                Ok(())
            }
            Err(e) if is_revert(&e) => {
                if ctx.chain.is_validator(accused).await? {
                    return Err(e);
                }
                info!(%accused, "Bad share issuer already penalized");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl DkgTask for DisputeShareDistributionTask {
    fn kind(&self) -> TaskKind {
        TaskKind::DisputeShareDistribution
    }

    fn window(&self) -> TaskWindow {
        self.window
    }

    async fn initialize(&mut self, _ctx: &TaskContext, snapshot: CeremonySnapshot<'_>) -> Result<()> {
        let state = snapshot.current()?;
        require_phase(
            state,
            &[Phase::ShareDistribution, Phase::DisputeShareDistribution],
        )?;
        let private_key = state
            .transport_private_key
            .ok_or_else(|| TaskError::MissingData("transport private key".to_string()))?;

        let mut bad = Vec::new();
        for issuer in state.sorted_participants() {
            if issuer.address == state.account {
                continue;
            }
            let check = verify_distributed_shares(
                state.index,
                &private_key,
                state.number_of_validators,
                &issuer.issued_shares(),
            )?;
            if check.present && !check.valid {
                warn!(issuer = %issuer.address, index = issuer.index, "Received bad share");
                bad.push(issuer.address);
            }
        }
        state.bad_shares.extend(bad);
        Ok(())
    }

    async fn do_work(&mut self, ctx: &TaskContext, state: &mut DkgState) -> Result<()> {
        let pending = still_validators(ctx, state.bad_shares.iter()).await?;
        let mut last_error = None;
        for accused in pending {
            if let Err(e) = self.accuse(ctx, state, accused).await {
                warn!(%accused, error = %e, "Share dispute failed");
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

    // Scoped to this phase: done once every issuer we caught is out of the pool
    async fn should_retry(&self, ctx: &TaskContext, state: &DkgState) -> bool {
        if !general_should_retry(ctx, state, &self.window).await {
            return false;
        }
        match still_validators(ctx, state.bad_shares.iter()).await {
            Ok(pending) => !pending.is_empty(),
            Err(_) => true,
        }
    }

    fn success(&self) -> bool {
        self.success
    }
}
