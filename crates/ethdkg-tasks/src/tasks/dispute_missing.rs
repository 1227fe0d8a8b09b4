//! Accusations against validators that skipped a phase
//!
//! One task type covers the four "did not" accusations; they only differ in
//! which phase they follow, what counts as missing and which contract call
//! carries the accusation.

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use tracing::{info, warn};

use super::{is_revert, pool_participants};
use crate::chain::{DkgCall, ParticipantState};
use crate::error::Result;
use crate::retry::general_should_retry;
use crate::state::{DkgState, Phase};
use crate::task::{
    require_phase, submit_and_wait, CeremonySnapshot, DkgTask, TaskContext, TaskKind, TaskWindow,
};

/// Which submission the accused failed to make
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingStage {
    Registration,
    ShareDistribution,
    KeyShares,
    Gpkj,
}

impl MissingStage {
    fn kind(self) -> TaskKind {
        match self {
            MissingStage::Registration => TaskKind::DisputeMissingRegistration,
            MissingStage::ShareDistribution => TaskKind::DisputeMissingShareDistribution,
            MissingStage::KeyShares => TaskKind::DisputeMissingKeyShares,
            MissingStage::Gpkj => TaskKind::DisputeMissingGpkj,
        }
    }

    fn phases(self) -> &'static [Phase] {
        match self {
            MissingStage::Registration => &[Phase::RegistrationOpen],
            MissingStage::ShareDistribution => &[Phase::ShareDistribution],
            MissingStage::KeyShares => &[Phase::DisputeShareDistribution, Phase::KeyShareSubmission],
            MissingStage::Gpkj => &[Phase::GPKJSubmission],
        }
    }

    /// Whether a pool member has not made this stage's submission in round `nonce`
    pub fn is_missing(self, nonce: u64, participant: &ParticipantState) -> bool {
        let registered = participant.nonce == nonce;
        match self {
            MissingStage::Registration => !registered,
            MissingStage::ShareDistribution => {
                registered && participant.distributed_shares_hash == B256::ZERO
            }
            MissingStage::KeyShares => {
                registered
                    && (participant.key_share_g1.is_none()
                        || participant.key_share_g1_proof.is_none()
                        || participant.key_share_g2.is_none())
            }
            MissingStage::Gpkj => registered && participant.gpkj.is_none(),
        }
    }

    fn accusation(self, accused: Vec<Address>) -> DkgCall {
        match self {
            MissingStage::Registration => DkgCall::AccuseNotRegistered { accused },
            MissingStage::ShareDistribution => DkgCall::AccuseDidNotDistributeShares { accused },
            MissingStage::KeyShares => DkgCall::AccuseDidNotSubmitKeyShares { accused },
            MissingStage::Gpkj => DkgCall::AccuseDidNotSubmitGpkj { accused },
        }
    }
}

/// Accuses every pool member that is missing a submission
pub struct DisputeMissingTask {
    stage: MissingStage,
    window: TaskWindow,
    accused: Vec<Address>,
    success: bool,
}

impl DisputeMissingTask {
    pub fn new(stage: MissingStage, window: TaskWindow) -> Self {
        Self {
            stage,
            window,
            accused: Vec::new(),
            success: false,
        }
    }

    pub fn registration(window: TaskWindow) -> Self {
        Self::new(MissingStage::Registration, window)
    }

    pub fn share_distribution(window: TaskWindow) -> Self {
        Self::new(MissingStage::ShareDistribution, window)
    }

    pub fn key_shares(window: TaskWindow) -> Self {
        Self::new(MissingStage::KeyShares, window)
    }

    pub fn gpkj(window: TaskWindow) -> Self {
        Self::new(MissingStage::Gpkj, window)
    }

    /// Addresses this task accused
    pub fn accused(&self) -> &[Address] {
        &self.accused
    }

    async fn missing(&self, ctx: &TaskContext) -> Result<Vec<Address>> {
        Ok(pool_participants(ctx)
            .await?
            .into_iter()
            .filter(|(_, participant)| self.stage.is_missing(self.window.nonce, participant))
            .map(|(address, _)| address)
            .collect())
    }
}

#[async_trait]
impl DkgTask for DisputeMissingTask {
    fn kind(&self) -> TaskKind {
        self.stage.kind()
    }

    fn window(&self) -> TaskWindow {
        self.window
    }

    async fn initialize(&mut self, _ctx: &TaskContext, snapshot: CeremonySnapshot<'_>) -> Result<()> {
        let state = snapshot.current()?;
        require_phase(state, self.stage.phases())
    }

    async fn do_work(&mut self, ctx: &TaskContext, state: &mut DkgState) -> Result<()> {
        let missing = self.missing(ctx).await?;
        if missing.is_empty() {
            self.success = true;
            return Ok(());
        }

        let call = self.stage.accusation(missing.clone());
        match submit_and_wait(ctx, state.account, call).await {
            Ok(_) => {
                warn!(stage = ?self.stage, accused = ?missing, "Accused missing participants");
                self.accused.extend(missing);
                self.success = true;
                Ok(())
            }
            // Another validator may have accused them first
            Err(e) if is_revert(&e) => {
                if !self.missing(ctx).await?.is_empty() {
                    return Err(e);
                }
                info!(stage = ?self.stage, "Missing participants already accused");
                self.success = true;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn should_retry(&self, ctx: &TaskContext, state: &DkgState) -> bool {
        if !general_should_retry(ctx, state, &self.window).await {
            return false;
        }
        match self.missing(ctx).await {
            Ok(missing) => !missing.is_empty(),
            Err(_) => true,
        }
    }

    fn success(&self) -> bool {
        self.success
    }
}
