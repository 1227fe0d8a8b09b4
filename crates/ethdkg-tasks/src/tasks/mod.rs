//! Phase tasks of the ETHDKG ceremony

mod completion;
mod dispute_gpkj;
mod dispute_missing;
mod dispute_share_distribution;
mod gpkj_submission;
mod key_share_submission;
mod mpk_submission;
mod register;
mod share_distribution;

pub use completion::CompletionTask;
pub use dispute_gpkj::DisputeGpkjTask;
pub use dispute_missing::{DisputeMissingTask, MissingStage};
pub use dispute_share_distribution::DisputeShareDistributionTask;
pub use gpkj_submission::GpkjSubmissionTask;
pub use key_share_submission::KeyShareSubmissionTask;
pub use mpk_submission::MpkSubmissionTask;
pub use register::RegisterTask;
pub use share_distribution::ShareDistributionTask;

use alloy_primitives::Address;

use crate::chain::{ChainError, ParticipantState};
use crate::error::{Result, TaskError};
use crate::task::TaskContext;

/// Current pool members with their contract records
async fn pool_participants(ctx: &TaskContext) -> Result<Vec<(Address, ParticipantState)>> {
    let validators = ctx.chain.validator_addresses().await?;
    let mut participants = Vec::with_capacity(validators.len());
    for address in validators {
        let state = ctx.chain.participant_state(address).await?;
        participants.push((address, state));
    }
    Ok(participants)
}

/// The subset of `accused` still in the validator pool
async fn still_validators(
    ctx: &TaskContext,
    accused: impl Iterator<Item = &Address>,
) -> Result<Vec<Address>> {
    let mut pending = Vec::new();
    for address in accused {
        if ctx.chain.is_validator(*address).await? {
            pending.push(*address);
        }
    }
    Ok(pending)
}

fn is_revert(error: &TaskError) -> bool {
    matches!(error, TaskError::Chain(ChainError::Reverted(_)))
}
