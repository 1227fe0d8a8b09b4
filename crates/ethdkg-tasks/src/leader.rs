//! Leader election for single-submitter tasks
//!
//! Only one validator needs to submit the master public key or complete
//! the round. The block hash at the start of the window picks a starting
//! index; once the desperation delay has passed without progress, the set
//! of allowed validators widens until everyone may act.

use alloy_primitives::{B256, U256};
use tracing::debug;

use crate::error::Result;
use crate::state::DkgState;
use crate::task::{TaskContext, TaskWindow};

/// Whether validator `my_index` (zero-based) may act
///
/// # Arguments
/// * `number_of_validators` - Size of the committee
/// * `my_index` - Zero-based position of the local validator
/// * `blocks_since_desperation` - Blocks past the desperation point; zero or
///   negative means only the hash-selected validator leads
/// * `block_hash` - Hash of the window's first block
/// * `desperation_factor` - Larger values widen the leader range more slowly
pub fn am_i_leading(
    number_of_validators: usize,
    my_index: usize,
    blocks_since_desperation: i64,
    block_hash: &B256,
    desperation_factor: u64,
) -> bool {
    if number_of_validators == 0 {
        return false;
    }
    let n = number_of_validators;

    let mut allowed = 1usize;
    let mut remaining = blocks_since_desperation;
    while remaining > 0 {
        remaining -= (desperation_factor / allowed as u64) as i64;
        allowed += 1;
        if allowed >= n {
            break;
        }
    }

    let hash = U256::from_be_bytes(block_hash.0);
    let start = (hash % U256::from(n)).as_limbs()[0] as usize;
    let end = (start + allowed) % n;

    if end > start {
        my_index >= start && my_index < end
    } else {
        my_index >= start || my_index < end
    }
}

/// [`am_i_leading`] for the local validator at the current height
pub async fn is_leading(ctx: &TaskContext, state: &DkgState, window: &TaskWindow) -> Result<bool> {
    if state.index == 0 {
        return Ok(false);
    }
    let height = ctx.chain.current_height().await?;
    let block_hash = ctx.chain.block_hash(window.start).await?;

    let desperation_point = window.start + ctx.config.desperation_delay;
    let blocks_since = height as i64 - desperation_point as i64;
    let leading = am_i_leading(
        state.number_of_validators,
        (state.index - 1) as usize,
        blocks_since,
        &block_hash,
        ctx.config.desperation_factor,
    );
    debug!(height, blocks_since, leading, "Leader check");
    Ok(leading)
}
