//! Retry policy shared by every task

use tracing::debug;

use crate::state::DkgState;
use crate::task::{TaskContext, TaskWindow};

/// A task may retry while the chain has not passed the end of its window
pub fn should_retry_at(current_block: u64, window: &TaskWindow) -> bool {
    current_block < window.end
}

/// [`should_retry_at`] against the live chain height
///
/// `false` once the state moved to another round. A failed height read is
/// taken as transient and allows the retry.
pub async fn general_should_retry(ctx: &TaskContext, state: &DkgState, window: &TaskWindow) -> bool {
    if state.nonce != window.nonce {
        return false;
    }
    match ctx.chain.current_height().await {
        Ok(height) => should_retry_at(height, window),
        Err(e) => {
            debug!(error = %e, "Height read failed, assuming retry");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::InMemoryEthDkg;
    use crate::config::TaskConfig;
    use alloy_primitives::Address;
    use std::sync::Arc;

    #[test]
    fn test_retry_until_window_end() {
        let window = TaskWindow::new(1, 10, 20);
        assert!(should_retry_at(5, &window));
        assert!(should_retry_at(19, &window));
        assert!(!should_retry_at(20, &window));
        assert!(!should_retry_at(25, &window));
    }

    #[tokio::test]
    async fn test_other_round_stops_retry() {
        let chain = Arc::new(InMemoryEthDkg::new(vec![Address::with_last_byte(1)], 10, 2));
        let ctx = TaskContext::new(chain.clone(), TaskConfig::default());
        let mut state = DkgState::new(Address::with_last_byte(1));
        state.nonce = 1;

        assert!(general_should_retry(&ctx, &state, &TaskWindow::new(1, 0, 10)).await);
        assert!(!general_should_retry(&ctx, &state, &TaskWindow::new(2, 0, 10)).await);

        chain.advance_blocks(20).await;
        assert!(!general_should_retry(&ctx, &state, &TaskWindow::new(1, 0, 10)).await);
    }
}
