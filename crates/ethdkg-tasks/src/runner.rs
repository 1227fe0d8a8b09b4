//! Drives a task through its lifecycle

use tokio::time::sleep;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::chain::ChainError;
use crate::error::TaskError;
use crate::retry::general_should_retry;
use crate::state::DkgState;
use crate::task::{CeremonySnapshot, DkgTask, TaskContext, TaskKind};

/// How a driven task ended
#[derive(Debug)]
pub struct TaskOutcome {
    pub kind: TaskKind,

    /// The task achieved its on-chain effect
    pub success: bool,

    /// `do_work` and `do_retry` calls made
    pub attempts: u32,

    /// Error of the last attempt, or of `initialize`
    pub last_error: Option<TaskError>,
}

/// Runs tasks with a shared context
pub struct TaskRunner {
    ctx: TaskContext,
}

impl TaskRunner {
    pub fn new(ctx: TaskContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &TaskContext {
        &self.ctx
    }

    /// Run `task` against `state` until it is done
    ///
    /// A retryable `initialize` failure is retried under the same budget and
    /// window as the work itself; a task whose `initialize` still fails is
    /// dropped without `do_done`. Otherwise
    /// attempts continue until an error is not retryable, `should_retry`
    /// returns false, `max_retries` is exhausted, or the round is cancelled;
    /// `do_done` is then called once.
    pub async fn drive(&self, task: &mut dyn DkgTask, state: &mut DkgState) -> TaskOutcome {
        let kind = task.kind();
        let window = task.window();
        let span = info_span!(
            parent: &self.ctx.span,
            "task",
            task = %kind,
            nonce = window.nonce,
            account = %state.account
        );
        self.drive_inner(task, state).instrument(span).await
    }

    async fn drive_inner(&self, task: &mut dyn DkgTask, state: &mut DkgState) -> TaskOutcome {
        let ctx = &self.ctx;
        let kind = task.kind();
        let window = task.window();

        let mut init_failures = 0u32;
        loop {
            let snapshot = CeremonySnapshot::for_round(state, window.nonce);
            let error = match task.initialize(ctx, snapshot).await {
                Ok(()) => break,
                Err(e) => e,
            };
            init_failures += 1;

            let retry = error.is_retryable()
                && init_failures <= ctx.config.max_retries
                && general_should_retry(ctx, state, &window).await;
            if !retry {
                warn!(attempts = init_failures, error = %error, "Task initialization failed");
                return TaskOutcome {
                    kind,
                    success: false,
                    attempts: 0,
                    last_error: Some(error),
                };
            }
            debug!(attempt = init_failures, error = %error, "Initialization failed, retrying");

            tokio::select! {
                _ = ctx.cancel.cancelled() => {
                    return TaskOutcome {
                        kind,
                        success: false,
                        attempts: 0,
                        last_error: Some(TaskError::Chain(ChainError::Cancelled)),
                    };
                }
                _ = sleep(ctx.config.retry_delay()) => {}
            }
        }

        let mut attempts = 0u32;
        let mut last_error = None;
        loop {
            if ctx.cancel.is_cancelled() {
                last_error = Some(TaskError::Chain(ChainError::Cancelled));
                break;
            }

            let result = if attempts == 0 {
                task.do_work(ctx, state).await
            } else {
                task.do_retry(ctx, state).await
            };
            attempts += 1;

            match result {
                Ok(()) => last_error = None,
                Err(e) if e.is_retryable() => {
                    debug!(attempt = attempts, error = %e, "Attempt failed");
                    last_error = Some(e);
                }
                Err(e) => {
                    warn!(attempt = attempts, error = %e, "Abandoning task");
                    last_error = Some(e);
                    break;
                }
            }

            if !task.should_retry(ctx, state).await {
                debug!(attempts, "No retry needed");
                break;
            }
            if attempts > ctx.config.max_retries {
                warn!(attempts, "Retry budget exhausted");
                break;
            }

            tokio::select! {
                _ = ctx.cancel.cancelled() => {
                    last_error = Some(TaskError::Chain(ChainError::Cancelled));
                    break;
                }
                _ = sleep(ctx.config.retry_delay()) => {}
            }
        }

        task.do_done(state);
        let success = task.success();
        info!(success, attempts, "Task finished");
        TaskOutcome {
            kind,
            success,
            attempts,
            last_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::InMemoryEthDkg;
    use crate::config::TaskConfig;
    use crate::error::Result;
    use crate::task::TaskWindow;
    use alloy_primitives::Address;
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Fails a fixed number of times, then succeeds
    struct Flaky {
        window: TaskWindow,
        failures_left: u32,
        init_failures_left: u32,
        retryable: bool,
        success: bool,
        done_calls: u32,
    }

    impl Flaky {
        fn new(failures: u32, retryable: bool) -> Self {
            Self {
                window: TaskWindow::new(1, 0, 100),
                failures_left: failures,
                init_failures_left: 0,
                retryable,
                success: false,
                done_calls: 0,
            }
        }
    }

    #[async_trait]
    impl DkgTask for Flaky {
        fn kind(&self) -> TaskKind {
            TaskKind::Register
        }

        fn window(&self) -> TaskWindow {
            self.window
        }

        async fn initialize(&mut self, _ctx: &TaskContext, snapshot: CeremonySnapshot<'_>) -> Result<()> {
            snapshot.current()?;
            if self.init_failures_left > 0 {
                self.init_failures_left -= 1;
                return Err(TaskError::Chain(ChainError::Rpc("connection reset".into())));
            }
            Ok(())
        }

        async fn do_work(&mut self, _ctx: &TaskContext, _state: &mut DkgState) -> Result<()> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                if self.retryable {
                    return Err(TaskError::TxFailed("status 0".into()));
                }
                return Err(TaskError::CanNotContinue("gone".into()));
            }
            self.success = true;
            Ok(())
        }

        async fn should_retry(&self, _ctx: &TaskContext, _state: &DkgState) -> bool {
            !self.success
        }

        fn do_done(&mut self, _state: &mut DkgState) {
            self.done_calls += 1;
        }

        fn success(&self) -> bool {
            self.success
        }
    }

    fn runner(max_retries: u32) -> TaskRunner {
        let chain = Arc::new(InMemoryEthDkg::new(Vec::new(), 10, 2));
        let config = TaskConfig {
            retry_delay_ms: 0,
            max_retries,
            ..TaskConfig::default()
        };
        TaskRunner::new(TaskContext::new(chain, config))
    }

    fn state() -> DkgState {
        let mut state = DkgState::new(Address::with_last_byte(1));
        state.nonce = 1;
        state
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let mut task = Flaky::new(2, true);
        let mut state = state();
        let outcome = runner(5).drive(&mut task, &mut state).await;
        assert!(outcome.success);
        assert_eq!(outcome.attempts, 3);
        assert!(outcome.last_error.is_none());
        assert_eq!(task.done_calls, 1);
    }

    #[tokio::test]
    async fn test_non_retryable_stops() {
        let mut task = Flaky::new(2, false);
        let mut state = state();
        let outcome = runner(5).drive(&mut task, &mut state).await;
        assert!(!outcome.success);
        assert_eq!(outcome.attempts, 1);
        assert!(matches!(outcome.last_error, Some(TaskError::CanNotContinue(_))));
        assert_eq!(task.done_calls, 1);
    }

    #[tokio::test]
    async fn test_retry_budget() {
        let mut task = Flaky::new(10, true);
        let mut state = state();
        let outcome = runner(2).drive(&mut task, &mut state).await;
        assert!(!outcome.success);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(task.done_calls, 1);
    }

    #[tokio::test]
    async fn test_failed_initialize_skips_done() {
        let mut task = Flaky::new(0, true);
        let mut state = state();
        state.nonce = 2;
        let outcome = runner(2).drive(&mut task, &mut state).await;
        assert_eq!(outcome.attempts, 0);
        assert_eq!(task.done_calls, 0);
        assert!(matches!(outcome.last_error, Some(TaskError::CanNotContinue(_))));
    }

    #[tokio::test]
    async fn test_cancelled_round() {
        let runner = runner(5);
        runner.context().cancel.cancel();
        let mut task = Flaky::new(0, true);
        let mut state = state();
        let outcome = runner.drive(&mut task, &mut state).await;
        assert_eq!(outcome.attempts, 0);
        assert!(matches!(
            outcome.last_error,
            Some(TaskError::Chain(ChainError::Cancelled))
        ));
        assert_eq!(task.done_calls, 1);
    }

    #[tokio::test]
    async fn test_retryable_initialize_is_retried() {
        let mut task = Flaky::new(0, true);
        task.init_failures_left = 2;
        let mut state = state();
        let outcome = runner(5).drive(&mut task, &mut state).await;
        assert!(outcome.success);
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.last_error.is_none());
        assert_eq!(task.done_calls, 1);
    }

    #[tokio::test]
    async fn test_initialize_retry_budget() {
        let mut task = Flaky::new(0, true);
        task.init_failures_left = 10;
        let mut state = state();
        let outcome = runner(2).drive(&mut task, &mut state).await;
        assert!(!outcome.success);
        assert_eq!(outcome.attempts, 0);
        assert_eq!(task.init_failures_left, 7);
        assert!(matches!(outcome.last_error, Some(TaskError::Chain(ChainError::Rpc(_)))));
        assert_eq!(task.done_calls, 0);
    }
}
