//! The lifecycle every ceremony task follows
//!
//! A task is created for one round and one block window. The runner calls
//! [`DkgTask::initialize`] once with a typed [`CeremonySnapshot`], then
//! [`DkgTask::do_work`] and, while [`DkgTask::should_retry`] holds,
//! [`DkgTask::do_retry`]. [`DkgTask::do_done`] closes the task exactly once.

use alloy_primitives::Address;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, Span};

use crate::chain::{DkgCall, EthDkgChain, ReceiptStatus};
use crate::config::TaskConfig;
use crate::error::{Result, TaskError};
use crate::state::{DkgEvent, DkgState, Phase};
use crate::tasks::{
    CompletionTask, DisputeGpkjTask, DisputeMissingTask, DisputeShareDistributionTask,
    GpkjSubmissionTask, KeyShareSubmissionTask, MpkSubmissionTask, RegisterTask,
    ShareDistributionTask,
};

/// Round and block range a task was scheduled for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskWindow {
    /// Ceremony round
    pub nonce: u64,

    /// First block of the window
    pub start: u64,

    /// First block after the window
    pub end: u64,
}

impl TaskWindow {
    pub fn new(nonce: u64, start: u64, end: u64) -> Self {
        Self { nonce, start, end }
    }

    pub fn contains(&self, height: u64) -> bool {
        height >= self.start && height < self.end
    }
}

/// Collaborators injected into every task
#[derive(Clone)]
pub struct TaskContext {
    /// ETHDKG contract access
    pub chain: Arc<dyn EthDkgChain>,

    /// Fires when the round is abandoned
    pub cancel: CancellationToken,

    /// Parent span for everything the task logs
    pub span: Span,

    pub config: TaskConfig,
}

impl TaskContext {
    pub fn new(chain: Arc<dyn EthDkgChain>, config: TaskConfig) -> Self {
        Self {
            chain,
            cancel: CancellationToken::new(),
            span: Span::none(),
            config,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Ceremony state as handed to [`DkgTask::initialize`]
///
/// Checked once against the round the task was built for; downstream code
/// only ever sees a current state.
#[derive(Debug)]
pub enum CeremonySnapshot<'a> {
    /// State of the round the task belongs to
    Current(&'a mut DkgState),

    /// The state moved to another round
    Superseded { expected: u64, found: u64 },
}

impl<'a> CeremonySnapshot<'a> {
    pub fn for_round(state: &'a mut DkgState, nonce: u64) -> Self {
        if state.nonce == nonce {
            CeremonySnapshot::Current(state)
        } else {
            CeremonySnapshot::Superseded {
                expected: nonce,
                found: state.nonce,
            }
        }
    }

    /// The current state, or [`TaskError::CanNotContinue`]
    pub fn current(self) -> Result<&'a mut DkgState> {
        match self {
            CeremonySnapshot::Current(state) => Ok(state),
            CeremonySnapshot::Superseded { expected, found } => Err(TaskError::CanNotContinue(
                format!("task belongs to round {} but the state is at round {}", expected, found),
            )),
        }
    }
}

/// Fail with [`TaskError::CanNotContinue`] unless the state is in one of `allowed`
pub fn require_phase(state: &DkgState, allowed: &[Phase]) -> Result<()> {
    if allowed.contains(&state.phase) {
        return Ok(());
    }
    Err(TaskError::CanNotContinue(format!(
        "phase is {}, expected one of {:?}",
        state.phase, allowed
    )))
}

/// One phase task of the ceremony
#[async_trait]
pub trait DkgTask: Send + Sync {
    fn kind(&self) -> TaskKind;

    fn window(&self) -> TaskWindow;

    /// Check the snapshot and derive task-local material
    async fn initialize(&mut self, ctx: &TaskContext, snapshot: CeremonySnapshot<'_>)
        -> Result<()>;

    /// First attempt
    async fn do_work(&mut self, ctx: &TaskContext, state: &mut DkgState) -> Result<()>;

    /// Later attempts
    async fn do_retry(&mut self, ctx: &TaskContext, state: &mut DkgState) -> Result<()> {
        self.do_work(ctx, state).await
    }

    /// `true` while there is still work this task could do
    ///
    /// Read errors count as `true`.
    async fn should_retry(&self, ctx: &TaskContext, state: &DkgState) -> bool;

    /// Terminal bookkeeping
    fn do_done(&mut self, _state: &mut DkgState) {
        info!(task = %self.kind(), success = self.success(), "Task done");
    }

    /// Whether the task achieved its on-chain effect
    fn success(&self) -> bool;
}

/// Every phase task of the ceremony
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Register,
    DisputeMissingRegistration,
    ShareDistribution,
    DisputeMissingShareDistribution,
    DisputeShareDistribution,
    KeyShareSubmission,
    DisputeMissingKeyShares,
    MpkSubmission,
    GpkjSubmission,
    DisputeMissingGpkj,
    DisputeGpkj,
    Completion,
}

impl TaskKind {
    /// A fresh task of this kind for `window`
    pub fn build(self, window: TaskWindow) -> Box<dyn DkgTask> {
        match self {
            TaskKind::Register => Box::new(RegisterTask::new(window)),
            TaskKind::DisputeMissingRegistration => {
                Box::new(DisputeMissingTask::registration(window))
            }
            TaskKind::ShareDistribution => Box::new(ShareDistributionTask::new(window)),
            TaskKind::DisputeMissingShareDistribution => {
                Box::new(DisputeMissingTask::share_distribution(window))
            }
            TaskKind::DisputeShareDistribution => {
                Box::new(DisputeShareDistributionTask::new(window))
            }
            TaskKind::KeyShareSubmission => Box::new(KeyShareSubmissionTask::new(window)),
            TaskKind::DisputeMissingKeyShares => Box::new(DisputeMissingTask::key_shares(window)),
            TaskKind::MpkSubmission => Box::new(MpkSubmissionTask::new(window)),
            TaskKind::GpkjSubmission => Box::new(GpkjSubmissionTask::new(window)),
            TaskKind::DisputeMissingGpkj => Box::new(DisputeMissingTask::gpkj(window)),
            TaskKind::DisputeGpkj => Box::new(DisputeGpkjTask::new(window)),
            TaskKind::Completion => Box::new(CompletionTask::new(window)),
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskKind::Register => "register",
            TaskKind::DisputeMissingRegistration => "dispute-missing-registration",
            TaskKind::ShareDistribution => "share-distribution",
            TaskKind::DisputeMissingShareDistribution => "dispute-missing-share-distribution",
            TaskKind::DisputeShareDistribution => "dispute-share-distribution",
            TaskKind::KeyShareSubmission => "key-share-submission",
            TaskKind::DisputeMissingKeyShares => "dispute-missing-key-shares",
            TaskKind::MpkSubmission => "mpk-submission",
            TaskKind::GpkjSubmission => "gpkj-submission",
            TaskKind::DisputeMissingGpkj => "dispute-missing-gpkj",
            TaskKind::DisputeGpkj => "dispute-gpkj",
            TaskKind::Completion => "completion",
        };
        f.write_str(name)
    }
}

/// Submit `call` and wait for its receipt
///
/// The wait honors the context's cancellation token. A mined but failed
/// transaction is [`TaskError::TxFailed`]. Returns the decoded logs.
pub async fn submit_and_wait(
    ctx: &TaskContext,
    from: Address,
    call: DkgCall,
) -> Result<Vec<DkgEvent>> {
    let name = call.name();
    let tx = ctx.chain.submit(from, call).await?;
    debug!(call = name, tx = %tx.0, "Submitted");

    let receipt = ctx.chain.await_receipt(tx, &ctx.cancel).await?;
    match receipt.status {
        ReceiptStatus::Success => {
            debug!(call = name, block = receipt.block, "Mined");
            Ok(receipt.logs)
        }
        ReceiptStatus::Failed(reason) => Err(TaskError::TxFailed(format!(
            "{} mined in block {}: {}",
            name, receipt.block, reason
        ))),
    }
}
