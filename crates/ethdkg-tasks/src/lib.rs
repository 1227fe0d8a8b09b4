//! ETHDKG Tasks - Ceremony state and the phase tasks that drive it
//!
//! This crate provides:
//! - The per-round [`DkgState`] and the chain events folded into it
//! - The [`EthDkgChain`] collaborator for contract reads and submissions
//! - The task lifecycle ([`DkgTask`]) with its retry policy and runner
//! - One task per ceremony phase, plus leader election and scheduling
//! - [`CeremonyActor`], the single owner of a validator's state
//!
//! # Lifecycle
//!
//! ```text
//! Created -> initialize -> do_work -> { should_retry -> do_retry }* -> do_done
//! ```
//!
//! A task whose `initialize` fails with [`TaskError::CanNotContinue`] is
//! dropped; its round was superseded or the phase moved on.

pub mod actor;
pub mod chain;
pub mod config;
pub mod error;
pub mod leader;
pub mod retry;
pub mod runner;
pub mod schedule;
pub mod state;
pub mod task;
pub mod tasks;

pub use actor::{CeremonyActor, CeremonyCommand, CeremonyHandle, PendingOutcome};
pub use chain::{
    ChainError, DkgCall, EthDkgChain, ParticipantState, Receipt, ReceiptStatus, TxHandle,
};
pub use config::{TaskConfig, DEFAULT_DESPERATION_DELAY, DEFAULT_DESPERATION_FACTOR};
pub use error::{Result, TaskError};
pub use leader::{am_i_leading, is_leading};
pub use retry::{general_should_retry, should_retry_at};
pub use runner::{TaskOutcome, TaskRunner};
pub use schedule::{Schedule, ScheduledTask};
pub use state::{DkgEvent, DkgState, Participant, Phase};
pub use task::{
    require_phase, submit_and_wait, CeremonySnapshot, DkgTask, TaskContext, TaskKind, TaskWindow,
};

#[cfg(any(test, feature = "testing"))]
pub use chain::InMemoryEthDkg;
