//! ETHDKG Node - Runs a ceremony between local validators
//!
//! Each validator is a [`CeremonyActor`](ethdkg_tasks::CeremonyActor) sharing
//! one in-memory contract. [`LocalCeremony`] mines blocks, forwards contract
//! events to every actor and hands out phase tasks as their windows open.
//! A round that ends with bad participants is restarted with the remaining
//! pool.

pub mod ceremony;
pub mod config;
pub mod error;

pub use ceremony::{CeremonyReport, CeremonySummary, LocalCeremony, RoundReport, RoundSummary, TaskFactory};
pub use config::NodeConfig;
pub use error::{NodeError, Result};
