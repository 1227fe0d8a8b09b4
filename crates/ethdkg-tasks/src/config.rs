//! Task configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of blocks before leader election starts widening
pub const DEFAULT_DESPERATION_DELAY: u64 = 40;

/// Default pace at which the allowed leader range widens
pub const DEFAULT_DESPERATION_FACTOR: u64 = 40;

/// Knobs shared by every ceremony task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Pause between retry attempts (milliseconds)
    pub retry_delay_ms: u64,

    /// Retries after the first attempt before giving up
    pub max_retries: u32,

    /// Blocks after a window opens before more validators may lead
    pub desperation_delay: u64,

    /// Controls how quickly the leader range widens after the delay
    pub desperation_factor: u64,

    /// Cap on witness subsets tried while categorizing group signers
    pub categorize_max_subsets: Option<usize>,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            retry_delay_ms: 1_000,
            max_retries: 10,
            desperation_delay: DEFAULT_DESPERATION_DELAY,
            desperation_factor: DEFAULT_DESPERATION_FACTOR,
            categorize_max_subsets: Some(100_000),
        }
    }
}

impl TaskConfig {
    /// Retry delay as a [`Duration`]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
