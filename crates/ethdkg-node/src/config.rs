//! Node configuration

use ethdkg_math::MIN_PARTICIPANTS;
use ethdkg_tasks::TaskConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{NodeError, Result};

/// Ceremony node configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Validators taking part in the first round
    pub validator_count: usize,

    /// Blocks per phase window
    pub phase_length: u64,

    /// Blocks between a phase completing and the next window opening
    pub confirmation_length: u64,

    /// Time between mined blocks (milliseconds)
    pub block_time_ms: u64,

    /// Blocks a single round may take before it is abandoned
    pub max_blocks: u64,

    /// Rounds to attempt before giving up on completion
    pub max_rounds: u32,

    /// Retry and leader election settings shared by every task
    pub tasks: TaskConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            validator_count: 5,
            phase_length: 40,
            confirmation_length: 6,
            block_time_ms: 50,
            max_blocks: 2_000,
            max_rounds: 3,
            tasks: TaskConfig {
                retry_delay_ms: 200,
                ..TaskConfig::default()
            },
        }
    }
}

impl NodeConfig {
    /// Default location, under the user's config directory
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/etc"))
            .join("ethdkg")
            .join("node.json")
    }

    /// Block time as a [`Duration`]
    pub fn block_time(&self) -> Duration {
        Duration::from_millis(self.block_time_ms)
    }

    /// Reject settings no ceremony can run with
    pub fn validate(&self) -> Result<()> {
        if self.validator_count < MIN_PARTICIPANTS {
            return Err(NodeError::Config(format!(
                "at least {} validators are required, got {}",
                MIN_PARTICIPANTS, self.validator_count
            )));
        }
        if self.phase_length == 0 {
            return Err(NodeError::Config("phase_length must be positive".to_string()));
        }
        if self.max_rounds == 0 {
            return Err(NodeError::Config("max_rounds must be positive".to_string()));
        }
        Ok(())
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load `path`, writing the defaults there first if it does not exist
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }
        let config = Self::default();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        config.save(path)?;
        tracing::info!("Created default config at {:?}", path);
        Ok(config)
    }
}
