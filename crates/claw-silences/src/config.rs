//! Silence store configuration.
//!
//! Loaded from TOML; every field has a default so an empty file is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SilenceError};

/// Path value that selects a private in-memory database.
pub const IN_MEMORY_PATH: &str = ":memory:";

/// Configuration for the background expiry sweep.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SweeperConfig {
    /// Whether expired silences are purged automatically.
    pub enabled: bool,
    /// Seconds between sweeps.
    pub interval_secs: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60,
        }
    }
}

impl SweeperConfig {
    /// Returns the sweep interval as a [`Duration`].
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Main silence store configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SilenceStoreConfig {
    /// Database file, or `:memory:`.
    pub path: PathBuf,
    /// How long SQLite waits on a locked database before failing.
    pub busy_timeout_ms: u64,
    /// Expiry sweep settings.
    pub sweeper: SweeperConfig,
}

impl Default for SilenceStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/silences.db"),
            busy_timeout_ms: 5000,
            sweeper: SweeperConfig::default(),
        }
    }
}

impl SilenceStoreConfig {
    /// Configuration for a private in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::from(IN_MEMORY_PATH),
            ..Self::default()
        }
    }

    /// Configuration for an on-disk store at `path`.
    #[must_use]
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Returns true if the store lives only in memory.
    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == IN_MEMORY_PATH
    }

    /// Returns the busy timeout as a [`Duration`].
    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            SilenceError::Config(format!(
                "failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails validation.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| SilenceError::Config(format!("invalid TOML: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(SilenceError::Config("path cannot be empty".to_string()));
        }

        if self.busy_timeout_ms == 0 {
            return Err(SilenceError::Config(
                "busy_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.sweeper.enabled && self.sweeper.interval_secs == 0 {
            return Err(SilenceError::Config(
                "sweeper.interval_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
