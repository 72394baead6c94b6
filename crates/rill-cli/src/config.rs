//! Demo runner configuration
//!
//! Loaded from `~/.rill/config.toml`; every field is optional. Command line
//! flags override whatever the file says.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Effective configuration for a demo run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RillConfig {
    /// Timer period of interval-driven producers
    pub interval_ms: u64,
    /// Increment between consecutive produced values
    pub step: u64,
    /// Number of values each producer emits before completing
    pub count: u64,
    /// Delay before the `dispose` scenario cancels its subscription
    pub dispose_after_ms: u64,
    /// Longest wait for a terminal event before giving up
    pub timeout_ms: u64,
    /// Fallback log filter when RUST_LOG is not set
    pub log_level: String,
    /// Print events as JSON lines instead of debug text
    pub json: bool,
}

impl Default for RillConfig {
    fn default() -> Self {
        Self {
            interval_ms: 10,
            step: 100,
            count: 3,
            dispose_after_ms: 50,
            timeout_ms: 1000,
            log_level: "info".to_string(),
            json: false,
        }
    }
}

/// Values given on the command line, applied on top of the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub interval_ms: Option<u64>,
    pub step: Option<u64>,
    pub count: Option<u64>,
    pub dispose_after_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub log_level: Option<String>,
    pub json: bool,
}

impl RillConfig {
    /// `~/.rill/config.toml`, if a home directory can be found
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".rill").join("config.toml"))
    }

    /// Load from `path`. A missing file yields the defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        Self::parse(&content).with_context(|| format!("Failed to parse config file {:?}", path))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply command line overrides
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(interval_ms) = overrides.interval_ms {
            self.interval_ms = interval_ms;
        }
        if let Some(step) = overrides.step {
            self.step = step;
        }
        if let Some(count) = overrides.count {
            self.count = count;
        }
        if let Some(dispose_after_ms) = overrides.dispose_after_ms {
            self.dispose_after_ms = dispose_after_ms;
        }
        if let Some(timeout_ms) = overrides.timeout_ms {
            self.timeout_ms = timeout_ms;
        }
        if let Some(log_level) = overrides.log_level {
            self.log_level = log_level;
        }
        self.json |= overrides.json;
    }

    /// Reject settings no scenario can run with
    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            bail!("interval_ms must be greater than zero");
        }
        if self.dispose_after_ms == 0 {
            bail!("dispose_after_ms must be greater than zero");
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn dispose_after(&self) -> Duration {
        Duration::from_millis(self.dispose_after_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
