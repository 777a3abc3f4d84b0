use anyhow::{Context, Result, bail};
use pvekit::{Timeouts, ToolPaths};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// System-wide config location
const SYSTEM_CONFIG: &str = "/etc/hostsync/config.toml";

/// Get the per-user config file path
pub fn user_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("hostsync").join("config.toml"))
}

// ============================================================================
// Engine Config
// ============================================================================

/// Engine policy: lock, time bounds and tool locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub lock_path: String,
    pub lock_wait_secs: u64,
    pub timeouts: TimeoutsConfig,
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutsConfig {
    pub read_secs: u64,
    pub stop_secs: u64,
    pub start_secs: u64,
    pub reconfigure_secs: u64,
    pub graceful_stop_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolsConfig {
    pub pct: String,
    pub qm: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_path: "/run/lock/hostsync.lock".to_string(),
            lock_wait_secs: 120,
            timeouts: TimeoutsConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        let defaults = Timeouts::default();
        Self {
            read_secs: defaults.read.as_secs(),
            stop_secs: defaults.stop.as_secs(),
            start_secs: defaults.start.as_secs(),
            reconfigure_secs: defaults.reconfigure.as_secs(),
            graceful_stop_secs: defaults.graceful_stop.as_secs(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        let defaults = ToolPaths::default();
        Self {
            pct: defaults.pct,
            qm: defaults.qm,
        }
    }
}

impl EngineConfig {
    /// Load the engine config.
    ///
    /// An explicit path must exist. Otherwise the system file, then the user
    /// file is used; with neither present the built-in defaults apply.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let candidates = std::iter::once(PathBuf::from(SYSTEM_CONFIG)).chain(user_config_path());
        for path in candidates {
            if path.is_file() {
                return Self::from_file(&path);
            }
        }

        log::debug!("no config file found, using defaults");
        Ok(Self::default())
    }

    /// Load and validate a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read config {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config {}", path.display()))?;
        log::debug!("loaded config {}", path.display());
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let durations = [
            ("lock_wait_secs", self.lock_wait_secs),
            ("timeouts.read_secs", self.timeouts.read_secs),
            ("timeouts.stop_secs", self.timeouts.stop_secs),
            ("timeouts.start_secs", self.timeouts.start_secs),
            ("timeouts.reconfigure_secs", self.timeouts.reconfigure_secs),
            ("timeouts.graceful_stop_secs", self.timeouts.graceful_stop_secs),
        ];
        for (key, value) in durations {
            if value == 0 {
                bail!("{key} must be greater than zero");
            }
        }
        if self.timeouts.graceful_stop_secs >= self.timeouts.stop_secs {
            bail!("timeouts.graceful_stop_secs must be less than timeouts.stop_secs");
        }
        if self.lock_path.trim().is_empty() {
            bail!("lock_path must not be empty");
        }
        if self.tools.pct.trim().is_empty() || self.tools.qm.trim().is_empty() {
            bail!("tools.pct and tools.qm must not be empty");
        }
        Ok(())
    }

    /// Lock file path with `~` and variables expanded
    pub fn lock_path(&self) -> PathBuf {
        let expanded = shellexpand::tilde(&self.lock_path);
        PathBuf::from(expanded.as_ref())
    }

    pub fn lock_wait(&self) -> Duration {
        Duration::from_secs(self.lock_wait_secs)
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            read: Duration::from_secs(self.timeouts.read_secs),
            stop: Duration::from_secs(self.timeouts.stop_secs),
            start: Duration::from_secs(self.timeouts.start_secs),
            reconfigure: Duration::from_secs(self.timeouts.reconfigure_secs),
            graceful_stop: Duration::from_secs(self.timeouts.graceful_stop_secs),
        }
    }

    pub fn tools(&self) -> ToolPaths {
        ToolPaths {
            pct: shellexpand::tilde(&self.tools.pct).into_owned(),
            qm: shellexpand::tilde(&self.tools.qm).into_owned(),
        }
    }
}
