//! Configuration loading and config file resolution
//!
//! # Config file priority
//!
//! 1. Command-line argument (highest priority)
//! 2. `CRMDASH_CONFIG` environment variable
//! 3. `<config_dir>/crmdash/config.toml`
//! 4. Compiled defaults (fallback)
//!
//! A missing file is not an error: the runner starts on defaults and logs a
//! warning.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{info, warn};

use crate::aggregator::DEFAULT_MEMBER_SALES_TARGET;
use crate::pipeline::{default_canonical_stages, CanonicalStage};
use crate::snapshot::GoalSettings;
use crate::users::{DirectoryEntry, RoleOverrides, TeamDirectory};
use crate::window::{DateRangePreset, DateWindow};
use crate::{Error, Result};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "CRMDASH_CONFIG";

/// Default webhook request timeout (3 minutes)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 180;

/// Default poll interval in watch mode
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;

/// Configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Webhook endpoint serving the CRM export
    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Delay between fetches in watch mode
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Sales target assigned to every team member
    #[serde(default = "default_member_sales_target")]
    pub member_sales_target: f64,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub goals: GoalSettings,

    /// Known team members, in matching order
    #[serde(default)]
    pub team: Vec<DirectoryEntry>,

    /// Role overrides by member id
    #[serde(default)]
    pub roles: RoleOverrides,

    #[serde(default)]
    pub window: WindowConfig,

    /// Canonical stage order; empty means the built-in funnel
    #[serde(default)]
    pub stages: Vec<CanonicalStage>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Reporting window selection
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WindowConfig {
    #[serde(default)]
    pub preset: DateRangePreset,
    #[serde(default)]
    pub start: Option<NaiveDate>,
    #[serde(default)]
    pub end: Option<NaiveDate>,
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_member_sales_target() -> f64 {
    DEFAULT_MEMBER_SALES_TARGET
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            member_sales_target: DEFAULT_MEMBER_SALES_TARGET,
            logging: LoggingConfig::default(),
            goals: GoalSettings::default(),
            team: Vec::new(),
            roles: RoleOverrides::new(),
            window: WindowConfig::default(),
            stages: Vec::new(),
        }
    }
}

impl WindowConfig {
    /// Resolve against `today`.
    pub fn resolve(&self, today: NaiveDate) -> DateWindow {
        DateWindow::for_preset(self.preset, self.start, self.end, today)
    }
}

impl TomlConfig {
    /// Parse and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TomlConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the highest-priority config file, or defaults when none exists.
    ///
    /// Returns the config and the path it came from.
    pub fn load_or_default(cli_arg: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        match resolve_config_path(cli_arg) {
            Some(path) if path.exists() => {
                let config = Self::load(&path)?;
                info!(path = %path.display(), team = config.team.len(), "Loaded configuration");
                Ok((config, Some(path)))
            }
            Some(path) => {
                warn!(path = %path.display(), "Config file not found, using defaults");
                Ok((Self::default(), None))
            }
            None => {
                warn!("No config directory available, using defaults");
                Ok((Self::default(), None))
            }
        }
    }

    /// Reject settings the runner cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            return Err(Error::Config("request_timeout_secs must be positive".to_string()));
        }
        if self.poll_interval_secs == 0 {
            return Err(Error::Config("poll_interval_secs must be positive".to_string()));
        }
        if let Some(url) = &self.webhook_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::Config(format!("webhook_url is not an HTTP URL: {}", url)));
            }
        }
        if !self.member_sales_target.is_finite() || self.member_sales_target < 0.0 {
            return Err(Error::Config("member_sales_target must be non-negative".to_string()));
        }
        for (idx, member) in self.team.iter().enumerate() {
            if member.id.trim().is_empty() {
                return Err(Error::Config(format!("team[{}] has an empty id", idx)));
            }
            if self.team[..idx].iter().any(|other| other.id == member.id) {
                return Err(Error::Config(format!("Duplicate team member id: {}", member.id)));
            }
        }
        if let (Some(start), Some(end)) = (self.window.start, self.window.end) {
            if end < start {
                return Err(Error::Config(format!("window end {} precedes start {}", end, start)));
            }
        }
        Ok(())
    }

    pub fn directory(&self) -> TeamDirectory {
        TeamDirectory::new(self.team.clone())
    }

    /// Configured stage order, or the built-in funnel.
    pub fn canonical_stages(&self) -> Vec<CanonicalStage> {
        if self.stages.is_empty() {
            default_canonical_stages()
        } else {
            self.stages.clone()
        }
    }
}

/// Config file path following the priority order in the module docs.
///
/// Only returns `None` when no argument, no environment variable and no
/// platform config directory are available.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    dirs::config_dir().map(|d| d.join("crmdash").join("config.toml"))
}
