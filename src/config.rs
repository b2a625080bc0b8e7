//! Configuration Management
//!
//! [`ManagerConfig`] drives refresh timing and registry keying.
//! [`Config`] is the optional on-disk file the CLI reads it from.

use crate::resource::IdentityPolicy;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default interval between background refreshes
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Default age after which a snapshot counts as stale
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(2 * 60);

/// Default bound on a single management call
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Runtime settings shared by every manager a registry creates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    pub refresh_interval: Duration,
    pub stale_after: Duration,
    pub request_timeout: Duration,
    pub identity_policy: IdentityPolicy,
    /// Start the background loop when a manager is created
    pub background_refresh: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            stale_after: DEFAULT_STALE_AFTER,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            identity_policy: IdentityPolicy::default(),
            background_refresh: true,
        }
    }
}

impl ManagerConfig {
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_identity_policy(mut self, policy: IdentityPolicy) -> Self {
        self.identity_policy = policy;
        self
    }

    /// Managers fill lazily on first `get` and never refresh on a timer
    pub fn without_background_refresh(mut self) -> Self {
        self.background_refresh = false;
        self
    }
}

/// User configuration file
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub refresh_interval_secs: Option<u64>,
    #[serde(default)]
    pub stale_after_secs: Option<u64>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub identity_policy: Option<IdentityPolicy>,
    /// Endpoints to inspect when none are given on the command line
    #[serde(default)]
    pub endpoints: Vec<String>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("ingest-resources").join("config.json"))
    }

    /// Load configuration from the default location
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load configuration from `path`, falling back to defaults
    pub fn load_from(path: &std::path::Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring invalid config {:?}: {}", path, e);
                Self::default()
            }),
            Err(e) => {
                tracing::warn!("Failed to read config {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Effective manager settings (file > defaults)
    pub fn manager_config(&self) -> ManagerConfig {
        let defaults = ManagerConfig::default();
        ManagerConfig {
            refresh_interval: self
                .refresh_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.refresh_interval),
            stale_after: self
                .stale_after_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.stale_after),
            request_timeout: self
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            identity_policy: self.identity_policy.unwrap_or(defaults.identity_policy),
            background_refresh: defaults.background_refresh,
        }
    }
}
