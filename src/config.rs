//! Configuration loading and management
//!
//! Handles parsing of `.taskflow.toml` configuration files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = ".taskflow.toml";

const MAX_UNDO_WINDOW_MS: u64 = 600_000;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Persistence backend configuration
    #[serde(default)]
    pub backend: BackendConfig,

    /// Task store behavior
    #[serde(default)]
    pub store: StoreSettings,
}

/// Which persistence client the store talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Local,
    Remote,
    Memory,
}

impl std::str::FromStr for BackendKind {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(BackendKind::Local),
            "remote" => Ok(BackendKind::Remote),
            "memory" => Ok(BackendKind::Memory),
            other => Err(Error::InvalidArgument(format!(
                "invalid backend '{other}' (expected local|remote|memory)"
            ))),
        }
    }
}

/// Backend configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend kind
    #[serde(default)]
    pub kind: BackendKind,

    /// Hosted API settings
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Local fallback settings
    #[serde(default)]
    pub local: LocalConfig,
}

/// Hosted backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the task API, without the trailing `/tasks`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Optional bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080/api".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
            token: None,
        }
    }
}

/// Local fallback configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Directory holding the `taskflow/` namespace; defaults to the
    /// platform data directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

/// Which pending removal `undo` restores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UndoPolicy {
    /// One undo slot; a new removal replaces the previous target
    #[default]
    Latest,
    /// Pending removals are undone last-removed-first
    Stack,
}

/// What happens to removals still inside their undo window at shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownPolicy {
    /// Issue the backend deletes immediately
    #[default]
    Purge,
    /// Drop the timers; the backend keeps the tasks
    Discard,
}

/// Task store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Grace period between a removal and the backend delete
    #[serde(default = "default_undo_window_ms")]
    pub undo_window_ms: u64,

    #[serde(default)]
    pub undo_policy: UndoPolicy,

    #[serde(default)]
    pub shutdown_policy: ShutdownPolicy,
}

fn default_undo_window_ms() -> u64 {
    5_000
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            undo_window_ms: default_undo_window_ms(),
            undo_policy: UndoPolicy::default(),
            shutdown_policy: ShutdownPolicy::default(),
        }
    }
}

impl StoreSettings {
    pub fn undo_window(&self) -> Duration {
        Duration::from_millis(self.undo_window_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.undo_window_ms == 0 {
            return Err(Error::InvalidConfig(
                "store.undo_window_ms must be > 0".to_string(),
            ));
        }
        if self.undo_window_ms > MAX_UNDO_WINDOW_MS {
            return Err(Error::InvalidConfig(format!(
                "store.undo_window_ms must be <= {MAX_UNDO_WINDOW_MS}"
            )));
        }
        Ok(())
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        let base = self.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(Error::InvalidConfig(format!(
                "backend.remote.base_url must start with http:// or https:// (got '{base}')"
            )));
        }
        if self.timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "backend.remote.timeout_ms must be > 0".to_string(),
            ));
        }
        if let Some(token) = &self.token {
            if token.trim().is_empty() {
                return Err(Error::InvalidConfig(
                    "backend.remote.token cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from a `.taskflow.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a directory, or return defaults when the
    /// file is missing
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.backend.kind == BackendKind::Remote {
            self.backend.remote.validate()?;
        }
        self.store.validate()?;
        Ok(())
    }
}
