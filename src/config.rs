//! Configuration
//!
//! Layered configuration through the `config` crate. Precedence, lowest to
//! highest: built-in defaults, the global file
//! (`$XDG_CONFIG_HOME/sandsync/config.toml`), the workspace file
//! (`<workspace>/sandsync.toml`), then `SANDSYNC__*` environment variables.

pub mod facade;
pub mod merge {
    pub mod merge_policy;
    pub mod service;
}
pub mod paths {
    pub mod xdg_root;
}
pub mod sources {
    pub mod environment;
    pub mod global_file;
    pub mod workspace_file;
}

pub use facade::ConfigLoader;
pub use paths::xdg_root as xdg;

use crate::error::{Result, SyncError};
use crate::logging::LoggingConfig;
use crate::session::PromptDetector;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Remote environment settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Absolute remote directory the workspace root maps to
    #[serde(default = "default_base_prefix")]
    pub base_prefix: String,

    /// Local directory backing the sandbox; None means the platform data dir
    #[serde(default)]
    pub sandbox_root: Option<PathBuf>,

    #[serde(default = "default_shell")]
    pub shell: String,
}

fn default_base_prefix() -> String {
    "/home/user".to_string()
}

fn default_shell() -> String {
    "/bin/bash".to_string()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_prefix: default_base_prefix(),
            sandbox_root: None,
            shell: default_shell(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Pull requests landing within this window run as one pull
    #[serde(default = "default_coalesce_window_ms")]
    pub coalesce_window_ms: u64,
}

fn default_coalesce_window_ms() -> u64 {
    50
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            coalesce_window_ms: default_coalesce_window_ms(),
        }
    }
}

impl SyncConfig {
    pub fn coalesce_window(&self) -> Duration {
        Duration::from_millis(self.coalesce_window_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    2000
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Terminal session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Quiet period after a detected prompt before pulling
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_true")]
    pub auto_sync: bool,

    #[serde(default = "default_cols")]
    pub default_cols: u16,

    #[serde(default = "default_rows")]
    pub default_rows: u16,

    /// Regexes appended to the built-in prompt patterns
    #[serde(default)]
    pub extra_prompt_patterns: Vec<String>,
}

fn default_debounce_ms() -> u64 {
    1500
}

fn default_true() -> bool {
    true
}

fn default_cols() -> u16 {
    80
}

fn default_rows() -> u16 {
    24
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            auto_sync: default_true(),
            default_cols: default_cols(),
            default_rows: default_rows(),
            extra_prompt_patterns: Vec::new(),
        }
    }
}

impl SessionsConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SandsyncConfig {
    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default)]
    pub sessions: SessionsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SandsyncConfig {
    pub fn validate(&self) -> Result<()> {
        let base = &self.remote.base_prefix;
        if base.trim_end_matches('/').is_empty() || !base.starts_with('/') {
            return Err(SyncError::ConfigError(format!(
                "remote.base_prefix must be an absolute path below '/', got {:?}",
                base
            )));
        }
        if self.sync.coalesce_window_ms == 0 {
            return Err(SyncError::ConfigError(
                "sync.coalesce_window_ms must be greater than zero".to_string(),
            ));
        }
        if self.watch.poll_interval_ms == 0 {
            return Err(SyncError::ConfigError(
                "watch.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.sessions.debounce_ms == 0 {
            return Err(SyncError::ConfigError(
                "sessions.debounce_ms must be greater than zero".to_string(),
            ));
        }
        if self.sessions.default_cols == 0 || self.sessions.default_rows == 0 {
            return Err(SyncError::ConfigError(
                "sessions.default_cols and default_rows must be greater than zero".to_string(),
            ));
        }
        PromptDetector::new(&self.sessions.extra_prompt_patterns)?;
        self.logging.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SandsyncConfig::default();
        assert_eq!(config.remote.base_prefix, "/home/user");
        assert_eq!(config.remote.shell, "/bin/bash");
        assert_eq!(config.sync.coalesce_window(), Duration::from_millis(50));
        assert_eq!(config.watch.poll_interval(), Duration::from_millis(2000));
        assert_eq!(config.sessions.debounce(), Duration::from_millis(1500));
        assert!(config.sessions.auto_sync);
        assert_eq!(
            (config.sessions.default_cols, config.sessions.default_rows),
            (80, 24)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: SandsyncConfig = toml::from_str(
            r#"
            [watch]
            poll_interval_ms = 500

            [sessions]
            auto_sync = false
            "#,
        )
        .unwrap();
        assert_eq!(config.watch.poll_interval_ms, 500);
        assert!(!config.sessions.auto_sync);
        assert_eq!(config.sessions.debounce_ms, 1500);
        assert_eq!(config.remote.base_prefix, "/home/user");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = SandsyncConfig::default();
        config.remote.base_prefix = "relative/path".to_string();
        assert!(matches!(config.validate(), Err(SyncError::ConfigError(_))));

        let mut config = SandsyncConfig::default();
        config.remote.base_prefix = "/".to_string();
        assert!(config.validate().is_err());

        let mut config = SandsyncConfig::default();
        config.watch.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = SandsyncConfig::default();
        config.sessions.extra_prompt_patterns = vec!["[".to_string()];
        assert!(config.validate().is_err());
    }
}
