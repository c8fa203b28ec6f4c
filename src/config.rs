//! Configuration model.
//!
//! Represents `.warden/config.yaml`. Unknown fields are preserved through a
//! flattened map so hand-edited files survive a rewrite, optional fields have
//! sensible defaults, and values are validated on load.

use crate::error::{Result, WardenError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Configuration for the review workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Git settings
    // =========================================================================
    /// Name of the trunk branch changesets merge into (default: "main").
    #[serde(default = "default_trunk_branch")]
    pub trunk_branch: String,

    /// Committer identity applied when the repository has none configured.
    #[serde(default = "default_bot_name")]
    pub bot_name: String,

    #[serde(default = "default_bot_email")]
    pub bot_email: String,

    // =========================================================================
    // Command execution settings
    // =========================================================================
    /// Seconds before an external git command is killed.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Extra attempts after a lock-held failure (0 disables retrying).
    #[serde(default = "default_lock_retry_limit")]
    pub lock_retry_limit: u32,

    /// Base backoff in milliseconds; doubles per retry.
    #[serde(default = "default_lock_retry_base_ms")]
    pub lock_retry_base_ms: u64,

    /// Extra attempts when a review branch name collides.
    #[serde(default = "default_branch_retry_limit")]
    pub branch_retry_limit: u32,

    /// Unrecognized keys, kept so rewriting the file never drops them.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

fn default_trunk_branch() -> String {
    "main".to_string()
}

fn default_bot_name() -> String {
    "warden".to_string()
}

fn default_bot_email() -> String {
    "warden@localhost".to_string()
}

fn default_command_timeout_secs() -> u64 {
    30
}

fn default_lock_retry_limit() -> u32 {
    4
}

fn default_lock_retry_base_ms() -> u64 {
    100
}

fn default_branch_retry_limit() -> u32 {
    3
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trunk_branch: default_trunk_branch(),
            bot_name: default_bot_name(),
            bot_email: default_bot_email(),
            command_timeout_secs: default_command_timeout_secs(),
            lock_retry_limit: default_lock_retry_limit(),
            lock_retry_base_ms: default_lock_retry_base_ms(),
            branch_retry_limit: default_branch_retry_limit(),
            extra: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load config from a YAML file. A missing file yields the defaults so a
    /// freshly initialized workflow works without one.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            WardenError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| WardenError::UserError(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to a YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            WardenError::UserError(format!("failed to serialize config to YAML: {}", e))
        })
    }

    /// Validate config values.
    ///
    /// Rules:
    /// - `trunk_branch` must be non-empty
    /// - `command_timeout_secs` must be positive
    /// - `lock_retry_base_ms` must be positive
    /// - `bot_name` and `bot_email` must be non-empty
    pub fn validate(&self) -> Result<()> {
        if self.trunk_branch.trim().is_empty() {
            return Err(WardenError::UserError(
                "config validation failed: trunk_branch must be non-empty".to_string(),
            ));
        }

        if self.command_timeout_secs == 0 {
            return Err(WardenError::UserError(
                "config validation failed: command_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.lock_retry_base_ms == 0 {
            return Err(WardenError::UserError(
                "config validation failed: lock_retry_base_ms must be greater than 0".to_string(),
            ));
        }

        if self.bot_name.trim().is_empty() || self.bot_email.trim().is_empty() {
            return Err(WardenError::UserError(
                "config validation failed: bot_name and bot_email must be non-empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Command timeout as a `Duration`.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Backoff base as a `Duration`.
    pub fn lock_retry_base(&self) -> Duration {
        Duration::from_millis(self.lock_retry_base_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.trunk_branch, "main");
        assert_eq!(config.command_timeout_secs, 30);
        assert_eq!(config.lock_retry_limit, 4);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let config = Config::load(temp.path().join("config.yaml")).unwrap();
        assert_eq!(config.trunk_branch, "main");
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let config = Config::from_yaml("trunk_branch: develop\n").unwrap();
        assert_eq!(config.trunk_branch, "develop");
        assert_eq!(config.command_timeout_secs, 30);
        assert_eq!(config.bot_name, "warden");
    }

    #[test]
    fn unknown_keys_are_preserved() {
        let config = Config::from_yaml("trunk_branch: main\ndashboard_port: 8080\n").unwrap();
        assert!(config.extra.contains_key("dashboard_port"));

        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("dashboard_port"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = Config::from_yaml("command_timeout_secs: 0\n").unwrap_err();
        assert!(err.to_string().contains("command_timeout_secs"));
    }

    #[test]
    fn empty_trunk_branch_is_rejected() {
        let err = Config::from_yaml("trunk_branch: \"\"\n").unwrap_err();
        assert!(err.to_string().contains("trunk_branch"));
    }

    #[test]
    fn empty_bot_identity_is_rejected() {
        let err = Config::from_yaml("bot_name: \"\"\n").unwrap_err();
        assert!(err.to_string().contains("bot_name"));
    }

    #[test]
    fn durations_convert_from_raw_fields() {
        let config = Config::from_yaml("command_timeout_secs: 5\nlock_retry_base_ms: 250\n").unwrap();
        assert_eq!(config.command_timeout(), Duration::from_secs(5));
        assert_eq!(config.lock_retry_base(), Duration::from_millis(250));
    }

    #[test]
    fn round_trips_through_yaml() {
        let mut config = Config::default();
        config.trunk_branch = "trunk".to_string();
        config.lock_retry_limit = 7;

        let yaml = config.to_yaml().unwrap();
        let parsed = Config::from_yaml(&yaml).unwrap();

        assert_eq!(parsed.trunk_branch, "trunk");
        assert_eq!(parsed.lock_retry_limit, 7);
    }
}
