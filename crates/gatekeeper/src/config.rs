//! Configuration management for the gatekeeper.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use gate_common::constants::{
    DEFAULT_CHANGES_ALLOWED, DEFAULT_REDIS_URL, MAX_GRID_DIMENSION, group_defaults,
};
use gate_common::{EnforceMode, GroupAuthConfig, GroupInfo};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// User id of the bot identity whose sessions are served
    #[serde(default)]
    pub bot_user_id: i64,

    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Session store backend
    #[serde(default)]
    pub store_backend: StoreBackend,

    /// Audit channel chat id (0 disables channel posts)
    #[serde(default)]
    pub audit_channel_id: i64,

    /// Data file locations
    #[serde(default)]
    pub data: DataConfig,

    /// Challenge rendering configuration
    #[serde(default)]
    pub challenge: ChallengeConfig,

    /// Defaults for groups seen for the first time
    #[serde(default)]
    pub group_defaults: GroupDefaultsConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Redis,
    Memory,
}

/// Compound data and per-group files
#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_candidate_path")]
    pub candidate_path: String,

    #[serde(default = "default_index_path")]
    pub index_path: String,

    /// Plain or BGZF compressed
    #[serde(default = "default_records_path")]
    pub records_path: String,

    /// Holds `g_{group_id}/anointed.bin`
    #[serde(default = "default_groups_dir")]
    pub groups_dir: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            candidate_path: default_candidate_path(),
            index_path: default_index_path(),
            records_path: default_records_path(),
            groups_dir: default_groups_dir(),
        }
    }
}

/// Challenge-specific configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ChallengeConfig {
    /// Rendered image edge length in pixels
    #[serde(default = "default_image_size")]
    pub image_size: u32,

    #[serde(default = "default_grid_columns")]
    pub grid_columns: u8,

    #[serde(default = "default_grid_rows")]
    pub grid_rows: u8,

    /// Re-rolls granted with each new challenge
    #[serde(default = "default_changes_allowed")]
    pub changes_allowed: u32,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            image_size: default_image_size(),
            grid_columns: default_grid_columns(),
            grid_rows: default_grid_rows(),
            changes_allowed: default_changes_allowed(),
        }
    }
}

/// Applied when a `GroupAuthConfig` is created lazily
#[derive(Debug, Clone, Deserialize)]
pub struct GroupDefaultsConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub enforce_mode: EnforceMode,

    /// 0 = never expire
    #[serde(default = "default_start_auth_timeout")]
    pub start_auth_timeout_secs: u32,

    #[serde(default = "default_auth_procedure_timeout")]
    pub auth_procedure_timeout_secs: u32,
}

impl Default for GroupDefaultsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            enforce_mode: EnforceMode::default(),
            start_auth_timeout_secs: default_start_auth_timeout(),
            auth_procedure_timeout_secs: default_auth_procedure_timeout(),
        }
    }
}

impl GroupDefaultsConfig {
    pub fn apply(&self, group: &GroupInfo) -> GroupAuthConfig {
        GroupAuthConfig {
            is_enabled: self.enabled,
            enforce_mode: self.enforce_mode,
            start_auth_timeout_seconds: self.start_auth_timeout_secs,
            auth_procedure_timeout_seconds: self.auth_procedure_timeout_secs,
            ..GroupAuthConfig::with_defaults(group)
        }
    }
}

/// Token bucket sizes per entry point
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// New challenges per user
    #[serde(default = "default_new_challenge_capacity")]
    pub new_challenge_capacity: u32,
    #[serde(default = "default_new_challenge_refill")]
    pub new_challenge_refill_ms: u64,

    /// Button presses per user
    #[serde(default = "default_callback_capacity")]
    pub callback_capacity: u32,
    #[serde(default = "default_callback_refill")]
    pub callback_refill_ms: u64,

    /// Private commands per user
    #[serde(default = "default_command_capacity")]
    pub command_capacity: u32,
    #[serde(default = "default_command_refill")]
    pub command_refill_ms: u64,

    /// Private events across all users, checked first
    #[serde(default = "default_anti_shock_capacity")]
    pub anti_shock_capacity: u32,
    #[serde(default = "default_anti_shock_refill")]
    pub anti_shock_refill_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            new_challenge_capacity: default_new_challenge_capacity(),
            new_challenge_refill_ms: default_new_challenge_refill(),
            callback_capacity: default_callback_capacity(),
            callback_refill_ms: default_callback_refill(),
            command_capacity: default_command_capacity(),
            command_refill_ms: default_command_refill(),
            anti_shock_capacity: default_anti_shock_capacity(),
            anti_shock_refill_ms: default_anti_shock_refill(),
        }
    }
}

impl RateLimitConfig {
    pub fn new_challenge(&self) -> (u32, Duration) {
        (self.new_challenge_capacity, Duration::from_millis(self.new_challenge_refill_ms))
    }

    pub fn callback(&self) -> (u32, Duration) {
        (self.callback_capacity, Duration::from_millis(self.callback_refill_ms))
    }

    pub fn command(&self) -> (u32, Duration) {
        (self.command_capacity, Duration::from_millis(self.command_refill_ms))
    }

    pub fn anti_shock(&self) -> (u32, Duration) {
        (self.anti_shock_capacity, Duration::from_millis(self.anti_shock_refill_ms))
    }
}

// Default value functions
fn default_redis_url() -> String { DEFAULT_REDIS_URL.to_string() }
fn default_candidate_path() -> String { "data/candidates.bin".to_string() }
fn default_index_path() -> String { "data/index.bin".to_string() }
fn default_records_path() -> String { "data/records.sdf.gz".to_string() }
fn default_groups_dir() -> String { "data/groups".to_string() }
fn default_image_size() -> u32 { 720 }
fn default_grid_columns() -> u8 { 5 }
fn default_grid_rows() -> u8 { 3 }
fn default_changes_allowed() -> u32 { DEFAULT_CHANGES_ALLOWED }
fn default_enabled() -> bool { group_defaults::ENABLED }
fn default_start_auth_timeout() -> u32 { group_defaults::START_AUTH_TIMEOUT_SECS } // 12 minutes
fn default_auth_procedure_timeout() -> u32 { group_defaults::AUTH_PROCEDURE_TIMEOUT_SECS } // 10 minutes
fn default_new_challenge_capacity() -> u32 { 2 }
fn default_new_challenge_refill() -> u64 { 5000 }
fn default_callback_capacity() -> u32 { 3 }
fn default_callback_refill() -> u64 { 500 }
fn default_command_capacity() -> u32 { 4 }
fn default_command_refill() -> u64 { 500 }
fn default_anti_shock_capacity() -> u32 { 3 }
fn default_anti_shock_refill() -> u64 { 100 }

/// Values given on the command line or in the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub redis_url: Option<String>,
    pub bot_user_id: Option<i64>,
}

impl AppConfig {
    /// Load configuration from file, with CLI overrides
    pub fn load(config_path: &str, overrides: &ConfigOverrides) -> Result<Self> {
        let mut config = if Path::new(config_path).exists() {
            let settings = config::Config::builder()
                .add_source(config::File::with_name(config_path))
                .build()
                .context("Failed to load config file")?;

            settings
                .try_deserialize()
                .context("Failed to parse config")?
        } else {
            // Use defaults if config file doesn't exist
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
            Self::default()
        };

        // Apply CLI overrides
        if let Some(ref redis_url) = overrides.redis_url {
            config.redis_url = redis_url.clone();
        }
        if let Some(bot_user_id) = overrides.bot_user_id {
            config.bot_user_id = bot_user_id;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let grid = 1..=MAX_GRID_DIMENSION;
        if !grid.contains(&self.challenge.grid_columns) || !grid.contains(&self.challenge.grid_rows) {
            bail!(
                "challenge grid {}x{} outside 1..={}",
                self.challenge.grid_columns,
                self.challenge.grid_rows,
                MAX_GRID_DIMENSION
            );
        }
        if self.challenge.image_size == 0 {
            bail!("challenge image size must be positive");
        }

        let sample = GroupInfo {
            group_id: 1,
            name: String::new(),
        };
        self.group_defaults
            .apply(&sample)
            .validate()
            .context("Invalid [group_defaults]")?;

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bot_user_id: 0,
            redis_url: default_redis_url(),
            store_backend: StoreBackend::default(),
            audit_channel_id: 0,
            data: DataConfig::default(),
            challenge: ChallengeConfig::default(),
            group_defaults: GroupDefaultsConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.challenge.grid_columns, 5);
        assert_eq!(config.challenge.grid_rows, 3);
        assert_eq!(config.rate_limit.new_challenge(), (2, Duration::from_millis(5000)));
        assert_eq!(config.rate_limit.anti_shock(), (3, Duration::from_millis(100)));
    }

    #[test]
    fn test_load_with_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gatekeeper.toml");
        std::fs::write(
            &path,
            "bot_user_id = 11\nstore_backend = \"memory\"\n\n[challenge]\ngrid_columns = 4\n\n[group_defaults]\nenforce_mode = \"no_hint\"\n",
        )
        .unwrap();

        let overrides = ConfigOverrides {
            redis_url: Some("redis://cache:6379".to_string()),
            bot_user_id: None,
        };
        let config = AppConfig::load(path.to_str().unwrap(), &overrides).unwrap();

        assert_eq!(config.bot_user_id, 11);
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.redis_url, "redis://cache:6379");
        assert_eq!(config.challenge.grid_columns, 4);
        assert_eq!(config.challenge.grid_rows, 3);
        assert_eq!(config.group_defaults.enforce_mode, EnforceMode::NoHint);
    }

    #[test]
    fn test_rejects_oversized_grid() {
        let mut config = AppConfig::default();
        config.challenge.grid_rows = 17;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_group_defaults_apply() {
        let group = GroupInfo {
            group_id: 9,
            name: "g".to_string(),
        };
        let config = GroupDefaultsConfig {
            start_auth_timeout_secs: 0,
            ..Default::default()
        }
        .apply(&group);
        assert_eq!(config.group_id, 9);
        assert_eq!(config.start_auth_timeout_seconds, 0);
        assert!(config.validate().is_ok());
    }
}
