//! CLI configuration: parsed from TOML file + environment variable overrides.
//!
//! Priority: environment variables > config file > defaults.

use anyhow::{Context, Result};
use seedguard_recovery::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Engine settings shared by every party of a deployment
    #[serde(default)]
    pub engine: EngineConfig,
}

impl CliConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CliConfig =
            toml::from_str(&contents).with_context(|| "Failed to parse TOML config")?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `SEEDGUARD_LOG_LEVEL`
    /// - `SEEDGUARD_FIELD_ORDER`
    /// - `SEEDGUARD_TOTP_PERIOD`
    /// - `SEEDGUARD_TOTP_DIGITS`
    /// - `SEEDGUARD_TOTP_SKEW`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("SEEDGUARD_LOG_LEVEL") {
            self.engine.log_level = v;
        }
        if let Ok(v) = std::env::var("SEEDGUARD_FIELD_ORDER") {
            self.engine.field.order_hex = v;
        }
        if let Ok(v) = std::env::var("SEEDGUARD_TOTP_PERIOD") {
            if let Ok(secs) = v.parse::<u64>() {
                self.engine.totp.period_secs = secs;
            }
        }
        if let Ok(v) = std::env::var("SEEDGUARD_TOTP_DIGITS") {
            if let Ok(digits) = v.parse::<u32>() {
                self.engine.totp.digits = digits;
            }
        }
        if let Ok(v) = std::env::var("SEEDGUARD_TOTP_SKEW") {
            if let Ok(periods) = v.parse::<u64>() {
                self.engine.totp.skew_periods = periods;
            }
        }
    }

    /// Validate that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;
        Ok(())
    }
}
