//! Engine configuration
//!
//! Everything a deployment must agree on: the field order, the TOTP parameters and the
//! owner key-derivation cost. Every section falls back to its defaults when omitted.
//!
//! ```toml
//! log_level = "info"
//!
//! [field]
//! order_hex = "c000...854f"
//!
//! [totp]
//! period_secs = 60
//! digits = 6
//! skew_periods = 1
//! secret_len = 20
//!
//! [owner_kdf]
//! m_cost = 65536
//! t_cost = 3
//! p_cost = 4
//! ```

use seedguard_core::KdfParams;
use seedguard_shamir::{is_probable_prime, PrimeField, SecretSharer, DEFAULT_ORDER_HEX};
use serde::{Deserialize, Serialize};

use crate::protocol::KeyRecovery;
use crate::totp::Totp;
use crate::verification::TotpVerifier;
use crate::RecoveryError;

/// Miller-Rabin rounds used to validate a configured order
const PRIMALITY_ROUNDS: usize = 32;

/// Shortest TOTP secret accepted (RFC 4226 minimum, 128 bits)
pub const MIN_TOTP_SECRET_LEN: usize = 16;

/// Orders must exceed 256 bits so every secp256k1 scalar and participant id fits
pub const MIN_ORDER_BITS: u64 = 257;

/// Longest TOTP period accepted (one day)
pub const MAX_TOTP_PERIOD_SECS: u64 = 86_400;

const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub field: FieldConfig,

    #[serde(default)]
    pub totp: TotpConfig,

    /// Argon2id cost for re-deriving the owner's shard key
    #[serde(default)]
    pub owner_kdf: KdfParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            field: FieldConfig::default(),
            totp: TotpConfig::default(),
            owner_kdf: KdfParams::default(),
        }
    }
}

/// Prime field settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Field order as big-endian hex
    #[serde(default = "default_order_hex")]
    pub order_hex: String,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            order_hex: default_order_hex(),
        }
    }
}

/// TOTP settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotpConfig {
    /// Time step in seconds
    #[serde(default = "default_period_secs")]
    pub period_secs: u64,

    /// Code length
    #[serde(default = "default_digits")]
    pub digits: u32,

    /// Periods of clock skew tolerated either side of the assertion timestamp
    #[serde(default = "default_skew_periods")]
    pub skew_periods: u64,

    /// Random bytes in a freshly generated secret
    #[serde(default = "default_secret_len")]
    pub secret_len: usize,
}

impl Default for TotpConfig {
    fn default() -> Self {
        Self {
            period_secs: default_period_secs(),
            digits: default_digits(),
            skew_periods: default_skew_periods(),
            secret_len: default_secret_len(),
        }
    }
}

impl TotpConfig {
    pub fn validate(&self) -> Result<(), RecoveryError> {
        if self.period_secs == 0 || self.period_secs > MAX_TOTP_PERIOD_SECS {
            return Err(RecoveryError::InvalidConfig(format!(
                "totp.period_secs must be between 1 and {}, got {}",
                MAX_TOTP_PERIOD_SECS, self.period_secs
            )));
        }
        if !(1..=9).contains(&self.digits) {
            return Err(RecoveryError::InvalidConfig(format!(
                "totp.digits must be between 1 and 9, got {}",
                self.digits
            )));
        }
        if self.secret_len < MIN_TOTP_SECRET_LEN {
            return Err(RecoveryError::InvalidConfig(format!(
                "totp.secret_len must be at least {} bytes",
                MIN_TOTP_SECRET_LEN
            )));
        }
        Ok(())
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_order_hex() -> String {
    DEFAULT_ORDER_HEX.to_string()
}

fn default_period_secs() -> u64 {
    60
}

fn default_digits() -> u32 {
    6
}

fn default_skew_periods() -> u64 {
    1
}

fn default_secret_len() -> usize {
    20
}

impl EngineConfig {
    /// Validate every section
    pub fn validate(&self) -> Result<(), RecoveryError> {
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(RecoveryError::InvalidConfig(format!(
                "log_level must be one of {:?}, got '{}'",
                LOG_LEVELS, self.log_level
            )));
        }

        let field = self.field()?;
        if field.bits() < MIN_ORDER_BITS {
            return Err(RecoveryError::InvalidConfig(format!(
                "field.order_hex must be at least {} bits, got {}",
                MIN_ORDER_BITS,
                field.bits()
            )));
        }
        if !is_probable_prime(field.order(), PRIMALITY_ROUNDS) {
            return Err(RecoveryError::InvalidConfig(format!(
                "field.order_hex is not prime: {}",
                self.field.order_hex
            )));
        }

        self.totp.validate()?;

        self.owner_kdf
            .validate()
            .map_err(|e| RecoveryError::InvalidConfig(format!("owner_kdf: {}", e)))?;

        Ok(())
    }

    /// The configured prime field (not checked for primality; see [`EngineConfig::validate`])
    pub fn field(&self) -> Result<PrimeField, RecoveryError> {
        PrimeField::from_hex(&self.field.order_hex)
            .map_err(|e| RecoveryError::InvalidConfig(format!("field.order_hex: {}", e)))
    }

    pub fn totp(&self) -> Result<Totp, RecoveryError> {
        Totp::new(self.totp)
    }

    pub fn verifier(&self) -> Result<TotpVerifier, RecoveryError> {
        Ok(TotpVerifier::new(self.totp()?))
    }

    pub fn key_recovery(&self) -> Result<KeyRecovery, RecoveryError> {
        Ok(KeyRecovery::new(SecretSharer::new(self.field()?)))
    }
}
