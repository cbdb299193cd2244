//! Time-based one-time codes (RFC 6238 over RFC 4226 HOTP)
//!
//! `counter = floor(timestamp_ms / 1000 / period)`, HMAC-SHA1 over the big-endian
//! counter, dynamic truncation, `mod 10^digits`, zero-padded.

use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use seedguard_core::{AsymmetricKey, CryptoError, PublicKeyBytes};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroizing;

use crate::config::TotpConfig;
use crate::shard::base64_bytes;
use crate::RecoveryError;

type HmacSha1 = Hmac<Sha1>;

/// Code generator for one TOTP configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totp {
    config: TotpConfig,
}

impl Default for Totp {
    fn default() -> Self {
        Self {
            config: TotpConfig::default(),
        }
    }
}

impl Totp {
    pub fn new(config: TotpConfig) -> Result<Self, RecoveryError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TotpConfig {
        &self.config
    }

    pub fn period_millis(&self) -> u64 {
        self.config.period_secs.saturating_mul(1000)
    }

    pub fn counter(&self, timestamp_millis: u64) -> u64 {
        timestamp_millis / 1000 / self.config.period_secs
    }

    /// Code for the time step containing `timestamp_millis`
    pub fn derive_code(&self, secret: &[u8], timestamp_millis: u64) -> String {
        self.code_for_counter(secret, self.counter(timestamp_millis))
    }

    /// HOTP value for an explicit counter
    pub fn code_for_counter(&self, secret: &[u8], counter: u64) -> String {
        let mut mac =
            <HmacSha1 as Mac>::new_from_slice(secret).expect("HMAC accepts keys of any length");
        mac.update(&counter.to_be_bytes());
        let hash = mac.finalize().into_bytes();

        let offset = (hash[hash.len() - 1] & 0x0f) as usize;
        let binary = u32::from_be_bytes([
            hash[offset],
            hash[offset + 1],
            hash[offset + 2],
            hash[offset + 3],
        ]) & 0x7fff_ffff;

        let digits = self.config.digits;
        format!(
            "{:0width$}",
            binary % 10u32.pow(digits),
            width = digits as usize
        )
    }

    /// Fresh random secret of the configured length
    pub fn generate_secret(&self) -> TotpSecret {
        TotpSecret::generate(self.config.secret_len)
    }
}

/// Shared TOTP secret, zeroized on drop
#[derive(Clone, PartialEq, Eq)]
pub struct TotpSecret(Zeroizing<Vec<u8>>);

impl TotpSecret {
    pub fn generate(len: usize) -> Self {
        let mut bytes = Zeroizing::new(vec![0u8; len]);
        OsRng.fill_bytes(&mut bytes[..]);
        Self(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// SHA-256 of the secret; identifies it without retaining it
    pub fn fingerprint(&self) -> [u8; 32] {
        Sha256::digest(self.as_bytes()).into()
    }

    /// Encrypt for the device that will verify codes
    pub fn encrypt_for(&self, device: &PublicKeyBytes) -> Result<EncryptedTotpSecret, CryptoError> {
        Ok(EncryptedTotpSecret {
            ciphertext: device.encrypt(self.as_bytes())?,
        })
    }
}

impl fmt::Debug for TotpSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TotpSecret(..)")
    }
}

/// A TOTP secret in transit to the verifying device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedTotpSecret {
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
}

impl EncryptedTotpSecret {
    pub fn decrypt(&self, key: &dyn AsymmetricKey) -> Result<TotpSecret, CryptoError> {
        let bytes = key.decrypt(&self.ciphertext)?;
        Ok(TotpSecret::from_bytes(bytes.to_vec()))
    }
}
