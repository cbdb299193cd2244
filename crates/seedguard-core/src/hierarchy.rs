//! Two-level key hierarchy
//!
//! - **Intermediate key**: a secp256k1 scalar. This is the value that gets
//!   threshold-shared among approvers.
//! - **Master key**: a random AES-256 key that encrypts user data (seed phrases).
//!   It is never shared, only wrapped under the intermediate key.
//!
//! Changing approvers means re-sharing the intermediate key; the wrapped master key
//! and everything it protects stay as they are.

use rand::RngCore;
use secp256k1::SecretKey;
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroizing;

use crate::crypto::{open, seal, CryptoError, SealedBox, KEY_LEN};
use crate::keys::{AsymmetricKey, DeviceKey, PublicKeyBytes};

/// Domain separation for deriving the master-key wrapping key
const WRAP_TAG: &[u8] = b"seedguard/intermediate-wrap/v1";

/// Data-encryption key protecting seed phrases
pub struct MasterKey(Zeroizing<[u8; KEY_LEN]>);

impl MasterKey {
    /// Generate a new random master key
    pub fn generate() -> Self {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        rand::rngs::OsRng.fill_bytes(&mut key[..]);
        Self(key)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != KEY_LEN {
            return Err(CryptoError::InvalidFormat);
        }
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Encrypt user data under the master key
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<SealedBox, CryptoError> {
        seal(&self.0, plaintext)
    }

    pub fn decrypt(&self, sealed: &SealedBox) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        open(&self.0, sealed)
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

/// The threshold-shared key that wraps the master key
#[derive(Clone, Debug)]
pub struct IntermediateKey(DeviceKey);

impl IntermediateKey {
    pub fn generate() -> Self {
        Self(DeviceKey::generate())
    }

    pub fn from_secret_key(secret: SecretKey) -> Self {
        Self(DeviceKey::from_secret_key(secret))
    }

    pub fn secret_key(&self) -> &SecretKey {
        self.0.secret_key()
    }

    /// Public half, recorded alongside the shards to check reconstruction
    pub fn public_key_bytes(&self) -> PublicKeyBytes {
        self.0.public_key_bytes()
    }

    fn wrapping_key(&self) -> Zeroizing<[u8; KEY_LEN]> {
        let scalar = Zeroizing::new(self.0.secret_key().secret_bytes());
        let mut hasher = Sha256::new();
        hasher.update(WRAP_TAG);
        hasher.update(&scalar[..]);
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        key.copy_from_slice(&hasher.finalize());
        key
    }

    /// Encrypt the master key under this intermediate key
    pub fn wrap_master(&self, master: &MasterKey) -> Result<SealedBox, CryptoError> {
        seal(&self.wrapping_key(), master.as_bytes())
    }

    /// Decrypt a master key wrapped by [`IntermediateKey::wrap_master`]
    pub fn unwrap_master(&self, wrapped: &SealedBox) -> Result<MasterKey, CryptoError> {
        let bytes = open(&self.wrapping_key(), wrapped)?;
        MasterKey::from_bytes(&bytes)
    }
}
