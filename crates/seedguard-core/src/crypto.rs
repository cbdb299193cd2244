//! Cryptographic utilities
//!
//! Symmetric sealing with AES-256-GCM and password-style key derivation with Argon2id.
//!
//! # Security Notes
//!
//! - Argon2id is memory-hard (resistant to GPU/ASIC attacks)
//! - AES-256-GCM provides authenticated encryption
//! - Each seal uses a fresh random nonce
//! - Derived keys are zeroized on drop

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::keys::DeviceKey;

/// Symmetric key length (AES-256)
pub const KEY_LEN: usize = 32;

/// Nonce length for AES-256-GCM
pub const NONCE_LEN: usize = 12;

/// Authentication tag length for AES-256-GCM
pub const TAG_LEN: usize = 16;

/// Minimum salt length accepted by Argon2
pub const MIN_SALT_LEN: usize = 8;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),
    #[error("Signing failed: {0}")]
    SigningFailed(String),
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid ciphertext format")]
    InvalidFormat,
}

/// AES-256-GCM ciphertext:
/// [nonce (12 bytes)][ciphertext + tag (len + 16 bytes)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBox {
    nonce: [u8; NONCE_LEN],
    ciphertext: Vec<u8>,
}

impl SealedBox {
    /// Serialize to bytes: nonce || ciphertext
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(NONCE_LEN + self.ciphertext.len());
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.ciphertext);
        bytes
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        // An empty plaintext still carries a full tag
        if bytes.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::InvalidFormat);
        }

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&bytes[..NONCE_LEN]);

        Ok(Self {
            nonce,
            ciphertext: bytes[NONCE_LEN..].to_vec(),
        })
    }
}

/// Encrypt `plaintext` under a 256-bit key with a random nonce
pub fn seal(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<SealedBox, CryptoError> {
    let nonce_arr = Aes256Gcm::generate_nonce(&mut OsRng);
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&nonce_arr);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    Ok(SealedBox { nonce, ciphertext })
}

/// Decrypt a [`SealedBox`]
///
/// # Errors
/// Returns error if the key is wrong or the ciphertext was tampered with
pub fn open(key: &[u8; KEY_LEN], sealed: &SealedBox) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(&sealed.nonce), sealed.ciphertext.as_slice())
        .map(Zeroizing::new)
        .map_err(|_| CryptoError::DecryptionFailed("Invalid key or corrupted data".to_string()))
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory in KiB
    pub m_cost: u32,
    /// Iterations
    pub t_cost: u32,
    /// Parallel lanes
    pub p_cost: u32,
}

impl Default for KdfParams {
    /// OWASP recommendations for 2024+: 64 MiB, 3 iterations, 4 lanes
    fn default() -> Self {
        Self {
            m_cost: 65536,
            t_cost: 3,
            p_cost: 4,
        }
    }
}

impl KdfParams {
    fn to_argon2(self) -> Result<Params, CryptoError> {
        Params::new(self.m_cost, self.t_cost, self.p_cost, Some(KEY_LEN))
            .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))
    }

    /// Check the parameters are accepted by Argon2
    pub fn validate(&self) -> Result<(), CryptoError> {
        self.to_argon2().map(|_| ())
    }
}

/// Derive a 256-bit key from a secret and salt using Argon2id
pub fn derive_key(
    secret: &[u8],
    salt: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>, CryptoError> {
    if salt.len() < MIN_SALT_LEN {
        return Err(CryptoError::KeyDerivationFailed(format!(
            "salt must be at least {} bytes",
            MIN_SALT_LEN
        )));
    }

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.to_argon2()?);

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(secret, salt, &mut key[..])
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;

    Ok(key)
}

/// Credentials from which the owner alone can re-derive their shard key.
///
/// The salt is not secret (an account identifier works); the secret is whatever the
/// owner authenticates with.
pub struct OwnerCredentials {
    secret: Zeroizing<Vec<u8>>,
    salt: Vec<u8>,
    params: KdfParams,
}

impl OwnerCredentials {
    pub fn new(secret: impl Into<Vec<u8>>, salt: impl Into<Vec<u8>>, params: KdfParams) -> Self {
        Self {
            secret: Zeroizing::new(secret.into()),
            salt: salt.into(),
            params,
        }
    }

    /// Deterministically derive the owner's shard key
    pub fn derive_key(&self) -> Result<DeviceKey, CryptoError> {
        let bytes = derive_key(&self.secret, &self.salt, &self.params)?;
        DeviceKey::from_bytes(&bytes[..])
            .map_err(|_| CryptoError::KeyDerivationFailed("derived scalar out of range".into()))
    }
}
