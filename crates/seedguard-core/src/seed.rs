//! BIP-39 seed phrase protection
//!
//! Seed phrases are stored as their entropy sealed under the [`MasterKey`].

use bip39::{Language, Mnemonic};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::crypto::{CryptoError, SealedBox};
use crate::hierarchy::MasterKey;

#[derive(Error, Debug)]
pub enum SeedError {
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// A seed phrase encrypted under the master key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedSeedPhrase(SealedBox);

impl EncryptedSeedPhrase {
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SeedError> {
        Ok(Self(SealedBox::from_bytes(bytes)?))
    }
}

/// Generate a new BIP-39 mnemonic (24 words)
pub fn generate_mnemonic() -> Result<Mnemonic, SeedError> {
    Mnemonic::generate_in(Language::English, 24)
        .map_err(|e| SeedError::InvalidMnemonic(e.to_string()))
}

/// Parse a mnemonic from words
pub fn parse_mnemonic(words: &str) -> Result<Mnemonic, SeedError> {
    Mnemonic::parse_in(Language::English, words)
        .map_err(|e| SeedError::InvalidMnemonic(e.to_string()))
}

/// Encrypt a seed phrase's entropy under the master key
pub fn encrypt_seed_phrase(
    master: &MasterKey,
    mnemonic: &Mnemonic,
) -> Result<EncryptedSeedPhrase, SeedError> {
    let entropy = Zeroizing::new(mnemonic.to_entropy());
    Ok(EncryptedSeedPhrase(master.encrypt(&entropy)?))
}

/// Decrypt a seed phrase sealed by [`encrypt_seed_phrase`]
pub fn decrypt_seed_phrase(
    master: &MasterKey,
    encrypted: &EncryptedSeedPhrase,
) -> Result<Mnemonic, SeedError> {
    let entropy = master.decrypt(&encrypted.0)?;
    Mnemonic::from_entropy(&entropy).map_err(|e| SeedError::InvalidMnemonic(e.to_string()))
}
