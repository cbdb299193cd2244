//! SeedGuard Core
//!
//! Key material and primitives shared by the recovery engine.
//!
//! # Key Hierarchy
//!
//! - Seed phrases are encrypted under a random **master key** (AES-256-GCM)
//! - The master key is wrapped under an **intermediate key** (secp256k1 scalar)
//! - The intermediate key is what gets threshold-shared among approvers
//!
//! # Identity Keys
//!
//! Participants are reached through the [`AsymmetricKey`] capability. The owner's own
//! shard key is re-derived from credentials with Argon2id.

pub mod crypto;
pub mod hierarchy;
pub mod keys;
pub mod seed;

#[cfg(test)]
pub(crate) mod test_utils;

pub use crypto::{CryptoError, KdfParams, OwnerCredentials, SealedBox};
pub use hierarchy::{IntermediateKey, MasterKey};
pub use keys::{AsymmetricKey, DeviceKey, PublicKeyBytes};
pub use seed::{decrypt_seed_phrase, encrypt_seed_phrase, EncryptedSeedPhrase, SeedError};

// Re-exported so downstream crates agree on the secp256k1 version
pub use secp256k1;
