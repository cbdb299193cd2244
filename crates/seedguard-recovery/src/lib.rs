//! SeedGuard Recovery
//!
//! Threshold backup and recovery of the intermediate key, plus the TOTP handshake
//! that gates an approver releasing their shard.
//!
//! # Flow
//!
//! 1. The owner calls [`KeyRecovery::create_policy`]: a fresh intermediate key wraps the
//!    master key and is split among the owner and the approvers.
//! 2. To recover, each approver runs an [`ApprovalSession`]: the owner proves liveness
//!    with a signed TOTP code and the approver re-encrypts their shard to the owner's
//!    device.
//! 3. The owner calls [`KeyRecovery::recover_master_key`] with the released shards and
//!    their own, re-derived from credentials.

pub mod config;
pub mod protocol;
pub mod session;
pub mod shard;
pub mod totp;
pub mod verification;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::{EngineConfig, FieldConfig, TotpConfig};
pub use protocol::{
    release_shard, IdentityCapabilities, KeyRecovery, OwnerKeySource, OwnerShard,
    RecoveryPolicy,
};
pub use session::{ApprovalSession, SessionState, UsedSecrets};
pub use shard::{EncryptedShard, Participant, ParticipantId};
pub use totp::{EncryptedTotpSecret, Totp, TotpSecret};
pub use verification::{TotpVerifier, VerificationAssertion, VerificationError};

use seedguard_core::CryptoError;
use seedguard_shamir::ShamirError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error(transparent)]
    Shamir(#[from] ShamirError),
    #[error("Decryption failure: {0}")]
    DecryptionFailure(#[from] CryptoError),
    #[error("Produced share does not belong to any requested participant")]
    BadParticipantId,
    #[error("Failed to retrieve approver key")]
    FailedToRetrieveApproverKey,
    #[error("Recovered key does not match the policy's public key")]
    PublicKeyMismatch,
    #[error("Recovered value is not a valid private key")]
    InvalidKeyMaterial,
    #[error("Need {need} shards to recover, got {have}")]
    InsufficientShares { have: usize, need: usize },
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
