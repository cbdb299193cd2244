//! SeedGuard Shamir Module
//!
//! Threshold secret sharing over a large prime field.
//!
//! # Layers
//!
//! - [`field`]: arithmetic in GF(p) for a configured prime order
//! - [`matrix`]: Vandermonde matrices and LUP inversion used for interpolation
//! - [`shamir`]: split, recover and re-share secrets
//!
//! # Example: 2-of-3 split
//!
//! ```
//! use seedguard_shamir::{PrimeField, SecretSharer};
//!
//! let sharer = SecretSharer::new(PrimeField::default());
//! let field = sharer.field().clone();
//!
//! let secret = field.from_u64(424242);
//! let ids: Vec<_> = (1..=3).map(|i| field.from_u64(i)).collect();
//!
//! let shares = sharer.split(&secret, 2, &ids).unwrap();
//!
//! // Recover with any 2 shares
//! let recovered = sharer.recover(&shares[1..3]).unwrap();
//! assert_eq!(recovered, secret);
//! ```

pub mod field;
pub mod matrix;
pub mod shamir;

// Re-exports
pub use field::{is_probable_prime, FieldElement, PrimeField, DEFAULT_ORDER_HEX};
pub use matrix::{vandermonde, LupDecomposition, Matrix};
pub use shamir::{Point, ResharedShare, SecretSharer};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShamirError {
    #[error("Invalid threshold: need at least 1")]
    InvalidThreshold,
    #[error("Threshold {threshold} exceeds participant count {participants}")]
    InsufficientParticipants { threshold: usize, participants: usize },
    #[error("Not enough shares to reconstruct")]
    InsufficientShares,
    #[error("Duplicate participant id (singular interpolation matrix)")]
    DuplicateParticipant,
    #[error("Participant id must be nonzero")]
    ZeroParticipantId,
    #[error("Division by zero in field arithmetic")]
    DivisionByZero,
    #[error("Invalid share: {0}")]
    InvalidShare(String),
    #[error("Invalid field order: {0}")]
    InvalidOrder(String),
}
