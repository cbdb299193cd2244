//! Approval session
//!
//! One approver confirming one prover (normally the owner) before releasing a shard:
//!
//! ```text
//! Requested --accept_secret--> VerificationPending --submit--> Confirmed
//!                                      |                  \--> Rejected
//!                                      \------reject---------> Rejected
//! ```
//!
//! The TOTP secret lives only while the session is pending. Once the session ends,
//! its fingerprint goes into [`UsedSecrets`] and the same secret is refused from then on.

use seedguard_core::{AsymmetricKey, PublicKeyBytes};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::protocol;
use crate::shard::EncryptedShard;
use crate::totp::{EncryptedTotpSecret, TotpSecret};
use crate::verification::{TotpVerifier, VerificationAssertion, VerificationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Requested,
    VerificationPending,
    Confirmed,
    Rejected,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Confirmed | SessionState::Rejected)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Requested => "requested",
            SessionState::VerificationPending => "verification pending",
            SessionState::Confirmed => "confirmed",
            SessionState::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// Fingerprints of TOTP secrets that must never be accepted again
#[derive(Debug, Clone, Default)]
pub struct UsedSecrets {
    fingerprints: HashSet<[u8; 32]>,
}

impl UsedSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, secret: &TotpSecret) -> bool {
        self.fingerprints.contains(&secret.fingerprint())
    }

    pub fn retire(&mut self, secret: &TotpSecret) {
        self.fingerprints.insert(secret.fingerprint());
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }
}

/// Verifier-side state for one approval
#[derive(Debug)]
pub struct ApprovalSession {
    state: SessionState,
    prover: PublicKeyBytes,
    secret: Option<TotpSecret>,
    verifier: TotpVerifier,
}

impl ApprovalSession {
    /// Start a session expecting assertions signed by `prover`
    pub fn new(verifier: TotpVerifier, prover: PublicKeyBytes) -> Self {
        log::info!("Approval session requested for {}", prover);
        Self {
            state: SessionState::Requested,
            prover,
            secret: None,
            verifier,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn prover(&self) -> &PublicKeyBytes {
        &self.prover
    }

    fn expect_state(
        &self,
        expected: SessionState,
        label: &'static str,
    ) -> Result<(), VerificationError> {
        if self.state != expected {
            return Err(VerificationError::InvalidState {
                expected: label,
                actual: self.state,
            });
        }
        Ok(())
    }

    /// Receive the TOTP secret, encrypted to this device
    pub fn accept_secret(
        &mut self,
        encrypted: &EncryptedTotpSecret,
        device_key: &dyn AsymmetricKey,
        used: &UsedSecrets,
    ) -> Result<(), VerificationError> {
        self.expect_state(SessionState::Requested, "requested")?;

        let secret = encrypted.decrypt(device_key)?;
        if used.contains(&secret) {
            log::warn!("Refusing previously used TOTP secret");
            return Err(VerificationError::SecretReused);
        }

        self.secret = Some(secret);
        self.state = SessionState::VerificationPending;
        log::info!("Approval session awaiting verification");
        Ok(())
    }

    /// The code to show the prover
    pub fn current_code(&self, now_millis: u64) -> Result<String, VerificationError> {
        self.expect_state(SessionState::VerificationPending, "verification pending")?;
        let secret = self.pending_secret()?;
        Ok(self.verifier.totp().derive_code(secret.as_bytes(), now_millis))
    }

    /// Check the prover's assertion and move to `Confirmed` or `Rejected`.
    ///
    /// On rejection the reason is returned as the error and the session is left in
    /// `Rejected`.
    pub fn submit(
        &mut self,
        assertion: &VerificationAssertion,
        now_millis: u64,
        used: &mut UsedSecrets,
    ) -> Result<SessionState, VerificationError> {
        self.expect_state(SessionState::VerificationPending, "verification pending")?;
        let secret = self.pending_secret()?;

        let outcome = self.verifier.check_freshness(assertion, now_millis).and_then(|_| {
            self.verifier
                .check_assertion(assertion, secret.as_bytes(), &self.prover)
        });

        match outcome {
            Ok(()) => {
                self.finish(SessionState::Confirmed, used);
                log::info!("Approval session confirmed for {}", self.prover);
                Ok(self.state)
            }
            Err(e) => {
                self.finish(SessionState::Rejected, used);
                log::warn!("Approval session rejected: {}", e);
                Err(e)
            }
        }
    }

    /// Abandon a session that has not reached a terminal state
    pub fn reject(&mut self, used: &mut UsedSecrets) -> Result<(), VerificationError> {
        if self.state.is_terminal() {
            return Err(VerificationError::InvalidState {
                expected: "requested or verification pending",
                actual: self.state,
            });
        }
        self.finish(SessionState::Rejected, used);
        log::info!("Approval session cancelled");
        Ok(())
    }

    /// Re-encrypt this approver's shard to the confirmed prover
    pub fn release_shard(
        &self,
        shard: &EncryptedShard,
        approver_key: &dyn AsymmetricKey,
    ) -> Result<EncryptedShard, VerificationError> {
        self.expect_state(SessionState::Confirmed, "confirmed")?;
        let released = protocol::release_shard(shard, approver_key, &self.prover)?;
        log::info!("Released shard {} to {}", shard.participant_id, self.prover);
        Ok(released)
    }

    fn pending_secret(&self) -> Result<&TotpSecret, VerificationError> {
        self.secret.as_ref().ok_or(VerificationError::InvalidState {
            expected: "verification pending",
            actual: self.state,
        })
    }

    /// Drop (and so zeroize) the secret and retire it
    fn finish(&mut self, state: SessionState, used: &mut UsedSecrets) {
        if let Some(secret) = self.secret.take() {
            used.retire(&secret);
        }
        self.state = state;
    }
}
