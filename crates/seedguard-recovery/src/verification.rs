//! Signed TOTP assertions
//!
//! The prover reads the code shown on the verifier's device, signs
//! `UTF8(code) || UTF8(decimal timestamp_ms)` with its identity key and sends the
//! assertion. The code itself never travels: the verifier recomputes the candidates
//! from the shared secret and accepts if the signature matches one of them.

use seedguard_core::{AsymmetricKey, CryptoError, PublicKeyBytes};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::SessionState;
use crate::shard::base64_bytes;
use crate::totp::Totp;

#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("Signature verification failed")]
    SignatureVerificationFailure,
    #[error("No code within the allowed clock skew matches")]
    ClockSkewExceeded,
    #[error("Invalid session state: expected {expected}, was {actual:?}")]
    InvalidState {
        expected: &'static str,
        actual: SessionState,
    },
    #[error("TOTP secret has already been used")]
    SecretReused,
    #[error(transparent)]
    Decryption(#[from] CryptoError),
}

/// A signed claim of knowing the current code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationAssertion {
    /// Only present on the prover's side
    #[serde(skip)]
    pub code: Option<String>,
    pub timestamp_millis: u64,
    #[serde(with = "base64_bytes")]
    pub signature: Vec<u8>,
    pub signer_public_key: PublicKeyBytes,
}

/// The bytes covered by an assertion signature
pub fn signed_message(code: &str, timestamp_millis: u64) -> Vec<u8> {
    format!("{}{}", code, timestamp_millis).into_bytes()
}

/// Builds and checks assertions for one TOTP configuration
#[derive(Debug, Clone, Default)]
pub struct TotpVerifier {
    totp: Totp,
}

impl TotpVerifier {
    pub fn new(totp: Totp) -> Self {
        Self { totp }
    }

    pub fn totp(&self) -> &Totp {
        &self.totp
    }

    /// Sign `code` as observed at `timestamp_millis`
    pub fn build_assertion(
        &self,
        code: &str,
        timestamp_millis: u64,
        signing_key: &dyn AsymmetricKey,
    ) -> Result<VerificationAssertion, VerificationError> {
        let signature = signing_key.sign(&signed_message(code, timestamp_millis))?;
        Ok(VerificationAssertion {
            code: Some(code.to_string()),
            timestamp_millis,
            signature,
            signer_public_key: signing_key.public_key_bytes(),
        })
    }

    /// Check an assertion against the shared secret and the expected signer.
    ///
    /// Candidate codes are derived at `ts + k * period` for `k` in
    /// `-skew_periods..=skew_periods`, each paired with the assertion's own timestamp.
    pub fn check_assertion(
        &self,
        assertion: &VerificationAssertion,
        secret: &[u8],
        expected_signer: &PublicKeyBytes,
    ) -> Result<(), VerificationError> {
        if assertion.signer_public_key != *expected_signer {
            log::warn!("Assertion signed by unexpected key {}", assertion.signer_public_key);
            return Err(VerificationError::SignatureVerificationFailure);
        }

        let period = self.totp.period_millis();
        let skew = self.totp.config().skew_periods;
        let ts = assertion.timestamp_millis;

        let earlier = (1..=skew).filter_map(|k| ts.checked_sub(k.checked_mul(period)?));
        let later = (1..=skew).filter_map(|k| ts.checked_add(k.checked_mul(period)?));

        let matched = std::iter::once(ts)
            .chain(earlier)
            .chain(later)
            .any(|candidate| {
                let code = self.totp.derive_code(secret, candidate);
                expected_signer.verify(&signed_message(&code, ts), &assertion.signature)
            });

        if matched {
            Ok(())
        } else {
            log::warn!("Assertion at {} matched no code within the skew window", ts);
            Err(VerificationError::ClockSkewExceeded)
        }
    }

    pub fn verify_assertion(
        &self,
        assertion: &VerificationAssertion,
        secret: &[u8],
        expected_signer: &PublicKeyBytes,
    ) -> bool {
        self.check_assertion(assertion, secret, expected_signer)
            .is_ok()
    }

    /// Reject assertions stamped too far from the verifier's clock.
    ///
    /// Allows `skew_periods + 1` periods either way: the skew window plus one period
    /// for reading and typing the code.
    pub fn check_freshness(
        &self,
        assertion: &VerificationAssertion,
        now_millis: u64,
    ) -> Result<(), VerificationError> {
        let allowed = self
            .totp
            .config()
            .skew_periods
            .saturating_add(1)
            .saturating_mul(self.totp.period_millis());
        if now_millis.abs_diff(assertion.timestamp_millis) > allowed {
            log::warn!(
                "Assertion timestamp {} too far from verifier clock {}",
                assertion.timestamp_millis,
                now_millis
            );
            return Err(VerificationError::ClockSkewExceeded);
        }
        Ok(())
    }
}
