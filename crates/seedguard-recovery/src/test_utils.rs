//! Shared test utilities for seedguard-recovery tests.

use seedguard_core::{DeviceKey, KdfParams, OwnerCredentials};

use crate::config::TotpConfig;
use crate::totp::Totp;
use crate::verification::TotpVerifier;

/// RFC 4226 Appendix D test secret
pub const RFC_SECRET: &[u8] = b"12345678901234567890";

/// Deterministic device key: `[0x01, 0x00, ..., 0x00, seed]`
pub fn test_device_key(seed_byte: u8) -> DeviceKey {
    let mut secret_bytes = [0u8; 32];
    secret_bytes[31] = seed_byte;
    secret_bytes[0] = 0x01;
    DeviceKey::from_bytes(&secret_bytes).unwrap()
}

/// Owner credentials with cheap Argon2id parameters
pub fn test_owner_credentials(secret: &str) -> OwnerCredentials {
    let params = KdfParams {
        m_cost: 256,
        t_cost: 1,
        p_cost: 1,
    };
    OwnerCredentials::new(secret, "owner@example.com", params)
}

pub fn test_verifier() -> TotpVerifier {
    TotpVerifier::new(Totp::new(TotpConfig::default()).unwrap())
}
