//! Shared test utilities for seedguard-core tests.

use crate::crypto::KdfParams;
use crate::keys::DeviceKey;

/// Cheap Argon2id parameters so tests stay fast
pub fn test_params() -> KdfParams {
    KdfParams {
        m_cost: 256,
        t_cost: 1,
        p_cost: 1,
    }
}

/// Generate a deterministic device key from a seed byte.
///
/// The secret key is `[0x01, 0x00, ..., 0x00, seed]` (32 bytes).
pub fn test_device_key(seed_byte: u8) -> DeviceKey {
    let mut secret_bytes = [0u8; 32];
    secret_bytes[31] = seed_byte;
    secret_bytes[0] = 0x01;
    DeviceKey::from_bytes(&secret_bytes).unwrap()
}
