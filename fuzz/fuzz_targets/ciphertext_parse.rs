#![no_main]

use libfuzzer_sys::fuzz_target;
use seedguard_core::{AsymmetricKey, DeviceKey, EncryptedSeedPhrase, SealedBox};

fuzz_target!(|data: &[u8]| {
    // Malformed ciphertexts are errors, not panics
    let _ = SealedBox::from_bytes(data);
    let _ = EncryptedSeedPhrase::from_bytes(data);

    let mut secret = [0u8; 32];
    secret[31] = 1;
    let key = DeviceKey::from_bytes(&secret).unwrap();
    assert!(key.decrypt(data).is_err());
});
