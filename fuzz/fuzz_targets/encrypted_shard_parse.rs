#![no_main]

use libfuzzer_sys::fuzz_target;
use seedguard_recovery::{EncryptedShard, ParticipantId, RecoveryPolicy, VerificationAssertion};

fuzz_target!(|data: &[u8]| {
    // Wire records from untrusted peers must parse or fail, never panic
    if let Ok(shard) = serde_json::from_slice::<EncryptedShard>(data) {
        let json = serde_json::to_vec(&shard).unwrap();
        let again: EncryptedShard = serde_json::from_slice(&json).unwrap();
        assert_eq!(again, shard);
    }

    let _ = serde_json::from_slice::<VerificationAssertion>(data);
    let _ = serde_json::from_slice::<RecoveryPolicy>(data);

    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(id) = ParticipantId::parse(s) {
            assert_eq!(ParticipantId::parse(&id.to_hex()).unwrap(), id);
        }
    }
});
