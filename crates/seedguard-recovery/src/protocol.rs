//! Threshold backup of a secp256k1 key
//!
//! [`KeyRecovery::shard`] turns a private key into one [`EncryptedShard`] per participant;
//! [`KeyRecovery::recover_key`] decrypts enough of them and interpolates the key back.
//!
//! On top of that sits the policy layer: a fresh intermediate key is sharded and wraps
//! the long-lived master key, so the approver set can change without touching the
//! master key or anything it encrypts.
//!
//! # Threshold
//!
//! Interpolation cannot tell when it was given too few shares: it silently produces
//! a wrong value. That value is usually not even a valid scalar
//! ([`RecoveryError::InvalidKeyMaterial`]); when it is,
//! [`KeyRecovery::recover_intermediate_key`] catches it by comparing the result with the
//! public key recorded in the [`RecoveryPolicy`] ([`RecoveryError::PublicKeyMismatch`]).

use seedguard_core::secp256k1::SecretKey;
use seedguard_core::{
    AsymmetricKey, CryptoError, DeviceKey, IntermediateKey, MasterKey, OwnerCredentials,
    PublicKeyBytes, SealedBox,
};
use seedguard_shamir::{FieldElement, Point, SecretSharer};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::shard::{sealed_box_base64, EncryptedShard, Participant, ParticipantId};
use crate::RecoveryError;

/// Length of a secp256k1 scalar
const SCALAR_LEN: usize = 32;

/// Source of the owner's shard key, re-derived on demand
pub trait OwnerKeySource {
    fn owner_key(&self) -> Result<Box<dyn AsymmetricKey>, CryptoError>;
}

impl OwnerKeySource for OwnerCredentials {
    fn owner_key(&self) -> Result<Box<dyn AsymmetricKey>, CryptoError> {
        Ok(Box::new(self.derive_key()?))
    }
}

impl OwnerKeySource for DeviceKey {
    fn owner_key(&self) -> Result<Box<dyn AsymmetricKey>, CryptoError> {
        Ok(Box::new(self.clone()))
    }
}

/// The owner's own shard and how to open it
pub struct OwnerShard<'a> {
    pub participant_id: ParticipantId,
    pub source: &'a dyn OwnerKeySource,
}

/// Keys available to whoever is recovering
pub struct IdentityCapabilities<'a> {
    /// Opens every shard except the owner's
    pub device_key: &'a dyn AsymmetricKey,
    pub owner: Option<OwnerShard<'a>>,
}

impl<'a> IdentityCapabilities<'a> {
    pub fn new(device_key: &'a dyn AsymmetricKey) -> Self {
        Self {
            device_key,
            owner: None,
        }
    }

    pub fn with_owner(
        mut self,
        participant_id: ParticipantId,
        source: &'a dyn OwnerKeySource,
    ) -> Self {
        self.owner = Some(OwnerShard {
            participant_id,
            source,
        });
        self
    }
}

/// Everything persisted for one backup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryPolicy {
    pub threshold: usize,
    pub participants: Vec<Participant>,
    pub encrypted_shards: Vec<EncryptedShard>,
    /// Public half of the sharded intermediate key
    pub intermediate_public_key: PublicKeyBytes,
    #[serde(with = "sealed_box_base64")]
    pub wrapped_master_key: SealedBox,
}

impl RecoveryPolicy {
    pub fn participant(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.id == id)
    }

    pub fn shard_for(&self, id: &ParticipantId) -> Option<&EncryptedShard> {
        self.encrypted_shards.iter().find(|s| &s.participant_id == id)
    }
}

/// Shards and recovers keys in one prime field
#[derive(Debug, Clone, Default)]
pub struct KeyRecovery {
    sharer: SecretSharer,
}

impl KeyRecovery {
    pub fn new(sharer: SecretSharer) -> Self {
        Self { sharer }
    }

    pub fn sharer(&self) -> &SecretSharer {
        &self.sharer
    }

    /// Split `private_key` among `participants`, encrypting each share to its holder
    pub fn shard(
        &self,
        private_key: &SecretKey,
        threshold: usize,
        participants: &[Participant],
    ) -> Result<Vec<EncryptedShard>, RecoveryError> {
        let scalar = Zeroizing::new(private_key.secret_bytes());
        let secret = FieldElement::from_bytes_be(&scalar[..]);
        // A reduced scalar would interpolate back to a different key
        if !self.sharer.field().contains(&secret) {
            return Err(RecoveryError::InvalidKeyMaterial);
        }
        let ids: Vec<FieldElement> = participants
            .iter()
            .map(|p| p.id.as_field_element().clone())
            .collect();

        let points = self.sharer.split(&secret, threshold, &ids)?;

        let shards = points
            .iter()
            .map(|point| {
                let participant = participants
                    .iter()
                    .find(|p| p.id.as_field_element() == &point.x)
                    .ok_or(RecoveryError::BadParticipantId)?;
                let y = Zeroizing::new(point.y.to_bytes_be());
                Ok(EncryptedShard {
                    participant_id: participant.id.clone(),
                    ciphertext: participant.public_key.encrypt(&y)?,
                })
            })
            .collect::<Result<Vec<_>, RecoveryError>>()?;

        log::info!(
            "Produced {} encrypted shards (threshold {})",
            shards.len(),
            threshold
        );
        Ok(shards)
    }

    /// Decrypt `shards` and interpolate the private key
    pub fn recover_key(
        &self,
        shards: &[EncryptedShard],
        identity: &IdentityCapabilities<'_>,
    ) -> Result<SecretKey, RecoveryError> {
        // Derived at most once per call
        let mut owner_key: Option<Box<dyn AsymmetricKey>> = None;
        let mut points = Vec::with_capacity(shards.len());

        for shard in shards {
            let y = match &identity.owner {
                Some(owner) if owner.participant_id == shard.participant_id => {
                    if owner_key.is_none() {
                        let key = owner.source.owner_key().map_err(|e| {
                            log::warn!("Owner key derivation failed: {}", e);
                            RecoveryError::FailedToRetrieveApproverKey
                        })?;
                        owner_key = Some(key);
                    }
                    let key = owner_key
                        .as_deref()
                        .ok_or(RecoveryError::FailedToRetrieveApproverKey)?;
                    key.decrypt(&shard.ciphertext)?
                }
                _ => identity.device_key.decrypt(&shard.ciphertext)?,
            };

            points.push(Point {
                x: shard.participant_id.as_field_element().clone(),
                y: FieldElement::from_bytes_be(&y[..]),
            });
        }

        let secret = self.sharer.recover(&points)?;
        let scalar = secret
            .to_bytes_be_padded(SCALAR_LEN)
            .map(Zeroizing::new)
            .ok_or(RecoveryError::InvalidKeyMaterial)?;
        let key =
            SecretKey::from_slice(&scalar[..]).map_err(|_| RecoveryError::InvalidKeyMaterial)?;

        log::info!("Recovered key from {} shards", shards.len());
        Ok(key)
    }

    /// Back up `master` behind a fresh intermediate key
    pub fn create_policy(
        &self,
        master: &MasterKey,
        threshold: usize,
        participants: Vec<Participant>,
    ) -> Result<RecoveryPolicy, RecoveryError> {
        let intermediate = IntermediateKey::generate();
        let wrapped_master_key = intermediate.wrap_master(master)?;
        let encrypted_shards = self.shard(intermediate.secret_key(), threshold, &participants)?;

        Ok(RecoveryPolicy {
            threshold,
            participants,
            encrypted_shards,
            intermediate_public_key: intermediate.public_key_bytes(),
            wrapped_master_key,
        })
    }

    /// Reconstruct and check the policy's intermediate key
    pub fn recover_intermediate_key(
        &self,
        policy: &RecoveryPolicy,
        shards: &[EncryptedShard],
        identity: &IdentityCapabilities<'_>,
    ) -> Result<IntermediateKey, RecoveryError> {
        if shards.len() < policy.threshold {
            return Err(RecoveryError::InsufficientShares {
                have: shards.len(),
                need: policy.threshold,
            });
        }
        if shards
            .iter()
            .any(|s| policy.participant(&s.participant_id).is_none())
        {
            return Err(RecoveryError::BadParticipantId);
        }

        let intermediate = IntermediateKey::from_secret_key(self.recover_key(shards, identity)?);
        if intermediate.public_key_bytes() != policy.intermediate_public_key {
            log::warn!("Recovered intermediate key does not match the policy");
            return Err(RecoveryError::PublicKeyMismatch);
        }
        Ok(intermediate)
    }

    /// Recover the master key protected by `policy`
    pub fn recover_master_key(
        &self,
        policy: &RecoveryPolicy,
        shards: &[EncryptedShard],
        identity: &IdentityCapabilities<'_>,
    ) -> Result<MasterKey, RecoveryError> {
        let intermediate = self.recover_intermediate_key(policy, shards, identity)?;
        let master = intermediate.unwrap_master(&policy.wrapped_master_key)?;
        log::info!("Master key recovered");
        Ok(master)
    }

    /// Re-shard the policy's intermediate key to a new approver set.
    ///
    /// The wrapped master key is carried over unchanged.
    pub fn rotate_approvers(
        &self,
        policy: &RecoveryPolicy,
        intermediate: &IntermediateKey,
        threshold: usize,
        participants: Vec<Participant>,
    ) -> Result<RecoveryPolicy, RecoveryError> {
        if intermediate.public_key_bytes() != policy.intermediate_public_key {
            return Err(RecoveryError::PublicKeyMismatch);
        }

        let encrypted_shards = self.shard(intermediate.secret_key(), threshold, &participants)?;
        log::info!(
            "Rotated approvers: {} -> {} participants",
            policy.participants.len(),
            participants.len()
        );

        Ok(RecoveryPolicy {
            threshold,
            participants,
            encrypted_shards,
            intermediate_public_key: policy.intermediate_public_key,
            wrapped_master_key: policy.wrapped_master_key.clone(),
        })
    }
}

/// Re-encrypt an approver's shard to the requester's device key
pub fn release_shard(
    shard: &EncryptedShard,
    approver_key: &dyn AsymmetricKey,
    requester: &PublicKeyBytes,
) -> Result<EncryptedShard, CryptoError> {
    let y = approver_key.decrypt(&shard.ciphertext)?;
    Ok(EncryptedShard {
        participant_id: shard.participant_id.clone(),
        ciphertext: requester.encrypt(&y)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{test_device_key, test_owner_credentials};
    use seedguard_shamir::{PrimeField, ShamirError};

    fn participants(seeds: &[u8]) -> (Vec<DeviceKey>, Vec<Participant>) {
        let keys: Vec<DeviceKey> = seeds.iter().map(|s| test_device_key(*s)).collect();
        let participants = keys
            .iter()
            .enumerate()
            .map(|(i, k)| Participant::new(format!("p{}", i), k.public_key_bytes()))
            .collect();
        (keys, participants)
    }

    #[test]
    fn test_shard_and_recover_single_holder() {
        // One device holding every shard
        let device = test_device_key(1);
        let holders: Vec<Participant> = (0..3)
            .map(|i| Participant::new(format!("slot {}", i), device.public_key_bytes()))
            .collect();
        let key = DeviceKey::generate();

        let recovery = KeyRecovery::default();
        let shards = recovery.shard(key.secret_key(), 2, &holders).unwrap();
        assert_eq!(shards.len(), 3);

        let identity = IdentityCapabilities::new(&device);
        for pair in [[0, 1], [0, 2], [1, 2]] {
            let subset = [shards[pair[0]].clone(), shards[pair[1]].clone()];
            let recovered = recovery.recover_key(&subset, &identity).unwrap();
            assert_eq!(recovered, *key.secret_key());
        }
    }

    #[test]
    fn test_three_holders_recover_from_any_pair() {
        let (keys, holders) = participants(&[40, 41, 42]);
        let mut scalar = [0x5a; 32];
        scalar[0] = 0x7e;
        let key = SecretKey::from_slice(&scalar).unwrap();

        let recovery = KeyRecovery::default();
        let shards = recovery.shard(&key, 2, &holders).unwrap();
        assert_eq!(shards.len(), 3);

        let requester = test_device_key(43);
        let identity = IdentityCapabilities::new(&requester);
        for pair in [[0, 1], [1, 2], [0, 2]] {
            let released: Vec<EncryptedShard> = pair
                .iter()
                .map(|&i| {
                    release_shard(&shards[i], &keys[i], &requester.public_key_bytes()).unwrap()
                })
                .collect();
            let recovered = recovery.recover_key(&released, &identity).unwrap();
            assert_eq!(recovered.secret_bytes(), scalar);
        }
    }

    #[test]
    fn test_scalar_larger_than_order_rejected() {
        // 2^255 - 19
        let field =
            PrimeField::from_hex("7fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffed")
                .unwrap();
        let recovery = KeyRecovery::new(SecretSharer::new(field.clone()));
        let device = test_device_key(44);
        let holders: Vec<Participant> = (1..=3)
            .map(|i| Participant {
                id: ParticipantId::from_field_element(field.from_u64(i)),
                public_key: device.public_key_bytes(),
                label: format!("p{}", i),
            })
            .collect();

        let mut big = [0xff; 32];
        big[0] = 0xf0;
        let big = SecretKey::from_slice(&big).unwrap();
        assert!(matches!(
            recovery.shard(&big, 2, &holders),
            Err(RecoveryError::InvalidKeyMaterial)
        ));

        // Scalars below the order still round-trip in the same field
        let mut small = [0u8; 32];
        small[31] = 0x05;
        let small = SecretKey::from_slice(&small).unwrap();
        let shards = recovery.shard(&small, 2, &holders).unwrap();
        let recovered = recovery
            .recover_key(&shards[1..], &IdentityCapabilities::new(&device))
            .unwrap();
        assert_eq!(recovered, small);
    }

    #[test]
    fn test_shards_are_per_participant() {
        let (keys, holders) = participants(&[2, 3]);
        let recovery = KeyRecovery::default();
        let shards = recovery
            .shard(DeviceKey::generate().secret_key(), 2, &holders)
            .unwrap();

        assert_eq!(shards[0].participant_id, holders[0].id);
        assert!(keys[0].decrypt(&shards[0].ciphertext).is_ok());
        assert!(keys[1].decrypt(&shards[0].ciphertext).is_err());
    }

    #[test]
    fn test_threshold_errors_propagate() {
        let (_, holders) = participants(&[4, 5]);
        let recovery = KeyRecovery::default();
        let key = DeviceKey::generate();
        assert!(matches!(
            recovery.shard(key.secret_key(), 3, &holders),
            Err(RecoveryError::Shamir(
                ShamirError::InsufficientParticipants { .. }
            ))
        ));
        assert!(matches!(
            recovery.shard(key.secret_key(), 0, &holders),
            Err(RecoveryError::Shamir(ShamirError::InvalidThreshold))
        ));
    }

    #[test]
    fn test_wrong_device_key_is_decryption_failure() {
        let (_, holders) = participants(&[6, 7]);
        let recovery = KeyRecovery::default();
        let shards = recovery
            .shard(DeviceKey::generate().secret_key(), 2, &holders)
            .unwrap();

        let stranger = test_device_key(8);
        assert!(matches!(
            recovery.recover_key(&shards, &IdentityCapabilities::new(&stranger)),
            Err(RecoveryError::DecryptionFailure(_))
        ));
    }

    #[test]
    fn test_owner_shard_uses_credentials() {
        let credentials = test_owner_credentials("correct horse battery staple");
        let owner_key = credentials.derive_key().unwrap();
        let device = test_device_key(9);

        let owner = Participant::new("owner", owner_key.public_key_bytes());
        let approver = Participant::new("approver", device.public_key_bytes());
        let owner_id = owner.id.clone();

        let recovery = KeyRecovery::default();
        let key = DeviceKey::generate();
        let shards = recovery
            .shard(key.secret_key(), 2, &[owner, approver])
            .unwrap();

        let identity =
            IdentityCapabilities::new(&device).with_owner(owner_id.clone(), &credentials);
        assert_eq!(recovery.recover_key(&shards, &identity).unwrap(), *key.secret_key());

        // Without the owner source the device key cannot open the owner's shard
        assert!(recovery
            .recover_key(&shards, &IdentityCapabilities::new(&device))
            .is_err());

        // Wrong credentials derive a different key
        let wrong = test_owner_credentials("wrong horse");
        let identity = IdentityCapabilities::new(&device).with_owner(owner_id, &wrong);
        assert!(matches!(
            recovery.recover_key(&shards, &identity),
            Err(RecoveryError::DecryptionFailure(_))
        ));
    }

    struct BrokenSource;

    impl OwnerKeySource for BrokenSource {
        fn owner_key(&self) -> Result<Box<dyn AsymmetricKey>, CryptoError> {
            Err(CryptoError::KeyDerivationFailed("no credentials".into()))
        }
    }

    #[test]
    fn test_owner_derivation_failure() {
        let device = test_device_key(10);
        let (_, holders) = participants(&[11, 12]);
        let recovery = KeyRecovery::default();
        let shards = recovery
            .shard(DeviceKey::generate().secret_key(), 2, &holders)
            .unwrap();

        let identity =
            IdentityCapabilities::new(&device).with_owner(holders[0].id.clone(), &BrokenSource);
        assert!(matches!(
            recovery.recover_key(&shards, &identity),
            Err(RecoveryError::FailedToRetrieveApproverKey)
        ));
    }

    #[test]
    fn test_ids_outside_small_field_rejected() {
        // Ids are 256-bit values, far above a 64-bit field's order
        let field = PrimeField::from_hex("ffffffffffffffc5").unwrap();
        let recovery = KeyRecovery::new(SecretSharer::new(field));
        let device = test_device_key(13);
        let holders = vec![
            Participant::new("a", device.public_key_bytes()),
            Participant::new("b", device.public_key_bytes()),
        ];
        let mut scalar = [0u8; 32];
        scalar[31] = 0x2a;
        let key = SecretKey::from_slice(&scalar).unwrap();
        assert!(matches!(
            recovery.shard(&key, 2, &holders),
            Err(RecoveryError::Shamir(ShamirError::InvalidShare(_)))
        ));
    }

    #[test]
    fn test_policy_roundtrip() {
        let (keys, holders) = participants(&[14, 15, 16]);
        let recovery = KeyRecovery::default();
        let master = MasterKey::generate();
        let policy = recovery.create_policy(&master, 2, holders).unwrap();

        // Approver 0 and 1 release to the requester device
        let requester = test_device_key(17);
        let released: Vec<EncryptedShard> = (0..2)
            .map(|i| {
                release_shard(
                    &policy.encrypted_shards[i],
                    &keys[i],
                    &requester.public_key_bytes(),
                )
                .unwrap()
            })
            .collect();

        let recovered = recovery
            .recover_master_key(&policy, &released, &IdentityCapabilities::new(&requester))
            .unwrap();
        assert_eq!(recovered.as_bytes(), master.as_bytes());
    }

    #[test]
    fn test_policy_serde() {
        let (_, holders) = participants(&[18, 19]);
        let recovery = KeyRecovery::default();
        let policy = recovery
            .create_policy(&MasterKey::generate(), 2, holders)
            .unwrap();

        let json = serde_json::to_string(&policy).unwrap();
        assert!(json.contains("\"wrappedMasterKey\""));
        let back: RecoveryPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, policy);
    }

    #[test]
    fn test_too_few_shards_detected() {
        let (keys, holders) = participants(&[20, 21, 22]);
        let recovery = KeyRecovery::default();
        let mut policy = recovery
            .create_policy(&MasterKey::generate(), 3, holders)
            .unwrap();
        let requester = test_device_key(23);
        let two: Vec<EncryptedShard> = (0..2)
            .map(|i| {
                release_shard(
                    &policy.encrypted_shards[i],
                    &keys[i],
                    &requester.public_key_bytes(),
                )
                .unwrap()
            })
            .collect();
        let identity = IdentityCapabilities::new(&requester);

        assert!(matches!(
            recovery.recover_master_key(&policy, &two, &identity),
            Err(RecoveryError::InsufficientShares { have: 2, need: 3 })
        ));

        // With a misrecorded threshold, interpolation runs and yields the wrong value
        policy.threshold = 2;
        assert!(matches!(
            recovery.recover_master_key(&policy, &two, &identity),
            Err(RecoveryError::PublicKeyMismatch) | Err(RecoveryError::InvalidKeyMaterial)
        ));
    }

    #[test]
    fn test_mismatched_policy_key_detected() {
        let (keys, holders) = participants(&[24, 25]);
        let recovery = KeyRecovery::default();
        let mut policy = recovery
            .create_policy(&MasterKey::generate(), 2, holders)
            .unwrap();
        policy.intermediate_public_key = test_device_key(26).public_key_bytes();

        let requester = test_device_key(27);
        let released: Vec<EncryptedShard> = (0..2)
            .map(|i| {
                release_shard(
                    &policy.encrypted_shards[i],
                    &keys[i],
                    &requester.public_key_bytes(),
                )
                .unwrap()
            })
            .collect();

        assert!(matches!(
            recovery.recover_master_key(&policy, &released, &IdentityCapabilities::new(&requester)),
            Err(RecoveryError::PublicKeyMismatch)
        ));
    }

    #[test]
    fn test_foreign_shard_rejected() {
        let (_, holders) = participants(&[28, 29]);
        let recovery = KeyRecovery::default();
        let policy = recovery
            .create_policy(&MasterKey::generate(), 2, holders)
            .unwrap();

        let mut shards = policy.encrypted_shards.clone();
        shards[1].participant_id = ParticipantId::generate();
        let device = test_device_key(30);
        assert!(matches!(
            recovery.recover_master_key(&policy, &shards, &IdentityCapabilities::new(&device)),
            Err(RecoveryError::BadParticipantId)
        ));
    }

    #[test]
    fn test_rotate_approvers_keeps_master() {
        let (old_keys, old_holders) = participants(&[31, 32]);
        let recovery = KeyRecovery::default();
        let master = MasterKey::generate();
        let policy = recovery.create_policy(&master, 2, old_holders).unwrap();

        let requester = test_device_key(33);
        let released: Vec<EncryptedShard> = (0..2)
            .map(|i| {
                release_shard(
                    &policy.encrypted_shards[i],
                    &old_keys[i],
                    &requester.public_key_bytes(),
                )
                .unwrap()
            })
            .collect();
        let intermediate = recovery
            .recover_intermediate_key(&policy, &released, &IdentityCapabilities::new(&requester))
            .unwrap();

        let (new_keys, new_holders) = participants(&[34, 35, 36]);
        let rotated = recovery
            .rotate_approvers(&policy, &intermediate, 2, new_holders)
            .unwrap();
        assert_eq!(rotated.wrapped_master_key, policy.wrapped_master_key);
        assert_eq!(rotated.intermediate_public_key, policy.intermediate_public_key);
        assert_eq!(rotated.participants.len(), 3);

        let released: Vec<EncryptedShard> = [1usize, 2]
            .iter()
            .map(|&i| {
                release_shard(
                    &rotated.encrypted_shards[i],
                    &new_keys[i],
                    &requester.public_key_bytes(),
                )
                .unwrap()
            })
            .collect();
        let recovered = recovery
            .recover_master_key(&rotated, &released, &IdentityCapabilities::new(&requester))
            .unwrap();
        assert_eq!(recovered.as_bytes(), master.as_bytes());

        // Old approvers' shards no longer belong to the policy
        assert!(rotated.shard_for(&policy.encrypted_shards[0].participant_id).is_none());
    }

    #[test]
    fn test_rotate_requires_matching_intermediate() {
        let (_, holders) = participants(&[37, 38]);
        let recovery = KeyRecovery::default();
        let policy = recovery
            .create_policy(&MasterKey::generate(), 2, holders.clone())
            .unwrap();
        assert!(matches!(
            recovery.rotate_approvers(&policy, &IntermediateKey::generate(), 2, holders),
            Err(RecoveryError::PublicKeyMismatch)
        ));
    }
}
