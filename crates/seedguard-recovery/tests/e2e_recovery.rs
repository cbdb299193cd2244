//! End-to-end recovery: backup a seed phrase behind a 2-of-3 policy (owner, approver A,
//! approver B), lose the device, and get it back through TOTP-gated approvals.

use seedguard_core::seed::{decrypt_seed_phrase, generate_mnemonic};
use seedguard_core::{
    encrypt_seed_phrase, AsymmetricKey, DeviceKey, KdfParams, MasterKey, OwnerCredentials,
};
use seedguard_recovery::{
    ApprovalSession, EncryptedShard, EngineConfig, IdentityCapabilities, Participant,
    RecoveryError, RecoveryPolicy, SessionState, UsedSecrets, VerificationError,
};

const NOW: u64 = 1_700_000_000_000;
const PERIOD: u64 = 60_000;

fn test_config() -> EngineConfig {
    EngineConfig {
        owner_kdf: KdfParams {
            m_cost: 256,
            t_cost: 1,
            p_cost: 1,
        },
        ..EngineConfig::default()
    }
}

struct World {
    config: EngineConfig,
    credentials: OwnerCredentials,
    approver_a: DeviceKey,
    approver_b: DeviceKey,
    policy: RecoveryPolicy,
}

impl World {
    fn owner(&self) -> &Participant {
        &self.policy.participants[0]
    }

    fn a(&self) -> &Participant {
        &self.policy.participants[1]
    }

    fn b(&self) -> &Participant {
        &self.policy.participants[2]
    }

    fn shard_of(&self, participant: &Participant) -> &EncryptedShard {
        self.policy.shard_for(&participant.id).unwrap()
    }
}

fn setup(master: &MasterKey) -> World {
    let config = test_config();
    config.validate().unwrap();

    let credentials =
        OwnerCredentials::new("correct horse battery staple", "owner-42", config.owner_kdf);
    let owner_key = credentials.derive_key().unwrap();
    let approver_a = DeviceKey::generate();
    let approver_b = DeviceKey::generate();

    let participants = vec![
        Participant::new("owner", owner_key.public_key_bytes()),
        Participant::new("A", approver_a.public_key_bytes()),
        Participant::new("B", approver_b.public_key_bytes()),
    ];

    let recovery = config.key_recovery().unwrap();
    let policy = recovery.create_policy(master, 2, participants).unwrap();

    // Persisted and reloaded
    let json = serde_json::to_string_pretty(&policy).unwrap();
    let policy: RecoveryPolicy = serde_json::from_str(&json).unwrap();

    World {
        config,
        credentials,
        approver_a,
        approver_b,
        policy,
    }
}

/// The approver confirms the owner's new device and releases its shard to it
fn approve(
    world: &World,
    approver_key: &DeviceKey,
    approver: &Participant,
    owner_device: &DeviceKey,
    used: &mut UsedSecrets,
) -> Result<EncryptedShard, VerificationError> {
    let verifier = world.config.verifier().unwrap();
    let secret = verifier.totp().generate_secret();
    let encrypted_secret = secret
        .encrypt_for(&approver_key.public_key_bytes())
        .unwrap();

    let mut session = ApprovalSession::new(verifier.clone(), owner_device.public_key_bytes());
    session.accept_secret(&encrypted_secret, approver_key, used)?;

    // Shown on the approver's screen, read out to the owner
    let code = session.current_code(NOW)?;
    let assertion = verifier.build_assertion(&code, NOW, owner_device)?;

    // Only the signature and timestamp travel back
    let wire = serde_json::to_string(&assertion).unwrap();
    let received = serde_json::from_str(&wire).unwrap();

    assert_eq!(session.submit(&received, NOW, used)?, SessionState::Confirmed);
    session.release_shard(world.shard_of(approver), approver_key)
}

#[test]
fn test_seed_phrase_recovery_with_owner_and_one_approver() {
    let mnemonic = generate_mnemonic().unwrap();
    let master = MasterKey::generate();
    let encrypted_seed = encrypt_seed_phrase(&master, &mnemonic).unwrap();
    let world = setup(&master);

    let new_device = DeviceKey::generate();
    let mut used = UsedSecrets::new();
    let released_a =
        approve(&world, &world.approver_a, world.a(), &new_device, &mut used).unwrap();

    let shards = vec![world.shard_of(world.owner()).clone(), released_a];
    let identity = IdentityCapabilities::new(&new_device)
        .with_owner(world.owner().id.clone(), &world.credentials);

    let recovery = world.config.key_recovery().unwrap();
    let recovered = recovery
        .recover_master_key(&world.policy, &shards, &identity)
        .unwrap();

    assert_eq!(decrypt_seed_phrase(&recovered, &encrypted_seed).unwrap(), mnemonic);
}

#[test]
fn test_recovery_with_owner_and_second_approver() {
    let master = MasterKey::generate();
    let world = setup(&master);

    let new_device = DeviceKey::generate();
    let mut used = UsedSecrets::new();
    let released_b =
        approve(&world, &world.approver_b, world.b(), &new_device, &mut used).unwrap();

    let shards = vec![released_b, world.shard_of(world.owner()).clone()];
    let identity = IdentityCapabilities::new(&new_device)
        .with_owner(world.owner().id.clone(), &world.credentials);

    let recovered = world
        .config
        .key_recovery()
        .unwrap()
        .recover_master_key(&world.policy, &shards, &identity)
        .unwrap();
    assert_eq!(recovered.as_bytes(), master.as_bytes());
}

#[test]
fn test_recovery_with_both_approvers_only() {
    let master = MasterKey::generate();
    let world = setup(&master);

    let new_device = DeviceKey::generate();
    let mut used = UsedSecrets::new();
    let shards = vec![
        approve(&world, &world.approver_a, world.a(), &new_device, &mut used).unwrap(),
        approve(&world, &world.approver_b, world.b(), &new_device, &mut used).unwrap(),
    ];
    assert_eq!(used.len(), 2);

    let recovery = world.config.key_recovery().unwrap();
    let recovered = recovery
        .recover_master_key(&world.policy, &shards, &IdentityCapabilities::new(&new_device))
        .unwrap();
    assert_eq!(recovered.as_bytes(), master.as_bytes());
}

#[test]
fn test_all_three_shards_recover() {
    let master = MasterKey::generate();
    let world = setup(&master);

    let new_device = DeviceKey::generate();
    let mut used = UsedSecrets::new();
    let shards = vec![
        approve(&world, &world.approver_b, world.b(), &new_device, &mut used).unwrap(),
        world.shard_of(world.owner()).clone(),
        approve(&world, &world.approver_a, world.a(), &new_device, &mut used).unwrap(),
    ];

    let identity = IdentityCapabilities::new(&new_device)
        .with_owner(world.owner().id.clone(), &world.credentials);
    let recovered = world
        .config
        .key_recovery()
        .unwrap()
        .recover_master_key(&world.policy, &shards, &identity)
        .unwrap();
    assert_eq!(recovered.as_bytes(), master.as_bytes());
}

#[test]
fn test_unrelated_signer_gets_nothing() {
    let master = MasterKey::generate();
    let world = setup(&master);

    let owner_device = DeviceKey::generate();
    let impostor = DeviceKey::generate();

    let verifier = world.config.verifier().unwrap();
    let secret = verifier.totp().generate_secret();
    let mut used = UsedSecrets::new();
    let mut session = ApprovalSession::new(verifier.clone(), owner_device.public_key_bytes());
    session
        .accept_secret(
            &secret
                .encrypt_for(&world.approver_a.public_key_bytes())
                .unwrap(),
            &world.approver_a,
            &used,
        )
        .unwrap();

    // The impostor learns the code but signs with its own key
    let code = session.current_code(NOW).unwrap();
    let assertion = verifier.build_assertion(&code, NOW, &impostor).unwrap();
    assert!(matches!(
        session.submit(&assertion, NOW, &mut used),
        Err(VerificationError::SignatureVerificationFailure)
    ));
    assert_eq!(session.state(), SessionState::Rejected);
    assert!(matches!(
        session.release_shard(world.shard_of(world.a()), &world.approver_a),
        Err(VerificationError::InvalidState { .. })
    ));

    // And the same secret cannot be used for a second attempt
    let mut retry = ApprovalSession::new(verifier, owner_device.public_key_bytes());
    assert!(matches!(
        retry.accept_secret(
            &secret
                .encrypt_for(&world.approver_a.public_key_bytes())
                .unwrap(),
            &world.approver_a,
            &used,
        ),
        Err(VerificationError::SecretReused)
    ));
}

#[test]
fn test_owner_clock_one_period_ahead() {
    let master = MasterKey::generate();
    let world = setup(&master);
    let owner_device = DeviceKey::generate();

    let verifier = world.config.verifier().unwrap();
    let secret = verifier.totp().generate_secret();
    let mut used = UsedSecrets::new();
    let mut session = ApprovalSession::new(verifier.clone(), owner_device.public_key_bytes());
    session
        .accept_secret(
            &secret
                .encrypt_for(&world.approver_b.public_key_bytes())
                .unwrap(),
            &world.approver_b,
            &used,
        )
        .unwrap();

    let code = session.current_code(NOW).unwrap();
    let assertion = verifier
        .build_assertion(&code, NOW + PERIOD, &owner_device)
        .unwrap();
    assert_eq!(
        session.submit(&assertion, NOW, &mut used).unwrap(),
        SessionState::Confirmed
    );
}

#[test]
fn test_owner_clock_two_periods_ahead_rejected() {
    let master = MasterKey::generate();
    let world = setup(&master);
    let owner_device = DeviceKey::generate();

    let verifier = world.config.verifier().unwrap();
    let secret = verifier.totp().generate_secret();
    let mut used = UsedSecrets::new();
    let mut session = ApprovalSession::new(verifier.clone(), owner_device.public_key_bytes());
    session
        .accept_secret(
            &secret
                .encrypt_for(&world.approver_b.public_key_bytes())
                .unwrap(),
            &world.approver_b,
            &used,
        )
        .unwrap();

    let code = session.current_code(NOW).unwrap();
    let assertion = verifier
        .build_assertion(&code, NOW + 2 * PERIOD, &owner_device)
        .unwrap();
    assert!(session.submit(&assertion, NOW, &mut used).is_err());
    assert_eq!(session.state(), SessionState::Rejected);
}

#[test]
fn test_single_shard_is_not_enough() {
    let master = MasterKey::generate();
    let world = setup(&master);
    let new_device = DeviceKey::generate();

    let identity = IdentityCapabilities::new(&new_device)
        .with_owner(world.owner().id.clone(), &world.credentials);
    let recovery = world.config.key_recovery().unwrap();
    assert!(matches!(
        recovery.recover_master_key(
            &world.policy,
            &[world.shard_of(world.owner()).clone()],
            &identity
        ),
        Err(RecoveryError::InsufficientShares { have: 1, need: 2 })
    ));
}

#[test]
fn test_wrong_owner_credentials() {
    let master = MasterKey::generate();
    let world = setup(&master);
    let new_device = DeviceKey::generate();
    let mut used = UsedSecrets::new();
    let released_a =
        approve(&world, &world.approver_a, world.a(), &new_device, &mut used).unwrap();

    let wrong = OwnerCredentials::new("wrong password", "owner-42", world.config.owner_kdf);
    let identity =
        IdentityCapabilities::new(&new_device).with_owner(world.owner().id.clone(), &wrong);
    let shards = vec![world.shard_of(world.owner()).clone(), released_a];
    assert!(matches!(
        world
            .config
            .key_recovery()
            .unwrap()
            .recover_master_key(&world.policy, &shards, &identity),
        Err(RecoveryError::DecryptionFailure(_))
    ));
}

#[test]
fn test_rotate_to_new_approvers() {
    let mnemonic = generate_mnemonic().unwrap();
    let master = MasterKey::generate();
    let encrypted_seed = encrypt_seed_phrase(&master, &mnemonic).unwrap();
    let world = setup(&master);
    let recovery = world.config.key_recovery().unwrap();

    // Owner still has their device: recover the intermediate key with owner + A
    let device = DeviceKey::generate();
    let mut used = UsedSecrets::new();
    let shards = vec![
        world.shard_of(world.owner()).clone(),
        approve(&world, &world.approver_a, world.a(), &device, &mut used).unwrap(),
    ];
    let identity = IdentityCapabilities::new(&device)
        .with_owner(world.owner().id.clone(), &world.credentials);
    let intermediate = recovery
        .recover_intermediate_key(&world.policy, &shards, &identity)
        .unwrap();

    // Replace B with C
    let approver_c = DeviceKey::generate();
    let participants = vec![
        world.owner().clone(),
        world.a().clone(),
        Participant::new("C", approver_c.public_key_bytes()),
    ];
    let rotated = recovery
        .rotate_approvers(&world.policy, &intermediate, 2, participants)
        .unwrap();
    assert_eq!(rotated.wrapped_master_key, world.policy.wrapped_master_key);

    // A and C recover without the owner
    let rotated_world = World {
        config: world.config.clone(),
        credentials: OwnerCredentials::new("unused", "owner-42", world.config.owner_kdf),
        approver_a: world.approver_a.clone(),
        approver_b: approver_c.clone(),
        policy: rotated,
    };
    let new_device = DeviceKey::generate();
    let shards = vec![
        approve(
            &rotated_world,
            &rotated_world.approver_a,
            rotated_world.a(),
            &new_device,
            &mut used,
        )
        .unwrap(),
        approve(
            &rotated_world,
            &approver_c,
            rotated_world.b(),
            &new_device,
            &mut used,
        )
        .unwrap(),
    ];
    let recovered = recovery
        .recover_master_key(
            &rotated_world.policy,
            &shards,
            &IdentityCapabilities::new(&new_device),
        )
        .unwrap();
    assert_eq!(decrypt_seed_phrase(&recovered, &encrypted_seed).unwrap(), mnemonic);

    // B's old shard is not part of the rotated policy
    let old_b = world.shard_of(world.b()).clone();
    assert!(matches!(
        recovery.recover_master_key(
            &rotated_world.policy,
            &[old_b, shards[0].clone()],
            &IdentityCapabilities::new(&new_device),
        ),
        Err(RecoveryError::BadParticipantId)
    ));
}
