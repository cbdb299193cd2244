//! Asymmetric identity keys
//!
//! The recovery protocol only needs an opaque capability: encrypt to a public key,
//! decrypt, sign, verify. [`AsymmetricKey`] is that seam; hardware-backed keys
//! implement it outside this crate. [`DeviceKey`] is the software secp256k1
//! implementation used by tests, tools and the owner-derived key.
//!
//! # Encryption format (ECIES)
//!
//! `[ephemeral pubkey (33 bytes)][nonce (12 bytes)][ciphertext + tag]`
//!
//! The AES-256-GCM key is `SHA256(tag || ECDH(ephemeral, recipient) || ephemeral pubkey)`.

use secp256k1::ecdh::SharedSecret;
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroizing;

use crate::crypto::{open, seal, CryptoError, SealedBox, KEY_LEN, NONCE_LEN, TAG_LEN};

/// Compressed secp256k1 public key length
pub const PUBLIC_KEY_LEN: usize = 33;

/// Domain separation for ECIES key derivation
const ECIES_TAG: &[u8] = b"seedguard/ecies/v1";

/// Opaque identity key capability
pub trait AsymmetricKey {
    /// Public half, shared with other parties
    fn public_key_bytes(&self) -> PublicKeyBytes;

    /// Decrypt a ciphertext produced by [`AsymmetricKey::encrypt`] or [`PublicKeyBytes::encrypt`]
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError>;

    /// Sign an arbitrary message
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError>;

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.public_key_bytes().encrypt(plaintext)
    }

    fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        self.public_key_bytes().verify(message, signature)
    }
}

/// A validated compressed secp256k1 public key
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKeyBytes([u8; PUBLIC_KEY_LEN]);

impl PublicKeyBytes {
    /// Parse and validate a compressed public key
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let pk = PublicKey::from_slice(bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self(pk.serialize()))
    }

    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s.trim()).map_err(|_| CryptoError::InvalidPublicKey)?;
        Self::from_slice(&bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    fn public_key(&self) -> Result<PublicKey, CryptoError> {
        PublicKey::from_slice(&self.0).map_err(|_| CryptoError::InvalidPublicKey)
    }

    /// Encrypt to this key (ECIES with a fresh ephemeral key)
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let recipient = self.public_key()?;
        let secp = Secp256k1::new();
        let (ephemeral_sk, ephemeral_pk) = secp.generate_keypair(&mut rand::thread_rng());

        let shared = SharedSecret::new(&recipient, &ephemeral_sk);
        let key = ecies_key(&shared, &ephemeral_pk);
        let sealed = seal(&key, plaintext)?;

        let mut out = Vec::with_capacity(PUBLIC_KEY_LEN + NONCE_LEN + TAG_LEN + plaintext.len());
        out.extend_from_slice(&ephemeral_pk.serialize());
        out.extend_from_slice(&sealed.to_bytes());
        Ok(out)
    }

    /// Verify a DER-encoded ECDSA signature over `SHA256(message)`
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(pk) = self.public_key() else {
            return false;
        };
        let Ok(sig) = Signature::from_der(signature) else {
            return false;
        };
        Secp256k1::verification_only()
            .verify_ecdsa(&message_digest(message), &sig, &pk)
            .is_ok()
    }
}

impl From<PublicKey> for PublicKeyBytes {
    fn from(pk: PublicKey) -> Self {
        Self(pk.serialize())
    }
}

impl fmt::Debug for PublicKeyBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKeyBytes({})", self.to_hex())
    }
}

impl fmt::Display for PublicKeyBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for PublicKeyBytes {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKeyBytes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        PublicKeyBytes::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Software secp256k1 key
#[derive(Clone)]
pub struct DeviceKey {
    secret: SecretKey,
    public: PublicKey,
}

impl DeviceKey {
    /// Generate a new random key from the thread CSPRNG
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret, public) = secp.generate_keypair(&mut rand::thread_rng());
        Self { secret, public }
    }

    pub fn from_secret_key(secret: SecretKey) -> Self {
        let public = secret.public_key(&Secp256k1::signing_only());
        Self { secret, public }
    }

    /// Build from a 32-byte big-endian scalar
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let secret = SecretKey::from_slice(bytes)
            .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;
        Ok(Self::from_secret_key(secret))
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    pub fn public_key(&self) -> PublicKey {
        self.public
    }
}

impl fmt::Debug for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceKey")
            .field("public", &PublicKeyBytes::from(self.public))
            .finish_non_exhaustive()
    }
}

impl AsymmetricKey for DeviceKey {
    fn public_key_bytes(&self) -> PublicKeyBytes {
        self.public.into()
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        if ciphertext.len() < PUBLIC_KEY_LEN + NONCE_LEN + TAG_LEN {
            return Err(CryptoError::InvalidFormat);
        }
        let ephemeral_pk = PublicKey::from_slice(&ciphertext[..PUBLIC_KEY_LEN])
            .map_err(|_| CryptoError::InvalidFormat)?;
        let sealed = SealedBox::from_bytes(&ciphertext[PUBLIC_KEY_LEN..])?;

        let shared = SharedSecret::new(&ephemeral_pk, &self.secret);
        let key = ecies_key(&shared, &ephemeral_pk);
        open(&key, &sealed)
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let sig = Secp256k1::signing_only().sign_ecdsa(&message_digest(message), &self.secret);
        Ok(sig.serialize_der().to_vec())
    }
}

fn ecies_key(shared: &SharedSecret, ephemeral_pk: &PublicKey) -> Zeroizing<[u8; KEY_LEN]> {
    let mut hasher = Sha256::new();
    hasher.update(ECIES_TAG);
    hasher.update(shared.secret_bytes());
    hasher.update(ephemeral_pk.serialize());
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    key.copy_from_slice(&hasher.finalize());
    key
}

fn message_digest(message: &[u8]) -> Message {
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&Sha256::digest(message));
    Message::from_digest(digest)
}
