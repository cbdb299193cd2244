//! Participants and the encrypted shard records that cross trust boundaries
//!
//! Wire format (JSON):
//!
//! ```text
//! { "participantId": "<hex | base58>", "ciphertext": "<base64>" }
//! ```
//!
//! Participant ids are emitted as big-endian hex. On input, a `0x` prefix or a string
//! of lowercase hex digits is read as hex; anything else as base58.

use rand::rngs::OsRng;
use rand::RngCore;
use seedguard_core::PublicKeyBytes;
use seedguard_shamir::FieldElement;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::RecoveryError;

/// Participant ids are drawn from this many random bytes
pub const PARTICIPANT_ID_BYTES: usize = 32;

/// A participant id: a nonzero field element derived from 256 random bits
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ParticipantId(FieldElement);

impl ParticipantId {
    /// Draw a fresh random id
    pub fn generate() -> Self {
        let mut bytes = [0u8; PARTICIPANT_ID_BYTES];
        loop {
            OsRng.fill_bytes(&mut bytes);
            let id = FieldElement::from_bytes_be(&bytes);
            if !id.is_zero() {
                return Self(id);
            }
        }
    }

    pub fn from_field_element(element: FieldElement) -> Self {
        Self(element)
    }

    pub fn as_field_element(&self) -> &FieldElement {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.0.to_bytes_be()).into_string()
    }

    /// Parse a hex or base58 encoded id
    pub fn parse(s: &str) -> Result<Self, RecoveryError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(RecoveryError::InvalidEncoding("empty participant id".into()));
        }

        let is_hex = trimmed.starts_with("0x")
            || trimmed
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));

        let element = if is_hex {
            FieldElement::from_hex(trimmed)
                .map_err(|e| RecoveryError::InvalidEncoding(e.to_string()))?
        } else {
            let bytes = bs58::decode(trimmed)
                .into_vec()
                .map_err(|e| RecoveryError::InvalidEncoding(format!("participant id: {}", e)))?;
            FieldElement::from_bytes_be(&bytes)
        };

        if element.is_zero() {
            return Err(RecoveryError::InvalidEncoding(
                "participant id must be nonzero".into(),
            ));
        }
        Ok(Self(element))
    }
}

impl fmt::Debug for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParticipantId({})", self.to_hex())
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ParticipantId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ParticipantId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ParticipantId::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A shard holder: the owner or one of the approvers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: ParticipantId,
    pub public_key: PublicKeyBytes,
    /// Human-readable label
    #[serde(default)]
    pub label: String,
}

impl Participant {
    /// New participant with a freshly generated id
    pub fn new(label: impl Into<String>, public_key: PublicKeyBytes) -> Self {
        Self {
            id: ParticipantId::generate(),
            public_key,
            label: label.into(),
        }
    }
}

/// One participant's share value, encrypted to that participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedShard {
    pub participant_id: ParticipantId,
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
}

/// Serde helper: bytes as standard base64
pub(crate) mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s.trim()).map_err(serde::de::Error::custom)
    }
}

/// Serde helper: a `SealedBox` as base64 of its byte encoding
pub(crate) mod sealed_box_base64 {
    use seedguard_core::SealedBox;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(sealed: &SealedBox, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        super::base64_bytes::serialize(&sealed.to_bytes(), serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SealedBox, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = super::base64_bytes::deserialize(deserializer)?;
        SealedBox::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}
