//! Key type definitions
//!
//! `PubKey` is a 33-byte compressed secp256k1 point, `KeyId` its hash-160.
//! Both are plain value types; nothing here touches secret material.

use std::fmt;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::hashing::hash160;

/// Compressed secp256k1 public key length.
pub const PUB_KEY_SIZE: usize = 33;

/// Hash-160 address length.
pub const KEY_ID_SIZE: usize = 20;

/// 20-byte hash-160 address, the primary account key.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct KeyId(pub [u8; KEY_ID_SIZE]);

impl KeyId {
    pub fn new(bytes: [u8; KEY_ID_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; KEY_ID_SIZE] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_ID_SIZE] {
        &self.0
    }

    /// All-zero ids mark "no address"; they never correspond to a real key.
    pub fn is_null(&self) -> bool {
        self.0 == [0u8; KEY_ID_SIZE]
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl AsRef<[u8]> for KeyId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// 33-byte compressed secp256k1 public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PubKey(pub [u8; PUB_KEY_SIZE]);

impl PubKey {
    pub fn new(bytes: [u8; PUB_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; PUB_KEY_SIZE] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; PUB_KEY_SIZE] {
        &self.0
    }

    /// Hash-160 of the compressed encoding.
    pub fn key_id(&self) -> KeyId {
        KeyId(hash160(&self.0))
    }

    /// True iff the bytes decode to a point actually on the curve.
    ///
    /// A structurally well-sized key can still be off-curve; consensus
    /// rules distinguish the two.
    pub fn is_fully_valid(&self) -> bool {
        secp256k1::PublicKey::from_slice(&self.0).is_ok()
    }
}

impl fmt::Display for PubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Serialize for PubKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for PubKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = Vec::<u8>::deserialize(deserializer)?;
        PubKey::from_slice(&bytes)
            .ok_or_else(|| D::Error::custom(format!("bad pubkey length {}", bytes.len())))
    }
}

/// DER-encoded ECDSA signature bytes.
///
/// An empty signature is a legitimate wire state for multisig slots whose
/// signer abstained; verification of an empty signature always fails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature(pub Vec<u8>);

impl Signature {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_id_roundtrip() {
        let id = KeyId::new([7u8; KEY_ID_SIZE]);
        assert_eq!(KeyId::from_slice(id.as_ref()), Some(id));
        assert!(KeyId::from_slice(&[0u8; 19]).is_none());
    }

    #[test]
    fn null_key_id() {
        assert!(KeyId::default().is_null());
        assert!(!KeyId::new([1u8; KEY_ID_SIZE]).is_null());
    }

    #[test]
    fn garbage_pubkey_is_not_fully_valid() {
        // Right length, not a curve point.
        let pk = PubKey::new([0xABu8; PUB_KEY_SIZE]);
        assert!(!pk.is_fully_valid());
    }

    #[test]
    fn key_id_matches_hash160_of_encoding() {
        let pk = PubKey::new([2u8; PUB_KEY_SIZE]);
        assert_eq!(pk.key_id().0, crate::hashing::hash160(pk.as_bytes()));
    }
}
