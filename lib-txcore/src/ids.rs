//! Principal identifiers.
//!
//! A principal can be referred to four ways on the wire; [`UserRef`] is
//! the closed sum over them. [`RegId`] is the compact registry id handed
//! out the first time an account appears on-chain.

use std::fmt;

use lib_crypto::{hash160, KeyId, PubKey};
use serde::{Deserialize, Serialize};

/// Serialized width of a registry id.
pub const REG_ID_SIZE: usize = 6;

/// Compact `(height, index)` registry identifier.
///
/// Assigned once, by the block position that registered the account, and
/// removed only on undo of that same position.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct RegId {
    height: u32,
    index: u16,
}

impl RegId {
    pub fn new(height: u32, index: u16) -> Self {
        Self { height, index }
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    /// The default id is the "unassigned" sentinel; no account at height 0
    /// index 0 exists because genesis carries no registrations.
    pub fn is_empty(&self) -> bool {
        self.height == 0 && self.index == 0
    }

    /// Fixed six-byte encoding: `u32` height LE ‖ `u16` index LE.
    pub fn to_vec6(&self) -> [u8; REG_ID_SIZE] {
        let mut out = [0u8; REG_ID_SIZE];
        out[..4].copy_from_slice(&self.height.to_le_bytes());
        out[4..].copy_from_slice(&self.index.to_le_bytes());
        out
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != REG_ID_SIZE {
            return None;
        }
        let height = u32::from_le_bytes(bytes[..4].try_into().ok()?);
        let index = u16::from_le_bytes(bytes[4..].try_into().ok()?);
        Some(Self { height, index })
    }

    /// Address of the account owned by this id itself (contract accounts).
    pub fn script_key_id(&self) -> KeyId {
        KeyId::new(hash160(&self.to_vec6()))
    }
}

impl fmt::Display for RegId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.height, self.index)
    }
}

/// Reference to a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserRef {
    /// No principal. Only ever valid as an optional miner key slot.
    Null,
    /// Registry id assigned at `(height, index)`.
    Reg(RegId),
    /// Raw compressed public key.
    Pub(PubKey),
    /// Hash-160 address.
    Key(KeyId),
}

impl UserRef {
    pub fn is_null(&self) -> bool {
        matches!(self, UserRef::Null)
    }

    pub fn as_reg_id(&self) -> Option<RegId> {
        match self {
            UserRef::Reg(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_pub_key(&self) -> Option<PubKey> {
        match self {
            UserRef::Pub(pk) => Some(*pk),
            _ => None,
        }
    }

    pub fn as_key_id(&self) -> Option<KeyId> {
        match self {
            UserRef::Key(id) => Some(*id),
            _ => None,
        }
    }

    /// One-word tag for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            UserRef::Null => "null",
            UserRef::Reg(_) => "regid",
            UserRef::Pub(_) => "pubkey",
            UserRef::Key(_) => "keyid",
        }
    }
}

impl fmt::Display for UserRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRef::Null => write!(f, "null"),
            UserRef::Reg(id) => write!(f, "regid:{id}"),
            UserRef::Pub(pk) => write!(f, "pubkey:{pk}"),
            UserRef::Key(id) => write!(f, "keyid:{id}"),
        }
    }
}

impl From<RegId> for UserRef {
    fn from(id: RegId) -> Self {
        UserRef::Reg(id)
    }
}

impl From<PubKey> for UserRef {
    fn from(pk: PubKey) -> Self {
        UserRef::Pub(pk)
    }
}

impl From<KeyId> for UserRef {
    fn from(id: KeyId) -> Self {
        UserRef::Key(id)
    }
}
