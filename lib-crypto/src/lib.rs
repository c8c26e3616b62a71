//! Veridian cryptography package
//!
//! Hashing and signature primitives shared by the transaction execution
//! core. The chain commits to double-SHA256 for canonical hashes, hash-160
//! for addresses, and secp256k1 ECDSA over 33-byte compressed keys.
//!
//! # Canonical Consensus Hash
//!
//! **Double-SHA256 is the canonical hash for all consensus-critical data.**
//! Transaction ids and signature hashes MUST be produced with
//! [`hashing::sha256d`]; addresses MUST be produced with
//! [`hashing::hash160`]. Using an alternate hash for consensus objects
//! breaks replay of historical blocks.

pub mod hashing;
pub mod types;
pub mod verification;

pub use hashing::{hash160, sha256, sha256d};
pub use types::keys::{KeyId, PubKey, Signature, KEY_ID_SIZE, PUB_KEY_SIZE};
pub use verification::{pub_key_for_secret, sign_hash, verify_signature, SignError};
