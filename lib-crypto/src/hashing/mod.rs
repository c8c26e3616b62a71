//! Hashing for the Veridian chain
//!
//! Double-SHA256 is the canonical hash for transaction ids and signature
//! hashes; hash-160 (RIPEMD160 over SHA256) is the canonical address
//! derivation. Both must stay byte-stable forever: every historical block
//! hash depends on them.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Single SHA256.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let digest = Sha256::digest(data);
    digest.into()
}

/// Double SHA256, the canonical consensus hash.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    second.into()
}

/// Hash-160: RIPEMD160 over SHA256, the canonical address hash.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    let digest = Ripemd160::digest(sha);
    digest.into()
}
