//! Signature verification
//!
//! ECDSA over secp256k1 with DER-encoded signatures. Verification is
//! context-reusing: one secp256k1 context per thread, never rebuilt per
//! call.

use secp256k1::ecdsa::Signature as EcdsaSignature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

use crate::types::keys::{PubKey, Signature};

thread_local! {
    static SECP256K1_CONTEXT: Secp256k1<secp256k1::All> = Secp256k1::new();
}

/// Signing failure. Verification never errors; it only answers yes or no.
#[derive(Error, Debug)]
pub enum SignError {
    #[error("invalid secret key bytes")]
    BadSecretKey,
}

/// Verify a DER signature over a 32-byte canonical hash.
///
/// Any malformed input (empty signature, bad DER, off-curve key) counts as
/// a verification failure, not an error: consensus code branches on a
/// boolean here, exactly once, per signer.
pub fn verify_signature(sighash: &[u8; 32], signature: &Signature, pub_key: &PubKey) -> bool {
    if signature.is_empty() {
        return false;
    }

    let Ok(pk) = PublicKey::from_slice(pub_key.as_bytes()) else {
        return false;
    };
    let Ok(sig) = EcdsaSignature::from_der(signature.as_bytes()) else {
        return false;
    };
    let msg = Message::from_digest(*sighash);

    SECP256K1_CONTEXT.with(|secp| secp.verify_ecdsa(&msg, &sig, &pk).is_ok())
}

/// Sign a 32-byte canonical hash, returning the DER encoding.
///
/// Lives here so fixtures and wallet-side tooling share one signing path;
/// the execution core itself only ever verifies.
pub fn sign_hash(sighash: &[u8; 32], secret: &[u8; 32]) -> Result<Signature, SignError> {
    let sk = SecretKey::from_slice(secret).map_err(|_| SignError::BadSecretKey)?;
    let msg = Message::from_digest(*sighash);
    let sig = SECP256K1_CONTEXT.with(|secp| secp.sign_ecdsa(&msg, &sk));
    Ok(Signature::new(sig.serialize_der().to_vec()))
}

/// Compressed public key for a secret key. Test fixtures derive all their
/// principals from fixed seeds through this.
pub fn pub_key_for_secret(secret: &[u8; 32]) -> Result<PubKey, SignError> {
    let sk = SecretKey::from_slice(secret).map_err(|_| SignError::BadSecretKey)?;
    let pk = SECP256K1_CONTEXT.with(|secp| PublicKey::from_secret_key(secp, &sk));
    Ok(PubKey::new(pk.serialize()))
}
