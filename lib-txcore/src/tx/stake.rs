//! Reserved stake kind.
//!
//! Deserialises and hashes so future software can relay it, but the
//! execution body is not activated: check rejects it unconditionally.
//! Lifting the rejection is a consensus decision, not a code change to
//! make casually.

use lib_crypto::Signature;
use serde::{Deserialize, Serialize};

use crate::validation::{RejectCode, TxError, TxResult, ValidationState};

use super::{encode_common, encode_signature, TxExecOutcome};
use crate::serialize::write_varint;

/// Stake fuel coins (reserved, not yet activated).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FcoinStakeTx {
    pub version: u8,
    pub valid_height: u32,
    pub fee: u64,
    pub stake_amount: u64,
    pub signature: Signature,
}

impl FcoinStakeTx {
    pub(super) fn encode_body(&self, buf: &mut Vec<u8>, include_sigs: bool) {
        encode_common(buf, self.version, self.valid_height, self.fee);
        write_varint(buf, self.stake_amount);
        encode_signature(buf, include_sigs, &self.signature);
    }

    pub(super) fn check(&self, state: &mut ValidationState) -> TxResult<()> {
        Err(state.dos(
            100,
            "stake transactions are reserved and not yet activated".into(),
            RejectCode::Invalid,
            "tx-kind-reserved",
        ))
    }

    pub(super) fn execute(&self, state: &mut ValidationState) -> TxResult<TxExecOutcome> {
        Err(state.dos(
            100,
            "stake transactions are reserved and not yet activated".into(),
            RejectCode::Invalid,
            "tx-kind-reserved",
        ))
    }

    pub(super) fn undo_execute(&self, _state: &mut ValidationState) -> TxResult<()> {
        // A reserved kind can never have committed, so an undo record for
        // one is evidence of corruption.
        Err(TxError::UndoCorrupt(
            "undo record for a reserved stake transaction".into(),
        ))
    }
}
