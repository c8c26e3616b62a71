//! Delegate voting.
//!
//! Moves balance between the voter's free pool and per-candidate vote
//! funds, and mirrors every delta into the candidates' received tallies
//! and the on-disk ranking index. The ranking index is kept consistent by
//! erasing a candidate's old entry before writing the new one.

use std::collections::BTreeSet;

use lib_crypto::{sha256d, verify_signature, KeyId, Signature};
use serde::{Deserialize, Serialize};

use crate::account::{BalanceOp, ResolvedVoteOp, VoteOp};
use crate::constants::{money_range, MAX_DELEGATES};
use crate::ids::UserRef;
use crate::types::TxHash;
use crate::undo::TxUndo;
use crate::validation::{RejectCode, TxResult, ValidationState};
use crate::view::{AccountView, ScriptView};

use super::{
    check_fee, check_signature_size, encode_common, encode_signature, encode_user_ref,
    index_tx_by_address, restore_account_preimages, undo_db_ops, TxContext, TxExecOutcome, TxKind,
};
use crate::serialize::write_varint;

/// One vote operation as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteOperation {
    pub op: VoteOp,
    /// Candidate. Must be a `Reg` reference.
    pub candidate: UserRef,
    pub count: u64,
}

/// Adjust the voter's delegate votes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegateVoteTx {
    pub version: u8,
    pub valid_height: u32,
    pub fee: u64,
    /// Voter. Must be a `Reg` reference.
    pub from: UserRef,
    pub operations: Vec<VoteOperation>,
    pub signature: Signature,
}

impl DelegateVoteTx {
    pub(super) fn encode_body(&self, buf: &mut Vec<u8>, include_sigs: bool) {
        encode_common(buf, self.version, self.valid_height, self.fee);
        encode_user_ref(buf, &self.from);
        write_varint(buf, self.operations.len() as u64);
        for operation in &self.operations {
            buf.push(match operation.op {
                VoteOp::Add => 1,
                VoteOp::Sub => 2,
            });
            encode_user_ref(buf, &operation.candidate);
            write_varint(buf, operation.count);
        }
        encode_signature(buf, include_sigs, &self.signature);
    }

    fn sig_hash(&self) -> [u8; 32] {
        let mut buf = vec![TxKind::DelegateVote.tag()];
        self.encode_body(&mut buf, false);
        sha256d(&buf)
    }

    pub(super) fn check(
        &self,
        view: &dyn AccountView,
        state: &mut ValidationState,
        ctx: &TxContext,
    ) -> TxResult<()> {
        if self.from.as_reg_id().is_none() {
            return Err(state.dos(
                100,
                format!("voter must be a regid, got {}", self.from.kind_name()),
                RejectCode::Invalid,
                "srcaddr-type-error",
            ));
        }

        if self.operations.is_empty() {
            return Err(state.dos(
                100,
                "vote operation list is empty".into(),
                RejectCode::Invalid,
                "oper-fund-empty-error",
            ));
        }
        if self.operations.len() > MAX_DELEGATES {
            return Err(state.dos(
                100,
                format!(
                    "{} vote operations exceed maximum {MAX_DELEGATES}",
                    self.operations.len()
                ),
                RejectCode::Invalid,
                "delegates-number-error",
            ));
        }

        check_fee(state, &ctx.features, self.fee, TxKind::DelegateVote)?;

        let voter = view.get_account(&self.from).ok_or_else(|| {
            state.dos(
                100,
                format!("voter account {} not found", self.from),
                RejectCode::Invalid,
                "bad-read-accountdb",
            )
        })?;
        if !voter.is_registered() {
            return Err(state.dos(
                100,
                format!("voter account {} has no registered pubkey", self.from),
                RejectCode::Invalid,
                "bad-no-pubkey",
            ));
        }

        if ctx.features.verifies_vote_signature() {
            check_signature_size(state, &self.signature)?;
            let verified = voter
                .pub_key
                .map(|pk| verify_signature(&self.sig_hash(), &self.signature, &pk))
                .unwrap_or(false);
            if !verified {
                return Err(state.dos(
                    100,
                    format!("vote signature invalid for {}", self.from),
                    RejectCode::Invalid,
                    "bad-signscript-check",
                ));
            }
        }

        let mut seen_candidates: BTreeSet<KeyId> = BTreeSet::new();
        for operation in &self.operations {
            if operation.count == 0 || !money_range(operation.count) {
                return Err(state.dos(
                    100,
                    format!("vote count {} outside (0, MAX_MONEY]", operation.count),
                    RejectCode::Invalid,
                    "bad-vote-count",
                ));
            }

            let candidate = view.get_account(&operation.candidate).ok_or_else(|| {
                state.dos(
                    100,
                    format!("candidate account {} not found", operation.candidate),
                    RejectCode::Invalid,
                    "bad-read-accountdb",
                )
            })?;

            if ctx.features.requires_registered_candidates() && !candidate.is_registered() {
                return Err(state.dos(
                    100,
                    format!("candidate account {} is unregistered", operation.candidate),
                    RejectCode::Invalid,
                    "bad-candidate-unregistered",
                ));
            }

            if !seen_candidates.insert(candidate.key_id) {
                return Err(state.dos(
                    100,
                    format!("duplicate vote for candidate {}", operation.candidate),
                    RejectCode::Invalid,
                    "delegates-duplication-fund-error",
                ));
            }
        }

        Ok(())
    }

    pub(super) fn execute(
        &self,
        view: &mut dyn AccountView,
        scripts: &mut dyn ScriptView,
        state: &mut ValidationState,
        ctx: &TxContext,
        tx_hash: TxHash,
    ) -> TxResult<TxExecOutcome> {
        let mut undo = TxUndo::new(tx_hash);

        let mut voter = view.get_account(&self.from).ok_or_else(|| {
            state.dos(
                100,
                format!("read of voter account {} failed", self.from),
                RejectCode::UpdateAccountFail,
                "bad-read-accountdb",
            )
        })?;
        undo.snapshot_account(&voter);

        if self.fee > 0 {
            voter
                .operate(BalanceOp::SubFree, self.fee, ctx.height)
                .map_err(|e| {
                    state.dos(
                        100,
                        format!("fee deduction for {} failed: {e}", voter.key_id),
                        RejectCode::UpdateAccountFail,
                        "operate-account-failed",
                    )
                })?;
        }

        for operation in &self.operations {
            let candidate_key = view.get_key_id(&operation.candidate).ok_or_else(|| {
                state.dos(
                    100,
                    format!("candidate {} unresolvable", operation.candidate),
                    RejectCode::UpdateAccountFail,
                    "bad-read-accountdb",
                )
            })?;
            voter
                .apply_vote_op(&ResolvedVoteOp {
                    op: operation.op,
                    candidate: candidate_key,
                    count: operation.count,
                })
                .map_err(|e| {
                    state.dos(
                        100,
                        format!("vote fund update for {} failed: {e}", voter.key_id),
                        RejectCode::UpdateAccountFail,
                        "operate-delegate-failed",
                    )
                })?;
        }

        let voter_reg_id = voter.reg_id.ok_or_else(|| {
            state.dos(
                100,
                format!("voter account {} has no reg id", voter.key_id),
                RejectCode::UpdateAccountFail,
                "bad-account-unregistered",
            )
        })?;
        let voter_key = voter.key_id;
        view.save_account_info(voter_reg_id, voter_key, voter)
            .map_err(|e| {
                state.dos(
                    100,
                    format!("write of voter {voter_key} failed: {e}"),
                    RejectCode::UpdateAccountFail,
                    "bad-save-accountdb",
                )
            })?;

        for operation in &self.operations {
            let mut candidate = view.get_account(&operation.candidate).ok_or_else(|| {
                state.dos(
                    100,
                    format!("read of candidate {} failed", operation.candidate),
                    RejectCode::UpdateAccountFail,
                    "bad-read-accountdb",
                )
            })?;
            undo.snapshot_account(&candidate);

            let before_mutation = candidate.clone();
            candidate
                .operate_received_votes(operation.op, operation.count)
                .map_err(|e| {
                    state.dos(
                        100,
                        format!("received-vote update for {} failed: {e}", candidate.key_id),
                        RejectCode::UpdateAccountFail,
                        "operate-vote-error",
                    )
                })?;

            // Old ranking entry out first, then the new one in.
            if before_mutation.received_votes > 0 {
                let op = scripts.erase_delegate_data(&before_mutation).map_err(|e| {
                    state.dos(
                        100,
                        format!("erase of ranking entry for {} failed: {e}", candidate.key_id),
                        RejectCode::UpdateAccountFail,
                        "bad-save-scriptdb",
                    )
                })?;
                undo.push_db_op(op);
            }
            let op = scripts.set_delegate_data(&candidate).map_err(|e| {
                state.dos(
                    100,
                    format!("write of ranking entry for {} failed: {e}", candidate.key_id),
                    RejectCode::UpdateAccountFail,
                    "bad-save-scriptdb",
                )
            })?;
            undo.push_db_op(op);

            let candidate_key = candidate.key_id;
            let write_result = match candidate.reg_id {
                Some(reg_id) => view.save_account_info(reg_id, candidate_key, candidate),
                None => view.store_account(candidate_key, candidate),
            };
            write_result.map_err(|e| {
                state.dos(
                    100,
                    format!("write of candidate {candidate_key} failed: {e}"),
                    RejectCode::UpdateAccountFail,
                    "bad-save-accountdb",
                )
            })?;
        }

        if ctx.address_index {
            index_tx_by_address(scripts, &mut undo, state, &voter_key, ctx)?;
        }

        Ok(TxExecOutcome { undo, run_step: 0 })
    }

    pub(super) fn undo_execute(
        &self,
        view: &mut dyn AccountView,
        scripts: &mut dyn ScriptView,
        state: &mut ValidationState,
        undo: &TxUndo,
    ) -> TxResult<()> {
        restore_account_preimages(view, state, undo)?;
        undo_db_ops(scripts, state, undo)
    }

    /// Historically returns no addresses; downstream index consumers do
    /// not see vote transactions. Kept for replay compatibility.
    pub(super) fn addresses(&self) -> Option<BTreeSet<KeyId>> {
        Some(BTreeSet::new())
    }
}
