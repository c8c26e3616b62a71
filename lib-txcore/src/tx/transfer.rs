//! Base-coin transfer.
//!
//! Moves free balance between two principals. A `PubKey`-referenced
//! source that has never been registered gets its registry id assigned
//! lazily from this block position; undo detects the assignment by
//! comparing the live account against its pre-image and clears it.

use std::collections::BTreeSet;

use lib_crypto::{sha256d, verify_signature, KeyId, Signature};
use serde::{Deserialize, Serialize};

use crate::account::{Account, BalanceOp};
use crate::constants::MEMO_MAX;
use crate::ids::UserRef;
use crate::types::TxHash;
use crate::undo::TxUndo;
use crate::validation::{RejectCode, TxResult, ValidationState};
use crate::view::{AccountView, ScriptView};

use super::{
    check_fee, check_signature_size, encode_common, encode_signature, encode_user_ref,
    index_tx_by_address, restore_one_account, undo_db_ops, TxContext, TxExecOutcome, TxKind,
};
use crate::serialize::{write_bytes, write_varint};

/// Transfer base coins from one principal to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTx {
    pub version: u8,
    pub valid_height: u32,
    pub fee: u64,
    /// Source: `Reg` or `Pub`.
    pub from: UserRef,
    /// Destination: `Reg` or `Key`.
    pub to: UserRef,
    pub amount: u64,
    pub memo: Vec<u8>,
    pub signature: Signature,
}

impl TransferTx {
    pub(super) fn encode_body(&self, buf: &mut Vec<u8>, include_sigs: bool) {
        encode_common(buf, self.version, self.valid_height, self.fee);
        encode_user_ref(buf, &self.from);
        encode_user_ref(buf, &self.to);
        write_varint(buf, self.amount);
        write_bytes(buf, &self.memo);
        encode_signature(buf, include_sigs, &self.signature);
    }

    fn sig_hash(&self) -> [u8; 32] {
        let mut buf = vec![TxKind::Transfer.tag()];
        self.encode_body(&mut buf, false);
        sha256d(&buf)
    }

    pub(super) fn check(
        &self,
        view: &dyn AccountView,
        state: &mut ValidationState,
        ctx: &TxContext,
    ) -> TxResult<()> {
        if self.memo.len() > MEMO_MAX {
            return Err(state.dos(
                100,
                format!("memo of {} bytes exceeds maximum {MEMO_MAX}", self.memo.len()),
                RejectCode::Invalid,
                "memo-size-toolarge",
            ));
        }

        if !matches!(self.from, UserRef::Reg(_) | UserRef::Pub(_)) {
            return Err(state.dos(
                100,
                format!("transfer source must be regid or pubkey, got {}", self.from.kind_name()),
                RejectCode::Invalid,
                "srcaddr-type-error",
            ));
        }

        if !matches!(self.to, UserRef::Reg(_) | UserRef::Key(_)) {
            return Err(state.dos(
                100,
                format!(
                    "transfer destination must be regid or keyid, got {}",
                    self.to.kind_name()
                ),
                RejectCode::Invalid,
                "desaddr-type-error",
            ));
        }

        if let Some(pub_key) = self.from.as_pub_key() {
            if !pub_key.is_fully_valid() {
                return Err(state.dos(
                    100,
                    format!("source pubkey {pub_key} is not on the curve"),
                    RejectCode::Invalid,
                    "bad-commontx-publickey",
                ));
            }
        }

        check_fee(state, &ctx.features, self.fee, TxKind::Transfer)?;

        let src_account = view.get_account(&self.from).ok_or_else(|| {
            state.dos(
                100,
                format!("source account {} not found", self.from),
                RejectCode::Invalid,
                "bad-getaccount",
            )
        })?;

        if matches!(self.from, UserRef::Reg(_)) && !src_account.is_registered() {
            return Err(state.dos(
                100,
                format!("source account {} has no registered pubkey", self.from),
                RejectCode::Invalid,
                "bad-account-unregistered",
            ));
        }

        check_signature_size(state, &self.signature)?;

        let signing_key = match self.from.as_pub_key() {
            Some(pk) => Some(pk),
            None => src_account.pub_key,
        };
        let verified = signing_key
            .map(|pk| verify_signature(&self.sig_hash(), &self.signature, &pk))
            .unwrap_or(false);
        if !verified {
            return Err(state.dos(
                100,
                format!("transfer signature invalid for source {}", self.from),
                RejectCode::Invalid,
                "bad-signscript-check",
            ));
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

        let mut src = view.get_account(&self.from).ok_or_else(|| {
            state.dos(
                100,
                format!("read of source account {} failed", self.from),
                RejectCode::ReadAccountFail,
                "bad-read-accountdb",
            )
        })?;
        undo.snapshot_account(&src);

        let mut assigned_reg_id = None;
        if let Some(pub_key) = self.from.as_pub_key() {
            src.pub_key = Some(pub_key);
            if view.get_reg_id(&self.from).is_none() {
                let reg_id = ctx.alloc_reg_id();
                src.reg_id = Some(reg_id);
                assigned_reg_id = Some(reg_id);
            }
        }

        let minus_value = self.fee.checked_add(self.amount).ok_or_else(|| {
            state.dos(
                100,
                "fee plus amount overflows".into(),
                RejectCode::UpdateAccountFail,
                "operate-minus-account-failed",
            )
        })?;
        src.operate(BalanceOp::SubFree, minus_value, ctx.height)
            .map_err(|e| {
                state.dos(
                    100,
                    format!("debit of source {} failed: {e}", src.key_id),
                    RejectCode::UpdateAccountFail,
                    "operate-minus-account-failed",
                )
            })?;

        let write_result = match assigned_reg_id {
            Some(reg_id) => view.save_account_info(reg_id, src.key_id, src.clone()),
            None => view.store_account(src.key_id, src.clone()),
        };
        write_result.map_err(|e| {
            state.dos(
                100,
                format!("write of source {} failed: {e}", src.key_id),
                RejectCode::WriteAccountFail,
                "bad-write-accountdb",
            )
        })?;

        let mut des = match view.get_account(&self.to) {
            Some(account) => account,
            None => match self.to.as_key_id() {
                Some(key_id) => Account::new(key_id),
                None => {
                    return Err(state.dos(
                        100,
                        format!("destination account {} not found", self.to),
                        RejectCode::ReadAccountFail,
                        "bad-read-accountdb",
                    ))
                }
            },
        };
        undo.snapshot_account(&des);

        des.operate(BalanceOp::AddFree, self.amount, ctx.height)
            .map_err(|e| {
                state.dos(
                    100,
                    format!("credit of destination {} failed: {e}", des.key_id),
                    RejectCode::UpdateAccountFail,
                    "operate-add-account-failed",
                )
            })?;
        let des_key = des.key_id;
        view.store_account(des_key, des).map_err(|e| {
            state.dos(
                100,
                format!("write of destination {des_key} failed: {e}"),
                RejectCode::UpdateAccountFail,
                "bad-save-account",
            )
        })?;

        if ctx.address_index {
            index_tx_by_address(scripts, &mut undo, state, &src.key_id, ctx)?;
            index_tx_by_address(scripts, &mut undo, state, &des_key, ctx)?;
        }

        Ok(TxExecOutcome { undo, run_step: 0 })
    }

    pub(super) fn undo_execute(
        &self,
        view: &mut dyn AccountView,
        scripts: &mut dyn ScriptView,
        state: &mut ValidationState,
        ctx: &TxContext,
        undo: &TxUndo,
    ) -> TxResult<()> {
        undo_transfer_like(view, scripts, state, ctx, undo)
    }

    pub(super) fn addresses(&self, view: &dyn AccountView) -> Option<BTreeSet<KeyId>> {
        let mut set = BTreeSet::new();
        set.insert(view.get_key_id(&self.from)?);
        set.insert(view.get_key_id(&self.to)?);
        Some(set)
    }
}

/// Shared undo for transfers and multisig transfers.
///
/// Restores pre-images in reverse; an account whose live record carries a
/// registry id allocated by this block position had it assigned here
/// (explicitly or lazily), so the index entry is erased alongside.
pub(super) fn undo_transfer_like(
    view: &mut dyn AccountView,
    scripts: &mut dyn ScriptView,
    state: &mut ValidationState,
    ctx: &TxContext,
    undo: &TxUndo,
) -> TxResult<()> {
    let assigned = ctx.alloc_reg_id();

    for pre in undo.accounts.iter().rev() {
        let current = view.load_account(&pre.key_id).ok_or_else(|| {
            state.dos(
                100,
                format!("undo read of account {} failed", pre.key_id),
                RejectCode::ReadAccountFail,
                "bad-read-accountdb",
            )
        })?;
        let assigned_here =
            current.reg_id == Some(assigned) && pre.reg_id != Some(assigned);

        restore_one_account(view, state, pre)?;

        if assigned_here {
            view.erase_reg_id(&assigned).map_err(|e| {
                state.dos(
                    100,
                    format!("erase of reg id {assigned} failed: {e}"),
                    RejectCode::UpdateAccountFail,
                    "bad-write-accountdb",
                )
            })?;
        }
    }

    undo_db_ops(scripts, state, undo)
}
