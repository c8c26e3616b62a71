//! Contract invocation.
//!
//! Transfers the attached amount to the contract account, then reenters
//! the VM through the runtime adapter. The adapter's account mutations
//! are written through here (after snapshotting), and its DB-write log is
//! merged verbatim into this transaction's undo record, so one reversal
//! pass undoes everything the call did.

use std::collections::BTreeSet;

use lib_crypto::{sha256d, verify_signature, KeyId, Signature};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::account::{Account, BalanceOp};
use crate::constants::ARG_MAX;
use crate::ids::UserRef;
use crate::resolver;
use crate::types::TxHash;
use crate::undo::TxUndo;
use crate::validation::{RejectCode, TxResult, ValidationState};
use crate::view::{AccountView, ScriptView};
use crate::vm::{ContractContext, ContractRuntime};

use super::{
    check_fee, check_signature_size, encode_common, encode_signature, encode_user_ref,
    index_tx_by_address, restore_account_preimages, undo_db_ops, TxContext, TxExecOutcome, TxKind,
};
use crate::serialize::{write_bytes, write_varint};

/// Invoke a registered contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCallTx {
    pub version: u8,
    pub valid_height: u32,
    pub fee: u64,
    /// Caller. Must be a `Reg` reference.
    pub from: UserRef,
    /// Contract account. Must be a `Reg` reference.
    pub app: UserRef,
    pub amount: u64,
    pub arguments: Vec<u8>,
    pub signature: Signature,
}

impl ContractCallTx {
    pub(super) fn encode_body(&self, buf: &mut Vec<u8>, include_sigs: bool) {
        encode_common(buf, self.version, self.valid_height, self.fee);
        encode_user_ref(buf, &self.from);
        encode_user_ref(buf, &self.app);
        write_varint(buf, self.amount);
        write_bytes(buf, &self.arguments);
        encode_signature(buf, include_sigs, &self.signature);
    }

    fn sig_hash(&self) -> [u8; 32] {
        let mut buf = vec![TxKind::ContractCall.tag()];
        self.encode_body(&mut buf, false);
        sha256d(&buf)
    }

    pub(super) fn check(
        &self,
        view: &dyn AccountView,
        scripts: &dyn ScriptView,
        state: &mut ValidationState,
        ctx: &TxContext,
    ) -> TxResult<()> {
        if self.arguments.len() > ARG_MAX {
            return Err(state.dos(
                100,
                format!(
                    "arguments of {} bytes exceed maximum {ARG_MAX}",
                    self.arguments.len()
                ),
                RejectCode::Invalid,
                "arguments-size-toolarge",
            ));
        }

        let Some(_caller) = self.from.as_reg_id() else {
            return Err(state.dos(
                100,
                format!("caller must be a regid, got {}", self.from.kind_name()),
                RejectCode::Invalid,
                "srcaddr-type-error",
            ));
        };
        let Some(app_id) = self.app.as_reg_id() else {
            return Err(state.dos(
                100,
                format!("app must be a regid, got {}", self.app.kind_name()),
                RejectCode::Invalid,
                "desaddr-type-error",
            ));
        };

        check_fee(state, &ctx.features, self.fee, TxKind::ContractCall)?;

        let src_account = view.get_account(&self.from).ok_or_else(|| {
            state.dos(
                100,
                format!("caller account {} not found", self.from),
                RejectCode::Invalid,
                "bad-getaccount",
            )
        })?;
        if !src_account.is_registered() {
            return Err(state.dos(
                100,
                format!("caller account {} has no registered pubkey", self.from),
                RejectCode::Invalid,
                "bad-account-unregistered",
            ));
        }

        if scripts.get_script(&app_id).is_none() {
            return Err(state.dos(
                100,
                format!("no contract script at {app_id}"),
                RejectCode::Invalid,
                "bad-read-script",
            ));
        }

        check_signature_size(state, &self.signature)?;

        let verified = src_account
            .pub_key
            .map(|pk| verify_signature(&self.sig_hash(), &self.signature, &pk))
            .unwrap_or(false);
        if !verified {
            return Err(state.dos(
                100,
                format!("contract call signature invalid for {}", self.from),
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
        runtime: &dyn ContractRuntime,
        state: &mut ValidationState,
        ctx: &TxContext,
        tx_hash: TxHash,
    ) -> TxResult<TxExecOutcome> {
        let mut undo = TxUndo::new(tx_hash);

        let (Some(caller), Some(app_id)) = (self.from.as_reg_id(), self.app.as_reg_id()) else {
            return Err(state.dos(
                100,
                "contract call principals must be regids".into(),
                RejectCode::UpdateAccountFail,
                "srcaddr-type-error",
            ));
        };

        let mut src = view.get_account(&self.from).ok_or_else(|| {
            state.dos(
                100,
                format!("read of caller account {caller} failed"),
                RejectCode::ReadAccountFail,
                "bad-read-accountdb",
            )
        })?;
        undo.snapshot_account(&src);

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
                    format!("debit of caller {} failed: {e}", src.key_id),
                    RejectCode::UpdateAccountFail,
                    "operate-minus-account-failed",
                )
            })?;
        let src_key = src.key_id;
        view.store_account(src_key, src).map_err(|e| {
            state.dos(
                100,
                format!("write of caller {src_key} failed: {e}"),
                RejectCode::WriteAccountFail,
                "bad-write-accountdb",
            )
        })?;

        let mut des = view.get_account(&self.app).ok_or_else(|| {
            state.dos(
                100,
                format!("read of contract account {app_id} failed"),
                RejectCode::ReadAccountFail,
                "bad-read-accountdb",
            )
        })?;
        undo.snapshot_account(&des);

        des.operate(BalanceOp::AddFree, self.amount, ctx.height)
            .map_err(|e| {
                state.dos(
                    100,
                    format!("credit of contract {} failed: {e}", des.key_id),
                    RejectCode::UpdateAccountFail,
                    "operate-add-account-failed",
                )
            })?;
        let des_key = des.key_id;
        view.store_account(des_key, des).map_err(|e| {
            state.dos(
                100,
                format!("write of contract {des_key} failed: {e}"),
                RejectCode::UpdateAccountFail,
                "bad-save-account",
            )
        })?;

        if scripts.get_script(&app_id).is_none() {
            return Err(state.dos(
                100,
                format!("no contract script at {app_id}"),
                RejectCode::ReadAccountFail,
                "bad-read-script",
            ));
        }

        let vm_ctx = ContractContext {
            tx_hash,
            caller,
            app: app_id,
            amount: self.amount,
            arguments: &self.arguments,
            height: ctx.height,
            fuel_rate: ctx.fuel_rate,
        };
        let output = runtime.execute(&vm_ctx, &*view, scripts).map_err(|e| {
            state.dos(
                100,
                format!("txid {tx_hash} run script error: {e}"),
                RejectCode::UpdateAccountFail,
                "run-script-error",
            )
        })?;
        debug!(
            tx = %tx_hash,
            run_step = output.run_step,
            mutated = output.accounts.len(),
            "contract call executed"
        );

        let mut related: BTreeSet<KeyId> = BTreeSet::new();
        related.insert(src_key);
        related.insert(des_key);

        for account in &output.accounts {
            if account.key_id.is_null() {
                return Err(state.dos(
                    100,
                    "script mutated an account with a null address".into(),
                    RejectCode::UpdateAccountFail,
                    "bad-read-accountdb",
                ));
            }
            let old = view
                .load_account(&account.key_id)
                .unwrap_or_else(|| Account::new(account.key_id));
            undo.snapshot_account(&old);
            view.store_account(account.key_id, account.clone())
                .map_err(|e| {
                    state.dos(
                        100,
                        format!("write of script account {} failed: {e}", account.key_id),
                        RejectCode::UpdateAccountFail,
                        "bad-write-accountdb",
                    )
                })?;
            related.insert(account.key_id);
        }

        // The adapter's own write log, verbatim and in order.
        for op in output.db_log {
            undo.push_db_op(op);
        }

        for blob in &output.app_user_ids {
            if let Some(key_id) = resolver::key_id_from_blob(&*view, blob) {
                related.insert(key_id);
            }
        }

        scripts
            .set_tx_related_accounts(&tx_hash, &related)
            .map_err(|e| {
                state.dos(
                    100,
                    format!("write of related accounts for {tx_hash} failed: {e}"),
                    RejectCode::UpdateAccountFail,
                    "bad-save-scriptdb",
                )
            })?;

        if ctx.address_index {
            index_tx_by_address(scripts, &mut undo, state, &src_key, ctx)?;
            index_tx_by_address(scripts, &mut undo, state, &des_key, ctx)?;
        }

        Ok(TxExecOutcome {
            undo,
            run_step: output.run_step,
        })
    }

    pub(super) fn undo_execute(
        &self,
        view: &mut dyn AccountView,
        scripts: &mut dyn ScriptView,
        state: &mut ValidationState,
        undo: &TxUndo,
        tx_hash: TxHash,
    ) -> TxResult<()> {
        restore_account_preimages(view, state, undo)?;
        undo_db_ops(scripts, state, undo)?;
        scripts.erase_tx_related_accounts(&tx_hash).map_err(|e| {
            state.dos(
                100,
                format!("erase of related accounts for {tx_hash} failed: {e}"),
                RejectCode::UpdateAccountFail,
                "bad-save-scriptdb",
            )
        })
    }

    pub(super) fn addresses(
        &self,
        view: &dyn AccountView,
        scripts: &dyn ScriptView,
        tx_hash: TxHash,
    ) -> Option<BTreeSet<KeyId>> {
        if let Some(related) = scripts.get_tx_related_accounts(&tx_hash) {
            return Some(related);
        }
        let mut set = BTreeSet::new();
        set.insert(view.get_key_id(&self.from)?);
        set.insert(view.get_key_id(&self.app)?);
        Some(set)
    }
}
