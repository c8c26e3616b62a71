//! Contract registration.
//!
//! Validates the script container, bills deployment fuel, and creates the
//! contract account at `hash160(reg_id_bytes)` with the freshly allocated
//! registry id. The fee bound deliberately floors the per-100-byte fuel
//! term (replay rule); the post-execution meter uses true ceiling
//! division.

use std::collections::BTreeSet;

use lib_crypto::{sha256d, verify_signature, KeyId, Signature};
use serde::{Deserialize, Serialize};

use crate::account::{Account, BalanceOp};
use crate::constants::{CONTRACT_DEPLOY_FUEL_FLOOR, FUEL_STEP};
use crate::ids::UserRef;
use crate::script::{ScriptFormatError, VmScript};
use crate::types::TxHash;
use crate::undo::TxUndo;
use crate::validation::{RejectCode, TxResult, ValidationState};
use crate::view::{AccountView, ScriptView};

use super::{
    check_fee, check_signature_size, encode_common, encode_signature, encode_user_ref,
    index_tx_by_address, restore_account_preimages, undo_db_ops, TxContext, TxExecOutcome, TxKind,
};
use crate::serialize::write_bytes;

/// Register a contract script on-chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterContractTx {
    pub version: u8,
    pub valid_height: u32,
    pub fee: u64,
    /// Registrant. Must be a `Reg` reference.
    pub from: UserRef,
    /// Script blob in the container format.
    pub script: Vec<u8>,
    pub signature: Signature,
}

impl RegisterContractTx {
    pub(super) fn encode_body(&self, buf: &mut Vec<u8>, include_sigs: bool) {
        encode_common(buf, self.version, self.valid_height, self.fee);
        encode_user_ref(buf, &self.from);
        write_bytes(buf, &self.script);
        encode_signature(buf, include_sigs, &self.signature);
    }

    fn sig_hash(&self) -> [u8; 32] {
        let mut buf = vec![TxKind::RegisterContract.tag()];
        self.encode_body(&mut buf, false);
        sha256d(&buf)
    }

    /// Check-time fuel bound. Integer division under-counts up to one
    /// unit per `FUEL_STEP` bytes; historical blocks replay against this
    /// exact bound.
    fn deploy_fuel_bound(&self, fuel_rate: u64) -> u64 {
        let fuel = (self.script.len() as u64 / FUEL_STEP) * fuel_rate;
        fuel.max(CONTRACT_DEPLOY_FUEL_FLOOR)
    }

    pub(super) fn check(
        &self,
        view: &dyn AccountView,
        state: &mut ValidationState,
        ctx: &TxContext,
    ) -> TxResult<()> {
        if let Err(e) = VmScript::from_bytes(&self.script) {
            let tag = match e {
                ScriptFormatError::Malformed(_) => "unserialize-error",
                _ => "vmscript-invalid",
            };
            return Err(state.dos(
                100,
                format!("script container invalid: {e}"),
                RejectCode::Invalid,
                tag,
            ));
        }

        if self.from.as_reg_id().is_none() {
            return Err(state.dos(
                100,
                format!("registrant must be a regid, got {}", self.from.kind_name()),
                RejectCode::Invalid,
                "regacctid-type-error",
            ));
        }

        check_fee(state, &ctx.features, self.fee, TxKind::RegisterContract)?;

        let fuel = self.deploy_fuel_bound(ctx.fuel_rate);
        if self.fee < fuel {
            return Err(state.dos(
                100,
                format!("deploy fee {} below fuel bound {fuel}", self.fee),
                RejectCode::Invalid,
                "fee-below-fuel",
            ));
        }

        let account = view.get_account(&self.from).ok_or_else(|| {
            state.dos(
                100,
                format!("registrant account {} not found", self.from),
                RejectCode::Invalid,
                "bad-getaccount",
            )
        })?;
        if !account.is_registered() {
            return Err(state.dos(
                100,
                format!("registrant account {} has no registered pubkey", self.from),
                RejectCode::Invalid,
                "bad-no-pubkey",
            ));
        }

        check_signature_size(state, &self.signature)?;

        let verified = account
            .pub_key
            .map(|pk| verify_signature(&self.sig_hash(), &self.signature, &pk))
            .unwrap_or(false);
        if !verified {
            return Err(state.dos(
                100,
                format!("deploy signature invalid for {}", self.from),
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

        let mut registrant = view.get_account(&self.from).ok_or_else(|| {
            state.dos(
                100,
                format!("read of registrant account {} failed", self.from),
                RejectCode::UpdateAccountFail,
                "bad-read-accountdb",
            )
        })?;
        undo.snapshot_account(&registrant);

        if self.fee > 0 {
            registrant
                .operate(BalanceOp::SubFree, self.fee, ctx.height)
                .map_err(|e| {
                    state.dos(
                        100,
                        format!("fee deduction for {} failed: {e}", registrant.key_id),
                        RejectCode::UpdateAccountFail,
                        "operate-account-failed",
                    )
                })?;
        }
        let registrant_key = registrant.key_id;
        view.store_account(registrant_key, registrant).map_err(|e| {
            state.dos(
                100,
                format!("write of registrant {registrant_key} failed: {e}"),
                RejectCode::UpdateAccountFail,
                "bad-save-accountdb",
            )
        })?;

        // Contract account owned by the allocated id itself.
        let reg_id = ctx.alloc_reg_id();
        let key_id = reg_id.script_key_id();
        undo.snapshot_account(&Account::new(key_id));

        let mut contract_account = Account::new(key_id);
        contract_account.reg_id = Some(reg_id);

        scripts.set_script(reg_id, self.script.clone()).map_err(|e| {
            state.dos(
                100,
                format!("write of script {reg_id} failed: {e}"),
                RejectCode::UpdateAccountFail,
                "bad-save-scriptdb",
            )
        })?;
        view.save_account_info(reg_id, key_id, contract_account)
            .map_err(|e| {
                state.dos(
                    100,
                    format!("write of contract account {reg_id} failed: {e}"),
                    RejectCode::UpdateAccountFail,
                    "bad-save-scriptdb",
                )
            })?;

        if ctx.address_index {
            index_tx_by_address(scripts, &mut undo, state, &registrant_key, ctx)?;
        }

        Ok(TxExecOutcome {
            undo,
            run_step: self.script.len() as u64,
        })
    }

    pub(super) fn undo_execute(
        &self,
        view: &mut dyn AccountView,
        scripts: &mut dyn ScriptView,
        state: &mut ValidationState,
        ctx: &TxContext,
        undo: &TxUndo,
    ) -> TxResult<()> {
        let reg_id = ctx.alloc_reg_id();

        scripts.erase_script(&reg_id).map_err(|e| {
            state.dos(
                100,
                format!("erase of script {reg_id} failed: {e}"),
                RejectCode::UpdateAccountFail,
                "erase-script-failed",
            )
        })?;
        view.erase_reg_id(&reg_id).map_err(|e| {
            state.dos(
                100,
                format!("erase of contract reg id {reg_id} failed: {e}"),
                RejectCode::UpdateAccountFail,
                "erase-appkeyid-failed",
            )
        })?;

        restore_account_preimages(view, state, undo)?;
        undo_db_ops(scripts, state, undo)
    }

    pub(super) fn addresses(&self, view: &dyn AccountView) -> Option<BTreeSet<KeyId>> {
        let mut set = BTreeSet::new();
        set.insert(view.get_key_id(&self.from)?);
        Some(set)
    }
}
