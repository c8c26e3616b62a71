//! Multisig transfer.
//!
//! The source principal is a script-hash account whose address is
//! `hash160(required ‖ count ‖ sorted pubkeys)`. Listed signers supply
//! signatures in slots; empty slots are abstentions. Execution is a
//! transfer from the script account, with the address→tx index updated
//! for every listed signer plus the destination.

use std::collections::BTreeSet;

use lib_crypto::{hash160, sha256d, verify_signature, KeyId, PubKey, Signature};
use serde::{Deserialize, Serialize};

use crate::account::{Account, BalanceOp};
use crate::constants::{MEMO_MAX, MULSIG_MAX};
use crate::ids::{RegId, UserRef};
use crate::types::TxHash;
use crate::undo::TxUndo;
use crate::validation::{RejectCode, TxResult, ValidationState};
use crate::view::{AccountView, ScriptView};

use super::transfer::undo_transfer_like;
use super::{
    check_fee, check_signature_size, encode_common, encode_user_ref, index_tx_by_address,
    TxContext, TxExecOutcome, TxKind,
};
use crate::serialize::{write_bytes, write_varint};

/// One listed signer and its (possibly empty) signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignaturePair {
    pub reg_id: RegId,
    pub signature: Signature,
}

/// Transfer from an m-of-n multisig account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultisigTx {
    pub version: u8,
    pub valid_height: u32,
    pub fee: u64,
    pub required: u8,
    pub signers: Vec<SignaturePair>,
    /// Destination: `Reg` or `Key`.
    pub to: UserRef,
    pub amount: u64,
    pub memo: Vec<u8>,
}

impl MultisigTx {
    pub(super) fn encode_body(&self, buf: &mut Vec<u8>, include_sigs: bool) {
        encode_common(buf, self.version, self.valid_height, self.fee);
        write_varint(buf, u64::from(self.required));
        write_varint(buf, self.signers.len() as u64);
        for signer in &self.signers {
            buf.extend_from_slice(&signer.reg_id.to_vec6());
            if include_sigs {
                write_bytes(buf, signer.signature.as_bytes());
            }
        }
        encode_user_ref(buf, &self.to);
        write_varint(buf, self.amount);
        write_bytes(buf, &self.memo);
    }

    fn sig_hash(&self) -> [u8; 32] {
        let mut buf = vec![TxKind::Multisig.tag()];
        self.encode_body(&mut buf, false);
        sha256d(&buf)
    }

    /// Derive the script-hash address from the signers' registered keys.
    ///
    /// Fails when any listed signer's account is missing or keyless.
    fn derive_script_key(
        &self,
        view: &dyn AccountView,
        state: &mut ValidationState,
    ) -> TxResult<(KeyId, BTreeSet<PubKey>)> {
        let mut pub_keys: BTreeSet<PubKey> = BTreeSet::new();
        for signer in &self.signers {
            let account = view
                .get_account(&UserRef::Reg(signer.reg_id))
                .ok_or_else(|| {
                    state.dos(
                        100,
                        format!("signer account {} not found", signer.reg_id),
                        RejectCode::Invalid,
                        "bad-getaccount",
                    )
                })?;
            let pub_key = account.pub_key.ok_or_else(|| {
                state.dos(
                    100,
                    format!("signer account {} has no registered pubkey", signer.reg_id),
                    RejectCode::Invalid,
                    "bad-account-unregistered",
                )
            })?;
            pub_keys.insert(pub_key);
        }

        let mut encoding = Vec::with_capacity(2 + pub_keys.len() * 33);
        encoding.push(self.required);
        encoding.push(pub_keys.len() as u8);
        for pub_key in &pub_keys {
            encoding.extend_from_slice(pub_key.as_bytes());
        }
        Ok((KeyId::new(hash160(&encoding)), pub_keys))
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

        if self.required < 1 || usize::from(self.required) > self.signers.len() {
            return Err(state.dos(
                100,
                format!(
                    "required {} outside 1..={} listed signers",
                    self.required,
                    self.signers.len()
                ),
                RejectCode::Invalid,
                "required-keys-invalid",
            ));
        }

        if self.signers.len() > MULSIG_MAX {
            return Err(state.dos(
                100,
                format!("{} signers exceed maximum {MULSIG_MAX}", self.signers.len()),
                RejectCode::Invalid,
                "signature-number-out-of-range",
            ));
        }

        if !matches!(self.to, UserRef::Reg(_) | UserRef::Key(_)) {
            return Err(state.dos(
                100,
                format!(
                    "destination must be regid or keyid, got {}",
                    self.to.kind_name()
                ),
                RejectCode::Invalid,
                "desaddr-type-error",
            ));
        }

        check_fee(state, &ctx.features, self.fee, TxKind::Multisig)?;

        let sighash = self.sig_hash();
        let mut valid: u8 = 0;
        for signer in &self.signers {
            let account = view
                .get_account(&UserRef::Reg(signer.reg_id))
                .ok_or_else(|| {
                    state.dos(
                        100,
                        format!("signer account {} not found", signer.reg_id),
                        RejectCode::Invalid,
                        "bad-getaccount",
                    )
                })?;

            if !signer.signature.is_empty() {
                check_signature_size(state, &signer.signature)?;
                let verified = account
                    .pub_key
                    .map(|pk| verify_signature(&sighash, &signer.signature, &pk))
                    .unwrap_or(false);
                if !verified {
                    return Err(state.dos(
                        100,
                        format!("signature of signer {} invalid", signer.reg_id),
                        RejectCode::Invalid,
                        "bad-signscript-check",
                    ));
                }
                valid += 1;
            }
        }

        let (script_key, pub_keys) = self.derive_script_key(view, state)?;

        if pub_keys.len() != self.signers.len() {
            return Err(state.dos(
                100,
                "listed signers contain a duplicate account".into(),
                RejectCode::Invalid,
                "duplicated-account",
            ));
        }

        if valid < self.required {
            return Err(state.dos(
                100,
                format!("{valid} valid signatures, {} required", self.required),
                RejectCode::Invalid,
                "not-enough-valid-signatures",
            ));
        }

        if view.load_account(&script_key).is_none() {
            return Err(state.dos(
                100,
                format!("multisig account {script_key} does not exist"),
                RejectCode::ReadAccountFail,
                "bad-read-accountdb",
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

        let (script_key, _) = self.derive_script_key(view, state)?;
        let mut src = view.load_account(&script_key).ok_or_else(|| {
            state.dos(
                100,
                format!("read of multisig account {script_key} failed"),
                RejectCode::ReadAccountFail,
                "bad-read-accountdb",
            )
        })?;
        undo.snapshot_account(&src);

        let mut assigned_reg_id = None;
        if src.reg_id.is_none() {
            let reg_id = ctx.alloc_reg_id();
            src.reg_id = Some(reg_id);
            assigned_reg_id = Some(reg_id);
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
                    format!("debit of multisig account {script_key} failed: {e}"),
                    RejectCode::UpdateAccountFail,
                    "operate-minus-account-failed",
                )
            })?;

        let write_result = match assigned_reg_id {
            Some(reg_id) => view.save_account_info(reg_id, script_key, src),
            None => view.store_account(script_key, src),
        };
        write_result.map_err(|e| {
            state.dos(
                100,
                format!("write of multisig account {script_key} failed: {e}"),
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
            for signer in &self.signers {
                let signer_key = view
                    .get_key_id(&UserRef::Reg(signer.reg_id))
                    .ok_or_else(|| {
                        state.dos(
                            100,
                            format!("signer {} unresolvable", signer.reg_id),
                            RejectCode::ReadAccountFail,
                            "bad-read-accountdb",
                        )
                    })?;
                index_tx_by_address(scripts, &mut undo, state, &signer_key, ctx)?;
            }
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
        for signer in &self.signers {
            set.insert(view.get_key_id(&UserRef::Reg(signer.reg_id))?);
        }
        set.insert(view.get_key_id(&self.to)?);
        Some(set)
    }
}
