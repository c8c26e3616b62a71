//! Account registration.
//!
//! Binds a public key (and optionally a miner key) to its hash-160
//! address and allocates the account's registry id from the block
//! position. The registry id is the only state here that undo cannot
//! recompute, so undo always erases the index entry it allocated.

use std::collections::BTreeSet;

use lib_crypto::{sha256d, verify_signature, KeyId, Signature};
use serde::{Deserialize, Serialize};

use crate::account::{Account, BalanceOp};
use crate::ids::UserRef;
use crate::types::TxHash;
use crate::undo::TxUndo;
use crate::validation::{RejectCode, TxError, TxResult, ValidationState};
use crate::view::{AccountView, ScriptView};

use super::{
    check_fee, check_signature_size, encode_common, encode_signature, encode_user_ref,
    index_tx_by_address, restore_one_account, undo_db_ops, TxContext, TxExecOutcome, TxKind,
};

/// Register a new account under its public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterAccountTx {
    pub version: u8,
    pub valid_height: u32,
    pub fee: u64,
    /// The key being registered. Must be a `Pub` reference.
    pub user: UserRef,
    /// Optional delegated miner key. `Pub` or `Null`.
    pub miner: UserRef,
    pub signature: Signature,
}

impl RegisterAccountTx {
    pub(super) fn encode_body(&self, buf: &mut Vec<u8>, include_sigs: bool) {
        encode_common(buf, self.version, self.valid_height, self.fee);
        encode_user_ref(buf, &self.user);
        encode_user_ref(buf, &self.miner);
        encode_signature(buf, include_sigs, &self.signature);
    }

    fn sig_hash(&self) -> [u8; 32] {
        let mut buf = vec![TxKind::RegisterAccount.tag()];
        self.encode_body(&mut buf, false);
        sha256d(&buf)
    }

    pub(super) fn check(&self, state: &mut ValidationState, ctx: &TxContext) -> TxResult<()> {
        let Some(pub_key) = self.user.as_pub_key() else {
            return Err(state.dos(
                100,
                format!("register user must be a pubkey, got {}", self.user.kind_name()),
                RejectCode::Invalid,
                "userid-type-error",
            ));
        };

        if !matches!(self.miner, UserRef::Null | UserRef::Pub(_)) {
            return Err(state.dos(
                100,
                format!("miner must be a pubkey or null, got {}", self.miner.kind_name()),
                RejectCode::Invalid,
                "minerid-type-error",
            ));
        }

        if !pub_key.is_fully_valid() {
            return Err(state.dos(
                100,
                format!("register pubkey {pub_key} is not on the curve"),
                RejectCode::Invalid,
                "bad-regtx-publickey",
            ));
        }

        check_fee(state, &ctx.features, self.fee, TxKind::RegisterAccount)?;
        check_signature_size(state, &self.signature)?;

        if !verify_signature(&self.sig_hash(), &self.signature, &pub_key) {
            return Err(state.dos(
                100,
                format!("register signature invalid for {pub_key}"),
                RejectCode::Invalid,
                "bad-regtx-signature",
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
        let Some(pub_key) = self.user.as_pub_key() else {
            return Err(state.dos(
                100,
                "register user must be a pubkey".into(),
                RejectCode::UpdateAccountFail,
                "userid-type-error",
            ));
        };
        let key_id = pub_key.key_id();
        let reg_id = ctx.alloc_reg_id();

        let mut account = view
            .load_account(&key_id)
            .unwrap_or_else(|| Account::new(key_id));

        if account.is_registered() {
            return Err(state.dos(
                100,
                format!("key id {key_id} already registered"),
                RejectCode::UpdateAccountFail,
                "duplicate-register-account",
            ));
        }

        let mut undo = TxUndo::new(tx_hash);
        undo.snapshot_account(&account);

        account.pub_key = Some(pub_key);
        if self.fee > 0 {
            account
                .operate(BalanceOp::SubFree, self.fee, ctx.height)
                .map_err(|e| {
                    state.dos(
                        100,
                        format!("fee deduction for {key_id} failed: {e}"),
                        RejectCode::UpdateAccountFail,
                        "not-sufficient-funds",
                    )
                })?;
        }

        if let Some(miner_key) = self.miner.as_pub_key() {
            if !miner_key.is_fully_valid() {
                return Err(state.dos(
                    100,
                    format!("miner pubkey {miner_key} is not on the curve"),
                    RejectCode::UpdateAccountFail,
                    "miner-pubkey-invalid",
                ));
            }
            account.miner_pub_key = Some(miner_key);
        }

        account.reg_id = Some(reg_id);
        view.save_account_info(reg_id, key_id, account).map_err(|e| {
            state.dos(
                100,
                format!("write of registered account {key_id} failed: {e}"),
                RejectCode::UpdateAccountFail,
                "bad-write-accountdb",
            )
        })?;

        if ctx.address_index {
            index_tx_by_address(scripts, &mut undo, state, &key_id, ctx)?;
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
        let Some(pub_key) = self.user.as_pub_key() else {
            return Err(TxError::UndoCorrupt(
                "register undo without a pubkey principal".into(),
            ));
        };
        let key_id = pub_key.key_id();
        let reg_id = ctx.alloc_reg_id();

        let pre = undo.account_preimage(&key_id).ok_or_else(|| {
            TxError::UndoCorrupt(format!("register undo missing preimage for {key_id}"))
        })?;
        restore_one_account(view, state, pre)?;

        view.erase_reg_id(&reg_id).map_err(|e| {
            state.dos(
                100,
                format!("erase of reg id {reg_id} failed: {e}"),
                RejectCode::UpdateAccountFail,
                "bad-write-accountdb",
            )
        })?;

        undo_db_ops(scripts, state, undo)
    }

    pub(super) fn addresses(&self) -> Option<BTreeSet<KeyId>> {
        let pub_key = self.user.as_pub_key()?;
        if !pub_key.is_fully_valid() {
            return None;
        }
        let mut set = BTreeSet::new();
        set.insert(pub_key.key_id());
        Some(set)
    }
}
