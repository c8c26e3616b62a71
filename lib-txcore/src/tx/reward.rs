//! Block reward.
//!
//! Coinbase-only. Slot 0 is the fee-collector marker and moves no
//! balance; slot −1 is the maturity payout that credits the reward. Any
//! other position is a protocol error. Rewards carry no fee and no
//! signature, and are exempt from the valid-height window.

use std::collections::BTreeSet;

use lib_crypto::KeyId;
use serde::{Deserialize, Serialize};

use crate::account::BalanceOp;
use crate::constants::money_range;
use crate::ids::UserRef;
use crate::types::TxHash;
use crate::undo::TxUndo;
use crate::validation::{RejectCode, TxResult, ValidationState};
use crate::view::{AccountView, ScriptView};

use super::{
    encode_user_ref, index_tx_by_address, restore_account_preimages, undo_db_ops, TxContext,
    TxExecOutcome,
};
use crate::serialize::write_varint;

/// Pay the block reward to a miner account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardTx {
    pub version: u8,
    /// Beneficiary: `Reg` or `Pub`.
    pub account: UserRef,
    pub reward_value: u64,
    /// Height of the block that minted this reward.
    pub height: u32,
}

impl RewardTx {
    pub(super) fn encode_body(&self, buf: &mut Vec<u8>) {
        write_varint(buf, u64::from(self.version));
        encode_user_ref(buf, &self.account);
        write_varint(buf, self.reward_value);
        write_varint(buf, u64::from(self.height));
    }

    pub(super) fn check(&self, state: &mut ValidationState) -> TxResult<()> {
        if !matches!(self.account, UserRef::Reg(_) | UserRef::Pub(_)) {
            return Err(state.dos(
                100,
                format!(
                    "reward account must be regid or pubkey, got {}",
                    self.account.kind_name()
                ),
                RejectCode::Invalid,
                "bad-account",
            ));
        }
        if !money_range(self.reward_value) {
            return Err(state.dos(
                100,
                format!("reward value {} out of money range", self.reward_value),
                RejectCode::Invalid,
                "bad-reward-value",
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
        // By execution time the miner's account is registered, so only a
        // regid names it unambiguously.
        if self.account.as_reg_id().is_none() {
            return Err(state.dos(
                100,
                format!("reward account {} must be a regid", self.account),
                RejectCode::UpdateAccountFail,
                "bad-account",
            ));
        }

        let mut account = view.get_account(&self.account).ok_or_else(|| {
            state.dos(
                100,
                format!("read of reward account {} failed", self.account),
                RejectCode::UpdateAccountFail,
                "bad-read-accountdb",
            )
        })?;

        let mut undo = TxUndo::new(tx_hash);
        undo.snapshot_account(&account);

        match ctx.index {
            0 => {
                // Fee-collector slot: fees are claimed elsewhere.
            }
            -1 => {
                account
                    .operate(BalanceOp::AddFree, self.reward_value, ctx.height)
                    .map_err(|e| {
                        state.dos(
                            100,
                            format!("reward credit of {} failed: {e}", account.key_id),
                            RejectCode::UpdateAccountFail,
                            "operate-add-account-failed",
                        )
                    })?;
            }
            other => {
                return Err(state.dos(
                    100,
                    format!("reward at protocol-invalid block position {other}"),
                    RejectCode::Invalid,
                    "bad-reward-index",
                ));
            }
        }

        let key_id = account.key_id;
        view.store_account(key_id, account).map_err(|e| {
            state.dos(
                100,
                format!("write of reward account {key_id} failed: {e}"),
                RejectCode::UpdateAccountFail,
                "bad-save-accountdb",
            )
        })?;

        if ctx.address_index && ctx.index == 0 {
            index_tx_by_address(scripts, &mut undo, state, &key_id, ctx)?;
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

    pub(super) fn addresses(&self, view: &dyn AccountView) -> Option<BTreeSet<KeyId>> {
        let mut set = BTreeSet::new();
        match self.account {
            UserRef::Pub(pub_key) if pub_key.is_fully_valid() => {
                set.insert(pub_key.key_id());
            }
            UserRef::Reg(_) => {
                set.insert(view.get_key_id(&self.account)?);
            }
            _ => return None,
        }
        Some(set)
    }
}
