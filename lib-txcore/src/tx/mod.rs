//! Transaction kinds.
//!
//! The seven live kinds (plus one reserved) form a closed set. Each kind
//! module owns its `check` / `execute` / `undo_execute` contract; this
//! module owns the closed enum, the canonical wire encoding that
//! transaction ids and signature hashes commit to, and the helpers every
//! kind shares.
//!
//! # Lifecycle
//!
//! ```text
//! check(view, scripts, state, ctx)          no state writes
//! execute(view, scripts, runtime, ...)      writes overlay, emits TxUndo
//! undo_execute(view, scripts, ..., undo)    consumes TxUndo in reverse
//! ```
//!
//! An error anywhere leaves the caller holding a poisoned overlay; the
//! driver discards it. The undo record is only ever consulted for
//! transactions that committed.

pub mod contract_call;
pub mod delegate_vote;
pub mod multisig;
pub mod register_account;
pub mod register_contract;
pub mod reward;
pub mod stake;
pub mod transfer;

use std::collections::BTreeSet;
use std::fmt;

use lib_crypto::{sha256d, KeyId, Signature};
use serde::{Deserialize, Serialize};

use crate::account::Account;
use crate::constants::{money_range, CONTRACT_DEPLOY_FUEL_FLOOR, FUEL_STEP, MIN_TX_FEE};
use crate::features::FeatureSet;
use crate::ids::{RegId, UserRef};
use crate::serialize::{write_bytes, write_varint};
use crate::types::TxHash;
use crate::undo::TxUndo;
use crate::validation::{RejectCode, TxResult, ValidationState};
use crate::view::{AccountView, ScriptView};
use crate::vm::ContractRuntime;

pub use contract_call::ContractCallTx;
pub use delegate_vote::{DelegateVoteTx, VoteOperation};
pub use multisig::{MultisigTx, SignaturePair};
pub use register_account::RegisterAccountTx;
pub use register_contract::RegisterContractTx;
pub use reward::RewardTx;
pub use stake::FcoinStakeTx;
pub use transfer::TransferTx;

/// Current transaction format version.
pub const TX_VERSION: u8 = 1;

/// Wire tag for each kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TxKind {
    Reward = 1,
    RegisterAccount = 2,
    Transfer = 3,
    ContractCall = 4,
    RegisterContract = 5,
    DelegateVote = 6,
    Multisig = 7,
    /// Reserved; carried on the wire for forward compatibility, rejected
    /// at check.
    FcoinStake = 8,
}

impl TxKind {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            TxKind::Reward => "REWARD_TX",
            TxKind::RegisterAccount => "REGISTER_ACCOUNT_TX",
            TxKind::Transfer => "BCOIN_TRANSFER_TX",
            TxKind::ContractCall => "CONTRACT_CALL_TX",
            TxKind::RegisterContract => "CONTRACT_DEPLOY_TX",
            TxKind::DelegateVote => "DELEGATE_VOTE_TX",
            TxKind::Multisig => "MULSIG_TX",
            TxKind::FcoinStake => "FCOIN_STAKE_TX",
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-transaction execution context supplied by the block driver.
#[derive(Debug, Clone, Copy)]
pub struct TxContext {
    /// Position in the block. Coinbase slots use `0` (fee collector) and
    /// `-1` (maturity); ordinary transactions count from 0.
    pub index: i32,
    /// Height of the block being executed.
    pub height: u32,
    /// Fuel price for this block.
    pub fuel_rate: u64,
    /// Whether the address→tx index is maintained.
    pub address_index: bool,
    /// Feature switches active at `height`.
    pub features: FeatureSet,
}

impl TxContext {
    /// Registry id allocated by this block position.
    ///
    /// Only meaningful for non-coinbase positions; callers never allocate
    /// ids for coinbase slots.
    pub fn alloc_reg_id(&self) -> RegId {
        debug_assert!(self.index >= 0, "coinbase slots never allocate reg ids");
        RegId::new(self.height, self.index as u16)
    }

    /// 1-based position recorded in the address→tx index.
    pub fn index_in_block(&self) -> u32 {
        (self.index + 1) as u32
    }
}

/// What `execute` hands back for one accepted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxExecOutcome {
    pub undo: TxUndo,
    /// Run-step meter for fuel billing; zero for kinds that burn none.
    pub run_step: u64,
}

/// A transaction: the closed tagged union over all kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transaction {
    Reward(RewardTx),
    RegisterAccount(RegisterAccountTx),
    Transfer(TransferTx),
    ContractCall(ContractCallTx),
    RegisterContract(RegisterContractTx),
    DelegateVote(DelegateVoteTx),
    Multisig(MultisigTx),
    FcoinStake(FcoinStakeTx),
}

impl Transaction {
    pub fn kind(&self) -> TxKind {
        match self {
            Transaction::Reward(_) => TxKind::Reward,
            Transaction::RegisterAccount(_) => TxKind::RegisterAccount,
            Transaction::Transfer(_) => TxKind::Transfer,
            Transaction::ContractCall(_) => TxKind::ContractCall,
            Transaction::RegisterContract(_) => TxKind::RegisterContract,
            Transaction::DelegateVote(_) => TxKind::DelegateVote,
            Transaction::Multisig(_) => TxKind::Multisig,
            Transaction::FcoinStake(_) => TxKind::FcoinStake,
        }
    }

    pub fn fee(&self) -> u64 {
        match self {
            Transaction::Reward(_) => 0,
            Transaction::RegisterAccount(tx) => tx.fee,
            Transaction::Transfer(tx) => tx.fee,
            Transaction::ContractCall(tx) => tx.fee,
            Transaction::RegisterContract(tx) => tx.fee,
            Transaction::DelegateVote(tx) => tx.fee,
            Transaction::Multisig(tx) => tx.fee,
            Transaction::FcoinStake(tx) => tx.fee,
        }
    }

    pub fn valid_height(&self) -> u32 {
        match self {
            Transaction::Reward(tx) => tx.height,
            Transaction::RegisterAccount(tx) => tx.valid_height,
            Transaction::Transfer(tx) => tx.valid_height,
            Transaction::ContractCall(tx) => tx.valid_height,
            Transaction::RegisterContract(tx) => tx.valid_height,
            Transaction::DelegateVote(tx) => tx.valid_height,
            Transaction::Multisig(tx) => tx.valid_height,
            Transaction::FcoinStake(tx) => tx.valid_height,
        }
    }

    /// Whether the declared valid height falls inside the acceptance
    /// window around the tip. Rewards are exempt.
    pub fn is_valid_height(&self, tip_height: u32, cache_height: u32) -> bool {
        if matches!(self, Transaction::Reward(_)) {
            return true;
        }
        let half = i64::from(cache_height / 2);
        let declared = i64::from(self.valid_height());
        let tip = i64::from(tip_height);
        declared <= tip + half && declared >= tip - half
    }

    /// Canonical wire bytes. With `include_sigs` the encoding commits to
    /// every signature (transaction id); without, signature slots are
    /// skipped (signature hash).
    pub fn encode(&self, include_sigs: bool) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.push(self.kind().tag());
        match self {
            Transaction::Reward(tx) => tx.encode_body(&mut buf),
            Transaction::RegisterAccount(tx) => tx.encode_body(&mut buf, include_sigs),
            Transaction::Transfer(tx) => tx.encode_body(&mut buf, include_sigs),
            Transaction::ContractCall(tx) => tx.encode_body(&mut buf, include_sigs),
            Transaction::RegisterContract(tx) => tx.encode_body(&mut buf, include_sigs),
            Transaction::DelegateVote(tx) => tx.encode_body(&mut buf, include_sigs),
            Transaction::Multisig(tx) => tx.encode_body(&mut buf, include_sigs),
            Transaction::FcoinStake(tx) => tx.encode_body(&mut buf, include_sigs),
        }
        buf
    }

    /// Transaction id: double-SHA256 over the full canonical encoding.
    pub fn hash(&self) -> TxHash {
        TxHash::new(sha256d(&self.encode(true)))
    }

    /// Hash every signature in this transaction signs.
    pub fn signature_hash(&self) -> [u8; 32] {
        sha256d(&self.encode(false))
    }

    /// Fuel consumed for a given run-step meter.
    pub fn fuel(&self, run_step: u64, fuel_rate: u64) -> u64 {
        let mut fuel = run_step.div_ceil(FUEL_STEP) * fuel_rate;
        if self.kind() == TxKind::RegisterContract && fuel < CONTRACT_DEPLOY_FUEL_FLOOR {
            fuel = CONTRACT_DEPLOY_FUEL_FLOOR;
        }
        fuel
    }

    /// Structural and cryptographic validation. Reads the views, writes
    /// nothing.
    pub fn check(
        &self,
        view: &dyn AccountView,
        scripts: &dyn ScriptView,
        state: &mut ValidationState,
        ctx: &TxContext,
    ) -> TxResult<()> {
        match self {
            Transaction::Reward(tx) => tx.check(state),
            Transaction::RegisterAccount(tx) => tx.check(state, ctx),
            Transaction::Transfer(tx) => tx.check(view, state, ctx),
            Transaction::ContractCall(tx) => tx.check(view, scripts, state, ctx),
            Transaction::RegisterContract(tx) => tx.check(view, state, ctx),
            Transaction::DelegateVote(tx) => tx.check(view, state, ctx),
            Transaction::Multisig(tx) => tx.check(view, state, ctx),
            Transaction::FcoinStake(tx) => tx.check(state),
        }
    }

    /// Apply the state transition, producing this transaction's undo
    /// record.
    pub fn execute(
        &self,
        view: &mut dyn AccountView,
        scripts: &mut dyn ScriptView,
        runtime: &dyn ContractRuntime,
        state: &mut ValidationState,
        ctx: &TxContext,
    ) -> TxResult<TxExecOutcome> {
        match self {
            Transaction::Reward(tx) => tx.execute(view, scripts, state, ctx, self.hash()),
            Transaction::RegisterAccount(tx) => tx.execute(view, scripts, state, ctx, self.hash()),
            Transaction::Transfer(tx) => tx.execute(view, scripts, state, ctx, self.hash()),
            Transaction::ContractCall(tx) => {
                tx.execute(view, scripts, runtime, state, ctx, self.hash())
            }
            Transaction::RegisterContract(tx) => tx.execute(view, scripts, state, ctx, self.hash()),
            Transaction::DelegateVote(tx) => tx.execute(view, scripts, state, ctx, self.hash()),
            Transaction::Multisig(tx) => tx.execute(view, scripts, state, ctx, self.hash()),
            Transaction::FcoinStake(tx) => tx.execute(state),
        }
    }

    /// Reverse a committed execution using its own undo record.
    pub fn undo_execute(
        &self,
        view: &mut dyn AccountView,
        scripts: &mut dyn ScriptView,
        state: &mut ValidationState,
        ctx: &TxContext,
        undo: &TxUndo,
    ) -> TxResult<()> {
        match self {
            Transaction::Reward(tx) => tx.undo_execute(view, scripts, state, undo),
            Transaction::RegisterAccount(tx) => tx.undo_execute(view, scripts, state, ctx, undo),
            Transaction::Transfer(tx) => tx.undo_execute(view, scripts, state, ctx, undo),
            Transaction::ContractCall(tx) => {
                tx.undo_execute(view, scripts, state, undo, self.hash())
            }
            Transaction::RegisterContract(tx) => {
                tx.undo_execute(view, scripts, state, ctx, undo)
            }
            Transaction::DelegateVote(tx) => tx.undo_execute(view, scripts, state, undo),
            Transaction::Multisig(tx) => tx.undo_execute(view, scripts, state, ctx, undo),
            Transaction::FcoinStake(tx) => tx.undo_execute(state),
        }
    }

    /// Addresses this transaction involves, for the related-accounts
    /// index. `None` means a reference failed to resolve.
    pub fn addresses(
        &self,
        view: &dyn AccountView,
        scripts: &dyn ScriptView,
    ) -> Option<BTreeSet<KeyId>> {
        match self {
            Transaction::Reward(tx) => tx.addresses(view),
            Transaction::RegisterAccount(tx) => tx.addresses(),
            Transaction::Transfer(tx) => tx.addresses(view),
            Transaction::ContractCall(tx) => tx.addresses(view, scripts, self.hash()),
            Transaction::RegisterContract(tx) => tx.addresses(view),
            Transaction::DelegateVote(tx) => tx.addresses(),
            Transaction::Multisig(tx) => tx.addresses(view),
            Transaction::FcoinStake(_) => Some(BTreeSet::new()),
        }
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "txType={}, hash={}, fee={}, validHeight={}",
            self.kind(),
            self.hash(),
            self.fee(),
            self.valid_height()
        )
    }
}

// ---------------------------------------------------------------------------
// Shared helpers for the kind modules
// ---------------------------------------------------------------------------

/// Encode a principal reference: tag byte then payload.
pub(crate) fn encode_user_ref(buf: &mut Vec<u8>, user: &UserRef) {
    match user {
        UserRef::Null => buf.push(0),
        UserRef::Reg(reg_id) => {
            buf.push(1);
            buf.extend_from_slice(&reg_id.to_vec6());
        }
        UserRef::Pub(pub_key) => {
            buf.push(2);
            buf.extend_from_slice(pub_key.as_bytes());
        }
        UserRef::Key(key_id) => {
            buf.push(3);
            buf.extend_from_slice(key_id.as_ref());
        }
    }
}

/// Encode the fields every signing kind shares: version, valid height,
/// fee.
pub(crate) fn encode_common(buf: &mut Vec<u8>, version: u8, valid_height: u32, fee: u64) {
    write_varint(buf, u64::from(version));
    write_varint(buf, u64::from(valid_height));
    write_varint(buf, fee);
}

/// Encode the trailing signature slot when the id (not the sighash) is
/// being computed.
pub(crate) fn encode_signature(buf: &mut Vec<u8>, include_sigs: bool, signature: &Signature) {
    if include_sigs {
        write_bytes(buf, signature.as_bytes());
    }
}

/// Money-range and post-fork floor checks on the declared fee.
pub(crate) fn check_fee(
    state: &mut ValidationState,
    features: &FeatureSet,
    fee: u64,
    kind: TxKind,
) -> TxResult<()> {
    if !money_range(fee) {
        return Err(state.dos(
            100,
            format!("{kind}: fee {fee} out of money range"),
            RejectCode::Invalid,
            "bad-tx-fee-toolarge",
        ));
    }
    if features.enforces_min_fee() && fee < MIN_TX_FEE {
        return Err(state.dos(
            100,
            format!("{kind}: fee {fee} below floor {MIN_TX_FEE}"),
            RejectCode::Invalid,
            "bad-tx-fee-toosmall",
        ));
    }
    Ok(())
}

/// Signature size precheck performed before any verification.
pub(crate) fn check_signature_size(
    state: &mut ValidationState,
    signature: &Signature,
) -> TxResult<()> {
    if signature.is_empty() || signature.len() >= crate::constants::MAX_BLOCK_SIG_SIZE {
        return Err(state.dos(
            100,
            format!("signature size {} invalid", signature.len()),
            RejectCode::Invalid,
            "bad-tx-sig-size",
        ));
    }
    Ok(())
}

/// Append an address→tx index entry and log its pre-image.
pub(crate) fn index_tx_by_address(
    scripts: &mut dyn ScriptView,
    undo: &mut TxUndo,
    state: &mut ValidationState,
    key_id: &KeyId,
    ctx: &TxContext,
) -> TxResult<()> {
    let op = scripts
        .set_tx_hash_by_address(key_id, ctx.height, ctx.index_in_block(), &undo.tx_hash)
        .map_err(|e| {
            state.dos(
                100,
                format!("address index write for {key_id} failed: {e}"),
                RejectCode::WriteAccountFail,
                "bad-write-indexdb",
            )
        })?;
    undo.push_db_op(op);
    Ok(())
}

/// Restore account pre-images in reverse order.
///
/// A pre-image that holds no value and carries neither registration nor a
/// registry id describes an account this transaction created; restoring
/// it means deleting the row.
pub(crate) fn restore_account_preimages(
    view: &mut dyn AccountView,
    state: &mut ValidationState,
    undo: &TxUndo,
) -> TxResult<()> {
    for pre in undo.accounts.iter().rev() {
        restore_one_account(view, state, pre)?;
    }
    Ok(())
}

pub(crate) fn restore_one_account(
    view: &mut dyn AccountView,
    state: &mut ValidationState,
    pre: &Account,
) -> TxResult<()> {
    let result = if pre.is_empty_value() && !pre.is_registered() && pre.reg_id.is_none() {
        view.remove_account(&pre.key_id)
    } else {
        view.store_account(pre.key_id, pre.clone())
    };
    result.map_err(|e| {
        state.dos(
            100,
            format!("restore of account {} failed: {e}", pre.key_id),
            RejectCode::UpdateAccountFail,
            "undo-operate-account-failed",
        )
    })
}

/// Revert logged DB writes in reverse order.
pub(crate) fn undo_db_ops(
    scripts: &mut dyn ScriptView,
    state: &mut ValidationState,
    undo: &TxUndo,
) -> TxResult<()> {
    for op in undo.db_ops.iter().rev() {
        scripts
            .undo_script_data(&op.key, op.old_value.clone())
            .map_err(|e| {
                state.dos(
                    100,
                    format!("undo of scriptdb write failed: {e}"),
                    RejectCode::UpdateAccountFail,
                    "bad-save-scriptdb",
                )
            })?;
    }
    Ok(())
}
