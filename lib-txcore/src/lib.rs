//! Veridian transaction execution core
//!
//! Deterministic state transitions for the seven transaction kinds of a
//! UTXO-derived, account-model chain. The core consumes two abstract
//! views (accounts, scripts) and produces, for each accepted transaction,
//! a reversal record precise enough to reconstruct the pre-state
//! bit-for-bit on reorg.
//!
//! The lifecycle is `check → execute → undo_execute`, driven per block by
//! [`executor::BlockExecutor`]: transaction `i` observes the effects of
//! `0..i-1` and nothing else, and the whole pipeline is a total function
//! from `(pre-state, block)` to `(post-state, undo)`.

pub mod account;
pub mod config;
pub mod constants;
pub mod executor;
pub mod features;
pub mod ids;
pub mod resolver;
pub mod script;
pub mod serialize;
pub mod tx;
pub mod types;
pub mod undo;
pub mod validation;
pub mod view;
pub mod vm;

// Core data model
pub use account::{Account, AccountError, BalanceOp, ResolvedVoteOp, VoteFund, VoteOp};
pub use ids::{RegId, UserRef, REG_ID_SIZE};
pub use types::TxHash;
pub use undo::{BlockUndo, DbOp, TxUndo};

// Lifecycle
pub use config::CoreConfig;
pub use executor::{ApplyOutcome, BlockExecError, BlockExecutor, BlockTx};
pub use features::{FeatureSet, ForkVersion};
pub use tx::{
    ContractCallTx, DelegateVoteTx, FcoinStakeTx, MultisigTx, RegisterAccountTx,
    RegisterContractTx, RewardTx, SignaturePair, Transaction, TransferTx, TxContext,
    TxExecOutcome, TxKind, VoteOperation, TX_VERSION,
};
pub use validation::{RejectCode, Rejection, TxError, TxResult, ValidationState};

// External seams
pub use script::{ScriptFormatError, VmScript, MAX_SCRIPT_SIZE, SCRIPT_FORMAT_VERSION, SCRIPT_MAGIC};
pub use view::{AccountView, MemAccountView, MemScriptView, ScriptView, ViewError};
pub use vm::{ContractContext, ContractRuntime, DisabledRuntime, VmError, VmExecOutput};
