//! Contract runtime adapter.
//!
//! The deliberate seam between the execution core and the script VM. The
//! core hands the adapter a read view of accounts and a writable script
//! view, and takes back everything it needs to commit or reverse the
//! call: post-state accounts, the raw app-user principals the script
//! touched, the pre-image log of every data write, and the run-step
//! meter for fuel billing.
//!
//! The adapter MUST be deterministic: identical inputs produce identical
//! outputs and an identical DB-log sequence. Nothing else about the VM is
//! the core's business.

use thiserror::Error;

use crate::account::Account;
use crate::ids::RegId;
use crate::types::TxHash;
use crate::undo::DbOp;
use crate::view::{AccountView, ScriptView};

/// Inputs to one contract invocation.
#[derive(Debug, Clone)]
pub struct ContractContext<'a> {
    pub tx_hash: TxHash,
    /// Caller's registry id.
    pub caller: RegId,
    /// Contract account's registry id.
    pub app: RegId,
    /// Base coins transferred to the contract account before invocation.
    pub amount: u64,
    /// Opaque call arguments.
    pub arguments: &'a [u8],
    /// Height of the block being executed.
    pub height: u32,
    /// Fuel price for this block.
    pub fuel_rate: u64,
}

/// Everything a successful invocation hands back to the core.
#[derive(Debug, Clone, Default)]
pub struct VmExecOutput {
    /// Run-step meter; fuel is billed as `ceil(run_step / FUEL_STEP) ×
    /// fuel_rate`.
    pub run_step: u64,
    /// Post-state of every account the script mutated. The core snapshots
    /// each one's pre-state and writes these through.
    pub accounts: Vec<Account>,
    /// Raw app-user principal ids (6-byte RegID or 20-byte KeyID blobs)
    /// the script touched in its own account namespace.
    pub app_user_ids: Vec<Vec<u8>>,
    /// Pre-images of the script-view writes performed during execution,
    /// in application order. Merged verbatim into the tx undo record.
    pub db_log: Vec<DbOp>,
}

/// Script execution failure. The transaction is rejected and the overlay
/// dropped; nothing the script did survives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("script aborted: {0}")]
    Aborted(String),

    #[error("fuel exhausted after {0} run-steps")]
    OutOfFuel(u64),

    #[error("script produced malformed output: {0}")]
    BadOutput(String),
}

/// The contract VM, as seen from the execution core.
pub trait ContractRuntime {
    /// Run the contract named by `ctx.app` against the supplied views.
    ///
    /// Data writes go through `scripts` (which records pre-images);
    /// account mutations are *returned*, never applied, so the calling
    /// transaction controls snapshot ordering.
    fn execute(
        &self,
        ctx: &ContractContext<'_>,
        accounts: &dyn AccountView,
        scripts: &mut dyn ScriptView,
    ) -> Result<VmExecOutput, VmError>;
}

/// Runtime for deployments that do not ship a VM: every contract call
/// fails deterministically.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledRuntime;

impl ContractRuntime for DisabledRuntime {
    fn execute(
        &self,
        _ctx: &ContractContext<'_>,
        _accounts: &dyn AccountView,
        _scripts: &mut dyn ScriptView,
    ) -> Result<VmExecOutput, VmError> {
        Err(VmError::Aborted("no contract runtime configured".into()))
    }
}
