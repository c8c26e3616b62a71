//! Consensus tunables.
//!
//! Compile-time constants only. Anything a deployment may vary (fork
//! height, fuel rate, index flags) lives in [`crate::config::CoreConfig`]
//! instead. Changing any value here is a hard fork.

/// Smallest-unit multiplier for one base coin.
pub const COIN: u64 = 100_000_000;

/// Total money supply ceiling; every balance mutation is checked against it.
pub const MAX_MONEY: u64 = 210_000_000 * COIN;

/// Fee floor enforced at heights past the R2 fork.
pub const MIN_TX_FEE: u64 = 10_000;

/// Maximum memo length for transfers, in bytes.
pub const MEMO_MAX: usize = 100;

/// Maximum contract-call argument blob, in bytes.
pub const ARG_MAX: usize = 4096;

/// Exclusive upper bound on a single DER signature.
pub const MAX_SIG_SIZE: usize = 100;

/// Exclusive upper bound on any signature carried in a block.
pub const MAX_BLOCK_SIG_SIZE: usize = 100;

/// Maximum listed signers in a multisig transfer.
pub const MULSIG_MAX: usize = 15;

/// Maximum vote operations in one delegate-vote transaction.
pub const MAX_DELEGATES: usize = 11;

/// Run-step units billed per fuel unit.
pub const FUEL_STEP: u64 = 100;

/// Fuel floor for registering a contract, in smallest units.
pub const CONTRACT_DEPLOY_FUEL_FLOOR: u64 = COIN;

/// True iff `value` is a representable amount of money.
pub fn money_range(value: u64) -> bool {
    value <= MAX_MONEY
}
