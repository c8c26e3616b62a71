//! Block executor (single authority).
//!
//! The only entry point for applying a block's transactions to state, and
//! for disconnecting them again on reorg.
//!
//! # Execution order (NON-NEGOTIABLE)
//!
//! ```text
//! for (index, tx) in block:
//!     is_valid_height
//!     check
//!     execute        → appends one TxUndo
//! ```
//!
//! Any error poisons the overlay; the caller discards it without
//! consulting the undo log. Disconnect walks the transactions in reverse
//! block order, each consuming its own undo record; an undo failure is
//! fatal and the driver must halt.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::CoreConfig;
use crate::tx::{Transaction, TxContext};
use crate::undo::BlockUndo;
use crate::validation::{TxError, ValidationState};
use crate::view::{AccountView, ScriptView};
use crate::vm::ContractRuntime;

/// A transaction with its block position.
///
/// Coinbase slots use positions `0` (fee collector) and `-1` (maturity);
/// ordinary transactions count up from 0 in block order.
#[derive(Debug, Clone)]
pub struct BlockTx {
    pub index: i32,
    pub tx: Transaction,
}

impl BlockTx {
    pub fn new(index: i32, tx: Transaction) -> Self {
        Self { index, tx }
    }
}

/// Error during block application or disconnect.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockExecError {
    #[error("transaction {index} outside the valid-height window")]
    InvalidHeightWindow { index: usize },

    #[error("transaction {index} rejected: {source}")]
    TxFailed {
        index: usize,
        #[source]
        source: TxError,
    },

    #[error("undo of transaction {index} failed: {source}")]
    UndoFailed {
        index: usize,
        #[source]
        source: TxError,
    },

    #[error("undo holds {undos} records for {txs} transactions")]
    UndoMismatch { undos: usize, txs: usize },
}

/// Outcome of successfully applying a block's transactions.
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub height: u32,
    pub tx_count: usize,
    /// Fees paid by the block's transactions.
    pub fees_collected: u64,
    /// Fuel burned by contract registrations and calls.
    pub total_fuel: u64,
    /// Per-transaction reversal records in block order.
    pub undo: BlockUndo,
}

/// The block driver.
///
/// Holds the deployment configuration and the contract runtime; state
/// arrives per call as exclusive view borrows, so one executor serves any
/// number of sequential blocks.
pub struct BlockExecutor {
    config: CoreConfig,
    runtime: Arc<dyn ContractRuntime>,
}

impl BlockExecutor {
    pub fn new(config: CoreConfig, runtime: Arc<dyn ContractRuntime>) -> Self {
        Self { config, runtime }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    fn tx_context(&self, index: i32, height: u32) -> TxContext {
        TxContext {
            index,
            height,
            fuel_rate: self.config.fuel_rate,
            address_index: self.config.address_index_enabled,
            features: self.config.features_at(height),
        }
    }

    /// Apply a block's ordered transaction list.
    ///
    /// On error the views hold partial effects of the failed transaction;
    /// the caller must discard them. On success the returned undo record
    /// reverses the whole block.
    pub fn execute_block(
        &self,
        height: u32,
        txs: &[BlockTx],
        view: &mut dyn AccountView,
        scripts: &mut dyn ScriptView,
    ) -> Result<ApplyOutcome, BlockExecError> {
        let mut undo = BlockUndo::default();
        let mut fees_collected: u64 = 0;
        let mut total_fuel: u64 = 0;

        for (position, entry) in txs.iter().enumerate() {
            let ctx = self.tx_context(entry.index, height);

            if !entry
                .tx
                .is_valid_height(height, self.config.tx_cache_height)
            {
                warn!(position, height, "transaction outside valid-height window");
                return Err(BlockExecError::InvalidHeightWindow { index: position });
            }

            let mut state = ValidationState::new();
            entry
                .tx
                .check(&*view, &*scripts, &mut state, &ctx)
                .map_err(|source| BlockExecError::TxFailed {
                    index: position,
                    source,
                })?;

            let outcome = entry
                .tx
                .execute(view, scripts, self.runtime.as_ref(), &mut state, &ctx)
                .map_err(|source| BlockExecError::TxFailed {
                    index: position,
                    source,
                })?;

            fees_collected = fees_collected.saturating_add(entry.tx.fee());
            total_fuel =
                total_fuel.saturating_add(entry.tx.fuel(outcome.run_step, ctx.fuel_rate));
            debug!(position, tx = %entry.tx.hash(), "transaction applied");
            undo.push(outcome.undo);
        }

        Ok(ApplyOutcome {
            height,
            tx_count: txs.len(),
            fees_collected,
            total_fuel,
            undo,
        })
    }

    /// Disconnect a block: undo its transactions in reverse order.
    ///
    /// Each transaction consumes its own undo record, matched by position
    /// and cross-checked by hash. Failure is fatal to the caller.
    pub fn undo_block(
        &self,
        height: u32,
        txs: &[BlockTx],
        undo: &BlockUndo,
        view: &mut dyn AccountView,
        scripts: &mut dyn ScriptView,
    ) -> Result<(), BlockExecError> {
        if undo.len() != txs.len() {
            return Err(BlockExecError::UndoMismatch {
                undos: undo.len(),
                txs: txs.len(),
            });
        }

        for (position, entry) in txs.iter().enumerate().rev() {
            let record = &undo.tx_undos[position];
            let expected = entry.tx.hash();
            if record.tx_hash != expected {
                return Err(BlockExecError::UndoFailed {
                    index: position,
                    source: TxError::UndoCorrupt(format!(
                        "undo record names {} but transaction is {expected}",
                        record.tx_hash
                    )),
                });
            }

            let ctx = self.tx_context(entry.index, height);
            let mut state = ValidationState::new();
            entry
                .tx
                .undo_execute(view, scripts, &mut state, &ctx, record)
                .map_err(|source| BlockExecError::UndoFailed {
                    index: position,
                    source,
                })?;
            debug!(position, tx = %expected, "transaction disconnected");
        }

        Ok(())
    }
}
