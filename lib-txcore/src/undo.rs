//! Undo log.
//!
//! Every accepted transaction leaves behind one [`TxUndo`]: the accounts
//! it touched, snapshotted *before* their first mutation, plus the raw
//! `(key, old_value)` pre-images of every secondary-index and contract DB
//! write. Replaying a record in reverse restores the pre-state exactly.
//!
//! The record is append-only while a transaction executes and opaque to
//! everything except the kind's own `undo_execute`.

use lib_crypto::KeyId;
use serde::{Deserialize, Serialize};

use crate::account::Account;
use crate::types::TxHash;

/// Pre-image of one contract/index DB write.
///
/// `old_value == None` means the key did not exist before the write, so
/// undo deletes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbOp {
    pub key: Vec<u8>,
    pub old_value: Option<Vec<u8>>,
}

impl DbOp {
    pub fn new(key: Vec<u8>, old_value: Option<Vec<u8>>) -> Self {
        Self { key, old_value }
    }
}

/// Reversal record for a single transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxUndo {
    pub tx_hash: TxHash,
    /// Account pre-images in first-mutation order.
    pub accounts: Vec<Account>,
    /// DB-write pre-images in application order.
    pub db_ops: Vec<DbOp>,
}

impl TxUndo {
    pub fn new(tx_hash: TxHash) -> Self {
        Self {
            tx_hash,
            accounts: Vec::new(),
            db_ops: Vec::new(),
        }
    }

    /// Record an account's pre-state.
    ///
    /// Only the first snapshot per address is kept; a second call for the
    /// same account is a no-op, so the record always holds the state from
    /// before the transaction touched it.
    pub fn snapshot_account(&mut self, account: &Account) {
        if self.accounts.iter().any(|a| a.key_id == account.key_id) {
            return;
        }
        self.accounts.push(account.clone());
    }

    /// Append a DB-write pre-image.
    pub fn push_db_op(&mut self, op: DbOp) {
        self.db_ops.push(op);
    }

    /// Look up the pre-image for an address.
    pub fn account_preimage(&self, key_id: &KeyId) -> Option<&Account> {
        self.accounts.iter().find(|a| a.key_id == *key_id)
    }
}

/// Reversal records for one block, in block order.
///
/// Disconnecting a block consumes the records back-to-front.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockUndo {
    pub tx_undos: Vec<TxUndo>,
}

impl BlockUndo {
    pub fn push(&mut self, undo: TxUndo) {
        self.tx_undos.push(undo);
    }

    pub fn len(&self) -> usize {
        self.tx_undos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx_undos.is_empty()
    }
}
