//! Abstract state views.
//!
//! The core consumes two views and never a concrete database: an account
//! view (primary `KeyID → Account` map plus the `RegID → KeyID` secondary
//! index) and a script view (contract code, contract data, and the
//! secondary indexes the core treats as opaque byte pre-images).
//!
//! # Data Model Invariants
//!
//! 1. **Single writer** - a transaction holds the only mutable borrow of
//!    both views for the whole of `execute`.
//! 2. **State writes are reversible** - every index/data write returns its
//!    `(key, old_value)` pre-image so the caller can append it to the
//!    transaction's undo record.
//! 3. **Views are overlays** - a failed transaction's edits are discarded
//!    by dropping the overlay, never by consulting the undo log.

pub mod mem;

use std::collections::BTreeSet;

use lib_crypto::KeyId;
use thiserror::Error;

use crate::account::Account;
use crate::ids::{RegId, UserRef};
use crate::resolver;
use crate::types::TxHash;
use crate::undo::DbOp;

pub use mem::{MemAccountView, MemScriptView};

/// View-layer failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ViewError {
    #[error("unresolvable principal reference: {0}")]
    Unresolvable(String),

    #[error("view backend failure: {0}")]
    Backend(String),
}

/// Account database view.
///
/// Implementors supply the six primitives; the `UserRef`-level operations
/// are provided on top and resolve references through
/// [`crate::resolver`].
pub trait AccountView {
    /// Load the account at an address.
    fn load_account(&self, key_id: &KeyId) -> Option<Account>;

    /// Write the account at an address, creating the row if absent.
    fn store_account(&mut self, key_id: KeyId, account: Account) -> Result<(), ViewError>;

    /// Delete the account row at an address.
    fn remove_account(&mut self, key_id: &KeyId) -> Result<(), ViewError>;

    /// Look up the secondary `RegID → KeyID` index.
    fn reg_index_get(&self, reg_id: &RegId) -> Option<KeyId>;

    /// Insert into the secondary index.
    fn reg_index_put(&mut self, reg_id: RegId, key_id: KeyId) -> Result<(), ViewError>;

    /// Remove from the secondary index.
    fn reg_index_remove(&mut self, reg_id: &RegId) -> Result<(), ViewError>;

    // -------------------------------------------------------------------
    // Provided operations over principal references
    // -------------------------------------------------------------------

    /// Account for a principal reference, if resolvable and present.
    fn get_account(&self, user: &UserRef) -> Option<Account> {
        let key_id = resolver::resolve_key_id(self, user)?;
        self.load_account(&key_id)
    }

    /// Write through for a principal reference.
    fn set_account(&mut self, user: &UserRef, account: Account) -> Result<(), ViewError> {
        let key_id = resolver::resolve_key_id(self, user)
            .ok_or_else(|| ViewError::Unresolvable(user.to_string()))?;
        self.store_account(key_id, account)
    }

    /// Atomically insert into both the primary and secondary maps.
    fn save_account_info(
        &mut self,
        reg_id: RegId,
        key_id: KeyId,
        account: Account,
    ) -> Result<(), ViewError> {
        self.reg_index_put(reg_id, key_id)?;
        self.store_account(key_id, account)
    }

    /// Delete the account row for a principal reference. Undo paths only.
    fn erase_account(&mut self, user: &UserRef) -> Result<(), ViewError> {
        let key_id = resolver::resolve_key_id(self, user)
            .ok_or_else(|| ViewError::Unresolvable(user.to_string()))?;
        self.remove_account(&key_id)
    }

    /// Delete a secondary index entry. Undo paths only.
    fn erase_reg_id(&mut self, reg_id: &RegId) -> Result<(), ViewError> {
        self.reg_index_remove(reg_id)
    }

    /// Canonical address for a principal reference.
    fn get_key_id(&self, user: &UserRef) -> Option<KeyId> {
        resolver::resolve_key_id(self, user)
    }

    /// Registry id for a principal reference, if one is assigned.
    fn get_reg_id(&self, user: &UserRef) -> Option<RegId> {
        resolver::resolve_reg_id(self, user)
    }
}

/// Contract/script database view.
///
/// Everything except contract code and the related-accounts set is
/// written through pre-image-returning methods; the caller owns appending
/// those pre-images to the undo record.
pub trait ScriptView {
    /// Contract code registered under a contract id.
    fn get_script(&self, reg_id: &RegId) -> Option<Vec<u8>>;

    /// Register contract code. Reversed by `erase_script`, not a pre-image.
    fn set_script(&mut self, reg_id: RegId, bytes: Vec<u8>) -> Result<(), ViewError>;

    /// Remove contract code. Undo paths only.
    fn erase_script(&mut self, reg_id: &RegId) -> Result<(), ViewError>;

    /// Append an address→tx index entry, returning its pre-image.
    fn set_tx_hash_by_address(
        &mut self,
        key_id: &KeyId,
        height: u32,
        index: u32,
        tx_hash: &TxHash,
    ) -> Result<DbOp, ViewError>;

    /// Ranking entry for a candidate at its current received votes.
    fn get_delegate_data(&self, candidate: &Account) -> Option<Vec<u8>>;

    /// Write a candidate's ranking entry keyed by its current received
    /// votes, returning the pre-image.
    fn set_delegate_data(&mut self, candidate: &Account) -> Result<DbOp, ViewError>;

    /// Erase the ranking entry keyed by the candidate's *previous*
    /// received votes, returning the pre-image.
    fn erase_delegate_data(&mut self, candidate: &Account) -> Result<DbOp, ViewError>;

    /// Raw contract-data write, returning the pre-image. The contract
    /// runtime adapter is the only caller.
    fn set_contract_data(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<DbOp, ViewError>;

    /// Raw contract-data read.
    fn get_contract_data(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Record the set of accounts a transaction touched.
    fn set_tx_related_accounts(
        &mut self,
        tx_hash: &TxHash,
        accounts: &BTreeSet<KeyId>,
    ) -> Result<(), ViewError>;

    /// Accounts a past transaction touched, if recorded.
    fn get_tx_related_accounts(&self, tx_hash: &TxHash) -> Option<BTreeSet<KeyId>>;

    /// Drop a related-accounts record. Undo paths only.
    fn erase_tx_related_accounts(&mut self, tx_hash: &TxHash) -> Result<(), ViewError>;

    /// Restore a pre-image captured by any of the writers above:
    /// `Some` re-instates the old value, `None` deletes the key.
    fn undo_script_data(&mut self, key: &[u8], old_value: Option<Vec<u8>>)
        -> Result<(), ViewError>;
}
