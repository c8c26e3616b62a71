//! Deterministic in-memory view overlays.
//!
//! Backing maps are `BTreeMap`s so iteration order, and therefore every
//! derived byte sequence, is deterministic. These overlays are the unit of
//! atomicity: the block driver clones the committed state, executes into
//! the clone, and either installs it or drops it.

use std::collections::{BTreeMap, BTreeSet};

use lib_crypto::KeyId;

use crate::account::Account;
use crate::ids::RegId;
use crate::types::TxHash;
use crate::undo::DbOp;

use super::{AccountView, ScriptView, ViewError};

const SCRIPT_PREFIX: &[u8] = b"script/";
const ADDR_TX_PREFIX: &[u8] = b"addrtx/";
const DELEGATE_PREFIX: &[u8] = b"delegate/";

/// In-memory account view: primary map plus `RegID → KeyID` index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemAccountView {
    accounts: BTreeMap<KeyId, Account>,
    reg_index: BTreeMap<RegId, KeyId>,
}

impl MemAccountView {
    pub fn new() -> Self {
        Self::default()
    }

    /// All accounts, in address order. Test suites use this for the
    /// conservation and vote-aggregate invariants.
    pub fn accounts(&self) -> impl Iterator<Item = (&KeyId, &Account)> {
        self.accounts.iter()
    }

    /// The secondary index, in id order.
    pub fn reg_index(&self) -> impl Iterator<Item = (&RegId, &KeyId)> {
        self.reg_index.iter()
    }

    /// Total free balance across all accounts.
    pub fn total_bcoins(&self) -> u64 {
        self.accounts.values().map(|a| a.bcoins).sum()
    }
}

impl AccountView for MemAccountView {
    fn load_account(&self, key_id: &KeyId) -> Option<Account> {
        self.accounts.get(key_id).cloned()
    }

    fn store_account(&mut self, key_id: KeyId, account: Account) -> Result<(), ViewError> {
        self.accounts.insert(key_id, account);
        Ok(())
    }

    fn remove_account(&mut self, key_id: &KeyId) -> Result<(), ViewError> {
        self.accounts.remove(key_id);
        Ok(())
    }

    fn reg_index_get(&self, reg_id: &RegId) -> Option<KeyId> {
        self.reg_index.get(reg_id).copied()
    }

    fn reg_index_put(&mut self, reg_id: RegId, key_id: KeyId) -> Result<(), ViewError> {
        self.reg_index.insert(reg_id, key_id);
        Ok(())
    }

    fn reg_index_remove(&mut self, reg_id: &RegId) -> Result<(), ViewError> {
        self.reg_index.remove(reg_id);
        Ok(())
    }
}

/// In-memory script view: contract code, contract data, secondary
/// indexes, and the per-tx related-accounts map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemScriptView {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
    related: BTreeMap<TxHash, BTreeSet<KeyId>>,
}

impl MemScriptView {
    pub fn new() -> Self {
        Self::default()
    }

    fn script_key(reg_id: &RegId) -> Vec<u8> {
        let mut key = SCRIPT_PREFIX.to_vec();
        key.extend_from_slice(&reg_id.to_vec6());
        key
    }

    fn addr_tx_key(key_id: &KeyId, height: u32, index: u32) -> Vec<u8> {
        let mut key = ADDR_TX_PREFIX.to_vec();
        key.extend_from_slice(key_id.as_ref());
        key.extend_from_slice(&height.to_be_bytes());
        key.extend_from_slice(&index.to_be_bytes());
        key
    }

    // Ranking keys sort ascending, so the vote count is stored inverted:
    // the heaviest candidate owns the smallest key.
    fn delegate_key(received_votes: u64, key_id: &KeyId) -> Vec<u8> {
        let mut key = DELEGATE_PREFIX.to_vec();
        key.extend_from_slice(&(u64::MAX - received_votes).to_be_bytes());
        key.extend_from_slice(key_id.as_ref());
        key
    }

    fn write(&mut self, key: Vec<u8>, value: Vec<u8>) -> DbOp {
        let old_value = self.data.insert(key.clone(), value);
        DbOp::new(key, old_value)
    }

    fn delete(&mut self, key: Vec<u8>) -> DbOp {
        let old_value = self.data.remove(&key);
        DbOp::new(key, old_value)
    }

    /// Raw entries under a key prefix, in key order.
    pub fn entries_with_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.data
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Candidate-ranking entries, heaviest first.
    pub fn delegate_entries(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.entries_with_prefix(DELEGATE_PREFIX)
    }

    /// Address→tx entries for one address, oldest first.
    pub fn addr_tx_entries(&self, key_id: &KeyId) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut prefix = ADDR_TX_PREFIX.to_vec();
        prefix.extend_from_slice(key_id.as_ref());
        self.entries_with_prefix(&prefix)
    }
}

impl ScriptView for MemScriptView {
    fn get_script(&self, reg_id: &RegId) -> Option<Vec<u8>> {
        self.data.get(&Self::script_key(reg_id)).cloned()
    }

    fn set_script(&mut self, reg_id: RegId, bytes: Vec<u8>) -> Result<(), ViewError> {
        self.data.insert(Self::script_key(&reg_id), bytes);
        Ok(())
    }

    fn erase_script(&mut self, reg_id: &RegId) -> Result<(), ViewError> {
        self.data.remove(&Self::script_key(reg_id));
        Ok(())
    }

    fn set_tx_hash_by_address(
        &mut self,
        key_id: &KeyId,
        height: u32,
        index: u32,
        tx_hash: &TxHash,
    ) -> Result<DbOp, ViewError> {
        let key = Self::addr_tx_key(key_id, height, index);
        Ok(self.write(key, tx_hash.as_bytes().to_vec()))
    }

    fn get_delegate_data(&self, candidate: &Account) -> Option<Vec<u8>> {
        let key = Self::delegate_key(candidate.received_votes, &candidate.key_id);
        self.data.get(&key).cloned()
    }

    fn set_delegate_data(&mut self, candidate: &Account) -> Result<DbOp, ViewError> {
        let key = Self::delegate_key(candidate.received_votes, &candidate.key_id);
        Ok(self.write(key, candidate.key_id.as_ref().to_vec()))
    }

    fn erase_delegate_data(&mut self, candidate: &Account) -> Result<DbOp, ViewError> {
        let key = Self::delegate_key(candidate.received_votes, &candidate.key_id);
        Ok(self.delete(key))
    }

    fn set_contract_data(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<DbOp, ViewError> {
        Ok(self.write(key, value))
    }

    fn get_contract_data(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.get(key).cloned()
    }

    fn set_tx_related_accounts(
        &mut self,
        tx_hash: &TxHash,
        accounts: &BTreeSet<KeyId>,
    ) -> Result<(), ViewError> {
        self.related.insert(*tx_hash, accounts.clone());
        Ok(())
    }

    fn get_tx_related_accounts(&self, tx_hash: &TxHash) -> Option<BTreeSet<KeyId>> {
        self.related.get(tx_hash).cloned()
    }

    fn erase_tx_related_accounts(&mut self, tx_hash: &TxHash) -> Result<(), ViewError> {
        self.related.remove(tx_hash);
        Ok(())
    }

    fn undo_script_data(
        &mut self,
        key: &[u8],
        old_value: Option<Vec<u8>>,
    ) -> Result<(), ViewError> {
        match old_value {
            Some(value) => {
                self.data.insert(key.to_vec(), value);
            }
            None => {
                self.data.remove(key);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_captures_preimage() {
        let mut view = MemScriptView::new();
        let op1 = view.set_contract_data(b"k".to_vec(), b"v1".to_vec()).unwrap();
        assert_eq!(op1.old_value, None);
        let op2 = view.set_contract_data(b"k".to_vec(), b"v2".to_vec()).unwrap();
        assert_eq!(op2.old_value.as_deref(), Some(&b"v1"[..]));
    }

    #[test]
    fn undo_script_data_restores_exactly() {
        let mut view = MemScriptView::new();
        let baseline = view.clone();

        let op = view.set_contract_data(b"k".to_vec(), b"v".to_vec()).unwrap();
        view.undo_script_data(&op.key, op.old_value).unwrap();
        assert_eq!(view, baseline);
    }

    #[test]
    fn delegate_entries_rank_heaviest_first() {
        let mut view = MemScriptView::new();
        let mut heavy = Account::new(KeyId::new([1; 20]));
        heavy.received_votes = 900;
        let mut light = Account::new(KeyId::new([2; 20]));
        light.received_votes = 100;

        view.set_delegate_data(&light).unwrap();
        view.set_delegate_data(&heavy).unwrap();

        let entries = view.delegate_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].1, heavy.key_id.as_ref().to_vec());
        assert_eq!(entries[1].1, light.key_id.as_ref().to_vec());
        assert_eq!(
            view.get_delegate_data(&heavy),
            Some(heavy.key_id.as_ref().to_vec())
        );
    }

    #[test]
    fn script_rows_are_isolated_by_reg_id() {
        let mut view = MemScriptView::new();
        view.set_script(RegId::new(1, 0), b"code-a".to_vec()).unwrap();
        view.set_script(RegId::new(2, 0), b"code-b".to_vec()).unwrap();
        assert_eq!(view.get_script(&RegId::new(1, 0)).unwrap(), b"code-a");
        view.erase_script(&RegId::new(1, 0)).unwrap();
        assert!(view.get_script(&RegId::new(1, 0)).is_none());
        assert!(view.get_script(&RegId::new(2, 0)).is_some());
    }
}
