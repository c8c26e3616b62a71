//! Shared fixtures for the execution-core test suites.
//!
//! All principals derive from fixed byte seeds, so every test run sees
//! identical keys, hashes, and signatures.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use lib_crypto::{pub_key_for_secret, sign_hash, KeyId, PubKey};
use lib_txcore::{
    Account, AccountView, BlockExecutor, BlockTx, ContractRuntime, CoreConfig, DisabledRuntime,
    MemAccountView, MemScriptView, RegId, ScriptView, Transaction, TransferTx, UserRef,
    TX_VERSION,
};

/// R2 activates at this height in every test chain.
pub const FORK_HEIGHT: u32 = 100;

pub fn secret(n: u8) -> [u8; 32] {
    [n; 32]
}

pub fn pubkey(n: u8) -> PubKey {
    pub_key_for_secret(&secret(n)).expect("fixture secret is a valid key")
}

pub fn config() -> CoreConfig {
    CoreConfig::default()
        .with_fork_height_r2(FORK_HEIGHT)
        .with_address_index(true)
        .with_fuel_rate(1)
}

pub fn executor() -> BlockExecutor {
    BlockExecutor::new(config(), Arc::new(DisabledRuntime))
}

pub fn executor_with(runtime: Arc<dyn ContractRuntime>) -> BlockExecutor {
    BlockExecutor::new(config(), runtime)
}

/// Seed a registered account: key bound, reg id indexed, balance funded.
pub fn seed_registered(
    view: &mut MemAccountView,
    seed: u8,
    reg_id: RegId,
    bcoins: u64,
) -> (PubKey, KeyId) {
    let pk = pubkey(seed);
    let key_id = pk.key_id();
    let mut account = Account::new(key_id);
    account.pub_key = Some(pk);
    account.reg_id = Some(reg_id);
    account.bcoins = bcoins;
    view.save_account_info(reg_id, key_id, account)
        .expect("seeding cannot fail in memory");
    (pk, key_id)
}

/// Seed a bare account: a funded address with no key and no reg id.
pub fn seed_unregistered(view: &mut MemAccountView, key_id: KeyId, bcoins: u64) {
    let mut account = Account::new(key_id);
    account.bcoins = bcoins;
    view.store_account(key_id, account)
        .expect("seeding cannot fail in memory");
}

/// Seed a contract: script bytes under `reg_id`, account at the script
/// address.
pub fn seed_contract(
    view: &mut MemAccountView,
    scripts: &mut MemScriptView,
    reg_id: RegId,
    blob: Vec<u8>,
) -> KeyId {
    let key_id = reg_id.script_key_id();
    let mut account = Account::new(key_id);
    account.reg_id = Some(reg_id);
    view.save_account_info(reg_id, key_id, account)
        .expect("seeding cannot fail in memory");
    scripts
        .set_script(reg_id, blob)
        .expect("seeding cannot fail in memory");
    key_id
}

/// Sign a finished transaction with the single-signer secret and return
/// the signed form.
pub fn signed(tx: Transaction, seed: u8) -> Transaction {
    let sighash = tx.signature_hash();
    let signature = sign_hash(&sighash, &secret(seed)).expect("fixture secret signs");
    match tx {
        Transaction::RegisterAccount(mut inner) => {
            inner.signature = signature;
            Transaction::RegisterAccount(inner)
        }
        Transaction::Transfer(mut inner) => {
            inner.signature = signature;
            Transaction::Transfer(inner)
        }
        Transaction::ContractCall(mut inner) => {
            inner.signature = signature;
            Transaction::ContractCall(inner)
        }
        Transaction::RegisterContract(mut inner) => {
            inner.signature = signature;
            Transaction::RegisterContract(inner)
        }
        Transaction::DelegateVote(mut inner) => {
            inner.signature = signature;
            Transaction::DelegateVote(inner)
        }
        other => other,
    }
}

/// Unsigned transfer body; callers wrap and sign.
pub fn transfer_body(from: UserRef, to: UserRef, amount: u64, fee: u64, valid_height: u32) -> TransferTx {
    TransferTx {
        version: TX_VERSION,
        valid_height,
        fee,
        from,
        to,
        amount,
        memo: Vec::new(),
        signature: lib_crypto::Signature::empty(),
    }
}

/// One-transaction block at the given position.
pub fn block_of(index: i32, tx: Transaction) -> Vec<BlockTx> {
    vec![BlockTx::new(index, tx)]
}

/// The vote-aggregate invariant: for every candidate, the sum of funds
/// voted toward it across all accounts equals its received tally.
pub fn assert_vote_aggregate(view: &MemAccountView) {
    let mut per_candidate: BTreeMap<KeyId, u64> = BTreeMap::new();
    for (_, account) in view.accounts() {
        for fund in &account.voted_funds {
            *per_candidate.entry(fund.candidate).or_default() += fund.amount;
        }
    }
    for (key_id, account) in view.accounts() {
        let voted_in = per_candidate.get(key_id).copied().unwrap_or(0);
        assert_eq!(
            account.received_votes, voted_in,
            "vote aggregate broken for {key_id}"
        );
    }
}

/// The reg-id uniqueness invariant: the secondary index is a partial
/// bijection and every indexed account carries its own id.
pub fn assert_reg_id_bijection(view: &MemAccountView) {
    let mut seen_keys: BTreeMap<KeyId, RegId> = BTreeMap::new();
    for (reg_id, key_id) in view.reg_index() {
        if let Some(previous) = seen_keys.insert(*key_id, *reg_id) {
            panic!("key {key_id} indexed under both {previous} and {reg_id}");
        }
        let account = view
            .load_account(key_id)
            .unwrap_or_else(|| panic!("index names missing account {key_id}"));
        assert_eq!(account.reg_id, Some(*reg_id));
    }
}
