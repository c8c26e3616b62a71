//! Multisig transfer scenarios: threshold acceptance, duplicate signer
//! rejection, and execution symmetry with plain transfers.

mod common;

use anyhow::Result;
use lib_crypto::{hash160, sign_hash, KeyId, PubKey, Signature};
use lib_txcore::{
    constants::{COIN, MIN_TX_FEE},
    Account, AccountView, BlockExecError, MemAccountView, MemScriptView, MultisigTx, RegId,
    SignaturePair, Transaction, UserRef, TX_VERSION,
};

use common::{block_of, executor, pubkey, secret, seed_registered, FORK_HEIGHT};

const SIGNER_SEEDS: [u8; 3] = [11, 12, 13];

fn signer_reg(i: usize) -> RegId {
    RegId::new(1, (i + 1) as u16)
}

/// Script address of the fixture's 2-of-3 arrangement.
fn script_key(required: u8) -> KeyId {
    let mut keys: Vec<PubKey> = SIGNER_SEEDS.iter().map(|s| pubkey(*s)).collect();
    keys.sort();
    let mut encoding = vec![required, keys.len() as u8];
    for key in &keys {
        encoding.extend_from_slice(key.as_bytes());
    }
    KeyId::new(hash160(&encoding))
}

/// Seed the three signer accounts and the funded multisig account.
fn seed_multisig_world(view: &mut MemAccountView, required: u8, balance: u64) -> KeyId {
    for (i, seed) in SIGNER_SEEDS.iter().enumerate() {
        seed_registered(view, *seed, signer_reg(i), COIN);
    }
    let key = script_key(required);
    let mut account = Account::new(key);
    account.bcoins = balance;
    view.store_account(key, account).expect("in-memory seed");
    key
}

/// Build a 2-of-3 transfer with signatures from the given signer
/// indices; the other slots stay empty.
fn multisig_tx(signing: &[usize], to: UserRef, amount: u64) -> Transaction {
    let mut tx = MultisigTx {
        version: TX_VERSION,
        valid_height: FORK_HEIGHT,
        fee: MIN_TX_FEE,
        required: 2,
        signers: SIGNER_SEEDS
            .iter()
            .enumerate()
            .map(|(i, _)| SignaturePair {
                reg_id: signer_reg(i),
                signature: Signature::empty(),
            })
            .collect(),
        to,
        amount,
        memo: b"multisig payout".to_vec(),
    };
    let sighash = Transaction::Multisig(tx.clone()).signature_hash();
    for &i in signing {
        tx.signers[i].signature =
            sign_hash(&sighash, &secret(SIGNER_SEEDS[i])).expect("fixture secret signs");
    }
    Transaction::Multisig(tx)
}

/// S5 accept path: two of three valid signatures clear the threshold.
#[test]
fn two_of_three_accepted() -> Result<()> {
    let mut view = MemAccountView::new();
    let mut scripts = MemScriptView::new();
    let script_account = seed_multisig_world(&mut view, 2, 5 * COIN);
    let dest = pubkey(20).key_id();

    let baseline_view = view.clone();
    let baseline_scripts = scripts.clone();

    let tx = multisig_tx(&[0, 2], UserRef::Key(dest), COIN);
    let block = block_of(0, tx);
    let executor = executor();
    let outcome = executor.execute_block(FORK_HEIGHT, &block, &mut view, &mut scripts)?;

    assert_eq!(
        view.load_account(&script_account).unwrap().bcoins,
        5 * COIN - COIN - MIN_TX_FEE
    );
    assert_eq!(view.load_account(&dest).unwrap().bcoins, COIN);
    // The script account was reg-id'd lazily by this position.
    assert_eq!(
        view.load_account(&script_account).unwrap().reg_id,
        Some(RegId::new(FORK_HEIGHT, 0))
    );

    // Address index covers every signer plus the destination.
    for seed in SIGNER_SEEDS {
        let signer_key = pubkey(seed).key_id();
        assert_eq!(scripts.addr_tx_entries(&signer_key).len(), 1);
    }
    assert_eq!(scripts.addr_tx_entries(&dest).len(), 1);

    executor.undo_block(FORK_HEIGHT, &block, &outcome.undo, &mut view, &mut scripts)?;
    assert_eq!(view, baseline_view);
    assert_eq!(scripts, baseline_scripts);
    Ok(())
}

/// S5 reject path: one valid signature misses the threshold.
#[test]
fn one_of_three_rejected() {
    let mut view = MemAccountView::new();
    let mut scripts = MemScriptView::new();
    seed_multisig_world(&mut view, 2, 5 * COIN);

    let tx = multisig_tx(&[1], UserRef::Key(pubkey(20).key_id()), COIN);
    let err = executor()
        .execute_block(FORK_HEIGHT, &block_of(0, tx), &mut view, &mut scripts)
        .unwrap_err();
    match err {
        BlockExecError::TxFailed { source, .. } => {
            assert_eq!(source.tag(), Some("not-enough-valid-signatures"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

/// S5 reject path: listing the same signer twice collapses the derived
/// key set and is refused.
#[test]
fn duplicate_signer_rejected() {
    let mut view = MemAccountView::new();
    let mut scripts = MemScriptView::new();
    seed_multisig_world(&mut view, 2, 5 * COIN);

    let tx = match multisig_tx(&[0, 1], UserRef::Key(pubkey(20).key_id()), COIN) {
        Transaction::Multisig(mut inner) => {
            inner.signers[2].reg_id = inner.signers[0].reg_id;
            // Re-sign: changing a signer changes the canonical hash.
            inner.signers[0].signature = Signature::empty();
            inner.signers[1].signature = Signature::empty();
            inner.signers[2].signature = Signature::empty();
            let sighash = Transaction::Multisig(inner.clone()).signature_hash();
            inner.signers[0].signature =
                sign_hash(&sighash, &secret(SIGNER_SEEDS[0])).expect("fixture secret signs");
            inner.signers[1].signature =
                sign_hash(&sighash, &secret(SIGNER_SEEDS[1])).expect("fixture secret signs");
            Transaction::Multisig(inner)
        }
        other => other,
    };

    let err = executor()
        .execute_block(FORK_HEIGHT, &block_of(0, tx), &mut view, &mut scripts)
        .unwrap_err();
    match err {
        BlockExecError::TxFailed { source, .. } => {
            assert_eq!(source.tag(), Some("duplicated-account"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

/// A transfer from a multisig arrangement with no funded account behind
/// it is refused at check.
#[test]
fn missing_multisig_account_rejected() {
    let mut view = MemAccountView::new();
    let mut scripts = MemScriptView::new();
    // Signers exist, but no account was ever funded at the script key.
    for (i, seed) in SIGNER_SEEDS.iter().enumerate() {
        seed_registered(&mut view, *seed, signer_reg(i), COIN);
    }

    let tx = multisig_tx(&[0, 1], UserRef::Key(pubkey(20).key_id()), COIN);
    let err = executor()
        .execute_block(FORK_HEIGHT, &block_of(0, tx), &mut view, &mut scripts)
        .unwrap_err();
    match err {
        BlockExecError::TxFailed { source, .. } => {
            assert_eq!(source.tag(), Some("bad-read-accountdb"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

/// Threshold bounds: `required` can never exceed the listed signers.
#[test]
fn required_above_signer_count_rejected() {
    let mut view = MemAccountView::new();
    let mut scripts = MemScriptView::new();
    seed_multisig_world(&mut view, 2, 5 * COIN);

    let tx = match multisig_tx(&[0, 1], UserRef::Key(pubkey(20).key_id()), COIN) {
        Transaction::Multisig(mut inner) => {
            inner.required = 4;
            Transaction::Multisig(inner)
        }
        other => other,
    };
    let err = executor()
        .execute_block(FORK_HEIGHT, &block_of(0, tx), &mut view, &mut scripts)
        .unwrap_err();
    match err {
        BlockExecError::TxFailed { source, .. } => {
            assert_eq!(source.tag(), Some("required-keys-invalid"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}
