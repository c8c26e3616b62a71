//! Contract registration and invocation scenarios, driven by a scripted
//! deterministic runtime standing in for the real VM.

mod common;

use std::sync::Arc;

use anyhow::Result;
use lib_crypto::{KeyId, Signature};
use lib_txcore::{
    constants::COIN, Account, AccountView, BlockExecError, ContractCallTx, ContractContext,
    ContractRuntime, MemAccountView, MemScriptView, RegId, RegisterContractTx, ScriptView,
    Transaction, UserRef, VmError, VmExecOutput, VmScript, TX_VERSION,
};

use common::{block_of, executor, executor_with, seed_contract, seed_registered, signed, FORK_HEIGHT};

/// Scripted stand-in for the VM: moves a fixed payout from the contract
/// account to two beneficiaries and bumps a counter in contract data.
struct PayoutRuntime {
    beneficiary_a: KeyId,
    beneficiary_b: KeyId,
    payout: u64,
    run_step: u64,
}

impl ContractRuntime for PayoutRuntime {
    fn execute(
        &self,
        ctx: &ContractContext<'_>,
        accounts: &dyn AccountView,
        scripts: &mut dyn ScriptView,
    ) -> Result<VmExecOutput, VmError> {
        let contract_key = ctx.app.script_key_id();
        let mut contract_account = accounts
            .load_account(&contract_key)
            .ok_or_else(|| VmError::Aborted("contract account missing".into()))?;

        let total = self.payout * 2;
        if contract_account.bcoins < total {
            return Err(VmError::Aborted("contract balance too low".into()));
        }
        contract_account.bcoins -= total;

        let mut account_a = accounts
            .load_account(&self.beneficiary_a)
            .unwrap_or_else(|| Account::new(self.beneficiary_a));
        account_a.bcoins += self.payout;
        let mut account_b = accounts
            .load_account(&self.beneficiary_b)
            .unwrap_or_else(|| Account::new(self.beneficiary_b));
        account_b.bcoins += self.payout;

        let mut db_log = Vec::new();
        let counter_key = b"app/payout-count".to_vec();
        let count = scripts
            .get_contract_data(&counter_key)
            .map(|v| u64::from_le_bytes(v.try_into().unwrap_or_default()))
            .unwrap_or(0);
        let op = scripts
            .set_contract_data(counter_key, (count + 1).to_le_bytes().to_vec())
            .map_err(|e| VmError::Aborted(e.to_string()))?;
        db_log.push(op);

        Ok(VmExecOutput {
            run_step: self.run_step,
            accounts: vec![contract_account, account_a, account_b],
            app_user_ids: vec![ctx.caller.to_vec6().to_vec()],
            db_log,
        })
    }
}

fn call_body(from: RegId, app: RegId, amount: u64, fee: u64, valid_height: u32) -> Transaction {
    Transaction::ContractCall(ContractCallTx {
        version: TX_VERSION,
        valid_height,
        fee,
        from: UserRef::Reg(from),
        app: UserRef::Reg(app),
        amount,
        arguments: b"invoke".to_vec(),
        signature: Signature::empty(),
    })
}

fn deploy_body(from: RegId, script: Vec<u8>, fee: u64, valid_height: u32) -> Transaction {
    Transaction::RegisterContract(RegisterContractTx {
        version: TX_VERSION,
        valid_height,
        fee,
        from: UserRef::Reg(from),
        script,
        signature: Signature::empty(),
    })
}

/// S3: a call mutates two extra accounts and writes contract data; the
/// merged undo log reverses all of it.
#[test]
fn contract_call_with_mutations_and_undo() -> Result<()> {
    let mut view = MemAccountView::new();
    let mut scripts = MemScriptView::new();

    let app_reg = RegId::new(10, 1);
    let caller_reg = RegId::new(20, 5);
    let (_, caller_key) = seed_registered(&mut view, 1, caller_reg, 10 * COIN);
    let contract_key = seed_contract(
        &mut view,
        &mut scripts,
        app_reg,
        VmScript::new(b"payout contract".to_vec(), Vec::new()).to_bytes(),
    );

    let a_key = KeyId::new([0xAA; 20]);
    let b_key = KeyId::new([0xBB; 20]);
    // A pre-exists with a balance; B is created by the call.
    let mut account_a = Account::new(a_key);
    account_a.bcoins = 1_000;
    view.store_account(a_key, account_a)?;

    let baseline_view = view.clone();
    let baseline_scripts = scripts.clone();

    let runtime = Arc::new(PayoutRuntime {
        beneficiary_a: a_key,
        beneficiary_b: b_key,
        payout: 250_000,
        run_step: 5_000,
    });
    let executor = executor_with(runtime);

    let amount = COIN;
    let fee = COIN;
    let tx = call_body(caller_reg, app_reg, amount, fee, FORK_HEIGHT);
    let tx = signed(tx, 1);
    let tx_hash = tx.hash();
    let block = block_of(0, tx);
    let outcome = executor.execute_block(FORK_HEIGHT, &block, &mut view, &mut scripts)?;

    // Caller paid fee + amount; contract received amount minus payouts.
    assert_eq!(
        view.load_account(&caller_key).unwrap().bcoins,
        10 * COIN - amount - fee
    );
    assert_eq!(
        view.load_account(&contract_key).unwrap().bcoins,
        amount - 2 * 250_000
    );
    assert_eq!(view.load_account(&a_key).unwrap().bcoins, 1_000 + 250_000);
    assert_eq!(view.load_account(&b_key).unwrap().bcoins, 250_000);
    assert_eq!(
        scripts.get_contract_data(b"app/payout-count").unwrap(),
        1u64.to_le_bytes().to_vec()
    );

    // Fuel: ceil(5000 / 100) × rate.
    assert_eq!(outcome.total_fuel, 50);

    // Related accounts cover both principals, both beneficiaries, and
    // the resolved app-user id (the caller again).
    let related = scripts.get_tx_related_accounts(&tx_hash).unwrap();
    assert!(related.contains(&caller_key));
    assert!(related.contains(&contract_key));
    assert!(related.contains(&a_key));
    assert!(related.contains(&b_key));

    executor.undo_block(FORK_HEIGHT, &block, &outcome.undo, &mut view, &mut scripts)?;
    assert_eq!(view, baseline_view);
    assert_eq!(scripts, baseline_scripts);
    assert!(view.load_account(&b_key).is_none());
    Ok(())
}

/// A runtime failure rejects the transaction with the script error tag.
#[test]
fn contract_call_script_failure_rejected() {
    let mut view = MemAccountView::new();
    let mut scripts = MemScriptView::new();

    let app_reg = RegId::new(10, 1);
    let caller_reg = RegId::new(20, 5);
    seed_registered(&mut view, 1, caller_reg, 10 * COIN);
    seed_contract(
        &mut view,
        &mut scripts,
        app_reg,
        VmScript::new(b"payout contract".to_vec(), Vec::new()).to_bytes(),
    );

    // DisabledRuntime aborts every call.
    let tx = signed(call_body(caller_reg, app_reg, COIN, COIN, FORK_HEIGHT), 1);
    let err = executor()
        .execute_block(FORK_HEIGHT, &block_of(0, tx), &mut view, &mut scripts)
        .unwrap_err();
    match err {
        BlockExecError::TxFailed { source, .. } => {
            assert_eq!(source.tag(), Some("run-script-error"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

/// Calling an app id with no registered script fails at check.
#[test]
fn contract_call_missing_script_rejected() {
    let mut view = MemAccountView::new();
    let mut scripts = MemScriptView::new();

    let caller_reg = RegId::new(20, 5);
    seed_registered(&mut view, 1, caller_reg, 10 * COIN);

    let tx = signed(
        call_body(caller_reg, RegId::new(10, 1), COIN, COIN, FORK_HEIGHT),
        1,
    );
    let err = executor()
        .execute_block(FORK_HEIGHT, &block_of(0, tx), &mut view, &mut scripts)
        .unwrap_err();
    match err {
        BlockExecError::TxFailed { source, .. } => {
            assert_eq!(source.tag(), Some("bad-read-script"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

/// Contract registration creates the script row, the script account, and
/// its registry id; undo removes all three.
#[test]
fn register_contract_and_undo() -> Result<()> {
    let mut view = MemAccountView::new();
    let mut scripts = MemScriptView::new();

    let registrant_reg = RegId::new(40, 2);
    let (_, registrant_key) = seed_registered(&mut view, 1, registrant_reg, 10 * COIN);

    let baseline_view = view.clone();
    let baseline_scripts = scripts.clone();

    let blob = VmScript::new(vec![0x42; 1_000], b"demo app".to_vec()).to_bytes();
    // Deploy fuel floor is 1 COIN at fuel rate 1.
    let tx = signed(deploy_body(registrant_reg, blob.clone(), COIN, FORK_HEIGHT), 1);
    let block = block_of(0, tx);
    let executor = executor();
    let outcome = executor.execute_block(FORK_HEIGHT, &block, &mut view, &mut scripts)?;

    let new_reg = RegId::new(FORK_HEIGHT, 0);
    let script_account_key = new_reg.script_key_id();
    assert_eq!(scripts.get_script(&new_reg), Some(blob));
    let script_account = view.load_account(&script_account_key).unwrap();
    assert_eq!(script_account.reg_id, Some(new_reg));
    assert_eq!(
        view.load_account(&registrant_key).unwrap().bcoins,
        10 * COIN - COIN
    );
    // run_step is the script length, so fuel hits the deploy floor.
    assert_eq!(outcome.total_fuel, COIN);

    executor.undo_block(FORK_HEIGHT, &block, &outcome.undo, &mut view, &mut scripts)?;
    assert_eq!(view, baseline_view);
    assert_eq!(scripts, baseline_scripts);
    assert!(scripts.get_script(&new_reg).is_none());
    Ok(())
}

/// The deploy fee must cover the fuel bound.
#[test]
fn register_contract_fee_below_fuel_rejected() {
    let mut view = MemAccountView::new();
    let mut scripts = MemScriptView::new();

    let registrant_reg = RegId::new(40, 2);
    seed_registered(&mut view, 1, registrant_reg, 10 * COIN);

    let blob = VmScript::new(vec![0x42; 1_000], Vec::new()).to_bytes();
    let tx = signed(
        deploy_body(registrant_reg, blob, COIN - 1, FORK_HEIGHT),
        1,
    );
    let err = executor()
        .execute_block(FORK_HEIGHT, &block_of(0, tx), &mut view, &mut scripts)
        .unwrap_err();
    match err {
        BlockExecError::TxFailed { source, .. } => {
            assert_eq!(source.tag(), Some("fee-below-fuel"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

/// Malformed script containers never register.
#[test]
fn register_contract_bad_container_rejected() {
    let mut view = MemAccountView::new();
    let mut scripts = MemScriptView::new();

    let registrant_reg = RegId::new(40, 2);
    seed_registered(&mut view, 1, registrant_reg, 10 * COIN);

    let tx = signed(
        deploy_body(registrant_reg, b"not a container".to_vec(), COIN, FORK_HEIGHT),
        1,
    );
    let err = executor()
        .execute_block(FORK_HEIGHT, &block_of(0, tx), &mut view, &mut scripts)
        .unwrap_err();
    match err {
        BlockExecError::TxFailed { source, .. } => {
            assert!(matches!(
                source.tag(),
                Some("vmscript-invalid") | Some("unserialize-error")
            ));
        }
        other => panic!("unexpected error {other:?}"),
    }
}
