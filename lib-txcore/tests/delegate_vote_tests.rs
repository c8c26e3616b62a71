//! Delegate-vote scenarios: fund accounting, the candidate ranking
//! index, and the vote-aggregate invariant.

mod common;

use anyhow::Result;
use lib_crypto::Signature;
use lib_txcore::{
    constants::{COIN, MIN_TX_FEE},
    AccountView, BlockExecError, DelegateVoteTx, MemAccountView, MemScriptView, RegId,
    Transaction, UserRef, VoteOp, VoteOperation, TX_VERSION,
};

use common::{
    assert_vote_aggregate, block_of, executor, seed_registered, signed, FORK_HEIGHT,
};

fn vote_body(
    from: RegId,
    operations: Vec<VoteOperation>,
    fee: u64,
    valid_height: u32,
) -> Transaction {
    Transaction::DelegateVote(DelegateVoteTx {
        version: TX_VERSION,
        valid_height,
        fee,
        from: UserRef::Reg(from),
        operations,
        signature: Signature::empty(),
    })
}

fn add(candidate: RegId, count: u64) -> VoteOperation {
    VoteOperation {
        op: VoteOp::Add,
        candidate: UserRef::Reg(candidate),
        count,
    }
}

fn sub(candidate: RegId, count: u64) -> VoteOperation {
    VoteOperation {
        op: VoteOp::Sub,
        candidate: UserRef::Reg(candidate),
        count,
    }
}

/// S4: vote 1000 up, then 400 down. The candidate tally lands on 600,
/// the voter's free balance is down by 600 plus fees, and the ranking
/// index holds exactly one entry.
#[test]
fn vote_up_then_down() -> Result<()> {
    let mut view = MemAccountView::new();
    let mut scripts = MemScriptView::new();

    let voter_reg = RegId::new(30, 1);
    let candidate_reg = RegId::new(30, 2);
    let (_, voter_key) = seed_registered(&mut view, 1, voter_reg, COIN);
    let (_, candidate_key) = seed_registered(&mut view, 2, candidate_reg, COIN);

    let baseline_view = view.clone();
    let baseline_scripts = scripts.clone();
    let executor = executor();

    let up = signed(
        vote_body(voter_reg, vec![add(candidate_reg, 1_000)], MIN_TX_FEE, FORK_HEIGHT),
        1,
    );
    let up_block = block_of(0, up);
    let up_outcome = executor.execute_block(FORK_HEIGHT, &up_block, &mut view, &mut scripts)?;

    assert_eq!(
        view.load_account(&candidate_key).unwrap().received_votes,
        1_000
    );
    assert_vote_aggregate(&view);

    let down = signed(
        vote_body(
            voter_reg,
            vec![sub(candidate_reg, 400)],
            MIN_TX_FEE,
            FORK_HEIGHT + 1,
        ),
        1,
    );
    let down_block = block_of(0, down);
    let down_outcome =
        executor.execute_block(FORK_HEIGHT + 1, &down_block, &mut view, &mut scripts)?;

    let candidate = view.load_account(&candidate_key).unwrap();
    assert_eq!(candidate.received_votes, 600);

    let voter = view.load_account(&voter_key).unwrap();
    assert_eq!(voter.bcoins, COIN - 600 - 2 * MIN_TX_FEE);
    assert_eq!(voter.voted_total(), 600);
    assert_vote_aggregate(&view);

    let ranking = scripts.delegate_entries();
    assert_eq!(ranking.len(), 1, "stale ranking entries left behind");
    assert_eq!(ranking[0].1, candidate_key.as_ref().to_vec());

    // Reorg both blocks, newest first.
    executor.undo_block(FORK_HEIGHT + 1, &down_block, &down_outcome.undo, &mut view, &mut scripts)?;
    executor.undo_block(FORK_HEIGHT, &up_block, &up_outcome.undo, &mut view, &mut scripts)?;
    assert_eq!(view, baseline_view);
    assert_eq!(scripts, baseline_scripts);
    Ok(())
}

/// Voting more than the free balance fails and leaves no partial state
/// observable after the driver discards the overlay.
#[test]
fn overdrawn_vote_rejected() {
    let mut view = MemAccountView::new();
    let mut scripts = MemScriptView::new();

    let voter_reg = RegId::new(30, 1);
    let candidate_reg = RegId::new(30, 2);
    seed_registered(&mut view, 1, voter_reg, 1_000 + MIN_TX_FEE);
    seed_registered(&mut view, 2, candidate_reg, COIN);

    let tx = signed(
        vote_body(voter_reg, vec![add(candidate_reg, 1_001)], MIN_TX_FEE, FORK_HEIGHT),
        1,
    );
    let err = executor()
        .execute_block(FORK_HEIGHT, &block_of(0, tx), &mut view, &mut scripts)
        .unwrap_err();
    match err {
        BlockExecError::TxFailed { source, .. } => {
            assert_eq!(source.tag(), Some("operate-delegate-failed"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

/// Two operations naming the same candidate are rejected.
#[test]
fn duplicate_candidate_rejected() {
    let mut view = MemAccountView::new();
    let mut scripts = MemScriptView::new();

    let voter_reg = RegId::new(30, 1);
    let candidate_reg = RegId::new(30, 2);
    seed_registered(&mut view, 1, voter_reg, COIN);
    seed_registered(&mut view, 2, candidate_reg, COIN);

    let tx = signed(
        vote_body(
            voter_reg,
            vec![add(candidate_reg, 100), add(candidate_reg, 200)],
            MIN_TX_FEE,
            FORK_HEIGHT,
        ),
        1,
    );
    let err = executor()
        .execute_block(FORK_HEIGHT, &block_of(0, tx), &mut view, &mut scripts)
        .unwrap_err();
    match err {
        BlockExecError::TxFailed { source, .. } => {
            assert_eq!(source.tag(), Some("delegates-duplication-fund-error"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

/// Post-R2, unsigned vote transactions are rejected; the same body
/// passes before the fork.
#[test]
fn vote_signature_gated_on_fork() -> Result<()> {
    // Post-fork, unsigned: rejected at the size precheck.
    {
        let mut view = MemAccountView::new();
        let mut scripts = MemScriptView::new();
        let voter_reg = RegId::new(30, 1);
        let candidate_reg = RegId::new(30, 2);
        seed_registered(&mut view, 1, voter_reg, COIN);
        seed_registered(&mut view, 2, candidate_reg, COIN);

        let tx = vote_body(voter_reg, vec![add(candidate_reg, 500)], MIN_TX_FEE, FORK_HEIGHT);
        let err = executor()
            .execute_block(FORK_HEIGHT, &block_of(0, tx), &mut view, &mut scripts)
            .unwrap_err();
        match err {
            BlockExecError::TxFailed { source, .. } => {
                assert_eq!(source.tag(), Some("bad-tx-sig-size"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    // Pre-fork, unsigned: accepted (historical replay).
    {
        let mut view = MemAccountView::new();
        let mut scripts = MemScriptView::new();
        let voter_reg = RegId::new(30, 1);
        let candidate_reg = RegId::new(30, 2);
        seed_registered(&mut view, 1, voter_reg, COIN);
        seed_registered(&mut view, 2, candidate_reg, COIN);

        let tx = vote_body(
            voter_reg,
            vec![add(candidate_reg, 500)],
            0,
            FORK_HEIGHT - 1,
        );
        executor().execute_block(FORK_HEIGHT - 1, &block_of(0, tx), &mut view, &mut scripts)?;
        assert_vote_aggregate(&view);
    }
    Ok(())
}

/// Multiple candidates in one transaction, with a reorg check over the
/// aggregate invariant.
#[test]
fn multi_candidate_vote_and_undo() -> Result<()> {
    let mut view = MemAccountView::new();
    let mut scripts = MemScriptView::new();

    let voter_reg = RegId::new(30, 1);
    let c1 = RegId::new(30, 2);
    let c2 = RegId::new(30, 3);
    seed_registered(&mut view, 1, voter_reg, COIN);
    seed_registered(&mut view, 2, c1, COIN);
    seed_registered(&mut view, 3, c2, COIN);

    let baseline_view = view.clone();
    let baseline_scripts = scripts.clone();

    let tx = signed(
        vote_body(
            voter_reg,
            vec![add(c1, 700), add(c2, 300)],
            MIN_TX_FEE,
            FORK_HEIGHT,
        ),
        1,
    );
    let block = block_of(0, tx);
    let executor = executor();
    let outcome = executor.execute_block(FORK_HEIGHT, &block, &mut view, &mut scripts)?;

    assert_vote_aggregate(&view);
    assert_eq!(scripts.delegate_entries().len(), 2);

    executor.undo_block(FORK_HEIGHT, &block, &outcome.undo, &mut view, &mut scripts)?;
    assert_eq!(view, baseline_view);
    assert_eq!(scripts, baseline_scripts);
    Ok(())
}
