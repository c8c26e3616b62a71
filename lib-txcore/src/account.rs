//! Account state.
//!
//! One record per principal, keyed by hash-160 address. Balance mutations
//! go through [`Account::operate`], which refuses anything that would
//! leave the balance outside `0 ..= MAX_MONEY`; there is no saturating
//! arithmetic anywhere in consensus state.
//!
//! # Invariants
//!
//! - `reg_id`, once set, changes only on the undo path.
//! - `bcoins` is the *free* balance; funds voted for candidates are held
//!   in `voted_funds` and are not spendable until voted back out.
//! - `voted_funds` stays sorted by amount descending, then candidate key
//!   ascending, after every mutation.

use lib_crypto::{KeyId, PubKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::money_range;
use crate::ids::RegId;

/// Balance operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceOp {
    /// Credit the free balance.
    AddFree,
    /// Debit the free balance.
    SubFree,
}

/// Vote operation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteOp {
    /// Move free balance into the fund for a candidate.
    Add,
    /// Move fund balance back to free.
    Sub,
}

impl VoteOp {
    pub fn name(&self) -> &'static str {
        match self {
            VoteOp::Add => "ADD_FUND",
            VoteOp::Sub => "MINUS_FUND",
        }
    }
}

/// A vote operation with its candidate already resolved to an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedVoteOp {
    pub op: VoteOp,
    pub candidate: KeyId,
    pub count: u64,
}

/// One candidate's share of an account's locked votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteFund {
    pub candidate: KeyId,
    pub amount: u64,
}

/// Account mutation failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: u64, need: u64 },

    #[error("balance overflow past MAX_MONEY")]
    Overflow,

    #[error("no vote fund for candidate {candidate}")]
    NoSuchFund { candidate: KeyId },

    #[error("vote fund underflow for candidate {candidate}: have {have}, need {need}")]
    FundUnderflow {
        candidate: KeyId,
        have: u64,
        need: u64,
    },

    #[error("received-vote tally underflow: have {have}, need {need}")]
    VoteUnderflow { have: u64, need: u64 },
}

/// Mutable per-principal record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Primary key: hash-160 address.
    pub key_id: KeyId,
    /// Registry id, if this account has been registered.
    pub reg_id: Option<RegId>,
    /// Owner public key, if known.
    pub pub_key: Option<PubKey>,
    /// Delegated mining key, if declared at registration.
    pub miner_pub_key: Option<PubKey>,
    /// Free base-coin balance.
    pub bcoins: u64,
    /// Votes cast for this account by others.
    pub received_votes: u64,
    /// This account's outgoing votes, sorted by amount desc then key asc.
    pub voted_funds: Vec<VoteFund>,
}

impl Account {
    /// Fresh empty account at an address.
    pub fn new(key_id: KeyId) -> Self {
        Self {
            key_id,
            reg_id: None,
            pub_key: None,
            miner_pub_key: None,
            bcoins: 0,
            received_votes: 0,
            voted_funds: Vec::new(),
        }
    }

    /// Registered means the chain knows a fully-valid public key for the
    /// account matching its address.
    pub fn is_registered(&self) -> bool {
        match &self.pub_key {
            Some(pk) => pk.is_fully_valid() && pk.key_id() == self.key_id,
            None => false,
        }
    }

    /// True iff the account holds no value of any kind.
    pub fn is_empty_value(&self) -> bool {
        self.bcoins == 0 && self.received_votes == 0 && self.voted_funds.is_empty()
    }

    /// Apply a free-balance operation.
    pub fn operate(&mut self, op: BalanceOp, amount: u64, _height: u32) -> Result<(), AccountError> {
        if !money_range(amount) {
            return Err(AccountError::Overflow);
        }
        match op {
            BalanceOp::AddFree => {
                let next = self
                    .bcoins
                    .checked_add(amount)
                    .filter(|v| money_range(*v))
                    .ok_or(AccountError::Overflow)?;
                self.bcoins = next;
            }
            BalanceOp::SubFree => {
                if self.bcoins < amount {
                    return Err(AccountError::InsufficientFunds {
                        have: self.bcoins,
                        need: amount,
                    });
                }
                self.bcoins -= amount;
            }
        }
        Ok(())
    }

    /// Apply one resolved vote operation to this (source) account.
    ///
    /// `Add` reserves free balance into the candidate's fund; `Sub`
    /// releases it. The fund list is re-sorted after every change.
    pub fn apply_vote_op(&mut self, op: &ResolvedVoteOp) -> Result<(), AccountError> {
        match op.op {
            VoteOp::Add => {
                if self.bcoins < op.count {
                    return Err(AccountError::InsufficientFunds {
                        have: self.bcoins,
                        need: op.count,
                    });
                }
                let pos = self
                    .voted_funds
                    .iter()
                    .position(|f| f.candidate == op.candidate);
                match pos {
                    Some(i) => {
                        let next = self.voted_funds[i]
                            .amount
                            .checked_add(op.count)
                            .filter(|v| money_range(*v))
                            .ok_or(AccountError::Overflow)?;
                        self.voted_funds[i].amount = next;
                    }
                    None => self.voted_funds.push(VoteFund {
                        candidate: op.candidate,
                        amount: op.count,
                    }),
                }
                self.bcoins -= op.count;
            }
            VoteOp::Sub => {
                let pos = self
                    .voted_funds
                    .iter()
                    .position(|f| f.candidate == op.candidate)
                    .ok_or(AccountError::NoSuchFund {
                        candidate: op.candidate,
                    })?;
                let fund = &mut self.voted_funds[pos];
                if fund.amount < op.count {
                    return Err(AccountError::FundUnderflow {
                        candidate: op.candidate,
                        have: fund.amount,
                        need: op.count,
                    });
                }
                fund.amount -= op.count;
                if fund.amount == 0 {
                    self.voted_funds.remove(pos);
                }
                let next = self
                    .bcoins
                    .checked_add(op.count)
                    .filter(|v| money_range(*v))
                    .ok_or(AccountError::Overflow)?;
                self.bcoins = next;
            }
        }
        self.sort_voted_funds();
        Ok(())
    }

    /// Apply the delta of a vote operation to this (candidate) account's
    /// received tally.
    pub fn operate_received_votes(&mut self, op: VoteOp, count: u64) -> Result<(), AccountError> {
        match op {
            VoteOp::Add => {
                let next = self
                    .received_votes
                    .checked_add(count)
                    .filter(|v| money_range(*v))
                    .ok_or(AccountError::Overflow)?;
                self.received_votes = next;
            }
            VoteOp::Sub => {
                if self.received_votes < count {
                    return Err(AccountError::VoteUnderflow {
                        have: self.received_votes,
                        need: count,
                    });
                }
                self.received_votes -= count;
            }
        }
        Ok(())
    }

    /// Total balance locked in outgoing votes.
    pub fn voted_total(&self) -> u64 {
        self.voted_funds.iter().map(|f| f.amount).sum()
    }

    fn sort_voted_funds(&mut self) {
        self.voted_funds
            .sort_by(|a, b| b.amount.cmp(&a.amount).then(a.candidate.cmp(&b.candidate)));
    }
}
