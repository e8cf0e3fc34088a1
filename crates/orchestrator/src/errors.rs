//! Error types for the orchestrator crate.

use alloy::primitives::Address;
use staked_celo_chain::{types::PendingWithdrawal, ChainError};
use thiserror::Error;

/// Chain state that contradicts what the protocol guarantees. Retrying will not help; an
/// operator has to look at the contracts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Inconsistency {
    /// The default strategy's list ended before reaching the advertised number of groups.
    #[error("default strategy list ended after {found} of {expected} groups")]
    DefaultListTooShort {
        /// Number reported by `getNumberOfGroups`.
        expected: usize,
        /// Number of groups actually walked.
        found: usize,
    },

    /// The default strategy's list visits the same group twice.
    #[error("default strategy list revisits group {0}")]
    DefaultListCycle(Address),

    /// The default strategy's list continues past the advertised number of groups.
    #[error("default strategy list has more than {count} groups, next is {next}")]
    DefaultListTooLong {
        /// Number reported by `getNumberOfGroups`.
        count: usize,
        /// The group the tail still points to.
        next: Address,
    },

    /// The default strategy reports no groups but has a head.
    #[error("default strategy reports no groups but its head is {0}")]
    EmptyListWithHead(Address),

    /// A group the account has votes to revoke from is not among the groups it votes for.
    #[error("group {0} is not voted for by the protocol account")]
    GroupNotVotedFor(Address),

    /// The pending withdrawal count does not match the length of the pending withdrawal list.
    #[error("beneficiary {beneficiary} has {count} pending withdrawals but {len} are listed")]
    WithdrawalCountMismatch {
        /// Beneficiary whose ledger was read.
        beneficiary: Address,
        /// Number reported by `getNumberPendingWithdrawals`.
        count: usize,
        /// Length of the list returned by `getPendingWithdrawals`.
        len: usize,
    },

    /// A withdrawal in the protocol ledger has no counterpart in LockedGold.
    #[error("withdrawal {withdrawal:?} of {beneficiary} has no LockedGold counterpart")]
    UnmatchedWithdrawal {
        /// Beneficiary whose ledger was read.
        beneficiary: Address,
        /// The unmatched entry.
        withdrawal: PendingWithdrawal,
    },

    /// Finalizing a withdrawal succeeded without removing it from the protocol ledger.
    #[error("finalizing a withdrawal of {beneficiary} left {len} entries pending")]
    SettlementStalled {
        /// Beneficiary whose ledger was read.
        beneficiary: Address,
        /// Ledger length observed after finalizing.
        len: usize,
    },
}

/// Errors raised by the orchestration operations.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Reading from or writing to the chain failed.
    #[error("chain interaction failed: {0}")]
    Chain(#[from] ChainError),

    /// The chain is in a state the protocol should never produce.
    #[error("inconsistent chain state: {0}")]
    StateInconsistency(#[from] Inconsistency),
}

/// Result type for the orchestration operations.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
