//! Errors raised while reading from or writing to the chain.

use alloy::{
    primitives::{Address, TxHash, U256},
    providers::PendingTransactionError,
};
use thiserror::Error;

/// Everything that can go wrong at the contract-call boundary.
#[derive(Debug, Error)]
pub enum ChainError {
    /// A view call failed, typically because the RPC node is unreachable.
    #[error("contract read failed: {0}")]
    Read(#[source] alloy::contract::Error),

    /// The node refused the transaction, e.g. because gas estimation hit a revert.
    #[error("transaction submission failed: {0}")]
    Submission(#[source] alloy::contract::Error),

    /// The transaction was sent but its receipt could not be obtained.
    #[error("failed to obtain transaction receipt: {0}")]
    Receipt(#[from] PendingTransactionError),

    /// The transaction was mined with a failed status.
    #[error("transaction {0} reverted")]
    Reverted(TxHash),

    /// An expected event was not found in a transaction receipt.
    #[error("event {event} not found in receipt of transaction {tx_hash}")]
    MissingEvent {
        /// Name of the missing event.
        event: &'static str,
        /// Transaction whose receipt was inspected.
        tx_hash: TxHash,
    },

    /// A hypothetical vote decrease is larger than the group's current total, so no ranking can
    /// be computed for it.
    #[error("decreasing group {group} by {decrease} underflows its {total} votes")]
    VoteUnderflow {
        /// The group being ranked.
        group: Address,
        /// The group's current total votes.
        total: U256,
        /// The requested decrease.
        decrease: U256,
    },

    /// A value read from the chain does not fit the type it is used as.
    #[error("malformed chain value: {0}")]
    Malformed(String),

    /// The contract rejected the call. Used by implementations that do not go through an RPC
    /// node.
    #[error("call rejected: {0}")]
    Rejected(String),
}

/// Result type for chain interactions.
pub type ChainResult<T> = Result<T, ChainError>;
