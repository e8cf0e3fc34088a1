//! In-memory implementations of the chain interfaces, used to exercise the orchestration without
//! a node.

use alloy::primitives::TxHash;

mod multisig;
mod staking;

pub use multisig::{ExecutedCall, InMemoryMultisig};
pub use staking::{InMemoryChain, RecordedCall, DEFAULT_UNLOCKING_PERIOD};

/// Deterministic transaction hash for the `n`-th transaction.
fn tx_hash(n: u64) -> TxHash {
    TxHash::left_padding_from(&n.to_be_bytes())
}
