//! Off-chain orchestration of the staked-CELO vote lifecycle:
//!
//! - Resolving the validator groups the protocol has stake in.
//! - Planning and sending vote revocations along with the election list hints they need.
//! - Finalizing unlocked withdrawals by matching the protocol ledger against LockedGold.
//! - Activating pending votes and casting scheduled ones.
//!
//! Every operation reads the chain afresh and sends at most one transaction at a time, waiting
//! for its receipt before reading again.

pub mod activation;
pub mod errors;
pub mod group_set;
pub mod revocation;
pub mod withdrawal;

#[cfg(test)]
mod testing;

pub use errors::{Inconsistency, OrchestratorError, OrchestratorResult};
