//! Governance tooling for the staked-CELO contracts: composing batches of contract calls and
//! taking them through the multisig as one proposal.

pub mod composer;
pub mod errors;
pub mod multisig;

pub use errors::{GovernanceError, GovernanceResult, Precondition};
