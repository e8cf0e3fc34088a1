//! Access to the staked-CELO contracts and the Celo system contracts they build on.
//!
//! The orchestration crates only ever talk to the chain through the traits in [`traits`]. The
//! [`rpc`] module implements them on top of an `alloy` provider and [`inmemory`] implements them
//! over plain data for tests and dry runs.

pub mod bindings;
pub mod errors;
pub mod inmemory;
pub mod neighbors;
pub mod rpc;
pub mod traits;
pub mod types;

pub use errors::{ChainError, ChainResult};
pub use traits::{ChainReader, ChainWriter, MultisigContract};
