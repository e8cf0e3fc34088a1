//! Utilities shared by every staked-celo service and tool, such as initializing the tracing
//! framework.

pub mod logging;

// Re-export tracing crate for convenience.
pub use tracing;
