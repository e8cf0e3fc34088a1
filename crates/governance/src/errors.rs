//! Error types for the governance crate.

use std::{io, path::PathBuf};

use staked_celo_chain::{types::ProposalId, ChainError};
use thiserror::Error;

/// A lifecycle step attempted before the proposal is ready for it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Precondition {
    /// Scheduling requires the confirmation threshold to be met.
    #[error("proposal {0} is not fully confirmed")]
    NotFullyConfirmed(ProposalId),

    /// The timelock has already been started.
    #[error("proposal {0} is already scheduled")]
    AlreadyScheduled(ProposalId),

    /// Execution requires the timelock to have elapsed.
    #[error("timelock of proposal {0} has not been reached")]
    TimelockNotReached(ProposalId),
}

/// Errors raised while composing or driving governance proposals.
#[derive(Debug, Error)]
pub enum GovernanceError {
    /// The contract name is not part of the deployments.
    #[error("unknown contract {0}")]
    UnknownContract(String),

    /// The function signature could not be parsed.
    #[error("invalid function signature {signature}: {reason}")]
    InvalidSignature {
        /// The offending signature.
        signature: String,
        /// Why parsing failed.
        reason: String,
    },

    /// The arguments do not split into a well-formed list.
    #[error("malformed argument list {0:?}")]
    MalformedArguments(String),

    /// The number of arguments does not match the signature.
    #[error("{signature} takes {expected} arguments, {found} given")]
    ArgumentCount {
        /// The function signature.
        signature: String,
        /// Number of parameters in the signature.
        expected: usize,
        /// Number of arguments given.
        found: usize,
    },

    /// An argument cannot be coerced into its parameter type.
    #[error("argument {index} ({value:?}) is not a valid {ty}: {reason}")]
    InvalidArgument {
        /// Position of the argument.
        index: usize,
        /// Solidity type of the parameter.
        ty: String,
        /// The raw argument.
        value: String,
        /// Why coercion failed.
        reason: String,
    },

    /// ABI encoding failed.
    #[error("failed to encode call to {signature}: {reason}")]
    Encode {
        /// The function signature.
        signature: String,
        /// Why encoding failed.
        reason: String,
    },

    /// A batch file could not be read.
    #[error("failed to read batch file {path}: {source}")]
    BatchFile {
        /// Path of the batch file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A batch file is not valid TOML or does not describe a batch.
    #[error("invalid batch: {0}")]
    InvalidBatch(#[from] toml::de::Error),

    /// A lifecycle step was attempted too early.
    #[error("precondition failed: {0}")]
    Precondition(#[from] Precondition),

    /// Talking to the multisig failed.
    #[error("multisig interaction failed: {0}")]
    Chain(#[from] ChainError),
}

/// Result type for governance operations.
pub type GovernanceResult<T> = Result<T, GovernanceError>;
