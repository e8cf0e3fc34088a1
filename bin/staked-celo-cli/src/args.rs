//! Parses command-line arguments for the staked-celo operator CLI.

use std::path::PathBuf;

use alloy::primitives::{Address, U256};
use clap::{crate_version, Parser, Subcommand};

#[derive(Debug, Parser)]
#[clap(
    name = "staked-celo",
    about = "Operator tooling for the staked CELO protocol",
    version = crate_version!()
)]
pub(crate) struct Cli {
    #[clap(
        long,
        short = 'c',
        help = "The file containing the network and contract configuration",
        default_value = "config.toml"
    )]
    pub(crate) config: PathBuf,

    #[arg(
        long,
        env = "STAKED_CELO_PRIVATE_KEY",
        hide_env_values = true,
        help = "hex encoded private key of the signer, required by commands that send transactions"
    )]
    pub(crate) private_key: Option<String>,

    #[arg(long, help = "overrides the rpc url of the configuration")]
    pub(crate) rpc_url: Option<String>,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum Commands {
    /// List the validator groups the protocol has stake in.
    Groups {
        #[arg(long, help = "only include specific strategies that currently hold votes")]
        voted_only: bool,
    },

    /// Show how the votes scheduled for removal from a group would be revoked.
    PlanRevocation {
        #[arg(help = "the validator group")]
        group: Address,

        #[arg(
            long,
            help = "plan the withdrawal scheduled for this beneficiary instead of the scheduled revoke"
        )]
        beneficiary: Option<Address>,
    },

    /// Withdraw the amounts scheduled for a beneficiary.
    Withdraw {
        #[arg(help = "the beneficiary")]
        beneficiary: Address,

        #[arg(long, help = "only withdraw from this group instead of every working group")]
        group: Option<Address>,
    },

    /// Revoke the votes scheduled to be revoked from a group.
    Revoke {
        #[arg(help = "the validator group")]
        group: Address,
    },

    /// Finalize every unlocked withdrawal of the given beneficiaries.
    FinishWithdrawals {
        #[arg(required = true, num_args = 1.., help = "the beneficiaries")]
        beneficiaries: Vec<Address>,
    },

    /// Activate pending votes and cast scheduled votes.
    Activate {
        #[arg(long = "group", help = "groups to activate, defaults to every working group")]
        groups: Vec<Address>,
    },

    /// Print the call data of a contract call.
    Encode {
        #[arg(help = "name of the contract in the deployments")]
        contract: String,

        #[arg(help = "function signature, e.g. `upgradeTo(address)`")]
        signature: String,

        #[arg(default_value = "", help = "comma separated arguments")]
        args: String,
    },

    /// Drive governance proposals through the multisig.
    #[command(subcommand)]
    Multisig(MultisigCommand),
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum MultisigCommand {
    /// Submit the steps of a TOML batch file as one proposal.
    Submit {
        #[arg(help = "the batch file")]
        batch: PathBuf,
    },

    /// Confirm a proposal.
    Confirm {
        #[arg(help = "the proposal id")]
        id: U256,
    },

    /// Revoke a confirmation.
    RevokeConfirmation {
        #[arg(help = "the proposal id")]
        id: U256,
    },

    /// Start the timelock of a fully confirmed proposal.
    Schedule {
        #[arg(help = "the proposal id")]
        id: U256,
    },

    /// Execute a proposal whose timelock has elapsed.
    Execute {
        #[arg(help = "the proposal id")]
        id: U256,
    },

    /// Show the stage and confirmations of a proposal.
    Status {
        #[arg(help = "the proposal id")]
        id: U256,
    },

    /// List the multisig owners.
    Owners,
}
