//! Operator CLI for the staked CELO protocol.

mod args;
mod config;
mod handlers;

use anyhow::Result;
use clap::Parser;
use staked_celo_common::logging::{self, LoggerConfig};
use tracing::debug;

use crate::{
    args::{Cli, Commands},
    config::Config,
    handlers::{governance, staking, Session},
};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init(LoggerConfig::from_env("staked-celo-cli"));

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    let session = Session {
        rpc_url: cli.rpc_url.unwrap_or_else(|| config.rpc_url.clone()),
        private_key: cli.private_key,
        config,
    };
    debug!(rpc_url = %session.rpc_url, command = ?cli.command, "starting");

    match cli.command {
        Commands::Groups { voted_only } => staking::handle_groups(&session, voted_only).await,
        Commands::PlanRevocation { group, beneficiary } => {
            staking::handle_plan_revocation(&session, group, beneficiary).await
        }
        Commands::Withdraw { beneficiary, group } => {
            staking::handle_withdraw(&session, beneficiary, group).await
        }
        Commands::Revoke { group } => staking::handle_revoke(&session, group).await,
        Commands::FinishWithdrawals { beneficiaries } => {
            staking::handle_finish_withdrawals(&session, &beneficiaries).await
        }
        Commands::Activate { groups } => staking::handle_activate(&session, groups).await,
        Commands::Encode {
            contract,
            signature,
            args,
        } => governance::handle_encode(&session, &contract, &signature, &args),
        Commands::Multisig(command) => governance::handle_multisig(&session, command).await,
    }
}
