//! Command handlers and the connection setup they share.

pub(crate) mod governance;
pub(crate) mod staking;

use alloy::{
    network::EthereumWallet,
    providers::{DynProvider, Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
};
use anyhow::{Context, Result};
use staked_celo_chain::rpc::ChainContext;
use tracing::info;

use crate::config::Config;

/// Everything a handler needs, built once from the command line and the configuration.
pub(crate) struct Session {
    pub(crate) config: Config,
    pub(crate) rpc_url: String,
    pub(crate) private_key: Option<String>,
}

impl Session {
    /// Connects without a signer, for commands that only read.
    pub(crate) async fn reader(&self) -> Result<ChainContext<DynProvider>> {
        let provider = ProviderBuilder::new()
            .connect_http(self.rpc_url.parse().context("invalid rpc url")?)
            .erased();

        self.connect(provider).await
    }

    /// Connects with the configured signer, for commands that send transactions.
    pub(crate) async fn writer(&self) -> Result<ChainContext<DynProvider>> {
        let key = self
            .private_key
            .as_deref()
            .context("a private key is required to send transactions")?;
        let signer = parse_private_key(key)?;
        info!(signer = %signer.address(), "sending as");

        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::new(signer))
            .connect_http(self.rpc_url.parse().context("invalid rpc url")?)
            .erased();

        self.connect(provider).await
    }

    async fn connect(&self, provider: DynProvider) -> Result<ChainContext<DynProvider>> {
        ChainContext::connect(provider, &self.config.contracts)
            .await
            .context("failed to resolve contract addresses")
    }
}

fn parse_private_key(key: &str) -> Result<PrivateKeySigner> {
    let bytes = hex::decode(key.trim().trim_start_matches("0x")).context("decode private key")?;
    PrivateKeySigner::from_slice(&bytes).context("signing key")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_key_with_or_without_prefix() {
        let key = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

        let plain = parse_private_key(key).unwrap();
        let prefixed = parse_private_key(&format!("0x{key}")).unwrap();
        assert_eq!(plain.address(), prefixed.address());

        assert!(parse_private_key("0x1234").is_err());
        assert!(parse_private_key("not hex").is_err());
    }
}
