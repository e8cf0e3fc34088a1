use std::{fs, path::Path};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use staked_celo_chain::types::ContractAddresses;
use staked_celo_governance::composer::Deployments;
use tracing::debug;

/// Network and contract configuration of one invocation. Never modified once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Config {
    /// JSON-RPC endpoint of the Celo node.
    pub rpc_url: String,

    /// Contracts the staking commands and the multisig commands talk to.
    pub contracts: ContractAddresses,

    /// Deployed contracts by name, used to resolve the targets of governance calls.
    #[serde(default)]
    pub deployments: Deployments,
}

impl Config {
    /// Reads and parses the TOML configuration at `path`.
    pub(crate) fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;

        let config = toml::from_str::<Self>(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        debug!(?config, "parsed config");

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::Address;

    use super::*;

    #[test]
    fn test_config_serde_toml() {
        let config = r#"
            rpc_url = "https://forno.celo.org"

            [contracts]
            account = "0x1111111111111111111111111111111111111111"
            default_strategy = "0x2222222222222222222222222222222222222222"
            specific_group_strategy = "0x3333333333333333333333333333333333333333"
            multisig = "0x4444444444444444444444444444444444444444"
            locked_gold = "0x5555555555555555555555555555555555555555"

            [deployments]
            Manager = "0x6666666666666666666666666666666666666666"
            Account = "0x1111111111111111111111111111111111111111"
        "#;

        let config = toml::from_str::<Config>(config);
        assert!(
            config.is_ok(),
            "must be able to deserialize config from toml but got: {}",
            config.unwrap_err()
        );

        let config = config.unwrap();
        assert_eq!(
            config.contracts.locked_gold,
            Some(Address::repeat_byte(0x55))
        );
        assert!(config.contracts.election.is_none());
        assert_eq!(
            config.deployments.address("Manager").unwrap(),
            Address::repeat_byte(0x66)
        );

        let serialized = toml::to_string(&config).expect("must be able to serialize config");
        let deserialized = toml::from_str::<Config>(&serialized)
            .expect("must be able to deserialize serialized config");
        assert_eq!(config, deserialized);
    }
}
