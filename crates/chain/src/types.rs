//! Plain data exchanged with the chain.

use std::fmt;

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// Identifier of a multisig proposal.
pub type ProposalId = U256;

/// A withdrawal waiting for the unlocking period, as recorded by a ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingWithdrawal {
    /// Amount of CELO being withdrawn.
    pub value: U256,

    /// Unix timestamp at which the withdrawal unlocks.
    pub timestamp: u64,
}

impl PendingWithdrawal {
    /// Creates a new [`PendingWithdrawal`].
    pub const fn new(value: U256, timestamp: u64) -> Self {
        Self { value, timestamp }
    }

    /// Whether the withdrawal has unlocked at `now`.
    pub const fn is_ready(&self, now: u64) -> bool {
        self.timestamp <= now
    }
}

/// A hypothetical change in the votes held by a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteDelta {
    /// Votes added to the group.
    Increase(U256),

    /// Votes removed from the group.
    Decrease(U256),
}

impl VoteDelta {
    /// Applies the delta to `total`, returning `None` if a decrease would underflow.
    pub fn apply(self, total: U256) -> Option<U256> {
        match self {
            VoteDelta::Increase(amount) => total.checked_add(amount),
            VoteDelta::Decrease(amount) => total.checked_sub(amount),
        }
    }

    /// The magnitude of the delta.
    pub const fn amount(&self) -> U256 {
        match self {
            VoteDelta::Increase(amount) | VoteDelta::Decrease(amount) => *amount,
        }
    }
}

impl fmt::Display for VoteDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteDelta::Increase(amount) => write!(f, "+{amount}"),
            VoteDelta::Decrease(amount) => write!(f, "-{amount}"),
        }
    }
}

/// Total votes of an eligible validator group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupVotes {
    /// The validator group.
    pub group: Address,

    /// Votes (pending and active, from every account) held by the group.
    pub votes: U256,
}

/// Neighbours of a group in the election's sorted list. The zero address means there is no
/// neighbour on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LesserGreater {
    /// The group ranked immediately below.
    pub lesser: Address,

    /// The group ranked immediately above.
    pub greater: Address,
}

/// Position hints consumed by `revokeVotes` and `withdraw`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RevocationHints {
    /// Neighbours of the group once the pending votes have been revoked.
    pub after_pending: LesserGreater,

    /// Neighbours of the group once the active votes have been revoked as well.
    pub after_active: LesserGreater,

    /// Index of the group in the list of groups the account votes for.
    pub group_index: usize,
}

/// Which list of the specific group strategy to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecificGroupSource {
    /// Every group registered as a specific strategy.
    Strategies,

    /// Only the specific strategies that currently hold votes.
    VotedGroups,
}

/// Addresses of the contracts used by one invocation.
///
/// Election and LockedGold are system contracts; when left unset they are looked up in the Celo
/// registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAddresses {
    /// The protocol's Account contract, which is also the account holding the votes.
    pub account: Address,

    /// The default strategy contract.
    pub default_strategy: Address,

    /// The specific group strategy contract.
    pub specific_group_strategy: Address,

    /// The governance multisig.
    pub multisig: Address,

    /// The Election system contract.
    #[serde(default)]
    pub election: Option<Address>,

    /// The LockedGold system contract.
    #[serde(default)]
    pub locked_gold: Option<Address>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_delta_apply() {
        let total = U256::from(100);
        assert_eq!(
            VoteDelta::Increase(U256::from(5)).apply(total),
            Some(U256::from(105))
        );
        assert_eq!(
            VoteDelta::Decrease(U256::from(100)).apply(total),
            Some(U256::ZERO)
        );
        assert_eq!(VoteDelta::Decrease(U256::from(101)).apply(total), None);
        assert_eq!(VoteDelta::Decrease(U256::from(7)).to_string(), "-7");
    }

    #[test]
    fn withdrawal_readiness_is_inclusive() {
        let withdrawal = PendingWithdrawal::new(U256::from(1), 1_000);
        assert!(!withdrawal.is_ready(999));
        assert!(withdrawal.is_ready(1_000));
        assert!(withdrawal.is_ready(1_001));
    }

    #[test]
    fn contract_addresses_from_toml() {
        let raw = r#"
            account = "0x1111111111111111111111111111111111111111"
            default_strategy = "0x2222222222222222222222222222222222222222"
            specific_group_strategy = "0x3333333333333333333333333333333333333333"
            multisig = "0x4444444444444444444444444444444444444444"
        "#;

        let addresses = toml::from_str::<ContractAddresses>(raw);
        assert!(
            addresses.is_ok(),
            "must be able to deserialize addresses but got: {}",
            addresses.unwrap_err()
        );

        let addresses = addresses.unwrap();
        assert_eq!(addresses.account, Address::repeat_byte(0x11));
        assert!(addresses.election.is_none());
        assert!(addresses.locked_gold.is_none());
    }
}
