//! Resolves the set of validator groups the protocol currently has stake in.

use std::collections::{BTreeSet, HashSet};

use alloy::primitives::Address;
use futures::future::try_join_all;
use staked_celo_chain::{types::SpecificGroupSource, ChainReader};
use tracing::{debug, info};

use crate::errors::{Inconsistency, OrchestratorResult};

/// Deduplicated union of the default strategy's groups and a specific strategy list.
///
/// Ordering is not meaningful; equality is set equality.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupWorkingSet(BTreeSet<Address>);

impl GroupWorkingSet {
    /// Number of groups in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `group` is part of the set.
    pub fn contains(&self, group: &Address) -> bool {
        self.0.contains(group)
    }

    /// Iterates over the groups.
    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.0.iter()
    }

    /// The groups as a list.
    pub fn to_vec(&self) -> Vec<Address> {
        self.0.iter().copied().collect()
    }
}

impl FromIterator<Address> for GroupWorkingSet {
    fn from_iter<T: IntoIterator<Item = Address>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a GroupWorkingSet {
    type Item = &'a Address;
    type IntoIter = std::collections::btree_set::Iter<'a, Address>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Walks the default strategy's list from its head, following the `previous` links, and checks
/// that it holds exactly as many groups as the strategy reports.
pub async fn default_strategy_groups<C>(chain: &C) -> OrchestratorResult<Vec<Address>>
where
    C: ChainReader + ?Sized,
{
    let count = chain.number_of_default_groups().await?;
    let head = chain.default_groups_head().await?;

    if count == 0 {
        if head != Address::ZERO {
            return Err(Inconsistency::EmptyListWithHead(head).into());
        }
        return Ok(Vec::new());
    }

    let mut groups = Vec::with_capacity(count);
    let mut seen = HashSet::with_capacity(count);
    let mut current = head;

    while groups.len() < count {
        if current == Address::ZERO {
            return Err(Inconsistency::DefaultListTooShort {
                expected: count,
                found: groups.len(),
            }
            .into());
        }
        if !seen.insert(current) {
            return Err(Inconsistency::DefaultListCycle(current).into());
        }

        groups.push(current);
        let (previous, _next) = chain.default_group_previous_and_next(current).await?;
        current = previous;
    }

    if current != Address::ZERO {
        return Err(Inconsistency::DefaultListTooLong {
            count,
            next: current,
        }
        .into());
    }

    debug!(%count, "walked default strategy list");
    Ok(groups)
}

/// Reads one of the specific group strategy's lists. Entries are fetched concurrently.
pub async fn specific_strategy_groups<C>(
    chain: &C,
    source: SpecificGroupSource,
) -> OrchestratorResult<Vec<Address>>
where
    C: ChainReader + ?Sized,
{
    let count = chain.number_of_specific_groups(source).await?;
    let groups =
        try_join_all((0..count).map(|index| chain.specific_group(source, index))).await?;

    debug!(?source, %count, "read specific strategy list");
    Ok(groups)
}

/// Resolves the working set of groups: the default strategy's groups together with the given
/// specific strategy list.
///
/// Has no side effects; read errors are propagated without retrying.
pub async fn resolve_working_groups<C>(
    chain: &C,
    source: SpecificGroupSource,
) -> OrchestratorResult<GroupWorkingSet>
where
    C: ChainReader + ?Sized,
{
    let (default, specific) = futures::try_join!(
        default_strategy_groups(chain),
        specific_strategy_groups(chain, source)
    )?;

    let set = default
        .into_iter()
        .chain(specific)
        .collect::<GroupWorkingSet>();

    info!(groups = set.len(), "resolved working group set");
    Ok(set)
}

#[cfg(test)]
mod tests {
    use staked_celo_chain::inmemory::InMemoryChain;

    use super::*;
    use crate::{
        errors::OrchestratorError,
        testing::{addr, ACCOUNT},
    };

    fn assert_inconsistent(result: OrchestratorResult<Vec<Address>>, expected: Inconsistency) {
        match result {
            Err(OrchestratorError::StateInconsistency(found)) => assert_eq!(found, expected),
            other => panic!("expected {expected:?}, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn walks_default_list_from_head() {
        let chain = InMemoryChain::new(ACCOUNT);
        chain.set_default_groups(&[addr(1), addr(2), addr(3)]).await;

        let groups = default_strategy_groups(&chain).await.unwrap();
        assert_eq!(groups, vec![addr(1), addr(2), addr(3)]);
    }

    #[tokio::test]
    async fn empty_default_list() {
        let chain = InMemoryChain::new(ACCOUNT);
        assert!(default_strategy_groups(&chain).await.unwrap().is_empty());

        chain.set_default_groups(&[addr(1)]).await;
        chain.set_default_group_count(0).await;
        assert_inconsistent(
            default_strategy_groups(&chain).await,
            Inconsistency::EmptyListWithHead(addr(1)),
        );
    }

    #[tokio::test]
    async fn list_looping_back_to_head_is_inconsistent() {
        let chain = InMemoryChain::new(ACCOUNT);
        chain.set_default_groups(&[addr(1), addr(2)]).await;
        chain.set_default_group_count(3).await;
        chain
            .set_default_group_links(addr(2), addr(1), addr(1))
            .await;

        assert_inconsistent(
            default_strategy_groups(&chain).await,
            Inconsistency::DefaultListCycle(addr(1)),
        );
    }

    #[tokio::test]
    async fn list_shorter_than_count_is_inconsistent() {
        let chain = InMemoryChain::new(ACCOUNT);
        chain.set_default_groups(&[addr(1), addr(2)]).await;
        chain.set_default_group_count(3).await;

        assert_inconsistent(
            default_strategy_groups(&chain).await,
            Inconsistency::DefaultListTooShort {
                expected: 3,
                found: 2,
            },
        );
    }

    #[tokio::test]
    async fn list_longer_than_count_is_inconsistent() {
        let chain = InMemoryChain::new(ACCOUNT);
        chain.set_default_groups(&[addr(1), addr(2), addr(3)]).await;
        chain.set_default_group_count(2).await;

        assert_inconsistent(
            default_strategy_groups(&chain).await,
            Inconsistency::DefaultListTooLong {
                count: 2,
                next: addr(3),
            },
        );
    }

    #[tokio::test]
    async fn working_set_is_deduplicated_union() {
        let chain = InMemoryChain::new(ACCOUNT);
        chain.set_default_groups(&[addr(1), addr(2)]).await;
        chain
            .set_specific_groups(&[addr(2), addr(3), addr(4)], &[addr(3)])
            .await;

        let all = resolve_working_groups(&chain, SpecificGroupSource::Strategies)
            .await
            .unwrap();
        assert_eq!(all.to_vec(), vec![addr(1), addr(2), addr(3), addr(4)]);

        let voted = resolve_working_groups(&chain, SpecificGroupSource::VotedGroups)
            .await
            .unwrap();
        assert_eq!(voted.to_vec(), vec![addr(1), addr(2), addr(3)]);
    }

    #[tokio::test]
    async fn resolving_twice_yields_the_same_set() {
        let chain = InMemoryChain::new(ACCOUNT);
        chain.set_default_groups(&[addr(5), addr(1), addr(3)]).await;
        chain.set_specific_groups(&[addr(3), addr(7)], &[]).await;

        let first = resolve_working_groups(&chain, SpecificGroupSource::Strategies)
            .await
            .unwrap();
        let second = resolve_working_groups(&chain, SpecificGroupSource::Strategies)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
        assert!(chain.calls().await.is_empty(), "resolving must not write");
    }
}
