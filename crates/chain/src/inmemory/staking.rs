//! In-memory model of the protocol's staking contracts and the election state they depend on.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::trace;

use crate::{
    errors::{ChainError, ChainResult},
    inmemory::tx_hash,
    neighbors::lesser_and_greater_after_vote,
    traits::{ChainReader, ChainWriter},
    types::{
        GroupVotes, LesserGreater, PendingWithdrawal, RevocationHints, SpecificGroupSource,
        VoteDelta,
    },
};

/// Unlocking period applied to withdrawals created by [`ChainWriter::withdraw`], in seconds.
pub const DEFAULT_UNLOCKING_PERIOD: u64 = 3 * 24 * 60 * 60;

/// A call observed by [`InMemoryChain`], kept in the order it was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    /// A neighbour computation.
    NeighborLookup {
        /// Group being ranked.
        group: Address,
        /// Hypothetical delta.
        delta: VoteDelta,
    },

    /// An `activateAndVote` transaction.
    ActivateAndVote {
        /// Target group.
        group: Address,
        /// Hints sent along.
        hints: LesserGreater,
    },

    /// A `revokeVotes` transaction.
    RevokeVotes {
        /// Target group.
        group: Address,
        /// Hints sent along.
        hints: RevocationHints,
    },

    /// A `withdraw` transaction.
    Withdraw {
        /// Beneficiary of the withdrawal.
        beneficiary: Address,
        /// Target group.
        group: Address,
        /// Hints sent along.
        hints: RevocationHints,
    },

    /// A successful `finishPendingWithdrawal` transaction, with the entries it removed.
    FinishPendingWithdrawal {
        /// Beneficiary of the withdrawal.
        beneficiary: Address,
        /// Index in the protocol ledger.
        local_index: usize,
        /// Index in the LockedGold ledger.
        chain_index: usize,
        /// Entry removed from the protocol ledger.
        local: PendingWithdrawal,
        /// Entry removed from the LockedGold ledger.
        chain: PendingWithdrawal,
    },
}

#[derive(Debug, Default)]
struct ChainState {
    now: u64,
    unlocking_period: u64,

    default_count: usize,
    default_head: Address,
    /// group -> (previous, next)
    default_links: HashMap<Address, (Address, Address)>,

    strategies: Vec<Address>,
    voted_strategies: Vec<Address>,

    scheduled_votes: HashMap<Address, U256>,
    /// (group, beneficiary) -> amount
    scheduled_withdrawals: HashMap<(Address, Address), U256>,
    scheduled_revokes: HashMap<Address, U256>,

    pending_votes: HashMap<Address, U256>,
    active_votes: HashMap<Address, U256>,
    activatable: HashSet<Address>,
    eligible: Vec<GroupVotes>,
    voted_groups: Vec<Address>,

    local_withdrawals: HashMap<Address, Vec<PendingWithdrawal>>,
    /// beneficiary -> count reported instead of the ledger length
    reported_withdrawal_counts: HashMap<Address, usize>,
    chain_withdrawals: Vec<PendingWithdrawal>,

    /// groups whose activation transaction reverts
    reverting_activations: HashSet<Address>,
    /// groups whose vote reads fail
    failing_reads: HashSet<Address>,
    /// finalizing succeeds without removing anything
    stalled_finalization: bool,

    txs: u64,
    calls: Vec<RecordedCall>,
}

impl ChainState {
    fn next_tx(&mut self) -> TxHash {
        self.txs += 1;
        tx_hash(self.txs)
    }

    fn check_readable(&self, group: Address) -> ChainResult<()> {
        if self.failing_reads.contains(&group) {
            return Err(ChainError::Rejected(format!("reads for group {group} fail")));
        }

        Ok(())
    }

    /// Votes for `group` that can still be revoked.
    fn revocable(&self, group: Address) -> U256 {
        let pending = self.pending_votes.get(&group).copied().unwrap_or_default();
        let active = self.active_votes.get(&group).copied().unwrap_or_default();

        pending + active
    }

    fn add_eligible_votes(&mut self, group: Address, amount: U256) {
        match self.eligible.iter_mut().find(|entry| entry.group == group) {
            Some(entry) => entry.votes += amount,
            None => self.eligible.push(GroupVotes {
                group,
                votes: amount,
            }),
        }
    }

    fn remove_eligible_votes(&mut self, group: Address, amount: U256) {
        if let Some(entry) = self.eligible.iter_mut().find(|entry| entry.group == group) {
            entry.votes = entry.votes.saturating_sub(amount);
        }
    }

    /// Removes `amount` from pending then active votes. Coverage is checked with `revocable`
    /// beforehand.
    fn revoke(&mut self, group: Address, amount: U256) {
        let pending = self.pending_votes.entry(group).or_default();
        let from_pending = amount.min(*pending);
        *pending -= from_pending;

        let active = self.active_votes.entry(group).or_default();
        let from_active = (amount - from_pending).min(*active);
        *active -= from_active;

        self.remove_eligible_votes(group, from_pending + from_active);
        if self.pending_votes[&group].is_zero() && self.active_votes[&group].is_zero() {
            self.voted_groups.retain(|voted| *voted != group);
        }
    }
}

/// Shared, cloneable in-memory chain. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct InMemoryChain {
    account: Address,
    state: Arc<RwLock<ChainState>>,
}

impl InMemoryChain {
    /// Creates an empty chain for the given protocol account.
    pub fn new(account: Address) -> Self {
        let state = ChainState {
            unlocking_period: DEFAULT_UNLOCKING_PERIOD,
            ..Default::default()
        };

        Self {
            account,
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Sets the current time.
    pub async fn set_now(&self, now: u64) {
        self.state.write().await.now = now;
    }

    /// Lays out the default strategy's list, head first, with consistent links and count.
    pub async fn set_default_groups(&self, groups: &[Address]) {
        let mut state = self.state.write().await;
        state.default_count = groups.len();
        state.default_head = groups.first().copied().unwrap_or(Address::ZERO);
        state.default_links = groups
            .iter()
            .enumerate()
            .map(|(i, group)| {
                let previous = groups.get(i + 1).copied().unwrap_or(Address::ZERO);
                let next = i
                    .checked_sub(1)
                    .map(|j| groups[j])
                    .unwrap_or(Address::ZERO);
                (*group, (previous, next))
            })
            .collect();
    }

    /// Overrides the number of default groups reported, leaving the list untouched.
    pub async fn set_default_group_count(&self, count: usize) {
        self.state.write().await.default_count = count;
    }

    /// Overrides the links of one entry of the default strategy's list.
    pub async fn set_default_group_links(&self, group: Address, previous: Address, next: Address) {
        self.state
            .write()
            .await
            .default_links
            .insert(group, (previous, next));
    }

    /// Sets the specific strategy lists.
    pub async fn set_specific_groups(&self, strategies: &[Address], voted: &[Address]) {
        let mut state = self.state.write().await;
        state.strategies = strategies.to_vec();
        state.voted_strategies = voted.to_vec();
    }

    /// Sets the votes scheduled for `group`.
    pub async fn set_scheduled_votes(&self, group: Address, amount: U256) {
        self.state
            .write()
            .await
            .scheduled_votes
            .insert(group, amount);
    }

    /// Sets the withdrawal scheduled from `group` for `beneficiary`.
    pub async fn set_scheduled_withdrawal(&self, group: Address, beneficiary: Address, amount: U256) {
        self.state
            .write()
            .await
            .scheduled_withdrawals
            .insert((group, beneficiary), amount);
    }

    /// Sets the votes scheduled to be revoked from `group`.
    pub async fn set_scheduled_revoke(&self, group: Address, amount: U256) {
        self.state
            .write()
            .await
            .scheduled_revokes
            .insert(group, amount);
    }

    /// Sets the protocol account's pending and active votes for `group`, registering it as voted
    /// for when either is non-zero.
    pub async fn set_account_votes(&self, group: Address, pending: U256, active: U256) {
        let mut state = self.state.write().await;
        state.pending_votes.insert(group, pending);
        state.active_votes.insert(group, active);
        if !(pending.is_zero() && active.is_zero()) && !state.voted_groups.contains(&group) {
            state.voted_groups.push(group);
        }
    }

    /// Marks whether the pending votes for `group` can be activated.
    pub async fn set_activatable(&self, group: Address, activatable: bool) {
        let mut state = self.state.write().await;
        if activatable {
            state.activatable.insert(group);
        } else {
            state.activatable.remove(&group);
        }
    }

    /// Sets the election's eligible groups and their totals, in election order.
    pub async fn set_eligible_groups(&self, eligible: &[GroupVotes]) {
        self.state.write().await.eligible = eligible.to_vec();
    }

    /// Overrides the order of the groups the account votes for.
    pub async fn set_voted_groups(&self, groups: &[Address]) {
        self.state.write().await.voted_groups = groups.to_vec();
    }

    /// Replaces the protocol ledger of `beneficiary`.
    pub async fn set_pending_withdrawals(
        &self,
        beneficiary: Address,
        withdrawals: &[PendingWithdrawal],
    ) {
        self.state
            .write()
            .await
            .local_withdrawals
            .insert(beneficiary, withdrawals.to_vec());
    }

    /// Overrides the pending withdrawal count reported for `beneficiary`.
    pub async fn set_reported_withdrawal_count(&self, beneficiary: Address, count: usize) {
        self.state
            .write()
            .await
            .reported_withdrawal_counts
            .insert(beneficiary, count);
    }

    /// Replaces the LockedGold ledger of the protocol account.
    pub async fn set_locked_gold_withdrawals(&self, withdrawals: &[PendingWithdrawal]) {
        self.state.write().await.chain_withdrawals = withdrawals.to_vec();
    }

    /// Makes activation transactions for `group` revert.
    pub async fn revert_activations_for(&self, group: Address) {
        self.state
            .write()
            .await
            .reverting_activations
            .insert(group);
    }

    /// Makes the scheduled and activatable vote reads for `group` fail.
    pub async fn fail_reads_for(&self, group: Address) {
        self.state.write().await.failing_reads.insert(group);
    }

    /// Makes `finishPendingWithdrawal` succeed without touching either ledger.
    pub async fn stall_finalization(&self) {
        self.state.write().await.stalled_finalization = true;
    }

    /// Calls observed so far.
    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.state.read().await.calls.clone()
    }

    /// Forgets the calls observed so far.
    pub async fn clear_calls(&self) {
        self.state.write().await.calls.clear();
    }
}

#[async_trait]
impl ChainReader for InMemoryChain {
    fn account(&self) -> Address {
        self.account
    }

    async fn current_timestamp(&self) -> ChainResult<u64> {
        Ok(self.state.read().await.now)
    }

    async fn number_of_default_groups(&self) -> ChainResult<usize> {
        Ok(self.state.read().await.default_count)
    }

    async fn default_groups_head(&self) -> ChainResult<Address> {
        Ok(self.state.read().await.default_head)
    }

    async fn default_group_previous_and_next(
        &self,
        group: Address,
    ) -> ChainResult<(Address, Address)> {
        Ok(self
            .state
            .read()
            .await
            .default_links
            .get(&group)
            .copied()
            .unwrap_or((Address::ZERO, Address::ZERO)))
    }

    async fn number_of_specific_groups(&self, source: SpecificGroupSource) -> ChainResult<usize> {
        let state = self.state.read().await;
        Ok(match source {
            SpecificGroupSource::Strategies => state.strategies.len(),
            SpecificGroupSource::VotedGroups => state.voted_strategies.len(),
        })
    }

    async fn specific_group(
        &self,
        source: SpecificGroupSource,
        index: usize,
    ) -> ChainResult<Address> {
        let state = self.state.read().await;
        let list = match source {
            SpecificGroupSource::Strategies => &state.strategies,
            SpecificGroupSource::VotedGroups => &state.voted_strategies,
        };

        list.get(index)
            .copied()
            .ok_or_else(|| ChainError::Rejected(format!("specific group index {index} out of range")))
    }

    async fn scheduled_votes_for_group(&self, group: Address) -> ChainResult<U256> {
        let state = self.state.read().await;
        state.check_readable(group)?;

        Ok(state.scheduled_votes.get(&group).copied().unwrap_or_default())
    }

    async fn scheduled_withdrawals_for_group_and_beneficiary(
        &self,
        group: Address,
        beneficiary: Address,
    ) -> ChainResult<U256> {
        Ok(self
            .state
            .read()
            .await
            .scheduled_withdrawals
            .get(&(group, beneficiary))
            .copied()
            .unwrap_or_default())
    }

    async fn scheduled_revoke_for_group(&self, group: Address) -> ChainResult<U256> {
        Ok(self
            .state
            .read()
            .await
            .scheduled_revokes
            .get(&group)
            .copied()
            .unwrap_or_default())
    }

    async fn votes_for_group(&self, group: Address) -> ChainResult<U256> {
        let state = self.state.read().await;
        let scheduled = state.scheduled_votes.get(&group).copied().unwrap_or_default();
        let pending = state.pending_votes.get(&group).copied().unwrap_or_default();
        let active = state.active_votes.get(&group).copied().unwrap_or_default();

        Ok(scheduled + pending + active)
    }

    async fn pending_votes_for_group(&self, group: Address) -> ChainResult<U256> {
        Ok(self
            .state
            .read()
            .await
            .pending_votes
            .get(&group)
            .copied()
            .unwrap_or_default())
    }

    async fn active_votes_for_group(&self, group: Address) -> ChainResult<U256> {
        Ok(self
            .state
            .read()
            .await
            .active_votes
            .get(&group)
            .copied()
            .unwrap_or_default())
    }

    async fn has_activatable_pending_votes(&self, group: Address) -> ChainResult<bool> {
        let state = self.state.read().await;
        state.check_readable(group)?;

        Ok(state.activatable.contains(&group))
    }

    async fn groups_voted_for(&self) -> ChainResult<Vec<Address>> {
        Ok(self.state.read().await.voted_groups.clone())
    }

    async fn find_lesser_and_greater_after_vote(
        &self,
        group: Address,
        delta: VoteDelta,
    ) -> ChainResult<LesserGreater> {
        let mut state = self.state.write().await;
        trace!(%group, %delta, "neighbour lookup");
        state.calls.push(RecordedCall::NeighborLookup { group, delta });

        lesser_and_greater_after_vote(&state.eligible, group, delta)
    }

    async fn number_pending_withdrawals(&self, beneficiary: Address) -> ChainResult<usize> {
        let state = self.state.read().await;
        let count = match state.reported_withdrawal_counts.get(&beneficiary) {
            Some(count) => *count,
            None => state
                .local_withdrawals
                .get(&beneficiary)
                .map_or(0, Vec::len),
        };

        Ok(count)
    }

    async fn pending_withdrawals(
        &self,
        beneficiary: Address,
    ) -> ChainResult<Vec<PendingWithdrawal>> {
        Ok(self
            .state
            .read()
            .await
            .local_withdrawals
            .get(&beneficiary)
            .cloned()
            .unwrap_or_default())
    }

    async fn locked_gold_pending_withdrawals(&self) -> ChainResult<Vec<PendingWithdrawal>> {
        Ok(self.state.read().await.chain_withdrawals.clone())
    }
}

#[async_trait]
impl ChainWriter for InMemoryChain {
    async fn activate_and_vote(
        &self,
        group: Address,
        hints: LesserGreater,
    ) -> ChainResult<TxHash> {
        let mut state = self.state.write().await;
        let tx_hash = state.next_tx();
        if state.reverting_activations.contains(&group) {
            return Err(ChainError::Reverted(tx_hash));
        }
        state.calls.push(RecordedCall::ActivateAndVote { group, hints });

        let scheduled = state.scheduled_votes.remove(&group).unwrap_or_default();
        let pending = state.pending_votes.remove(&group).unwrap_or_default();
        *state.active_votes.entry(group).or_default() += scheduled + pending;
        state.activatable.remove(&group);
        state.add_eligible_votes(group, scheduled);
        if !state.voted_groups.contains(&group) {
            state.voted_groups.push(group);
        }

        Ok(tx_hash)
    }

    async fn revoke_votes(&self, group: Address, hints: RevocationHints) -> ChainResult<TxHash> {
        let mut state = self.state.write().await;
        let amount = state.scheduled_revokes.get(&group).copied().unwrap_or_default();
        if amount > state.revocable(group) {
            return Err(ChainError::Rejected(format!(
                "not enough votes for group {group} to revoke {amount}"
            )));
        }

        state.scheduled_revokes.remove(&group);
        state.revoke(group, amount);
        state.calls.push(RecordedCall::RevokeVotes { group, hints });

        Ok(state.next_tx())
    }

    async fn withdraw(
        &self,
        beneficiary: Address,
        group: Address,
        hints: RevocationHints,
    ) -> ChainResult<TxHash> {
        let mut state = self.state.write().await;
        let amount = state
            .scheduled_withdrawals
            .get(&(group, beneficiary))
            .copied()
            .unwrap_or_default();
        let scheduled = state.scheduled_votes.get(&group).copied().unwrap_or_default();
        let immediate = amount.min(scheduled);
        let remaining = amount - immediate;
        if remaining > state.revocable(group) {
            return Err(ChainError::Rejected(format!(
                "not enough votes for group {group} to withdraw {amount}"
            )));
        }

        state.scheduled_withdrawals.remove(&(group, beneficiary));
        if !immediate.is_zero() {
            state.scheduled_votes.insert(group, scheduled - immediate);
        }
        if !remaining.is_zero() {
            state.revoke(group, remaining);

            let withdrawal =
                PendingWithdrawal::new(remaining, state.now + state.unlocking_period);
            state
                .local_withdrawals
                .entry(beneficiary)
                .or_default()
                .push(withdrawal);
            state.chain_withdrawals.push(withdrawal);
        }
        state.calls.push(RecordedCall::Withdraw {
            beneficiary,
            group,
            hints,
        });

        Ok(state.next_tx())
    }

    async fn finish_pending_withdrawal(
        &self,
        beneficiary: Address,
        local_index: usize,
        chain_index: usize,
    ) -> ChainResult<TxHash> {
        let mut state = self.state.write().await;
        let now = state.now;

        let local = state
            .local_withdrawals
            .get(&beneficiary)
            .and_then(|ledger| ledger.get(local_index))
            .copied()
            .ok_or_else(|| ChainError::Rejected(format!("no local withdrawal at {local_index}")))?;
        let chain = state
            .chain_withdrawals
            .get(chain_index)
            .copied()
            .ok_or_else(|| ChainError::Rejected(format!("no chain withdrawal at {chain_index}")))?;

        if local != chain {
            return Err(ChainError::Rejected(format!(
                "withdrawal mismatch: local {local:?}, chain {chain:?}"
            )));
        }
        if !local.is_ready(now) {
            return Err(ChainError::Rejected(format!(
                "withdrawal unlocks at {}, now is {now}",
                local.timestamp
            )));
        }

        if !state.stalled_finalization {
            if let Some(ledger) = state.local_withdrawals.get_mut(&beneficiary) {
                ledger.remove(local_index);
            }
            state.chain_withdrawals.remove(chain_index);
        }
        state.calls.push(RecordedCall::FinishPendingWithdrawal {
            beneficiary,
            local_index,
            chain_index,
            local,
            chain,
        });

        Ok(state.next_tx())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    #[tokio::test]
    async fn default_list_links_follow_order() {
        let chain = InMemoryChain::new(addr(0xaa));
        chain.set_default_groups(&[addr(1), addr(2), addr(3)]).await;

        assert_eq!(chain.number_of_default_groups().await.unwrap(), 3);
        assert_eq!(chain.default_groups_head().await.unwrap(), addr(1));
        assert_eq!(
            chain.default_group_previous_and_next(addr(1)).await.unwrap(),
            (addr(2), Address::ZERO)
        );
        assert_eq!(
            chain.default_group_previous_and_next(addr(3)).await.unwrap(),
            (Address::ZERO, addr(2))
        );
    }

    #[tokio::test]
    async fn withdraw_creates_matching_ledger_entries() {
        let chain = InMemoryChain::new(addr(0xaa));
        chain.set_now(100).await;
        chain.set_scheduled_votes(addr(1), U256::from(10)).await;
        chain.set_account_votes(addr(1), U256::from(5), U256::from(50)).await;
        chain
            .set_scheduled_withdrawal(addr(1), addr(0xbb), U256::from(25))
            .await;

        chain
            .withdraw(addr(0xbb), addr(1), RevocationHints::default())
            .await
            .unwrap();

        let expected = PendingWithdrawal::new(U256::from(15), 100 + DEFAULT_UNLOCKING_PERIOD);
        assert_eq!(chain.pending_withdrawals(addr(0xbb)).await.unwrap(), vec![expected]);
        assert_eq!(chain.locked_gold_pending_withdrawals().await.unwrap(), vec![expected]);
        assert_eq!(chain.pending_votes_for_group(addr(1)).await.unwrap(), U256::ZERO);
        assert_eq!(chain.active_votes_for_group(addr(1)).await.unwrap(), U256::from(40));
    }

    #[tokio::test]
    async fn finish_rejects_mismatched_entries() {
        let chain = InMemoryChain::new(addr(0xaa));
        chain
            .set_pending_withdrawals(addr(0xbb), &[PendingWithdrawal::new(U256::from(1), 5)])
            .await;
        chain
            .set_locked_gold_withdrawals(&[PendingWithdrawal::new(U256::from(2), 5)])
            .await;
        chain.set_now(10).await;

        assert!(chain.finish_pending_withdrawal(addr(0xbb), 0, 0).await.is_err());
        assert!(chain.calls().await.is_empty());
    }

    #[tokio::test]
    async fn rejected_withdraw_leaves_state_untouched() {
        let chain = InMemoryChain::new(addr(0xaa));
        chain.set_scheduled_votes(addr(1), U256::from(10)).await;
        chain.set_account_votes(addr(1), U256::from(5), U256::from(5)).await;
        chain
            .set_scheduled_withdrawal(addr(1), addr(0xbb), U256::from(25))
            .await;

        assert!(chain
            .withdraw(addr(0xbb), addr(1), RevocationHints::default())
            .await
            .is_err());

        assert_eq!(chain.scheduled_votes_for_group(addr(1)).await.unwrap(), U256::from(10));
        assert_eq!(
            chain
                .scheduled_withdrawals_for_group_and_beneficiary(addr(1), addr(0xbb))
                .await
                .unwrap(),
            U256::from(25)
        );
        assert_eq!(chain.pending_votes_for_group(addr(1)).await.unwrap(), U256::from(5));
        assert_eq!(chain.active_votes_for_group(addr(1)).await.unwrap(), U256::from(5));
        assert!(chain.pending_withdrawals(addr(0xbb)).await.unwrap().is_empty());
        assert!(chain.calls().await.is_empty());
    }

    #[tokio::test]
    async fn rejected_revoke_leaves_state_untouched() {
        let chain = InMemoryChain::new(addr(0xaa));
        chain.set_account_votes(addr(1), U256::from(5), U256::from(5)).await;
        chain.set_scheduled_revoke(addr(1), U256::from(11)).await;

        assert!(chain
            .revoke_votes(addr(1), RevocationHints::default())
            .await
            .is_err());

        assert_eq!(chain.scheduled_revoke_for_group(addr(1)).await.unwrap(), U256::from(11));
        assert_eq!(chain.votes_for_group(addr(1)).await.unwrap(), U256::from(10));
        assert_eq!(chain.groups_voted_for().await.unwrap(), vec![addr(1)]);
    }
}
