//! Interfaces to the on-chain state the orchestration works against.
//!
//! Implementations never cache: every call reflects the chain at the time it is made.

use alloy::primitives::{Address, Bytes, TxHash, U256};
use async_trait::async_trait;

use crate::{
    errors::ChainResult,
    types::{
        LesserGreater, PendingWithdrawal, ProposalId, RevocationHints, SpecificGroupSource,
        VoteDelta,
    },
};

/// Read-only view of the protocol contracts and the election/locked-gold state of the protocol
/// account.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// The protocol account, i.e. the Account contract that holds the votes.
    fn account(&self) -> Address;

    /// Timestamp of the latest block, against which pending withdrawal unlock times are checked.
    async fn current_timestamp(&self) -> ChainResult<u64>;

    /// Number of active groups in the default strategy.
    async fn number_of_default_groups(&self) -> ChainResult<usize>;

    /// Head of the default strategy's sorted group list.
    async fn default_groups_head(&self) -> ChainResult<Address>;

    /// `(previous, next)` links of `group` in the default strategy's list.
    async fn default_group_previous_and_next(&self, group: Address)
        -> ChainResult<(Address, Address)>;

    /// Length of the given specific-strategy list.
    async fn number_of_specific_groups(&self, source: SpecificGroupSource) -> ChainResult<usize>;

    /// Entry `index` of the given specific-strategy list.
    async fn specific_group(&self, source: SpecificGroupSource, index: usize)
        -> ChainResult<Address>;

    /// Votes scheduled for `group` that have not been cast yet.
    async fn scheduled_votes_for_group(&self, group: Address) -> ChainResult<U256>;

    /// Withdrawals scheduled from `group` on behalf of `beneficiary`.
    async fn scheduled_withdrawals_for_group_and_beneficiary(
        &self,
        group: Address,
        beneficiary: Address,
    ) -> ChainResult<U256>;

    /// Votes scheduled to be revoked from `group` (rebalancing, not tied to a beneficiary).
    async fn scheduled_revoke_for_group(&self, group: Address) -> ChainResult<U256>;

    /// Total votes the protocol account has for `group`, scheduled ones included.
    async fn votes_for_group(&self, group: Address) -> ChainResult<U256>;

    /// Pending (not yet activated) votes of the protocol account for `group`.
    async fn pending_votes_for_group(&self, group: Address) -> ChainResult<U256>;

    /// Active votes of the protocol account for `group`.
    async fn active_votes_for_group(&self, group: Address) -> ChainResult<U256>;

    /// Whether the protocol account has pending votes for `group` that can be activated.
    async fn has_activatable_pending_votes(&self, group: Address) -> ChainResult<bool>;

    /// Groups the protocol account votes for, in the election's order.
    async fn groups_voted_for(&self) -> ChainResult<Vec<Address>>;

    /// Neighbours `group` would have in the election list after `delta` is applied.
    async fn find_lesser_and_greater_after_vote(
        &self,
        group: Address,
        delta: VoteDelta,
    ) -> ChainResult<LesserGreater>;

    /// Number of pending withdrawals the protocol ledger holds for `beneficiary`.
    async fn number_pending_withdrawals(&self, beneficiary: Address) -> ChainResult<usize>;

    /// Pending withdrawals the protocol ledger holds for `beneficiary`, in insertion order.
    async fn pending_withdrawals(&self, beneficiary: Address)
        -> ChainResult<Vec<PendingWithdrawal>>;

    /// Pending withdrawals LockedGold holds for the protocol account, in insertion order.
    async fn locked_gold_pending_withdrawals(&self) -> ChainResult<Vec<PendingWithdrawal>>;
}

/// Transactions against the protocol's Account contract.
///
/// Every method waits for the receipt and fails if the transaction reverted.
#[async_trait]
pub trait ChainWriter: Send + Sync {
    /// Activates pending votes for `group` and casts its scheduled votes.
    async fn activate_and_vote(&self, group: Address, hints: LesserGreater)
        -> ChainResult<TxHash>;

    /// Revokes the votes scheduled for revocation from `group`.
    async fn revoke_votes(&self, group: Address, hints: RevocationHints) -> ChainResult<TxHash>;

    /// Withdraws the amount scheduled for `beneficiary` from `group`.
    async fn withdraw(
        &self,
        beneficiary: Address,
        group: Address,
        hints: RevocationHints,
    ) -> ChainResult<TxHash>;

    /// Finalizes an unlocked withdrawal given its index in both ledgers.
    async fn finish_pending_withdrawal(
        &self,
        beneficiary: Address,
        local_index: usize,
        chain_index: usize,
    ) -> ChainResult<TxHash>;
}

/// The governance multisig.
#[async_trait]
pub trait MultisigContract: Send + Sync {
    /// Submits a proposal and returns its id. The submitter's confirmation is implied.
    async fn submit_proposal(
        &self,
        destinations: Vec<Address>,
        values: Vec<U256>,
        payloads: Vec<Bytes>,
    ) -> ChainResult<ProposalId>;

    /// Confirms a proposal.
    async fn confirm_proposal(&self, id: ProposalId) -> ChainResult<TxHash>;

    /// Revokes a previous confirmation.
    async fn revoke_confirmation(&self, id: ProposalId) -> ChainResult<TxHash>;

    /// Starts the timelock of a fully confirmed proposal.
    async fn schedule_proposal(&self, id: ProposalId) -> ChainResult<TxHash>;

    /// Executes a proposal whose timelock has been reached.
    async fn execute_proposal(&self, id: ProposalId) -> ChainResult<TxHash>;

    /// Whether the proposal has reached the confirmation threshold.
    async fn is_fully_confirmed(&self, id: ProposalId) -> ChainResult<bool>;

    /// Whether the proposal's timelock has started.
    async fn is_scheduled(&self, id: ProposalId) -> ChainResult<bool>;

    /// Whether the proposal's timelock has elapsed.
    async fn is_proposal_timelock_reached(&self, id: ProposalId) -> ChainResult<bool>;

    /// Current owners.
    async fn owners(&self) -> ChainResult<Vec<Address>>;

    /// Owners that confirmed the proposal.
    async fn confirmations(&self, id: ProposalId) -> ChainResult<Vec<Address>>;

    /// Whether `owner` confirmed the proposal.
    async fn is_confirmed_by(&self, id: ProposalId, owner: Address) -> ChainResult<bool>;

    /// Whether `address` is an owner.
    async fn is_owner(&self, address: Address) -> ChainResult<bool>;
}
