//! [`ChainReader`], [`ChainWriter`] and [`MultisigContract`] backed by an `alloy` provider.

use alloy::{
    eips::BlockNumberOrTag,
    network::Ethereum,
    primitives::{address, Address, Bytes, TxHash, U256},
    providers::{PendingTransactionBuilder, Provider},
};
use async_trait::async_trait;
use tracing::{debug, info};

use crate::{
    bindings::{
        IAccount, IDefaultStrategy, IElection, ILockedGold, IMultiSig, IRegistry,
        ISpecificGroupStrategy,
    },
    errors::{ChainError, ChainResult},
    neighbors::lesser_and_greater_after_vote,
    traits::{ChainReader, ChainWriter, MultisigContract},
    types::{
        ContractAddresses, GroupVotes, LesserGreater, PendingWithdrawal, ProposalId,
        RevocationHints, SpecificGroupSource, VoteDelta,
    },
};

/// Address of the Celo registry, identical on every Celo network.
pub const CELO_REGISTRY_ADDRESS: Address = address!("000000000000000000000000000000000000ce10");

/// Registry identifier of the Election contract.
const ELECTION_REGISTRY_ID: &str = "Election";

/// Registry identifier of the LockedGold contract.
const LOCKED_GOLD_REGISTRY_ID: &str = "LockedGold";

/// Contract addresses with the system contracts resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedContracts {
    /// The protocol's Account contract.
    pub account: Address,
    /// The default strategy.
    pub default_strategy: Address,
    /// The specific group strategy.
    pub specific_group_strategy: Address,
    /// The governance multisig.
    pub multisig: Address,
    /// The Election system contract.
    pub election: Address,
    /// The LockedGold system contract.
    pub locked_gold: Address,
}

/// Immutable connection context handed to every operation: a provider (carrying the signer, if
/// any) and the contract addresses it talks to.
#[derive(Debug, Clone)]
pub struct ChainContext<P> {
    provider: P,
    contracts: ResolvedContracts,
}

impl<P> ChainContext<P>
where
    P: Provider + Clone,
{
    /// Creates a context, looking up Election and LockedGold in the Celo registry when they are
    /// not configured.
    pub async fn connect(provider: P, addresses: &ContractAddresses) -> ChainResult<Self> {
        let election = match addresses.election {
            Some(election) => election,
            None => lookup_registry(&provider, ELECTION_REGISTRY_ID).await?,
        };
        let locked_gold = match addresses.locked_gold {
            Some(locked_gold) => locked_gold,
            None => lookup_registry(&provider, LOCKED_GOLD_REGISTRY_ID).await?,
        };

        let contracts = ResolvedContracts {
            account: addresses.account,
            default_strategy: addresses.default_strategy,
            specific_group_strategy: addresses.specific_group_strategy,
            multisig: addresses.multisig,
            election,
            locked_gold,
        };
        debug!(?contracts, "chain context ready");

        Ok(Self {
            provider,
            contracts,
        })
    }

    /// The resolved contract addresses.
    pub const fn contracts(&self) -> &ResolvedContracts {
        &self.contracts
    }
}

async fn lookup_registry<P: Provider + Clone>(provider: &P, id: &str) -> ChainResult<Address> {
    let registry = IRegistry::new(CELO_REGISTRY_ADDRESS, provider.clone());
    let registered = registry
        .getAddressForStringOrDie(id.to_string())
        .call()
        .await
        .map_err(ChainError::Read)?;
    debug!(%id, %registered, "resolved system contract");

    Ok(registered)
}

/// Waits for the receipt of a sent transaction and checks its status.
async fn confirm(pending: PendingTransactionBuilder<Ethereum>) -> ChainResult<TxHash> {
    let tx_hash = *pending.tx_hash();
    debug!(%tx_hash, "waiting for receipt");

    let receipt = pending.get_receipt().await?;
    if !receipt.status() {
        return Err(ChainError::Reverted(tx_hash));
    }

    Ok(tx_hash)
}

fn to_usize(value: U256, what: &str) -> ChainResult<usize> {
    u64::try_from(value)
        .ok()
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| ChainError::Malformed(format!("{what} {value} does not fit in usize")))
}

fn to_withdrawals(values: Vec<U256>, timestamps: Vec<U256>) -> ChainResult<Vec<PendingWithdrawal>> {
    if values.len() != timestamps.len() {
        return Err(ChainError::Malformed(format!(
            "pending withdrawals have {} values but {} timestamps",
            values.len(),
            timestamps.len()
        )));
    }

    values
        .into_iter()
        .zip(timestamps)
        .map(|(value, timestamp)| {
            let timestamp = u64::try_from(timestamp).map_err(|_| {
                ChainError::Malformed(format!("withdrawal timestamp {timestamp} overflows u64"))
            })?;
            Ok(PendingWithdrawal::new(value, timestamp))
        })
        .collect()
}

#[async_trait]
impl<P> ChainReader for ChainContext<P>
where
    P: Provider + Clone + 'static,
{
    fn account(&self) -> Address {
        self.contracts.account
    }

    async fn current_timestamp(&self) -> ChainResult<u64> {
        // LockedGold compares unlock times against block time, not the operator's clock
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await
            .map_err(|err| ChainError::Read(err.into()))?
            .ok_or_else(|| ChainError::Malformed("node returned no latest block".to_string()))?;

        Ok(block.header.timestamp)
    }

    async fn number_of_default_groups(&self) -> ChainResult<usize> {
        let strategy = IDefaultStrategy::new(self.contracts.default_strategy, self.provider.clone());
        let count = strategy
            .getNumberOfGroups()
            .call()
            .await
            .map_err(ChainError::Read)?;

        to_usize(count, "default group count")
    }

    async fn default_groups_head(&self) -> ChainResult<Address> {
        let strategy = IDefaultStrategy::new(self.contracts.default_strategy, self.provider.clone());
        Ok(strategy
            .getGroupsHead()
            .call()
            .await
            .map_err(ChainError::Read)?
            .head)
    }

    async fn default_group_previous_and_next(
        &self,
        group: Address,
    ) -> ChainResult<(Address, Address)> {
        let strategy = IDefaultStrategy::new(self.contracts.default_strategy, self.provider.clone());
        let links = strategy
            .getGroupPreviousAndNext(group)
            .call()
            .await
            .map_err(ChainError::Read)?;

        Ok((links.previousAddress, links.nextAddress))
    }

    async fn number_of_specific_groups(&self, source: SpecificGroupSource) -> ChainResult<usize> {
        let strategy = ISpecificGroupStrategy::new(
            self.contracts.specific_group_strategy,
            self.provider.clone(),
        );
        let count = match source {
            SpecificGroupSource::Strategies => {
                strategy
                    .getNumberOfStrategies()
                    .call()
                    .await
                    .map_err(ChainError::Read)?
            }
            SpecificGroupSource::VotedGroups => {
                strategy
                    .getNumberOfVotedGroups()
                    .call()
                    .await
                    .map_err(ChainError::Read)?
            }
        };

        to_usize(count, "specific group count")
    }

    async fn specific_group(
        &self,
        source: SpecificGroupSource,
        index: usize,
    ) -> ChainResult<Address> {
        let strategy = ISpecificGroupStrategy::new(
            self.contracts.specific_group_strategy,
            self.provider.clone(),
        );
        let index = U256::from(index);
        let group = match source {
            SpecificGroupSource::Strategies => {
                strategy
                    .getStrategy(index)
                    .call()
                    .await
                    .map_err(ChainError::Read)?
            }
            SpecificGroupSource::VotedGroups => {
                strategy
                    .getVotedGroup(index)
                    .call()
                    .await
                    .map_err(ChainError::Read)?
            }
        };

        Ok(group)
    }

    async fn scheduled_votes_for_group(&self, group: Address) -> ChainResult<U256> {
        let account = IAccount::new(self.contracts.account, self.provider.clone());
        Ok(account
            .scheduledVotesForGroup(group)
            .call()
            .await
            .map_err(ChainError::Read)?)
    }

    async fn scheduled_withdrawals_for_group_and_beneficiary(
        &self,
        group: Address,
        beneficiary: Address,
    ) -> ChainResult<U256> {
        let account = IAccount::new(self.contracts.account, self.provider.clone());
        Ok(account
            .scheduledWithdrawalsForGroupAndBeneficiary(group, beneficiary)
            .call()
            .await
            .map_err(ChainError::Read)?)
    }

    async fn scheduled_revoke_for_group(&self, group: Address) -> ChainResult<U256> {
        let account = IAccount::new(self.contracts.account, self.provider.clone());
        Ok(account
            .scheduledRevokeForGroup(group)
            .call()
            .await
            .map_err(ChainError::Read)?)
    }

    async fn votes_for_group(&self, group: Address) -> ChainResult<U256> {
        let account = IAccount::new(self.contracts.account, self.provider.clone());
        Ok(account
            .votesForGroup(group)
            .call()
            .await
            .map_err(ChainError::Read)?)
    }

    async fn pending_votes_for_group(&self, group: Address) -> ChainResult<U256> {
        let election = IElection::new(self.contracts.election, self.provider.clone());
        Ok(election
            .getPendingVotesForGroupByAccount(group, self.contracts.account)
            .call()
            .await
            .map_err(ChainError::Read)?)
    }

    async fn active_votes_for_group(&self, group: Address) -> ChainResult<U256> {
        let election = IElection::new(self.contracts.election, self.provider.clone());
        Ok(election
            .getActiveVotesForGroupByAccount(group, self.contracts.account)
            .call()
            .await
            .map_err(ChainError::Read)?)
    }

    async fn has_activatable_pending_votes(&self, group: Address) -> ChainResult<bool> {
        let election = IElection::new(self.contracts.election, self.provider.clone());
        Ok(election
            .hasActivatablePendingVotes(self.contracts.account, group)
            .call()
            .await
            .map_err(ChainError::Read)?)
    }

    async fn groups_voted_for(&self) -> ChainResult<Vec<Address>> {
        let election = IElection::new(self.contracts.election, self.provider.clone());
        Ok(election
            .getGroupsVotedForByAccount(self.contracts.account)
            .call()
            .await
            .map_err(ChainError::Read)?)
    }

    async fn find_lesser_and_greater_after_vote(
        &self,
        group: Address,
        delta: VoteDelta,
    ) -> ChainResult<LesserGreater> {
        let election = IElection::new(self.contracts.election, self.provider.clone());
        let eligible = election
            .getTotalVotesForEligibleValidatorGroups()
            .call()
            .await
            .map_err(ChainError::Read)?;

        if eligible.groups.len() != eligible.values.len() {
            return Err(ChainError::Malformed(format!(
                "{} eligible groups but {} vote totals",
                eligible.groups.len(),
                eligible.values.len()
            )));
        }

        let eligible = eligible
            .groups
            .into_iter()
            .zip(eligible.values)
            .map(|(group, votes)| GroupVotes { group, votes })
            .collect::<Vec<_>>();

        let neighbors = lesser_and_greater_after_vote(&eligible, group, delta)?;
        debug!(%group, %delta, ?neighbors, "computed election neighbours");

        Ok(neighbors)
    }

    async fn number_pending_withdrawals(&self, beneficiary: Address) -> ChainResult<usize> {
        let account = IAccount::new(self.contracts.account, self.provider.clone());
        let count = account
            .getNumberPendingWithdrawals(beneficiary)
            .call()
            .await
            .map_err(ChainError::Read)?;

        to_usize(count, "pending withdrawal count")
    }

    async fn pending_withdrawals(
        &self,
        beneficiary: Address,
    ) -> ChainResult<Vec<PendingWithdrawal>> {
        let account = IAccount::new(self.contracts.account, self.provider.clone());
        let ledger = account
            .getPendingWithdrawals(beneficiary)
            .call()
            .await
            .map_err(ChainError::Read)?;

        to_withdrawals(ledger.values, ledger.timestamps)
    }

    async fn locked_gold_pending_withdrawals(&self) -> ChainResult<Vec<PendingWithdrawal>> {
        let locked_gold = ILockedGold::new(self.contracts.locked_gold, self.provider.clone());
        let ledger = locked_gold
            .getPendingWithdrawals(self.contracts.account)
            .call()
            .await
            .map_err(ChainError::Read)?;

        to_withdrawals(ledger.values, ledger.timestamps)
    }
}

#[async_trait]
impl<P> ChainWriter for ChainContext<P>
where
    P: Provider + Clone + 'static,
{
    async fn activate_and_vote(
        &self,
        group: Address,
        hints: LesserGreater,
    ) -> ChainResult<TxHash> {
        info!(%group, lesser = %hints.lesser, greater = %hints.greater, "sending activateAndVote");
        let account = IAccount::new(self.contracts.account, self.provider.clone());
        let pending = account
            .activateAndVote(group, hints.lesser, hints.greater)
            .send()
            .await
            .map_err(ChainError::Submission)?;

        confirm(pending).await
    }

    async fn revoke_votes(&self, group: Address, hints: RevocationHints) -> ChainResult<TxHash> {
        info!(%group, ?hints, "sending revokeVotes");
        let account = IAccount::new(self.contracts.account, self.provider.clone());
        let pending = account
            .revokeVotes(
                group,
                hints.after_pending.lesser,
                hints.after_pending.greater,
                hints.after_active.lesser,
                hints.after_active.greater,
                U256::from(hints.group_index),
            )
            .send()
            .await
            .map_err(ChainError::Submission)?;

        confirm(pending).await
    }

    async fn withdraw(
        &self,
        beneficiary: Address,
        group: Address,
        hints: RevocationHints,
    ) -> ChainResult<TxHash> {
        info!(%beneficiary, %group, ?hints, "sending withdraw");
        let account = IAccount::new(self.contracts.account, self.provider.clone());
        let pending = account
            .withdraw(
                beneficiary,
                group,
                hints.after_pending.lesser,
                hints.after_pending.greater,
                hints.after_active.lesser,
                hints.after_active.greater,
                U256::from(hints.group_index),
            )
            .send()
            .await
            .map_err(ChainError::Submission)?;

        confirm(pending).await
    }

    async fn finish_pending_withdrawal(
        &self,
        beneficiary: Address,
        local_index: usize,
        chain_index: usize,
    ) -> ChainResult<TxHash> {
        info!(%beneficiary, %local_index, %chain_index, "sending finishPendingWithdrawal");
        let account = IAccount::new(self.contracts.account, self.provider.clone());
        let pending = account
            .finishPendingWithdrawal(beneficiary, U256::from(local_index), U256::from(chain_index))
            .send()
            .await
            .map_err(ChainError::Submission)?;

        confirm(pending).await
    }
}

#[async_trait]
impl<P> MultisigContract for ChainContext<P>
where
    P: Provider + Clone + 'static,
{
    async fn submit_proposal(
        &self,
        destinations: Vec<Address>,
        values: Vec<U256>,
        payloads: Vec<Bytes>,
    ) -> ChainResult<ProposalId> {
        info!(calls = destinations.len(), "sending submitProposal");
        let multisig = IMultiSig::new(self.contracts.multisig, self.provider.clone());
        let pending = multisig
            .submitProposal(destinations, values, payloads)
            .send()
            .await
            .map_err(ChainError::Submission)?;

        let tx_hash = *pending.tx_hash();
        let receipt = pending.get_receipt().await?;
        if !receipt.status() {
            return Err(ChainError::Reverted(tx_hash));
        }

        receipt
            .inner
            .logs()
            .iter()
            .filter(|log| log.address() == self.contracts.multisig)
            .find_map(|log| log.log_decode::<IMultiSig::ProposalAdded>().ok())
            .map(|added| added.inner.data.proposalId)
            .ok_or(ChainError::MissingEvent {
                event: "ProposalAdded",
                tx_hash,
            })
    }

    async fn confirm_proposal(&self, id: ProposalId) -> ChainResult<TxHash> {
        info!(%id, "sending confirmProposal");
        let multisig = IMultiSig::new(self.contracts.multisig, self.provider.clone());
        let pending = multisig
            .confirmProposal(id)
            .send()
            .await
            .map_err(ChainError::Submission)?;

        confirm(pending).await
    }

    async fn revoke_confirmation(&self, id: ProposalId) -> ChainResult<TxHash> {
        info!(%id, "sending revokeConfirmation");
        let multisig = IMultiSig::new(self.contracts.multisig, self.provider.clone());
        let pending = multisig
            .revokeConfirmation(id)
            .send()
            .await
            .map_err(ChainError::Submission)?;

        confirm(pending).await
    }

    async fn schedule_proposal(&self, id: ProposalId) -> ChainResult<TxHash> {
        info!(%id, "sending scheduleProposal");
        let multisig = IMultiSig::new(self.contracts.multisig, self.provider.clone());
        let pending = multisig
            .scheduleProposal(id)
            .send()
            .await
            .map_err(ChainError::Submission)?;

        confirm(pending).await
    }

    async fn execute_proposal(&self, id: ProposalId) -> ChainResult<TxHash> {
        info!(%id, "sending executeProposal");
        let multisig = IMultiSig::new(self.contracts.multisig, self.provider.clone());
        let pending = multisig
            .executeProposal(id)
            .send()
            .await
            .map_err(ChainError::Submission)?;

        confirm(pending).await
    }

    async fn is_fully_confirmed(&self, id: ProposalId) -> ChainResult<bool> {
        let multisig = IMultiSig::new(self.contracts.multisig, self.provider.clone());
        Ok(multisig
            .isFullyConfirmed(id)
            .call()
            .await
            .map_err(ChainError::Read)?)
    }

    async fn is_scheduled(&self, id: ProposalId) -> ChainResult<bool> {
        let multisig = IMultiSig::new(self.contracts.multisig, self.provider.clone());
        Ok(multisig
            .isScheduled(id)
            .call()
            .await
            .map_err(ChainError::Read)?)
    }

    async fn is_proposal_timelock_reached(&self, id: ProposalId) -> ChainResult<bool> {
        let multisig = IMultiSig::new(self.contracts.multisig, self.provider.clone());
        Ok(multisig
            .isProposalTimelockReached(id)
            .call()
            .await
            .map_err(ChainError::Read)?)
    }

    async fn owners(&self) -> ChainResult<Vec<Address>> {
        let multisig = IMultiSig::new(self.contracts.multisig, self.provider.clone());
        Ok(multisig
            .getOwners()
            .call()
            .await
            .map_err(ChainError::Read)?)
    }

    async fn confirmations(&self, id: ProposalId) -> ChainResult<Vec<Address>> {
        let multisig = IMultiSig::new(self.contracts.multisig, self.provider.clone());
        Ok(multisig
            .getConfirmations(id)
            .call()
            .await
            .map_err(ChainError::Read)?)
    }

    async fn is_confirmed_by(&self, id: ProposalId, owner: Address) -> ChainResult<bool> {
        let multisig = IMultiSig::new(self.contracts.multisig, self.provider.clone());
        Ok(multisig
            .isConfirmedBy(id, owner)
            .call()
            .await
            .map_err(ChainError::Read)?)
    }

    async fn is_owner(&self, address: Address) -> ChainResult<bool> {
        let multisig = IMultiSig::new(self.contracts.multisig, self.provider.clone());
        Ok(multisig
            .isOwner(address)
            .call()
            .await
            .map_err(ChainError::Read)?)
    }
}

#[cfg(test)]
mod tests {
    use alloy::{
        consensus::Header,
        providers::{mock::Asserter, DynProvider, ProviderBuilder},
        rpc::types::{Block, Header as RpcHeader},
    };

    use super::*;

    fn mocked_chain(asserter: &Asserter) -> ChainContext<DynProvider> {
        let provider = ProviderBuilder::new()
            .connect_mocked_client(asserter.clone())
            .erased();

        ChainContext {
            provider,
            contracts: ResolvedContracts {
                account: Address::repeat_byte(1),
                default_strategy: Address::repeat_byte(2),
                specific_group_strategy: Address::repeat_byte(3),
                multisig: Address::repeat_byte(4),
                election: Address::repeat_byte(5),
                locked_gold: Address::repeat_byte(6),
            },
        }
    }

    #[tokio::test]
    async fn unlock_clock_is_latest_block_time() {
        let asserter = Asserter::new();
        let chain = mocked_chain(&asserter);

        let block: Block = Block::empty(RpcHeader::new(Header {
            timestamp: 1_700_000_000,
            ..Default::default()
        }));
        asserter.push_success(&block);

        assert_eq!(chain.current_timestamp().await.unwrap(), 1_700_000_000);
    }

    #[tokio::test]
    async fn missing_latest_block_is_malformed() {
        let asserter = Asserter::new();
        let chain = mocked_chain(&asserter);
        asserter.push_success(&Option::<Block>::None);

        let err = chain.current_timestamp().await.unwrap_err();
        assert!(matches!(err, ChainError::Malformed(_)), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn single_value_reads_decode_directly() {
        let asserter = Asserter::new();
        let chain = mocked_chain(&asserter);
        asserter.push_success(&Bytes::from(U256::from(42).to_be_bytes::<32>().to_vec()));

        assert_eq!(
            chain.votes_for_group(Address::repeat_byte(9)).await.unwrap(),
            U256::from(42)
        );
    }

    #[test]
    fn mismatched_ledger_arrays_are_malformed() {
        let err = to_withdrawals(vec![U256::from(1), U256::from(2)], vec![U256::from(10)])
            .unwrap_err();
        assert!(matches!(err, ChainError::Malformed(_)), "unexpected error: {err}");
    }

    #[test]
    fn ledger_arrays_are_zipped_in_order() {
        let withdrawals = to_withdrawals(
            vec![U256::from(1), U256::from(2)],
            vec![U256::from(10), U256::from(20)],
        )
        .unwrap();

        assert_eq!(
            withdrawals,
            vec![
                PendingWithdrawal::new(U256::from(1), 10),
                PendingWithdrawal::new(U256::from(2), 20),
            ]
        );
    }

    #[test]
    fn oversized_counts_are_rejected() {
        assert_eq!(to_usize(U256::from(3), "count").unwrap(), 3);
        assert!(to_usize(U256::MAX, "count").is_err());
    }
}
