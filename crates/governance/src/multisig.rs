//! Drives a proposal through the multisig's lifecycle:
//! `Submitted -> Confirmed -> FullyConfirmed -> Scheduled -> TimelockReached -> executed`.
//!
//! Nothing is remembered between calls; the stage of a proposal is always read from the chain.
//! A proposal that is never executed simply stays where it is.

use std::fmt;

use alloy::primitives::{Address, TxHash};
use staked_celo_chain::{types::ProposalId, MultisigContract};
use tracing::info;

use crate::{
    composer::ProposalBatch,
    errors::{GovernanceResult, Precondition},
};

/// Where a proposal stands, as far as the multisig's reads tell.
///
/// The multisig has no read for execution, so an executed proposal keeps reporting
/// [`ProposalStage::TimelockReached`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalStage {
    /// Submitted without any standing confirmation.
    Submitted,

    /// Confirmed by some owners, below the threshold.
    Confirmed,

    /// The confirmation threshold is met.
    FullyConfirmed,

    /// The timelock is running.
    Scheduled,

    /// The timelock has elapsed; the proposal can be executed, or already was.
    TimelockReached,
}

impl fmt::Display for ProposalStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            ProposalStage::Submitted => "submitted",
            ProposalStage::Confirmed => "confirmed",
            ProposalStage::FullyConfirmed => "fully confirmed",
            ProposalStage::Scheduled => "scheduled",
            ProposalStage::TimelockReached => "timelock reached",
        };

        f.write_str(stage)
    }
}

/// A snapshot of a proposal for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalStatus {
    /// The proposal.
    pub id: ProposalId,

    /// Its stage.
    pub stage: ProposalStage,

    /// Owners that currently confirm it.
    pub confirmations: Vec<Address>,
}

/// Sequences multisig calls and checks that each lifecycle step is allowed before sending it.
#[derive(Debug, Clone)]
pub struct MultisigDriver<M> {
    multisig: M,
}

impl<M> MultisigDriver<M>
where
    M: MultisigContract,
{
    /// Creates a driver over `multisig`.
    pub const fn new(multisig: M) -> Self {
        Self { multisig }
    }

    /// The underlying contract.
    pub const fn contract(&self) -> &M {
        &self.multisig
    }

    /// Submits `batch` as a new proposal and returns its id.
    pub async fn submit(&self, batch: &ProposalBatch) -> GovernanceResult<ProposalId> {
        let id = self
            .multisig
            .submit_proposal(
                batch.destinations.clone(),
                batch.values.clone(),
                batch.payloads.clone(),
            )
            .await?;

        info!(%id, calls = batch.len(), "submitted proposal");
        Ok(id)
    }

    /// Confirms the proposal. Confirming twice is rejected by the contract.
    pub async fn confirm(&self, id: ProposalId) -> GovernanceResult<TxHash> {
        let tx_hash = self.multisig.confirm_proposal(id).await?;
        info!(%id, %tx_hash, "confirmed proposal");

        Ok(tx_hash)
    }

    /// Withdraws the sender's confirmation. Revoking an absent confirmation is rejected by the
    /// contract.
    pub async fn revoke_confirmation(&self, id: ProposalId) -> GovernanceResult<TxHash> {
        let tx_hash = self.multisig.revoke_confirmation(id).await?;
        info!(%id, %tx_hash, "revoked confirmation");

        Ok(tx_hash)
    }

    /// Whether the confirmation threshold is met.
    pub async fn is_fully_confirmed(&self, id: ProposalId) -> GovernanceResult<bool> {
        Ok(self.multisig.is_fully_confirmed(id).await?)
    }

    /// Whether the timelock has started.
    pub async fn is_scheduled(&self, id: ProposalId) -> GovernanceResult<bool> {
        Ok(self.multisig.is_scheduled(id).await?)
    }

    /// Whether the timelock has elapsed.
    pub async fn is_timelock_reached(&self, id: ProposalId) -> GovernanceResult<bool> {
        Ok(self.multisig.is_proposal_timelock_reached(id).await?)
    }

    /// Starts the timelock of a fully confirmed proposal.
    pub async fn schedule(&self, id: ProposalId) -> GovernanceResult<TxHash> {
        if !self.multisig.is_fully_confirmed(id).await? {
            return Err(Precondition::NotFullyConfirmed(id).into());
        }
        if self.multisig.is_scheduled(id).await? {
            return Err(Precondition::AlreadyScheduled(id).into());
        }

        let tx_hash = self.multisig.schedule_proposal(id).await?;
        info!(%id, %tx_hash, "scheduled proposal");

        Ok(tx_hash)
    }

    /// Executes a proposal whose timelock has elapsed.
    ///
    /// Whether it already ran cannot be read beforehand; a second execution is rejected by the
    /// contract and surfaces as a chain error.
    pub async fn execute(&self, id: ProposalId) -> GovernanceResult<TxHash> {
        if !self.multisig.is_proposal_timelock_reached(id).await? {
            return Err(Precondition::TimelockNotReached(id).into());
        }

        let tx_hash = self.multisig.execute_proposal(id).await?;
        info!(%id, %tx_hash, "executed proposal");

        Ok(tx_hash)
    }

    /// Current owners.
    pub async fn owners(&self) -> GovernanceResult<Vec<Address>> {
        Ok(self.multisig.owners().await?)
    }

    /// Owners that currently confirm the proposal.
    pub async fn confirmations(&self, id: ProposalId) -> GovernanceResult<Vec<Address>> {
        Ok(self.multisig.confirmations(id).await?)
    }

    /// Whether `owner` confirms the proposal.
    pub async fn is_confirmed_by(&self, id: ProposalId, owner: Address) -> GovernanceResult<bool> {
        Ok(self.multisig.is_confirmed_by(id, owner).await?)
    }

    /// Whether `address` is an owner.
    pub async fn is_owner(&self, address: Address) -> GovernanceResult<bool> {
        Ok(self.multisig.is_owner(address).await?)
    }

    /// Derives the stage of the proposal from the multisig's reads.
    pub async fn stage(&self, id: ProposalId) -> GovernanceResult<ProposalStage> {
        Ok(self.status(id).await?.stage)
    }

    /// Reads the stage and confirmations of the proposal.
    pub async fn status(&self, id: ProposalId) -> GovernanceResult<ProposalStatus> {
        let confirmations = self.multisig.confirmations(id).await?;

        let stage = if self.multisig.is_proposal_timelock_reached(id).await? {
            ProposalStage::TimelockReached
        } else if self.multisig.is_scheduled(id).await? {
            ProposalStage::Scheduled
        } else if self.multisig.is_fully_confirmed(id).await? {
            ProposalStage::FullyConfirmed
        } else if confirmations.is_empty() {
            ProposalStage::Submitted
        } else {
            ProposalStage::Confirmed
        };

        Ok(ProposalStatus {
            id,
            stage,
            confirmations,
        })
    }
}
