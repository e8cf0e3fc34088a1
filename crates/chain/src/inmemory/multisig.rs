//! In-memory governance multisig with a confirmation threshold and a timelock.

use std::sync::Arc;

use alloy::primitives::{Address, Bytes, TxHash, U256};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    errors::{ChainError, ChainResult},
    inmemory::tx_hash,
    traits::MultisigContract,
    types::ProposalId,
};

/// A call executed by [`InMemoryMultisig`] when a proposal runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedCall {
    /// Proposal the call belonged to.
    pub proposal: ProposalId,

    /// Destination contract.
    pub destination: Address,

    /// Value sent along.
    pub value: U256,

    /// ABI-encoded call data.
    pub payload: Bytes,
}

#[derive(Debug, Clone)]
struct Proposal {
    destinations: Vec<Address>,
    values: Vec<U256>,
    payloads: Vec<Bytes>,
    confirmations: Vec<Address>,
    scheduled_at: Option<u64>,
    executed: bool,
}

#[derive(Debug, Default)]
struct MultisigState {
    owners: Vec<Address>,
    required: usize,
    delay: u64,
    now: u64,
    proposals: Vec<Proposal>,
    executed: Vec<ExecutedCall>,
    txs: u64,
}

impl MultisigState {
    fn proposal(&self, id: ProposalId) -> ChainResult<&Proposal> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.proposals.get(index))
            .ok_or_else(|| ChainError::Rejected(format!("proposal {id} does not exist")))
    }

    fn proposal_mut(&mut self, id: ProposalId) -> ChainResult<&mut Proposal> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.proposals.get_mut(index))
            .ok_or_else(|| ChainError::Rejected(format!("proposal {id} does not exist")))
    }

    fn ensure_owner(&self, sender: Address) -> ChainResult<()> {
        if self.owners.contains(&sender) {
            Ok(())
        } else {
            Err(ChainError::Rejected(format!("{sender} is not an owner")))
        }
    }

    fn timelock_reached(&self, proposal: &Proposal) -> bool {
        proposal
            .scheduled_at
            .is_some_and(|at| self.now >= at.saturating_add(self.delay))
    }
}

/// Shared in-memory multisig. Each handle acts on behalf of one sender; handles created with
/// [`InMemoryMultisig::as_sender`] share the same proposals.
#[derive(Debug, Clone)]
pub struct InMemoryMultisig {
    sender: Address,
    state: Arc<RwLock<MultisigState>>,
}

impl InMemoryMultisig {
    /// Creates a multisig with the given owners, confirmation threshold and timelock delay. The
    /// returned handle sends as the first owner.
    pub fn new(owners: Vec<Address>, required: usize, delay: u64) -> Self {
        let sender = owners.first().copied().unwrap_or(Address::ZERO);
        let state = MultisigState {
            owners,
            required,
            delay,
            ..Default::default()
        };

        Self {
            sender,
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// A handle onto the same multisig that sends as `sender`.
    pub fn as_sender(&self, sender: Address) -> Self {
        Self {
            sender,
            state: self.state.clone(),
        }
    }

    /// Sets the current time.
    pub async fn set_now(&self, now: u64) {
        self.state.write().await.now = now;
    }

    /// Calls made by executed proposals, in execution order.
    pub async fn executed(&self) -> Vec<ExecutedCall> {
        self.state.read().await.executed.clone()
    }

    async fn transact<F>(&self, f: F) -> ChainResult<TxHash>
    where
        F: FnOnce(&mut MultisigState, Address) -> ChainResult<()> + Send,
    {
        let mut state = self.state.write().await;
        state.ensure_owner(self.sender)?;
        f(&mut state, self.sender)?;
        state.txs += 1;

        Ok(tx_hash(state.txs))
    }
}

#[async_trait]
impl MultisigContract for InMemoryMultisig {
    async fn submit_proposal(
        &self,
        destinations: Vec<Address>,
        values: Vec<U256>,
        payloads: Vec<Bytes>,
    ) -> ChainResult<ProposalId> {
        if destinations.len() != values.len() || destinations.len() != payloads.len() {
            return Err(ChainError::Rejected(
                "proposal arrays must have the same length".to_string(),
            ));
        }

        let mut state = self.state.write().await;
        state.ensure_owner(self.sender)?;
        state.proposals.push(Proposal {
            destinations,
            values,
            payloads,
            confirmations: vec![self.sender],
            scheduled_at: None,
            executed: false,
        });
        state.txs += 1;

        Ok(ProposalId::from(state.proposals.len() - 1))
    }

    async fn confirm_proposal(&self, id: ProposalId) -> ChainResult<TxHash> {
        self.transact(|state, sender| {
            let proposal = state.proposal_mut(id)?;
            if proposal.confirmations.contains(&sender) {
                return Err(ChainError::Rejected(format!(
                    "proposal {id} already confirmed by {sender}"
                )));
            }
            proposal.confirmations.push(sender);

            Ok(())
        })
        .await
    }

    async fn revoke_confirmation(&self, id: ProposalId) -> ChainResult<TxHash> {
        self.transact(|state, sender| {
            let proposal = state.proposal_mut(id)?;
            if proposal.scheduled_at.is_some() {
                return Err(ChainError::Rejected(format!("proposal {id} is scheduled")));
            }
            let before = proposal.confirmations.len();
            proposal.confirmations.retain(|owner| *owner != sender);
            if proposal.confirmations.len() == before {
                return Err(ChainError::Rejected(format!(
                    "proposal {id} not confirmed by {sender}"
                )));
            }

            Ok(())
        })
        .await
    }

    async fn schedule_proposal(&self, id: ProposalId) -> ChainResult<TxHash> {
        self.transact(|state, _| {
            let (now, required) = (state.now, state.required);
            let proposal = state.proposal_mut(id)?;
            if proposal.confirmations.len() < required {
                return Err(ChainError::Rejected(format!(
                    "proposal {id} is not fully confirmed"
                )));
            }
            if proposal.scheduled_at.is_some() {
                return Err(ChainError::Rejected(format!(
                    "proposal {id} is already scheduled"
                )));
            }
            proposal.scheduled_at = Some(now);

            Ok(())
        })
        .await
    }

    async fn execute_proposal(&self, id: ProposalId) -> ChainResult<TxHash> {
        self.transact(|state, _| {
            let proposal = state.proposal(id)?;
            if !state.timelock_reached(proposal) {
                return Err(ChainError::Rejected(format!(
                    "proposal {id} timelock not reached"
                )));
            }
            if proposal.executed {
                return Err(ChainError::Rejected(format!(
                    "proposal {id} already executed"
                )));
            }

            let calls = proposal
                .destinations
                .iter()
                .zip(&proposal.values)
                .zip(&proposal.payloads)
                .map(|((destination, value), payload)| ExecutedCall {
                    proposal: id,
                    destination: *destination,
                    value: *value,
                    payload: payload.clone(),
                })
                .collect::<Vec<_>>();
            state.executed.extend(calls);
            state.proposal_mut(id)?.executed = true;

            Ok(())
        })
        .await
    }

    async fn is_fully_confirmed(&self, id: ProposalId) -> ChainResult<bool> {
        let state = self.state.read().await;
        Ok(state.proposal(id)?.confirmations.len() >= state.required)
    }

    async fn is_scheduled(&self, id: ProposalId) -> ChainResult<bool> {
        Ok(self.state.read().await.proposal(id)?.scheduled_at.is_some())
    }

    async fn is_proposal_timelock_reached(&self, id: ProposalId) -> ChainResult<bool> {
        let state = self.state.read().await;
        let proposal = state.proposal(id)?;
        Ok(state.timelock_reached(proposal))
    }

    async fn owners(&self) -> ChainResult<Vec<Address>> {
        Ok(self.state.read().await.owners.clone())
    }

    async fn confirmations(&self, id: ProposalId) -> ChainResult<Vec<Address>> {
        Ok(self.state.read().await.proposal(id)?.confirmations.clone())
    }

    async fn is_confirmed_by(&self, id: ProposalId, owner: Address) -> ChainResult<bool> {
        Ok(self
            .state
            .read()
            .await
            .proposal(id)?
            .confirmations
            .contains(&owner))
    }

    async fn is_owner(&self, address: Address) -> ChainResult<bool> {
        Ok(self.state.read().await.owners.contains(&address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn proposal_runs_after_threshold_and_delay() {
        let (a, b) = (Address::repeat_byte(1), Address::repeat_byte(2));
        let multisig = InMemoryMultisig::new(vec![a, b], 2, 100);

        let id = multisig
            .submit_proposal(
                vec![Address::repeat_byte(9)],
                vec![U256::ZERO],
                vec![Bytes::from_static(&[0xde, 0xad])],
            )
            .await
            .unwrap();
        assert!(!multisig.is_fully_confirmed(id).await.unwrap());
        assert!(multisig.schedule_proposal(id).await.is_err());

        multisig.as_sender(b).confirm_proposal(id).await.unwrap();
        multisig.schedule_proposal(id).await.unwrap();
        assert!(multisig.execute_proposal(id).await.is_err());

        multisig.set_now(100).await;
        multisig.execute_proposal(id).await.unwrap();

        let executed = multisig.executed().await;
        assert_eq!(executed.len(), 1);
        assert_eq!(executed[0].destination, Address::repeat_byte(9));
    }

    #[tokio::test]
    async fn duplicate_confirmation_is_rejected() {
        let a = Address::repeat_byte(1);
        let multisig = InMemoryMultisig::new(vec![a], 1, 0);
        let id = multisig
            .submit_proposal(vec![], vec![], vec![])
            .await
            .unwrap();

        assert!(multisig.confirm_proposal(id).await.is_err());
        multisig.revoke_confirmation(id).await.unwrap();
        assert!(multisig.revoke_confirmation(id).await.is_err());
    }

    #[tokio::test]
    async fn strangers_cannot_submit() {
        let multisig = InMemoryMultisig::new(vec![Address::repeat_byte(1)], 1, 0);
        let result = multisig
            .as_sender(Address::repeat_byte(7))
            .submit_proposal(vec![], vec![], vec![])
            .await;

        assert!(result.is_err());
    }
}
