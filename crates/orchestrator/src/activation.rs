//! Activates pending votes and casts scheduled votes, group by group.

use alloy::primitives::{Address, TxHash, U256};
use futures::future::join_all;
use staked_celo_chain::{
    types::{LesserGreater, VoteDelta},
    ChainReader, ChainWriter,
};
use tracing::{debug, info, warn};

use crate::errors::OrchestratorResult;

/// Activation state of one group as read before any transaction is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivationCandidate {
    /// The group.
    pub group: Address,

    /// Whether pending votes for the group can be activated.
    pub can_activate: bool,

    /// Votes scheduled for the group.
    pub scheduled: U256,
}

impl ActivationCandidate {
    /// Whether there is anything to do for the group.
    pub fn needs_activation(&self) -> bool {
        self.can_activate || !self.scheduled.is_zero()
    }
}

/// Result of activating one group.
#[derive(Debug)]
pub struct GroupActivation {
    /// The group.
    pub group: Address,

    /// The state the group was activated from, `None` if it could not be read.
    pub candidate: Option<ActivationCandidate>,

    /// Hints and transaction on success; the error otherwise.
    pub outcome: OrchestratorResult<(LesserGreater, TxHash)>,
}

impl GroupActivation {
    /// Whether the activation went through.
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

async fn read_candidate<C>(chain: &C, group: Address) -> OrchestratorResult<ActivationCandidate>
where
    C: ChainReader + ?Sized,
{
    let (can_activate, scheduled) = futures::try_join!(
        chain.has_activatable_pending_votes(group),
        chain.scheduled_votes_for_group(group)
    )?;

    Ok(ActivationCandidate {
        group,
        can_activate,
        scheduled,
    })
}

/// Reads the activation state of every group concurrently, in input order. A failed read only
/// affects the group it was for.
pub async fn activation_candidates<C>(
    chain: &C,
    groups: &[Address],
) -> Vec<OrchestratorResult<ActivationCandidate>>
where
    C: ChainReader + ?Sized,
{
    join_all(groups.iter().map(|&group| read_candidate(chain, group))).await
}

async fn activate_group<C>(
    chain: &C,
    candidate: &ActivationCandidate,
) -> OrchestratorResult<(LesserGreater, TxHash)>
where
    C: ChainReader + ChainWriter + ?Sized,
{
    let delta = VoteDelta::Increase(candidate.scheduled);
    let hints = chain
        .find_lesser_and_greater_after_vote(candidate.group, delta)
        .await?;
    let tx_hash = chain.activate_and_vote(candidate.group, hints).await?;

    Ok((hints, tx_hash))
}

/// Activates every group in `groups` that has activatable pending votes or scheduled votes.
///
/// Transactions are sent one at a time, each with hints computed right before it. A group whose
/// state cannot be read or whose activation fails is reported in its result and the remaining
/// groups are still processed. Groups with nothing to do are left out of the results.
pub async fn activate_ready<C>(chain: &C, groups: &[Address]) -> Vec<GroupActivation>
where
    C: ChainReader + ChainWriter + ?Sized,
{
    let reads = activation_candidates(chain, groups).await;

    let mut results = Vec::new();
    for (&group, read) in groups.iter().zip(reads) {
        let candidate = match read {
            Ok(candidate) if !candidate.needs_activation() => continue,
            Ok(candidate) => candidate,
            Err(err) => {
                warn!(%group, %err, "failed to read activation state");
                results.push(GroupActivation {
                    group,
                    candidate: None,
                    outcome: Err(err),
                });
                continue;
            }
        };

        let outcome = activate_group(chain, &candidate).await;
        match &outcome {
            Ok((_, tx_hash)) => info!(
                %group,
                scheduled = %candidate.scheduled,
                %tx_hash,
                "activated group"
            ),
            Err(err) => warn!(%group, %err, "failed to activate group"),
        }

        results.push(GroupActivation {
            group,
            candidate: Some(candidate),
            outcome,
        });
    }

    debug!(
        activated = results.iter().filter(|result| result.is_success()).count(),
        attempted = results.len(),
        "activation round complete"
    );
    results
}
