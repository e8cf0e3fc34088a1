//! Plans and executes the removal of votes from a group, either to pay out a beneficiary or to
//! rebalance the protocol's stake.

use alloy::primitives::{Address, TxHash, U256};
use staked_celo_chain::{
    types::{RevocationHints, VoteDelta},
    ChainReader, ChainWriter,
};
use tracing::{debug, info};

use crate::{
    errors::{Inconsistency, OrchestratorResult},
    group_set::GroupWorkingSet,
};

/// How an amount to remove from a group is covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevocationSplit {
    /// Taken from votes that were scheduled but never cast.
    pub immediate: U256,

    /// Left to revoke from the election once scheduled votes are used up.
    pub remaining: U256,

    /// Part of `remaining` revoked from pending votes.
    pub from_pending: U256,

    /// Part of `remaining` revoked from active votes.
    pub from_active: U256,
}

impl RevocationSplit {
    /// Splits `total` over the group's scheduled votes first, then its pending votes, then its
    /// active votes.
    pub fn new(total: U256, scheduled: U256, pending: U256) -> Self {
        let immediate = scheduled.min(total);
        let remaining = total - immediate;
        let from_pending = remaining.min(pending);

        Self {
            immediate,
            remaining,
            from_pending,
            from_active: remaining - from_pending,
        }
    }
}

/// Everything needed to send a `revokeVotes` or `withdraw` transaction for one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationPlan {
    /// The group votes are removed from.
    pub group: Address,

    /// The amount to remove.
    pub total: U256,

    /// How `total` is covered.
    pub split: RevocationSplit,

    /// Election list hints. Absent when nothing has to be revoked from the election.
    pub hints: Option<RevocationHints>,
}

impl RevocationPlan {
    /// Hints to send with the transaction. When the election list is not touched the contract
    /// ignores them, so the zero address and index are sent.
    pub fn hints_or_default(&self) -> RevocationHints {
        self.hints.unwrap_or_default()
    }
}

/// A revocation that was planned and sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationOutcome {
    /// The plan the transaction was built from.
    pub plan: RevocationPlan,

    /// The confirmed transaction.
    pub tx_hash: TxHash,
}

/// Plans the removal of what is scheduled for `group`: the withdrawal scheduled for
/// `beneficiary` if one is given, the scheduled rebalancing revoke otherwise.
pub async fn plan_revocation<C>(
    chain: &C,
    group: Address,
    beneficiary: Option<Address>,
) -> OrchestratorResult<RevocationPlan>
where
    C: ChainReader + ?Sized,
{
    let total = match beneficiary {
        Some(beneficiary) => {
            chain
                .scheduled_withdrawals_for_group_and_beneficiary(group, beneficiary)
                .await?
        }
        None => chain.scheduled_revoke_for_group(group).await?,
    };

    plan_revocation_for_amount(chain, group, total).await
}

/// Plans the removal of `total` votes from `group`.
///
/// Only reads from the chain. When the scheduled votes cover `total` no neighbour is computed.
pub async fn plan_revocation_for_amount<C>(
    chain: &C,
    group: Address,
    total: U256,
) -> OrchestratorResult<RevocationPlan>
where
    C: ChainReader + ?Sized,
{
    if total.is_zero() {
        return Ok(RevocationPlan {
            group,
            total,
            split: RevocationSplit::new(total, U256::ZERO, U256::ZERO),
            hints: None,
        });
    }

    let scheduled = chain.scheduled_votes_for_group(group).await?;
    if scheduled >= total {
        debug!(%group, %total, %scheduled, "covered by scheduled votes");
        return Ok(RevocationPlan {
            group,
            total,
            split: RevocationSplit::new(total, scheduled, U256::ZERO),
            hints: None,
        });
    }

    let pending = chain.pending_votes_for_group(group).await?;
    let split = RevocationSplit::new(total, scheduled, pending);

    // Pending votes go first in the same transaction, so the active hints rank the group after
    // the whole remaining amount is gone.
    let after_pending = chain
        .find_lesser_and_greater_after_vote(group, VoteDelta::Decrease(split.from_pending))
        .await?;
    let after_active = chain
        .find_lesser_and_greater_after_vote(group, VoteDelta::Decrease(split.remaining))
        .await?;

    let group_index = chain
        .groups_voted_for()
        .await?
        .iter()
        .position(|voted| *voted == group)
        .ok_or(Inconsistency::GroupNotVotedFor(group))?;

    debug!(
        %group,
        %total,
        immediate = %split.immediate,
        from_pending = %split.from_pending,
        from_active = %split.from_active,
        %group_index,
        "planned revocation"
    );

    Ok(RevocationPlan {
        group,
        total,
        split,
        hints: Some(RevocationHints {
            after_pending,
            after_active,
            group_index,
        }),
    })
}

/// Withdraws what is scheduled for `beneficiary` from `group`.
pub async fn withdraw_for_beneficiary<C>(
    chain: &C,
    group: Address,
    beneficiary: Address,
) -> OrchestratorResult<RevocationOutcome>
where
    C: ChainReader + ChainWriter + ?Sized,
{
    let plan = plan_revocation(chain, group, Some(beneficiary)).await?;
    let tx_hash = chain
        .withdraw(beneficiary, group, plan.hints_or_default())
        .await?;

    info!(%group, %beneficiary, amount = %plan.total, %tx_hash, "withdrew from group");
    Ok(RevocationOutcome { plan, tx_hash })
}

/// Revokes the votes scheduled to be taken away from `group`.
pub async fn revoke_scheduled<C>(chain: &C, group: Address) -> OrchestratorResult<RevocationOutcome>
where
    C: ChainReader + ChainWriter + ?Sized,
{
    let plan = plan_revocation(chain, group, None).await?;
    let tx_hash = chain.revoke_votes(group, plan.hints_or_default()).await?;

    info!(%group, amount = %plan.total, %tx_hash, "revoked scheduled votes");
    Ok(RevocationOutcome { plan, tx_hash })
}

/// Withdraws, group by group, everything scheduled for `beneficiary`.
///
/// Each group is planned right before its transaction so the hints reflect the writes made for
/// the groups before it. Groups with nothing scheduled are skipped.
pub async fn withdraw_all_for_beneficiary<C>(
    chain: &C,
    beneficiary: Address,
    groups: &GroupWorkingSet,
) -> OrchestratorResult<Vec<RevocationOutcome>>
where
    C: ChainReader + ChainWriter + ?Sized,
{
    let mut outcomes = Vec::new();
    for &group in groups {
        let scheduled = chain
            .scheduled_withdrawals_for_group_and_beneficiary(group, beneficiary)
            .await?;
        if scheduled.is_zero() {
            continue;
        }

        outcomes.push(withdraw_for_beneficiary(chain, group, beneficiary).await?);
    }

    info!(%beneficiary, withdrawals = outcomes.len(), "withdrew scheduled amounts");
    Ok(outcomes)
}
