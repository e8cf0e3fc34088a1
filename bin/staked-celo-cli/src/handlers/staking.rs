use alloy::primitives::Address;
use anyhow::{bail, Result};
use staked_celo_chain::types::SpecificGroupSource;
use staked_celo_orchestrator::{
    activation::activate_ready,
    group_set::resolve_working_groups,
    revocation::{
        plan_revocation, revoke_scheduled, withdraw_all_for_beneficiary,
        withdraw_for_beneficiary, RevocationOutcome, RevocationPlan,
    },
    withdrawal::settle_all_ready_for_all,
};
use tracing::warn;

use super::Session;

pub(crate) async fn handle_groups(session: &Session, voted_only: bool) -> Result<()> {
    let chain = session.reader().await?;
    let source = if voted_only {
        SpecificGroupSource::VotedGroups
    } else {
        SpecificGroupSource::Strategies
    };

    for group in &resolve_working_groups(&chain, source).await? {
        println!("{group}");
    }

    Ok(())
}

pub(crate) async fn handle_plan_revocation(
    session: &Session,
    group: Address,
    beneficiary: Option<Address>,
) -> Result<()> {
    let chain = session.reader().await?;
    let plan = plan_revocation(&chain, group, beneficiary).await?;
    print_plan(&plan);

    Ok(())
}

pub(crate) async fn handle_withdraw(
    session: &Session,
    beneficiary: Address,
    group: Option<Address>,
) -> Result<()> {
    let chain = session.writer().await?;

    let outcomes = match group {
        Some(group) => vec![withdraw_for_beneficiary(&chain, group, beneficiary).await?],
        None => {
            let groups = resolve_working_groups(&chain, SpecificGroupSource::Strategies).await?;
            withdraw_all_for_beneficiary(&chain, beneficiary, &groups).await?
        }
    };

    if outcomes.is_empty() {
        println!("nothing scheduled for {beneficiary}");
    }
    outcomes.iter().for_each(print_outcome);

    Ok(())
}

pub(crate) async fn handle_revoke(session: &Session, group: Address) -> Result<()> {
    let chain = session.writer().await?;
    let outcome = revoke_scheduled(&chain, group).await?;
    print_outcome(&outcome);

    Ok(())
}

pub(crate) async fn handle_finish_withdrawals(
    session: &Session,
    beneficiaries: &[Address],
) -> Result<()> {
    let chain = session.writer().await?;
    let settled = settle_all_ready_for_all(&chain, beneficiaries).await?;
    println!("finalized {settled} withdrawals");

    Ok(())
}

pub(crate) async fn handle_activate(session: &Session, groups: Vec<Address>) -> Result<()> {
    let chain = session.writer().await?;
    let groups = if groups.is_empty() {
        resolve_working_groups(&chain, SpecificGroupSource::Strategies)
            .await?
            .to_vec()
    } else {
        groups
    };

    let results = activate_ready(&chain, &groups).await;
    let mut failed = 0;
    for result in &results {
        match (&result.candidate, &result.outcome) {
            (Some(candidate), Ok((hints, tx_hash))) => println!(
                "{}: activated {} (lesser {}, greater {}) in {tx_hash}",
                result.group, candidate.scheduled, hints.lesser, hints.greater
            ),
            (_, Ok(_)) => println!("{}: activated", result.group),
            (_, Err(err)) => {
                failed += 1;
                warn!(group = %result.group, %err, "activation failed");
                println!("{}: failed: {err}", result.group);
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} activations failed", results.len());
    }

    Ok(())
}

fn print_plan(plan: &RevocationPlan) {
    println!("group:        {}", plan.group);
    println!("total:        {}", plan.total);
    println!("immediate:    {}", plan.split.immediate);
    println!("from pending: {}", plan.split.from_pending);
    println!("from active:  {}", plan.split.from_active);

    match &plan.hints {
        Some(hints) => {
            println!(
                "pending:      lesser {} greater {}",
                hints.after_pending.lesser, hints.after_pending.greater
            );
            println!(
                "active:       lesser {} greater {}",
                hints.after_active.lesser, hints.after_active.greater
            );
            println!("group index:  {}", hints.group_index);
        }
        None => println!("hints:        none, election list untouched"),
    }
}

fn print_outcome(outcome: &RevocationOutcome) {
    println!(
        "{}: removed {} in {}",
        outcome.plan.group, outcome.plan.total, outcome.tx_hash
    );
}
