//! Finalizes unlocked withdrawals by pairing the protocol's ledger with LockedGold's.
//!
//! The two ledgers hold the same withdrawals but not necessarily at the same indices, so entries
//! are matched by value and timestamp. Every step works on freshly read ledgers since each
//! finalization shifts the indices of both.

use alloy::primitives::Address;
use staked_celo_chain::{types::PendingWithdrawal, ChainReader, ChainWriter};
use tracing::{debug, info};

use crate::errors::{Inconsistency, OrchestratorResult};

/// A ready withdrawal located in both ledgers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawalMatch {
    /// Index in the protocol ledger of the beneficiary.
    pub local_index: usize,

    /// Index in the LockedGold ledger of the protocol account.
    pub chain_index: usize,

    /// The matched entry.
    pub withdrawal: PendingWithdrawal,

    /// Length of the protocol ledger when the match was made.
    pub ledger_len: usize,
}

/// Both ledgers as read at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledgers {
    /// Pending withdrawals of the beneficiary in the protocol ledger.
    pub local: Vec<PendingWithdrawal>,

    /// Pending withdrawals of the protocol account in LockedGold.
    pub chain: Vec<PendingWithdrawal>,

    /// Time the readiness of entries is checked against.
    pub now: u64,
}

impl Ledgers {
    /// Reads both ledgers, checking that the protocol's count agrees with its list.
    pub async fn fetch<C>(chain: &C, beneficiary: Address) -> OrchestratorResult<Self>
    where
        C: ChainReader + ?Sized,
    {
        let (count, local, locked, now) = futures::try_join!(
            chain.number_pending_withdrawals(beneficiary),
            chain.pending_withdrawals(beneficiary),
            chain.locked_gold_pending_withdrawals(),
            chain.current_timestamp()
        )?;

        if count != local.len() {
            return Err(Inconsistency::WithdrawalCountMismatch {
                beneficiary,
                count,
                len: local.len(),
            }
            .into());
        }

        Ok(Self {
            local,
            chain: locked,
            now,
        })
    }

    /// The first ready entry of the protocol ledger together with its LockedGold counterpart.
    pub fn first_ready(&self, beneficiary: Address) -> OrchestratorResult<Option<WithdrawalMatch>> {
        let Some((local_index, withdrawal)) = self
            .local
            .iter()
            .enumerate()
            .find(|(_, withdrawal)| withdrawal.is_ready(self.now))
        else {
            return Ok(None);
        };

        let chain_index = self
            .chain
            .iter()
            .position(|candidate| candidate == withdrawal)
            .ok_or(Inconsistency::UnmatchedWithdrawal {
                beneficiary,
                withdrawal: *withdrawal,
            })?;

        Ok(Some(WithdrawalMatch {
            local_index,
            chain_index,
            withdrawal: *withdrawal,
            ledger_len: self.local.len(),
        }))
    }
}

/// Produces the next withdrawal to finalize for one beneficiary, reading the ledgers anew on
/// every call.
#[derive(Debug)]
pub struct ReadyWithdrawals<'a, C: ?Sized> {
    chain: &'a C,
    beneficiary: Address,
}

impl<'a, C> ReadyWithdrawals<'a, C>
where
    C: ChainReader + ?Sized,
{
    /// Creates a producer for `beneficiary`.
    pub const fn new(chain: &'a C, beneficiary: Address) -> Self {
        Self { chain, beneficiary }
    }

    /// The next ready withdrawal, or `None` once nothing is left to finalize.
    pub async fn next(&mut self) -> OrchestratorResult<Option<WithdrawalMatch>> {
        Ledgers::fetch(self.chain, self.beneficiary)
            .await?
            .first_ready(self.beneficiary)
    }
}

/// Finalizes every unlocked withdrawal of `beneficiary` and returns how many were finalized.
///
/// Stops as soon as nothing is ready. A finalization that does not shrink the protocol ledger is
/// reported rather than retried.
pub async fn settle_all_ready<C>(chain: &C, beneficiary: Address) -> OrchestratorResult<usize>
where
    C: ChainReader + ChainWriter + ?Sized,
{
    let mut ready = ReadyWithdrawals::new(chain, beneficiary);
    let mut settled = 0;

    while let Some(found) = ready.next().await? {
        let tx_hash = chain
            .finish_pending_withdrawal(beneficiary, found.local_index, found.chain_index)
            .await?;
        debug!(
            %beneficiary,
            local_index = found.local_index,
            chain_index = found.chain_index,
            value = %found.withdrawal.value,
            %tx_hash,
            "finalized withdrawal"
        );

        let len = chain.number_pending_withdrawals(beneficiary).await?;
        if len >= found.ledger_len {
            return Err(Inconsistency::SettlementStalled { beneficiary, len }.into());
        }
        settled += 1;
    }

    info!(%beneficiary, %settled, "settled ready withdrawals");
    Ok(settled)
}

/// Runs [`settle_all_ready`] for each beneficiary in turn and returns the total.
pub async fn settle_all_ready_for_all<C>(
    chain: &C,
    beneficiaries: &[Address],
) -> OrchestratorResult<usize>
where
    C: ChainReader + ChainWriter + ?Sized,
{
    let mut total = 0;
    for beneficiary in beneficiaries {
        total += settle_all_ready(chain, *beneficiary).await?;
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use staked_celo_chain::inmemory::{InMemoryChain, RecordedCall};

    use super::*;
    use crate::{
        errors::OrchestratorError,
        testing::{addr, u, ACCOUNT, BENEFICIARY},
    };

    fn withdrawal(value: u64, timestamp: u64) -> PendingWithdrawal {
        PendingWithdrawal::new(u(value), timestamp)
    }

    async fn chain_with(local: &[PendingWithdrawal], locked: &[PendingWithdrawal]) -> InMemoryChain {
        let chain = InMemoryChain::new(ACCOUNT);
        chain.set_now(1_000).await;
        chain.set_pending_withdrawals(BENEFICIARY, local).await;
        chain.set_locked_gold_withdrawals(locked).await;
        chain
    }

    fn finalized(calls: &[RecordedCall]) -> Vec<(PendingWithdrawal, PendingWithdrawal)> {
        calls
            .iter()
            .filter_map(|call| match call {
                RecordedCall::FinishPendingWithdrawal { local, chain, .. } => Some((*local, *chain)),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn reverse_ordered_ledgers_are_matched_by_value() {
        let (a, b) = (withdrawal(10, 100), withdrawal(20, 200));
        let chain = chain_with(&[a, b], &[b, a]).await;

        let settled = settle_all_ready(&chain, BENEFICIARY).await.unwrap();

        assert_eq!(settled, 2);
        assert!(chain.pending_withdrawals(BENEFICIARY).await.unwrap().is_empty());
        assert!(chain.locked_gold_pending_withdrawals().await.unwrap().is_empty());

        let calls = chain.calls().await;
        assert_eq!(finalized(&calls), vec![(a, a), (b, b)]);
        assert!(matches!(
            calls[0],
            RecordedCall::FinishPendingWithdrawal {
                local_index: 0,
                chain_index: 1,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn removed_entries_always_match() {
        let other = withdrawal(7, 50);
        let entries = [withdrawal(5, 10), withdrawal(5, 20), withdrawal(6, 10)];
        let chain = chain_with(
            &entries,
            &[other, entries[2], entries[0], entries[1]],
        )
        .await;

        settle_all_ready(&chain, BENEFICIARY).await.unwrap();

        for (local, chain_entry) in finalized(&chain.calls().await) {
            assert_eq!(local, chain_entry);
        }
        assert_eq!(
            chain.locked_gold_pending_withdrawals().await.unwrap(),
            vec![other]
        );
    }

    #[tokio::test]
    async fn settling_twice_finalizes_nothing_new() {
        let chain = chain_with(
            &[withdrawal(1, 500), withdrawal(2, 5_000)],
            &[withdrawal(2, 5_000), withdrawal(1, 500)],
        )
        .await;

        assert_eq!(settle_all_ready(&chain, BENEFICIARY).await.unwrap(), 1);
        assert_eq!(settle_all_ready(&chain, BENEFICIARY).await.unwrap(), 0);
        assert_eq!(
            chain.pending_withdrawals(BENEFICIARY).await.unwrap(),
            vec![withdrawal(2, 5_000)]
        );
    }

    #[tokio::test]
    async fn unlock_time_is_inclusive() {
        let chain = chain_with(&[withdrawal(1, 1_000)], &[withdrawal(1, 1_000)]).await;
        assert_eq!(settle_all_ready(&chain, BENEFICIARY).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn missing_counterpart_is_inconsistent() {
        let chain = chain_with(&[withdrawal(1, 100)], &[withdrawal(1, 101)]).await;

        let err = settle_all_ready(&chain, BENEFICIARY).await.unwrap_err();
        assert!(
            matches!(
                err,
                OrchestratorError::StateInconsistency(Inconsistency::UnmatchedWithdrawal { .. })
            ),
            "unexpected error: {err}"
        );
        assert!(chain.calls().await.is_empty());
    }

    #[tokio::test]
    async fn count_mismatch_is_inconsistent() {
        let chain = chain_with(&[withdrawal(1, 100)], &[withdrawal(1, 100)]).await;
        chain.set_reported_withdrawal_count(BENEFICIARY, 2).await;

        let err = settle_all_ready(&chain, BENEFICIARY).await.unwrap_err();
        assert!(
            matches!(
                err,
                OrchestratorError::StateInconsistency(Inconsistency::WithdrawalCountMismatch {
                    count: 2,
                    len: 1,
                    ..
                })
            ),
            "unexpected error: {err}"
        );
    }

    #[tokio::test]
    async fn stalled_finalization_does_not_loop() {
        let chain = chain_with(&[withdrawal(1, 100)], &[withdrawal(1, 100)]).await;
        chain.stall_finalization().await;

        let err = settle_all_ready(&chain, BENEFICIARY).await.unwrap_err();
        assert!(
            matches!(
                err,
                OrchestratorError::StateInconsistency(Inconsistency::SettlementStalled {
                    len: 1,
                    ..
                })
            ),
            "unexpected error: {err}"
        );
        assert_eq!(chain.calls().await.len(), 1);
    }

    #[tokio::test]
    async fn settles_every_beneficiary() {
        let other = addr(0xcc);
        let chain = chain_with(&[withdrawal(1, 100)], &[withdrawal(1, 100), withdrawal(3, 300)]).await;
        chain
            .set_pending_withdrawals(other, &[withdrawal(3, 300)])
            .await;

        let settled = settle_all_ready_for_all(&chain, &[BENEFICIARY, other])
            .await
            .unwrap();

        assert_eq!(settled, 2);
        assert!(chain.locked_gold_pending_withdrawals().await.unwrap().is_empty());
    }

    #[test]
    fn first_ready_skips_locked_entries() {
        let ledgers = Ledgers {
            local: vec![withdrawal(1, 2_000), withdrawal(2, 900)],
            chain: vec![withdrawal(2, 900), withdrawal(1, 2_000)],
            now: 1_000,
        };

        let found = ledgers.first_ready(BENEFICIARY).unwrap().unwrap();
        assert_eq!(found.local_index, 1);
        assert_eq!(found.chain_index, 0);
        assert_eq!(found.ledger_len, 2);
    }
}
