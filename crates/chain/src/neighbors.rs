//! Computes the lesser/greater hints the election contract needs to re-sort a group after its
//! votes change.

use alloy::primitives::{Address, U256};

use crate::{
    errors::{ChainError, ChainResult},
    types::{GroupVotes, LesserGreater, VoteDelta},
};

/// Finds the neighbours `group` would have in the election list once `delta` is applied to its
/// total.
///
/// `eligible` is the election's list of eligible groups with their totals. It is sorted here in
/// descending order of votes; the sort is stable so ties keep the chain's ordering. A group that
/// is not eligible is treated as holding zero votes when it gains votes. Losing votes never moves
/// it in the list, so a decrease yields no neighbours.
///
/// Walking from the top, every other group with strictly more votes than the new total is a
/// candidate for `greater` (the last one wins) and the first with less or equal votes is
/// `lesser`.
pub fn lesser_and_greater_after_vote(
    eligible: &[GroupVotes],
    group: Address,
    delta: VoteDelta,
) -> ChainResult<LesserGreater> {
    let mut sorted = eligible.to_vec();
    sorted.sort_by(|a, b| b.votes.cmp(&a.votes));

    let current = match sorted.iter().find(|entry| entry.group == group) {
        Some(entry) => entry.votes,
        None if matches!(delta, VoteDelta::Decrease(_)) => return Ok(LesserGreater::default()),
        None => U256::ZERO,
    };

    let new_total = delta.apply(current).ok_or(ChainError::VoteUnderflow {
        group,
        total: current,
        decrease: delta.amount(),
    })?;

    let mut neighbors = LesserGreater::default();
    for entry in sorted.iter().filter(|entry| entry.group != group) {
        if entry.votes <= new_total {
            neighbors.lesser = entry.group;
            break;
        }
        neighbors.greater = entry.group;
    }

    Ok(neighbors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn votes(byte: u8, amount: u64) -> GroupVotes {
        GroupVotes {
            group: Address::repeat_byte(byte),
            votes: U256::from(amount),
        }
    }

    fn list() -> Vec<GroupVotes> {
        vec![votes(1, 100), votes(2, 80), votes(3, 50), votes(4, 10)]
    }

    #[test]
    fn zero_delta_keeps_current_neighbors() {
        let neighbors =
            lesser_and_greater_after_vote(&list(), Address::repeat_byte(2), VoteDelta::Increase(U256::ZERO))
                .unwrap();

        assert_eq!(neighbors.greater, Address::repeat_byte(1));
        assert_eq!(neighbors.lesser, Address::repeat_byte(3));
    }

    #[test]
    fn decrease_moves_group_down() {
        // 80 - 45 = 35 lands between 50 and 10
        let neighbors = lesser_and_greater_after_vote(
            &list(),
            Address::repeat_byte(2),
            VoteDelta::Decrease(U256::from(45)),
        )
        .unwrap();

        assert_eq!(neighbors.greater, Address::repeat_byte(3));
        assert_eq!(neighbors.lesser, Address::repeat_byte(4));
    }

    #[test]
    fn increase_to_top_has_no_greater() {
        let neighbors = lesser_and_greater_after_vote(
            &list(),
            Address::repeat_byte(3),
            VoteDelta::Increase(U256::from(60)),
        )
        .unwrap();

        assert_eq!(neighbors.greater, Address::ZERO);
        assert_eq!(neighbors.lesser, Address::repeat_byte(1));
    }

    #[test]
    fn decrease_to_bottom_has_no_lesser() {
        let neighbors = lesser_and_greater_after_vote(
            &list(),
            Address::repeat_byte(1),
            VoteDelta::Decrease(U256::from(95)),
        )
        .unwrap();

        assert_eq!(neighbors.greater, Address::repeat_byte(4));
        assert_eq!(neighbors.lesser, Address::ZERO);
    }

    #[test]
    fn ties_rank_below_existing_groups() {
        // equal totals count as lesser
        let neighbors = lesser_and_greater_after_vote(
            &list(),
            Address::repeat_byte(4),
            VoteDelta::Increase(U256::from(40)),
        )
        .unwrap();

        assert_eq!(neighbors.greater, Address::repeat_byte(2));
        assert_eq!(neighbors.lesser, Address::repeat_byte(3));
    }

    #[test]
    fn unsorted_input_is_ranked() {
        let mut shuffled = list();
        shuffled.reverse();

        let neighbors = lesser_and_greater_after_vote(
            &shuffled,
            Address::repeat_byte(2),
            VoteDelta::Increase(U256::ZERO),
        )
        .unwrap();

        assert_eq!(neighbors.greater, Address::repeat_byte(1));
        assert_eq!(neighbors.lesser, Address::repeat_byte(3));
    }

    #[test]
    fn ineligible_group_starts_from_zero() {
        let neighbors = lesser_and_greater_after_vote(
            &list(),
            Address::repeat_byte(9),
            VoteDelta::Increase(U256::from(60)),
        )
        .unwrap();

        assert_eq!(neighbors.greater, Address::repeat_byte(1));
        assert_eq!(neighbors.lesser, Address::repeat_byte(3));
    }

    #[test]
    fn ineligible_group_decrease_has_no_neighbors() {
        let neighbors = lesser_and_greater_after_vote(
            &list(),
            Address::repeat_byte(9),
            VoteDelta::Decrease(U256::from(25)),
        )
        .unwrap();

        assert_eq!(neighbors, LesserGreater::default());
    }

    #[test]
    fn underflow_is_an_error() {
        let err = lesser_and_greater_after_vote(
            &list(),
            Address::repeat_byte(4),
            VoteDelta::Decrease(U256::from(11)),
        )
        .unwrap_err();

        assert!(
            matches!(err, ChainError::VoteUnderflow { total, decrease, .. } if total == U256::from(10) && decrease == U256::from(11)),
            "unexpected error: {err}"
        );
    }
}
