//! Pure scoring and winner selection over in-memory vote snapshots.
//!
//! # Responsibility
//! - Compute per-proposal scores for both voting methods.
//! - Select the winning proposal with deterministic tie-breaking.
//!
//! # Invariants
//! - Functions here never touch storage; repositories load a snapshot,
//!   call in, and persist the result in their own transaction.
//! - Every proposal of the round appears in the score map; zero-voted
//!   proposals are explicitly 0, never stale.
//! - Creation time is treated as a total order for tie-breaking; callers
//!   pass proposals ordered by creation so full ties resolve to the
//!   earliest-loaded proposal and nothing else.

use crate::model::proposal::{Proposal, ProposalId};
use crate::model::round::VotingMethod;
use crate::model::vote::Vote;
use std::collections::BTreeMap;

/// Points contributed by one ranked-choice vote at the given rank.
///
/// Out-of-range ranks contribute nothing rather than failing; validation
/// rejects them before they are ever persisted.
pub fn rank_weight(rank: u8) -> i64 {
    match rank {
        1 => 3,
        2 => 2,
        3 => 1,
        _ => 0,
    }
}

/// Computes the score of every proposal from the full vote set.
///
/// Approval: score = count of votes referencing the proposal.
/// Ranked-choice: score = Σ [`rank_weight`] over the proposal's votes.
///
/// Idempotent: identical inputs always produce identical scores. Votes
/// referencing proposals outside `proposals` are ignored.
pub fn score_proposals(
    method: VotingMethod,
    proposals: &[Proposal],
    votes: &[Vote],
) -> BTreeMap<ProposalId, i64> {
    let mut scores: BTreeMap<ProposalId, i64> = proposals
        .iter()
        .map(|proposal| (proposal.uuid, 0))
        .collect();

    for vote in votes {
        if let Some(score) = scores.get_mut(&vote.proposal_id) {
            *score += match method {
                VotingMethod::Approval => 1,
                VotingMethod::RankedChoice => rank_weight(vote.rank),
            };
        }
    }

    scores
}

/// Selects the winning proposal, or `None` when the round has no proposals.
///
/// Approval: highest score, ties broken by earliest creation time.
/// Ranked-choice: highest score, then most rank-1 votes, then most rank-2
/// votes, then earliest creation time.
///
/// Pure decision function: writing the winner is the lifecycle controller's
/// job.
pub fn determine_winner(
    method: VotingMethod,
    proposals: &[Proposal],
    votes: &[Vote],
) -> Option<ProposalId> {
    if proposals.is_empty() {
        return None;
    }

    let scores = score_proposals(method, proposals, votes);
    let mut rank_counts: BTreeMap<ProposalId, (i64, i64)> = BTreeMap::new();
    if method == VotingMethod::RankedChoice {
        for vote in votes {
            let entry = rank_counts.entry(vote.proposal_id).or_default();
            match vote.rank {
                1 => entry.0 += 1,
                2 => entry.1 += 1,
                _ => {}
            }
        }
    }

    let mut ordered: Vec<&Proposal> = proposals.iter().collect();
    // Stable sort: proposals arrive ordered by creation, so a tie that
    // survives every criterion keeps the earliest-loaded proposal in front.
    ordered.sort_by(|a, b| {
        let score_a = scores.get(&a.uuid).copied().unwrap_or(0);
        let score_b = scores.get(&b.uuid).copied().unwrap_or(0);
        let mut order = score_b.cmp(&score_a);

        if method == VotingMethod::RankedChoice {
            let (firsts_a, seconds_a) = rank_counts.get(&a.uuid).copied().unwrap_or((0, 0));
            let (firsts_b, seconds_b) = rank_counts.get(&b.uuid).copied().unwrap_or((0, 0));
            order = order
                .then(firsts_b.cmp(&firsts_a))
                .then(seconds_b.cmp(&seconds_a));
        }

        order.then(a.created_at.cmp(&b.created_at))
    });

    ordered.first().map(|proposal| proposal.uuid)
}

#[cfg(test)]
mod tests {
    use super::{determine_winner, rank_weight, score_proposals};
    use crate::model::proposal::Proposal;
    use crate::model::round::VotingMethod;
    use crate::model::vote::Vote;
    use uuid::Uuid;

    fn proposal(round_id: Uuid, created_at: i64) -> Proposal {
        let mut proposal = Proposal::new(round_id, Uuid::new_v4(), "book");
        proposal.created_at = created_at;
        proposal
    }

    fn vote(round_id: Uuid, member_id: Uuid, proposal_id: Uuid, rank: u8) -> Vote {
        Vote {
            round_id,
            member_id,
            proposal_id,
            rank,
            created_at: 0,
        }
    }

    #[test]
    fn rank_weights_follow_three_two_one() {
        assert_eq!(rank_weight(1), 3);
        assert_eq!(rank_weight(2), 2);
        assert_eq!(rank_weight(3), 1);
        assert_eq!(rank_weight(0), 0);
        assert_eq!(rank_weight(4), 0);
    }

    #[test]
    fn approval_scores_count_votes_and_zero_fill() {
        let round = Uuid::new_v4();
        let a = proposal(round, 100);
        let b = proposal(round, 200);
        let c = proposal(round, 300);
        let (m1, m2, m3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let votes = vec![
            vote(round, m1, a.uuid, 1),
            vote(round, m2, a.uuid, 1),
            vote(round, m3, b.uuid, 1),
        ];

        let proposals = vec![a.clone(), b.clone(), c.clone()];
        let scores = score_proposals(VotingMethod::Approval, &proposals, &votes);

        assert_eq!(scores[&a.uuid], 2);
        assert_eq!(scores[&b.uuid], 1);
        assert_eq!(scores[&c.uuid], 0);
        assert_eq!(
            determine_winner(VotingMethod::Approval, &proposals, &votes),
            Some(a.uuid)
        );
    }

    #[test]
    fn scoring_is_idempotent_for_unchanged_votes() {
        let round = Uuid::new_v4();
        let a = proposal(round, 100);
        let b = proposal(round, 200);
        let member = Uuid::new_v4();
        let votes = vec![
            vote(round, member, a.uuid, 1),
            vote(round, member, b.uuid, 2),
        ];
        let proposals = vec![a, b];

        let first = score_proposals(VotingMethod::RankedChoice, &proposals, &votes);
        let second = score_proposals(VotingMethod::RankedChoice, &proposals, &votes);
        assert_eq!(first, second);
    }

    #[test]
    fn ranked_tie_falls_through_rank_counts_to_creation_time() {
        // member1: A=1, B=2; member2: B=1, A=2 -> A=5, B=5, firsts 1-1,
        // seconds 1-1, so the earlier-created proposal wins.
        let round = Uuid::new_v4();
        let a = proposal(round, 100);
        let b = proposal(round, 200);
        let (m1, m2) = (Uuid::new_v4(), Uuid::new_v4());
        let votes = vec![
            vote(round, m1, a.uuid, 1),
            vote(round, m1, b.uuid, 2),
            vote(round, m2, b.uuid, 1),
            vote(round, m2, a.uuid, 2),
        ];
        let proposals = vec![a.clone(), b.clone()];

        let scores = score_proposals(VotingMethod::RankedChoice, &proposals, &votes);
        assert_eq!(scores[&a.uuid], 5);
        assert_eq!(scores[&b.uuid], 5);

        assert_eq!(
            determine_winner(VotingMethod::RankedChoice, &proposals, &votes),
            Some(a.uuid)
        );
    }

    #[test]
    fn ranked_tie_prefers_more_first_place_votes() {
        // A: one rank-1 and one rank-3 (4 pts); B: two rank-2 (4 pts).
        // A has more first-place votes and must win despite being newer.
        let round = Uuid::new_v4();
        let b = proposal(round, 100);
        let a = proposal(round, 200);
        let (m1, m2) = (Uuid::new_v4(), Uuid::new_v4());
        let votes = vec![
            vote(round, m1, a.uuid, 1),
            vote(round, m2, a.uuid, 3),
            vote(round, m1, b.uuid, 2),
            vote(round, m2, b.uuid, 2),
        ];
        let proposals = vec![b.clone(), a.clone()];

        let scores = score_proposals(VotingMethod::RankedChoice, &proposals, &votes);
        assert_eq!(scores[&a.uuid], 4);
        assert_eq!(scores[&b.uuid], 4);

        assert_eq!(
            determine_winner(VotingMethod::RankedChoice, &proposals, &votes),
            Some(a.uuid)
        );
    }

    #[test]
    fn no_proposals_yields_no_winner() {
        assert_eq!(determine_winner(VotingMethod::Approval, &[], &[]), None);
    }

    #[test]
    fn zero_votes_selects_earliest_proposal() {
        let round = Uuid::new_v4();
        let later = proposal(round, 500);
        let earlier = proposal(round, 100);
        let proposals = vec![earlier.clone(), later.clone()];

        assert_eq!(
            determine_winner(VotingMethod::Approval, &proposals, &[]),
            Some(earlier.uuid)
        );
    }

    #[test]
    fn votes_for_foreign_proposals_are_ignored() {
        let round = Uuid::new_v4();
        let a = proposal(round, 100);
        let foreign = Uuid::new_v4();
        let votes = vec![vote(round, Uuid::new_v4(), foreign, 1)];
        let proposals = vec![a.clone()];

        let scores = score_proposals(VotingMethod::Approval, &proposals, &votes);
        assert_eq!(scores[&a.uuid], 0);
        assert_eq!(scores.len(), 1);
    }
}
