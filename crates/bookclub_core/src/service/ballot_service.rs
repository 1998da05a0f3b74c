//! Ballot submission service.
//!
//! # Responsibility
//! - Validate a member's ballot against the round's voting method.
//! - Replace the member's prior ballot atomically and trigger rescoring.
//!
//! # Invariants
//! - Validation happens entirely before any write.
//! - Submissions always replace the full ballot; an empty ballot withdraws
//!   the member's votes.

use crate::model::member::Actor;
use crate::model::proposal::ProposalId;
use crate::model::round::{RoundId, RoundStatus, VotingMethod};
use crate::model::vote::{BallotEntry, Vote, APPROVAL_RANK, MAX_RANK, MAX_RANKED_BALLOT, MIN_RANK};
use crate::model::ValidationError;
use crate::repo::ballot_repo::BallotRepository;
use crate::service::{ServiceError, ServiceResult};
use log::debug;
use std::collections::HashSet;

/// Use-case service for vote submission.
pub struct BallotService<R: BallotRepository> {
    repo: R,
}

impl<R: BallotRepository> BallotService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Replaces the acting member's full ballot for the round.
    ///
    /// Validation order: round exists, round open, per-method ballot shape,
    /// every referenced proposal belongs to the round. Only then is the
    /// replace-and-rescore transaction executed.
    pub fn submit_ballot(
        &mut self,
        actor: &Actor,
        round_id: RoundId,
        ballot: &[BallotEntry],
    ) -> ServiceResult<()> {
        let (status, method) =
            self.repo
                .voting_context(round_id)?
                .ok_or(ServiceError::NotFound {
                    entity: "round",
                    id: round_id,
                })?;
        if status != RoundStatus::Open {
            return Err(ServiceError::Policy(
                "round is not open for voting".to_string(),
            ));
        }

        let rows = normalize_ballot(method, ballot)?;

        if !rows.is_empty() {
            let ids: Vec<ProposalId> = rows.iter().map(|(id, _)| *id).collect();
            let matching = self.repo.count_proposals_in_round(round_id, &ids)?;
            if matching != ids.len() {
                return Err(ServiceError::Validation(ValidationError::new(
                    "proposal_id",
                    "one or more proposals do not belong to this round",
                )));
            }
        }

        if !self
            .repo
            .replace_ballot(round_id, actor.member_id, &rows)?
        {
            return Err(ServiceError::Policy(
                "round is not open for voting".to_string(),
            ));
        }
        debug!(
            "event=ballot_submit module=service status=ok round={} member={} entries={}",
            round_id,
            actor.member_id,
            rows.len()
        );
        Ok(())
    }

    /// The acting member's current ballot rows, ordered by rank.
    pub fn my_votes(&self, actor: &Actor, round_id: RoundId) -> ServiceResult<Vec<Vote>> {
        self.repo
            .voting_context(round_id)?
            .ok_or(ServiceError::NotFound {
                entity: "round",
                id: round_id,
            })?;
        Ok(self.repo.member_votes(round_id, actor.member_id)?)
    }
}

/// Validates ballot shape and resolves the rank recorded for each entry.
fn normalize_ballot(
    method: VotingMethod,
    ballot: &[BallotEntry],
) -> Result<Vec<(ProposalId, u8)>, ValidationError> {
    let mut seen_proposals = HashSet::with_capacity(ballot.len());
    for entry in ballot {
        if !seen_proposals.insert(entry.proposal_id) {
            return Err(ValidationError::new(
                "proposal_id",
                "a ballot may reference each proposal at most once",
            ));
        }
    }

    match method {
        VotingMethod::Approval => Ok(ballot
            .iter()
            .map(|entry| (entry.proposal_id, APPROVAL_RANK))
            .collect()),
        VotingMethod::RankedChoice => {
            if ballot.len() > MAX_RANKED_BALLOT {
                return Err(ValidationError::new(
                    "votes",
                    format!("ranked choice allows at most {MAX_RANKED_BALLOT} votes"),
                ));
            }

            let mut seen_ranks = HashSet::with_capacity(ballot.len());
            let mut rows = Vec::with_capacity(ballot.len());
            for entry in ballot {
                let rank = entry.rank.ok_or_else(|| {
                    ValidationError::new("rank", "each ranked-choice vote requires a rank")
                })?;
                if !(MIN_RANK..=MAX_RANK).contains(&rank) {
                    return Err(ValidationError::new(
                        "rank",
                        format!("rank must be between {MIN_RANK} and {MAX_RANK}"),
                    ));
                }
                if !seen_ranks.insert(rank) {
                    return Err(ValidationError::new(
                        "rank",
                        "duplicate ranks are not allowed",
                    ));
                }
                rows.push((entry.proposal_id, rank));
            }
            Ok(rows)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::normalize_ballot;
    use crate::model::round::VotingMethod;
    use crate::model::vote::{BallotEntry, APPROVAL_RANK};
    use uuid::Uuid;

    #[test]
    fn approval_pins_ranks_to_the_canonical_marker() {
        let ballot = vec![
            BallotEntry::ranked(Uuid::new_v4(), 3),
            BallotEntry::approve(Uuid::new_v4()),
        ];
        let rows = normalize_ballot(VotingMethod::Approval, &ballot).unwrap();
        assert!(rows.iter().all(|(_, rank)| *rank == APPROVAL_RANK));
    }

    #[test]
    fn ranked_choice_rejects_missing_and_out_of_range_ranks() {
        let missing = vec![BallotEntry::approve(Uuid::new_v4())];
        let err = normalize_ballot(VotingMethod::RankedChoice, &missing).unwrap_err();
        assert_eq!(err.field, "rank");

        let out_of_range = vec![BallotEntry::ranked(Uuid::new_v4(), 4)];
        let err = normalize_ballot(VotingMethod::RankedChoice, &out_of_range).unwrap_err();
        assert_eq!(err.field, "rank");
    }

    #[test]
    fn ranked_choice_rejects_duplicate_ranks_and_oversized_ballots() {
        let duplicate = vec![
            BallotEntry::ranked(Uuid::new_v4(), 1),
            BallotEntry::ranked(Uuid::new_v4(), 1),
        ];
        let err = normalize_ballot(VotingMethod::RankedChoice, &duplicate).unwrap_err();
        assert_eq!(err.field, "rank");

        let oversized: Vec<_> = (1..=4)
            .map(|rank| BallotEntry::ranked(Uuid::new_v4(), rank))
            .collect();
        let err = normalize_ballot(VotingMethod::RankedChoice, &oversized).unwrap_err();
        assert_eq!(err.field, "votes");
    }

    #[test]
    fn duplicate_proposal_references_are_rejected_for_both_methods() {
        let proposal = Uuid::new_v4();
        let ballot = vec![
            BallotEntry::ranked(proposal, 1),
            BallotEntry::ranked(proposal, 2),
        ];
        for method in [VotingMethod::Approval, VotingMethod::RankedChoice] {
            let err = normalize_ballot(method, &ballot).unwrap_err();
            assert_eq!(err.field, "proposal_id");
        }
    }

    #[test]
    fn short_ranked_ballots_are_valid() {
        let ballot = vec![BallotEntry::ranked(Uuid::new_v4(), 2)];
        let rows = normalize_ballot(VotingMethod::RankedChoice, &ballot).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1, 2);
    }
}
