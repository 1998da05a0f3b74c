//! Round lifecycle service.
//!
//! # Responsibility
//! - Own round state transitions and who may propose when.
//! - Invoke the tally at the moment of closing, through the repository's
//!   transactional finalize.
//!
//! # Invariants
//! - Status never skips or moves backwards; closing goes through
//!   [`RoundService::close_round`] only, so a tally can never be bypassed.
//! - Once a round is closed, proposals are immutable.

use crate::model::member::Actor;
use crate::model::proposal::{Proposal, ProposalId};
use crate::model::round::{Round, RoundId, RoundPatch, RoundStatus, VotingMethod};
use crate::repo::round_repo::{CloseOutcome, ProposalResult, RoundRepository, RoundSummary};
use crate::service::{require_organizer, ServiceError, ServiceResult};
use log::info;
use serde::{Deserialize, Serialize};

/// Request model for creating a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRoundRequest {
    pub title: String,
    pub voting_method: VotingMethod,
    /// Optional voting deadline in epoch milliseconds.
    pub deadline: Option<i64>,
}

/// Request model for nominating a proposal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProposeRequest {
    pub title: String,
    pub author: Option<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
}

/// Round detail read model: the round plus its scoreboard-ordered proposals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundDetail {
    pub round: Round,
    pub proposals: Vec<Proposal>,
}

/// Tallied results read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResults {
    pub round: Round,
    pub proposals: Vec<ProposalResult>,
}

/// Use-case service for the round lifecycle.
pub struct RoundService<R: RoundRepository> {
    repo: R,
}

impl<R: RoundRepository> RoundService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Opens a new decision round. Organizer only.
    pub fn create_round(&self, actor: &Actor, request: &CreateRoundRequest) -> ServiceResult<Round> {
        require_organizer(actor, "creating a round")?;

        let round = Round::new(
            request.title.clone(),
            request.voting_method,
            request.deadline,
            actor.member_id,
        );
        let id = self.repo.create_round(&round)?;
        self.fetch_round(id)
    }

    /// Edits title/deadline/status. Organizer only.
    ///
    /// Status changes obey the no-skip rule, and `closed` is rejected here
    /// because closing must run the tally via [`Self::close_round`].
    pub fn update_round(
        &self,
        actor: &Actor,
        id: RoundId,
        patch: &RoundPatch,
    ) -> ServiceResult<Round> {
        require_organizer(actor, "updating a round")?;

        let round = self.fetch_round(id)?;
        if let Some(next) = patch.status {
            if next == RoundStatus::Closed {
                return Err(ServiceError::Policy(
                    "rounds are closed via the close operation, not a status edit".to_string(),
                ));
            }
            if !round.status.can_transition_to(next) {
                return Err(ServiceError::Policy(format!(
                    "round status cannot move from {:?} to {:?}",
                    round.status, next
                )));
            }
        }

        self.repo.update_round(id, patch)?;
        self.fetch_round(id)
    }

    /// Closes voting: final tally, winner selection, and the status flip
    /// happen in one guarded transaction. Organizer only.
    ///
    /// Exactly one of two racing closers succeeds; the loser receives
    /// [`ServiceError::Conflict`] and must not re-derive a winner.
    pub fn close_round(&mut self, actor: &Actor, id: RoundId) -> ServiceResult<Round> {
        require_organizer(actor, "closing a round")?;

        let round = self.fetch_round(id)?;
        if !round.is_open() {
            return Err(ServiceError::Policy("round is not open".to_string()));
        }

        match self.repo.finalize_round(id)? {
            CloseOutcome::Closed(winner) => {
                info!(
                    "event=round_close module=service status=ok round={} winner={}",
                    id,
                    winner
                        .map(|w| w.to_string())
                        .unwrap_or_else(|| "none".to_string())
                );
                self.fetch_round(id)
            }
            CloseOutcome::LostRace => {
                info!("event=round_close module=service status=conflict round={id}");
                Err(ServiceError::Conflict(
                    "round was closed by a concurrent request".to_string(),
                ))
            }
        }
    }

    /// Nominates a proposal. Any member, while the round is open.
    pub fn propose(
        &self,
        actor: &Actor,
        round_id: RoundId,
        request: &ProposeRequest,
    ) -> ServiceResult<Proposal> {
        let round = self.fetch_round(round_id)?;
        if !round.is_open() {
            return Err(ServiceError::Policy(
                "round is not open for proposals".to_string(),
            ));
        }

        let mut proposal = Proposal::new(round_id, actor.member_id, request.title.clone());
        proposal.author = none_if_blank(request.author.as_deref());
        proposal.description = none_if_blank(request.description.as_deref());
        proposal.cover_url = none_if_blank(request.cover_url.as_deref());

        let id = self.repo.create_proposal(&proposal)?;
        self.fetch_proposal(id)
    }

    /// Withdraws a proposal. Proposer or organizer, while the round is open.
    pub fn delete_proposal(&self, actor: &Actor, proposal_id: ProposalId) -> ServiceResult<()> {
        let proposal = self.fetch_proposal(proposal_id)?;
        let round = self.fetch_round(proposal.round_id)?;
        if !round.is_open() {
            return Err(ServiceError::Policy(
                "proposals of a non-open round are immutable".to_string(),
            ));
        }
        if !actor.is_organizer() && proposal.proposed_by != actor.member_id {
            return Err(ServiceError::Policy(
                "only the proposer or an organizer may delete a proposal".to_string(),
            ));
        }

        self.repo.delete_proposal(proposal_id)?;
        Ok(())
    }

    /// All rounds with aggregate context, newest first.
    pub fn round_summaries(&self) -> ServiceResult<Vec<RoundSummary>> {
        Ok(self.repo.list_round_summaries()?)
    }

    /// One round with its proposals ordered by score, then creation.
    pub fn round_detail(&self, id: RoundId) -> ServiceResult<RoundDetail> {
        let round = self.fetch_round(id)?;
        let proposals = self.repo.list_proposals(id)?;
        Ok(RoundDetail { round, proposals })
    }

    /// Tallied results with per-rank counts and the winner flag.
    pub fn round_results(&self, id: RoundId) -> ServiceResult<RoundResults> {
        let round = self.fetch_round(id)?;
        let proposals = self.repo.round_results(id)?;
        Ok(RoundResults { round, proposals })
    }

    fn fetch_round(&self, id: RoundId) -> ServiceResult<Round> {
        self.repo
            .get_round(id)?
            .ok_or(ServiceError::NotFound {
                entity: "round",
                id,
            })
    }

    fn fetch_proposal(&self, id: ProposalId) -> ServiceResult<Proposal> {
        self.repo
            .get_proposal(id)?
            .ok_or(ServiceError::NotFound {
                entity: "proposal",
                id,
            })
    }
}

fn none_if_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}
