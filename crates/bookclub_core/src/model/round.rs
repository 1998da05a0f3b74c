//! Round domain model: one bounded proposal-and-vote cycle.
//!
//! # Invariants
//! - `winning_proposal_id` is `None` while the round is open; it is written
//!   exactly once, at close time, by the round repository.
//! - Status only ever moves forward: open → closed → archived.

use crate::model::member::MemberId;
use crate::model::proposal::ProposalId;
use crate::model::ValidationError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for a decision round.
pub type RoundId = Uuid;

const TITLE_MAX_CHARS: usize = 255;

/// Voting rule applied when tallying a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingMethod {
    /// Every vote is an unweighted "approve"; score = approval count.
    Approval,
    /// Positional weighting: ranks 1/2/3 score 3/2/1 points.
    RankedChoice,
}

/// Lifecycle state of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    /// Accepting proposals and votes.
    Open,
    /// Tallied; winner recorded; proposals and votes immutable.
    Closed,
    /// Cosmetic terminal state for past rounds.
    Archived,
}

impl RoundStatus {
    /// Whether `next` is reachable from `self` in a single valid transition.
    ///
    /// Skipping states or moving backwards is never allowed.
    pub fn can_transition_to(self, next: RoundStatus) -> bool {
        matches!(
            (self, next),
            (RoundStatus::Open, RoundStatus::Closed)
                | (RoundStatus::Closed, RoundStatus::Archived)
        )
    }
}

/// One decision cycle with a single eventual winner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub uuid: RoundId,
    pub title: String,
    pub voting_method: VotingMethod,
    pub status: RoundStatus,
    /// Optional voting deadline in epoch milliseconds. Informational; closing
    /// is always an explicit organizer action.
    pub deadline: Option<i64>,
    /// Set exactly once, at close time. `None` while open, and `None` after
    /// close when the round had no proposals.
    pub winning_proposal_id: Option<ProposalId>,
    pub created_by: MemberId,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Round {
    /// Creates a new open round with a generated stable ID.
    pub fn new(
        title: impl Into<String>,
        voting_method: VotingMethod,
        deadline: Option<i64>,
        created_by: MemberId,
    ) -> Self {
        Self::with_id(Uuid::new_v4(), title, voting_method, deadline, created_by)
    }

    /// Creates a new open round with a caller-provided stable ID.
    pub fn with_id(
        uuid: RoundId,
        title: impl Into<String>,
        voting_method: VotingMethod,
        deadline: Option<i64>,
        created_by: MemberId,
    ) -> Self {
        Self {
            uuid,
            title: title.into(),
            voting_method,
            status: RoundStatus::Open,
            deadline,
            winning_proposal_id: None,
            created_by,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_title(&self.title)?;
        if self.status == RoundStatus::Open && self.winning_proposal_id.is_some() {
            return Err(ValidationError::new(
                "winning_proposal_id",
                "must be empty while the round is open",
            ));
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.status == RoundStatus::Open
    }
}

/// Organizer-editable round fields.
///
/// Status may only target a state reachable by a single valid transition,
/// and closing must go through the dedicated close operation so the tally
/// cannot be skipped. `winning_proposal_id` is intentionally absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundPatch {
    pub title: Option<String>,
    /// `Some(None)` clears the deadline.
    pub deadline: Option<Option<i64>>,
    pub status: Option<RoundStatus>,
}

impl RoundPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.deadline.is_none() && self.status.is_none()
    }
}

pub(crate) fn validate_title(title: &str) -> Result<(), ValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("title", "must not be empty"));
    }
    if trimmed.chars().count() > TITLE_MAX_CHARS {
        return Err(ValidationError::new(
            "title",
            format!("must be at most {TITLE_MAX_CHARS} characters"),
        ));
    }
    Ok(())
}
