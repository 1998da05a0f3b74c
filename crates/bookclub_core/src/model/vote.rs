//! Vote and ballot shapes.
//!
//! A member's full ballot for a round is replaced atomically on every
//! submission; individual vote rows are never patched in place.

use crate::model::member::MemberId;
use crate::model::proposal::ProposalId;
use crate::model::round::RoundId;
use serde::{Deserialize, Serialize};

/// Rank recorded for every approval-method vote. Carries no ordering meaning.
pub const APPROVAL_RANK: u8 = 1;

/// Maximum entries in a ranked-choice ballot.
pub const MAX_RANKED_BALLOT: usize = 3;

/// Lowest valid ranked-choice rank.
pub const MIN_RANK: u8 = 1;

/// Highest valid ranked-choice rank.
pub const MAX_RANK: u8 = 3;

/// One persisted (round, member, proposal) ballot entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub round_id: RoundId,
    pub member_id: MemberId,
    pub proposal_id: ProposalId,
    /// Under approval voting this is always [`APPROVAL_RANK`].
    pub rank: u8,
    pub created_at: i64,
}

/// One entry of a ballot as submitted by a member.
///
/// `rank` is required under ranked-choice voting and ignored under approval
/// voting, where it is pinned to [`APPROVAL_RANK`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotEntry {
    pub proposal_id: ProposalId,
    pub rank: Option<u8>,
}

impl BallotEntry {
    pub fn approve(proposal_id: ProposalId) -> Self {
        Self {
            proposal_id,
            rank: None,
        }
    }

    pub fn ranked(proposal_id: ProposalId, rank: u8) -> Self {
        Self {
            proposal_id,
            rank: Some(rank),
        }
    }
}
