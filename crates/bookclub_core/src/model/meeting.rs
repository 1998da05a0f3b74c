//! Meeting slot and availability models.
//!
//! Meetings run on a parallel sub-state-machine per round: slots may be
//! proposed regardless of voting status, and exactly one proposed→confirmed
//! transition is permitted per meeting.

use crate::model::member::MemberId;
use crate::model::round::RoundId;
use crate::model::ValidationError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for a meeting slot.
pub type MeetingId = Uuid;

/// Lifecycle state of a meeting slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    /// Candidate slot collecting availability responses.
    Proposed,
    /// Confirmed by an organizer; immutable from here on.
    Confirmed,
}

/// Tri-state availability answer for one (meeting, member) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityResponse {
    Yes,
    Maybe,
    No,
}

/// One proposed (or confirmed) meeting slot for a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meeting {
    pub uuid: MeetingId,
    pub round_id: RoundId,
    pub proposed_by: MemberId,
    /// Proposed date-time in epoch milliseconds.
    pub scheduled_at: i64,
    pub location: Option<String>,
    pub virtual_link: Option<String>,
    pub notes: Option<String>,
    pub status: MeetingStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Meeting {
    /// Creates a proposed meeting slot with a generated stable ID.
    pub fn new(round_id: RoundId, proposed_by: MemberId, scheduled_at: i64) -> Self {
        Self::with_id(Uuid::new_v4(), round_id, proposed_by, scheduled_at)
    }

    /// Creates a proposed meeting slot with a caller-provided stable ID.
    pub fn with_id(
        uuid: MeetingId,
        round_id: RoundId,
        proposed_by: MemberId,
        scheduled_at: i64,
    ) -> Self {
        Self {
            uuid,
            round_id,
            proposed_by,
            scheduled_at,
            location: None,
            virtual_link: None,
            notes: None,
            status: MeetingStatus::Proposed,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.scheduled_at <= 0 {
            return Err(ValidationError::new(
                "scheduled_at",
                "must be a positive epoch-millisecond timestamp",
            ));
        }
        Ok(())
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == MeetingStatus::Confirmed
    }
}
