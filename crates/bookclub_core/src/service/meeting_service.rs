//! Meeting coordination service.
//!
//! # Responsibility
//! - Manage the per-round meeting sub-flow: propose slots, collect
//!   availability, confirm one slot.
//! - Fan one notification per member out when a meeting is confirmed.
//!
//! # Invariants
//! - Slots may be proposed regardless of round status.
//! - A meeting is confirmed at most once; re-confirmation is a policy
//!   error, so duplicate fan-out cannot happen.
//! - Confirmed meetings are immutable.

use crate::model::meeting::{AvailabilityResponse, Meeting, MeetingId};
use crate::model::member::Actor;
use crate::model::round::RoundId;
use crate::repo::meeting_repo::{MeetingOverview, MeetingRepository};
use crate::service::{require_organizer, ServiceError, ServiceResult};
use chrono::{LocalResult, TimeZone, Utc};
use log::info;

const CONFIRMATION_SUBJECT: &str = "Meeting confirmed";

/// Request model for proposing a meeting slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProposeSlotRequest {
    /// Proposed date-time in epoch milliseconds.
    pub scheduled_at: i64,
    pub location: Option<String>,
    pub virtual_link: Option<String>,
    pub notes: Option<String>,
}

/// Use-case service for meeting coordination.
pub struct MeetingService<R: MeetingRepository> {
    repo: R,
}

impl<R: MeetingRepository> MeetingService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Proposes a meeting slot for the round. Any member, any round status.
    pub fn propose_slot(
        &self,
        actor: &Actor,
        round_id: RoundId,
        request: &ProposeSlotRequest,
    ) -> ServiceResult<Meeting> {
        if !self.repo.round_exists(round_id)? {
            return Err(ServiceError::NotFound {
                entity: "round",
                id: round_id,
            });
        }

        let mut meeting = Meeting::new(round_id, actor.member_id, request.scheduled_at);
        meeting.location = none_if_blank(request.location.as_deref());
        meeting.virtual_link = none_if_blank(request.virtual_link.as_deref());
        meeting.notes = none_if_blank(request.notes.as_deref());

        let id = self.repo.create_meeting(&meeting)?;
        self.fetch_meeting(id)
    }

    /// Records or overwrites the acting member's availability.
    pub fn respond(
        &self,
        actor: &Actor,
        meeting_id: MeetingId,
        response: AvailabilityResponse,
    ) -> ServiceResult<()> {
        self.fetch_meeting(meeting_id)?;
        self.repo
            .upsert_availability(meeting_id, actor.member_id, response)?;
        Ok(())
    }

    /// Confirms the slot and queues one notification per known member.
    /// Organizer only; valid only while the meeting is proposed.
    pub fn confirm(&mut self, actor: &Actor, meeting_id: MeetingId) -> ServiceResult<Meeting> {
        require_organizer(actor, "confirming a meeting")?;

        let meeting = self.fetch_meeting(meeting_id)?;
        if meeting.is_confirmed() {
            return Err(ServiceError::Policy(
                "meeting is already confirmed".to_string(),
            ));
        }

        let body = confirmation_body(&meeting);
        if !self
            .repo
            .confirm_meeting(meeting_id, CONFIRMATION_SUBJECT, &body)?
        {
            return Err(ServiceError::Policy(
                "meeting is not awaiting confirmation".to_string(),
            ));
        }

        info!(
            "event=meeting_confirm module=service status=ok meeting={} round={}",
            meeting_id, meeting.round_id
        );
        self.fetch_meeting(meeting_id)
    }

    /// Withdraws a proposed slot. Proposer or organizer only; confirmed
    /// meetings are immutable.
    pub fn delete_slot(&self, actor: &Actor, meeting_id: MeetingId) -> ServiceResult<()> {
        let meeting = self.fetch_meeting(meeting_id)?;
        if meeting.is_confirmed() {
            return Err(ServiceError::Policy(
                "confirmed meetings cannot be deleted".to_string(),
            ));
        }
        if !actor.is_organizer() && meeting.proposed_by != actor.member_id {
            return Err(ServiceError::Policy(
                "only the proposer or an organizer may delete a meeting".to_string(),
            ));
        }

        self.repo.delete_meeting(meeting_id)?;
        Ok(())
    }

    /// The round's meetings with response counts and the acting member's
    /// own response, ordered by scheduled time.
    pub fn meetings_for_round(
        &self,
        actor: &Actor,
        round_id: RoundId,
    ) -> ServiceResult<Vec<MeetingOverview>> {
        if !self.repo.round_exists(round_id)? {
            return Err(ServiceError::NotFound {
                entity: "round",
                id: round_id,
            });
        }
        Ok(self.repo.list_meetings(round_id, actor.member_id)?)
    }

    fn fetch_meeting(&self, id: MeetingId) -> ServiceResult<Meeting> {
        self.repo
            .get_meeting(id)?
            .ok_or(ServiceError::NotFound {
                entity: "meeting",
                id,
            })
    }
}

/// Notification body describing the confirmed slot.
fn confirmation_body(meeting: &Meeting) -> String {
    let mut body = format!(
        "A meeting has been confirmed for {}",
        format_scheduled_at(meeting.scheduled_at)
    );
    if let Some(location) = meeting.location.as_deref() {
        body.push_str(&format!(" at {location}"));
    }
    if let Some(link) = meeting.virtual_link.as_deref() {
        body.push_str(&format!(". Join: {link}"));
    }
    body.push('.');
    body
}

fn format_scheduled_at(epoch_ms: i64) -> String {
    match Utc.timestamp_millis_opt(epoch_ms) {
        LocalResult::Single(datetime) => datetime.format("%Y-%m-%d %H:%M UTC").to_string(),
        _ => format!("epoch-ms {epoch_ms}"),
    }
}

fn none_if_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::{confirmation_body, format_scheduled_at};
    use crate::model::meeting::Meeting;
    use uuid::Uuid;

    #[test]
    fn body_mentions_time_location_and_link_when_present() {
        let mut meeting = Meeting::new(Uuid::new_v4(), Uuid::new_v4(), 1_735_689_600_000);
        meeting.location = Some("Library annex".to_string());
        meeting.virtual_link = Some("https://meet.example/book".to_string());

        let body = confirmation_body(&meeting);
        assert!(body.contains("2025-01-01"));
        assert!(body.contains("at Library annex"));
        assert!(body.contains("Join: https://meet.example/book"));
        assert!(body.ends_with('.'));
    }

    #[test]
    fn body_omits_absent_fields() {
        let meeting = Meeting::new(Uuid::new_v4(), Uuid::new_v4(), 1_735_689_600_000);
        let body = confirmation_body(&meeting);
        assert!(!body.contains(" at "));
        assert!(!body.contains("Join:"));
    }

    #[test]
    fn scheduled_at_renders_as_utc() {
        assert_eq!(format_scheduled_at(1_735_689_600_000), "2025-01-01 00:00 UTC");
    }
}
