//! Meeting repository contract and SQLite implementation.
//!
//! # Responsibility
//! - CRUD over meeting slots and availability responses.
//! - Own the transactional confirmation: status compare-and-swap plus
//!   per-member notification fan-out as one unit.
//!
//! # Invariants
//! - Availability is unique per (meeting, member); resubmission overwrites.
//! - `confirm_meeting` flips `proposed`→`confirmed` at most once; the
//!   fan-out can therefore never run twice for one meeting.
//! - A notification insert failing for one member is logged and skipped,
//!   never aborting the confirmation or the other members' records.

use crate::model::meeting::{AvailabilityResponse, Meeting, MeetingId, MeetingStatus};
use crate::model::member::MemberId;
use crate::model::notification::Notification;
use crate::model::round::RoundId;
use crate::repo::member_repo::parse_member_row;
use crate::repo::{ensure_schema_ready, parse_uuid, RepoError, RepoResult};
use log::warn;
use rusqlite::{params, Connection, Row, TransactionBehavior};
use serde::{Deserialize, Serialize};

const MEETING_SELECT_SQL: &str = "SELECT
    uuid,
    round_uuid,
    proposed_by,
    scheduled_at,
    location,
    virtual_link,
    notes,
    status,
    created_at,
    updated_at
FROM meetings";

/// Meeting listing read model: slot plus aggregated responses and the
/// viewer's own answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingOverview {
    pub meeting: Meeting,
    pub proposed_by_name: String,
    pub yes_count: i64,
    pub maybe_count: i64,
    pub no_count: i64,
    pub my_response: Option<AvailabilityResponse>,
}

/// Repository interface for meeting coordination.
pub trait MeetingRepository {
    fn round_exists(&self, round_id: RoundId) -> RepoResult<bool>;
    fn create_meeting(&self, meeting: &Meeting) -> RepoResult<MeetingId>;
    fn get_meeting(&self, id: MeetingId) -> RepoResult<Option<Meeting>>;
    /// Lists the round's meetings with response counts and the viewer's own
    /// response, ordered by scheduled time.
    fn list_meetings(&self, round_id: RoundId, viewer: MemberId)
        -> RepoResult<Vec<MeetingOverview>>;
    /// Records or overwrites the member's availability for the meeting.
    fn upsert_availability(
        &self,
        meeting_id: MeetingId,
        member_id: MemberId,
        response: AvailabilityResponse,
    ) -> RepoResult<()>;
    fn delete_meeting(&self, id: MeetingId) -> RepoResult<()>;
    /// Flips the meeting to confirmed and queues one notification per known
    /// member in the same transaction. Returns `false` when the meeting was
    /// no longer awaiting confirmation (nothing written).
    fn confirm_meeting(
        &mut self,
        id: MeetingId,
        subject: &str,
        body: &str,
    ) -> RepoResult<bool>;
}

/// SQLite-backed meeting repository.
pub struct SqliteMeetingRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteMeetingRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_schema_ready(
            conn,
            &["meetings", "availability", "notifications", "members", "rounds"],
        )?;
        Ok(Self { conn })
    }
}

impl MeetingRepository for SqliteMeetingRepository<'_> {
    fn round_exists(&self, round_id: RoundId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM rounds WHERE uuid = ?1);",
            [round_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn create_meeting(&self, meeting: &Meeting) -> RepoResult<MeetingId> {
        meeting.validate()?;

        self.conn.execute(
            "INSERT INTO meetings (
                uuid,
                round_uuid,
                proposed_by,
                scheduled_at,
                location,
                virtual_link,
                notes,
                status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                meeting.uuid.to_string(),
                meeting.round_id.to_string(),
                meeting.proposed_by.to_string(),
                meeting.scheduled_at,
                meeting.location.as_deref().map(str::trim),
                meeting.virtual_link.as_deref().map(str::trim),
                meeting.notes.as_deref().map(str::trim),
                meeting_status_to_db(meeting.status),
            ],
        )?;

        Ok(meeting.uuid)
    }

    fn get_meeting(&self, id: MeetingId) -> RepoResult<Option<Meeting>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{MEETING_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_meeting_row(row)?));
        }
        Ok(None)
    }

    fn list_meetings(
        &self,
        round_id: RoundId,
        viewer: MemberId,
    ) -> RepoResult<Vec<MeetingOverview>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                mt.uuid,
                mt.round_uuid,
                mt.proposed_by,
                mt.scheduled_at,
                mt.location,
                mt.virtual_link,
                mt.notes,
                mt.status,
                mt.created_at,
                mt.updated_at,
                mb.display_name AS proposed_by_name,
                COUNT(CASE WHEN a.response = 'yes' THEN 1 END) AS yes_count,
                COUNT(CASE WHEN a.response = 'maybe' THEN 1 END) AS maybe_count,
                COUNT(CASE WHEN a.response = 'no' THEN 1 END) AS no_count,
                (
                    SELECT a2.response
                    FROM availability a2
                    WHERE a2.meeting_uuid = mt.uuid AND a2.member_uuid = ?2
                ) AS my_response
             FROM meetings mt
             JOIN members mb ON mb.uuid = mt.proposed_by
             LEFT JOIN availability a ON a.meeting_uuid = mt.uuid
             WHERE mt.round_uuid = ?1
             GROUP BY mt.uuid
             ORDER BY mt.scheduled_at ASC;",
        )?;

        let mut rows = stmt.query(params![round_id.to_string(), viewer.to_string()])?;
        let mut overviews = Vec::new();
        while let Some(row) = rows.next()? {
            let my_response = match row.get::<_, Option<String>>("my_response")? {
                Some(value) => Some(parse_availability(&value)?),
                None => None,
            };
            overviews.push(MeetingOverview {
                meeting: parse_meeting_row(row)?,
                proposed_by_name: row.get("proposed_by_name")?,
                yes_count: row.get("yes_count")?,
                maybe_count: row.get("maybe_count")?,
                no_count: row.get("no_count")?,
                my_response,
            });
        }

        Ok(overviews)
    }

    fn upsert_availability(
        &self,
        meeting_id: MeetingId,
        member_id: MemberId,
        response: AvailabilityResponse,
    ) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO availability (meeting_uuid, member_uuid, response)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (meeting_uuid, member_uuid) DO UPDATE SET
                response = excluded.response,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                meeting_id.to_string(),
                member_id.to_string(),
                availability_to_db(response),
            ],
        )?;
        Ok(())
    }

    fn delete_meeting(&self, id: MeetingId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM meetings WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn confirm_meeting(&mut self, id: MeetingId, subject: &str, body: &str) -> RepoResult<bool> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let changed = tx.execute(
            "UPDATE meetings
             SET
                status = 'confirmed',
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1
               AND status = 'proposed';",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Ok(false);
        }

        let members = {
            let mut stmt = tx.prepare(
                "SELECT uuid, display_name, role, contact_channel, created_at, updated_at
                 FROM members
                 ORDER BY display_name ASC;",
            )?;
            let mut rows = stmt.query([])?;
            let mut members = Vec::new();
            while let Some(row) = rows.next()? {
                members.push(parse_member_row(row)?);
            }
            members
        };

        for member in &members {
            let notification = Notification::new(
                member.uuid,
                member.notify_channel(),
                Some(subject.to_string()),
                body,
            );
            let inserted = tx.execute(
                "INSERT INTO notifications (uuid, member_uuid, channel, subject, body)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    notification.uuid.to_string(),
                    notification.member_id.to_string(),
                    notification.channel,
                    notification.subject,
                    notification.body,
                ],
            );
            if let Err(err) = inserted {
                warn!(
                    "event=notify_member module=repo status=error meeting={} member={} error={}",
                    id, member.uuid, err
                );
            }
        }

        tx.commit()?;
        Ok(true)
    }
}

pub(crate) fn meeting_status_to_db(status: MeetingStatus) -> &'static str {
    match status {
        MeetingStatus::Proposed => "proposed",
        MeetingStatus::Confirmed => "confirmed",
    }
}

pub(crate) fn parse_meeting_status(value: &str) -> RepoResult<MeetingStatus> {
    match value {
        "proposed" => Ok(MeetingStatus::Proposed),
        "confirmed" => Ok(MeetingStatus::Confirmed),
        other => Err(RepoError::InvalidData(format!(
            "invalid meeting status `{other}` in meetings.status"
        ))),
    }
}

pub(crate) fn availability_to_db(response: AvailabilityResponse) -> &'static str {
    match response {
        AvailabilityResponse::Yes => "yes",
        AvailabilityResponse::Maybe => "maybe",
        AvailabilityResponse::No => "no",
    }
}

pub(crate) fn parse_availability(value: &str) -> RepoResult<AvailabilityResponse> {
    match value {
        "yes" => Ok(AvailabilityResponse::Yes),
        "maybe" => Ok(AvailabilityResponse::Maybe),
        "no" => Ok(AvailabilityResponse::No),
        other => Err(RepoError::InvalidData(format!(
            "invalid availability response `{other}` in availability.response"
        ))),
    }
}

fn parse_meeting_row(row: &Row<'_>) -> RepoResult<Meeting> {
    let uuid_text: String = row.get("uuid")?;
    let round_text: String = row.get("round_uuid")?;
    let proposer_text: String = row.get("proposed_by")?;
    let status_text: String = row.get("status")?;

    Ok(Meeting {
        uuid: parse_uuid(&uuid_text, "meetings.uuid")?,
        round_id: parse_uuid(&round_text, "meetings.round_uuid")?,
        proposed_by: parse_uuid(&proposer_text, "meetings.proposed_by")?,
        scheduled_at: row.get("scheduled_at")?,
        location: row.get("location")?,
        virtual_link: row.get("virtual_link")?,
        notes: row.get("notes")?,
        status: parse_meeting_status(&status_text)?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
