//! Notification log repository.
//!
//! # Responsibility
//! - Append broadcast notifications for every known member.
//! - Serve each member's own notification history, newest first.
//!
//! # Invariants
//! - The log is append-only; rows are never updated or deleted here.
//! - List limits are clamped to keep result sets bounded.

use crate::model::member::MemberId;
use crate::model::notification::Notification;
use crate::repo::member_repo::parse_member_row;
use crate::repo::{ensure_schema_ready, parse_uuid, RepoResult};
use log::warn;
use rusqlite::{params, Connection, Row, TransactionBehavior};

const NOTIFICATIONS_DEFAULT_LIMIT: u32 = 20;
const NOTIFICATIONS_LIMIT_MAX: u32 = 100;

const NOTIFICATION_SELECT_SQL: &str = "SELECT
    uuid,
    member_uuid,
    channel,
    subject,
    body,
    created_at
FROM notifications";

/// Repository interface for the notification log.
pub trait NotificationRepository {
    /// Queues one notification per known member on their preferred channel.
    /// Returns how many records were written; a failing row is logged and
    /// skipped without aborting the rest.
    fn broadcast_to_all_members(
        &mut self,
        subject: Option<&str>,
        body: &str,
    ) -> RepoResult<usize>;
    /// The member's notifications, newest first.
    fn list_for_member(
        &self,
        member_id: MemberId,
        limit: Option<u32>,
        offset: u32,
    ) -> RepoResult<Vec<Notification>>;
}

/// SQLite-backed notification log.
pub struct SqliteNotificationRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteNotificationRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn, &["notifications", "members"])?;
        Ok(Self { conn })
    }
}

impl NotificationRepository for SqliteNotificationRepository<'_> {
    fn broadcast_to_all_members(
        &mut self,
        subject: Option<&str>,
        body: &str,
    ) -> RepoResult<usize> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

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

        let mut written = 0usize;
        for member in &members {
            let notification = Notification::new(
                member.uuid,
                member.notify_channel(),
                subject.map(str::to_string),
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
            match inserted {
                Ok(_) => written += 1,
                Err(err) => {
                    warn!(
                        "event=notify_member module=repo status=error member={} error={}",
                        member.uuid, err
                    );
                }
            }
        }

        tx.commit()?;
        Ok(written)
    }

    fn list_for_member(
        &self,
        member_id: MemberId,
        limit: Option<u32>,
        offset: u32,
    ) -> RepoResult<Vec<Notification>> {
        let limit = normalize_notification_limit(limit);
        let mut stmt = self.conn.prepare(&format!(
            "{NOTIFICATION_SELECT_SQL}
             WHERE member_uuid = ?1
             ORDER BY created_at DESC, uuid ASC
             LIMIT ?2 OFFSET ?3;"
        ))?;
        let mut rows = stmt.query(params![member_id.to_string(), limit, offset])?;
        let mut notifications = Vec::new();
        while let Some(row) = rows.next()? {
            notifications.push(parse_notification_row(row)?);
        }
        Ok(notifications)
    }
}

/// Normalizes the list limit according to the notification log contract.
pub fn normalize_notification_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) => NOTIFICATIONS_DEFAULT_LIMIT,
        Some(value) if value > NOTIFICATIONS_LIMIT_MAX => NOTIFICATIONS_LIMIT_MAX,
        Some(value) => value,
        None => NOTIFICATIONS_DEFAULT_LIMIT,
    }
}

fn parse_notification_row(row: &Row<'_>) -> RepoResult<Notification> {
    let uuid_text: String = row.get("uuid")?;
    let member_text: String = row.get("member_uuid")?;

    Ok(Notification {
        uuid: parse_uuid(&uuid_text, "notifications.uuid")?,
        member_id: parse_uuid(&member_text, "notifications.member_uuid")?,
        channel: row.get("channel")?,
        subject: row.get("subject")?,
        body: row.get("body")?,
        created_at: row.get("created_at")?,
    })
}
