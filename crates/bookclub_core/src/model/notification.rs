//! Notification records queued for external delivery.
//!
//! Append-only: records are produced by meeting confirmation and organizer
//! broadcasts and never mutated afterwards. Actual delivery is an external
//! responsibility.

use crate::model::member::MemberId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for a notification record.
pub type NotificationId = Uuid;

/// A point-in-time record of a message queued for one member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub uuid: NotificationId,
    pub member_id: MemberId,
    /// Delivery channel, e.g. `email`. Lowercase, never empty.
    pub channel: String,
    pub subject: Option<String>,
    pub body: String,
    pub created_at: i64,
}

impl Notification {
    pub fn new(
        member_id: MemberId,
        channel: impl Into<String>,
        subject: Option<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            member_id,
            channel: channel.into(),
            subject,
            body: body.into(),
            created_at: 0,
        }
    }
}
