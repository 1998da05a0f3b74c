//! Member directory records and the acting-identity value.
//!
//! Identity and session issuance live outside the core; every operation
//! receives an [`Actor`] the host already authenticated. The member table
//! exists so the core can resolve display names, roles, and notification
//! channels.

use crate::model::ValidationError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for a club member.
pub type MemberId = Uuid;

/// Fallback channel used when a member has no preference stored.
pub const DEFAULT_CONTACT_CHANNEL: &str = "email";

const DISPLAY_NAME_MAX_CHARS: usize = 255;

/// Privilege level for lifecycle-changing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    /// Regular member: may propose, vote, and respond to meetings.
    Member,
    /// Organizer: may additionally create/close rounds, confirm meetings,
    /// delete others' records, and broadcast.
    Admin,
}

/// Directory record for one club member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub uuid: MemberId,
    pub display_name: String,
    pub role: MemberRole,
    /// Preferred notification channel; `None` falls back to
    /// [`DEFAULT_CONTACT_CHANNEL`].
    pub contact_channel: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Member {
    /// Creates a member record with a generated stable ID.
    pub fn new(display_name: impl Into<String>, role: MemberRole) -> Self {
        Self::with_id(Uuid::new_v4(), display_name, role)
    }

    /// Creates a member record with a caller-provided stable ID.
    ///
    /// Used when identity already exists in the host's auth system.
    pub fn with_id(uuid: MemberId, display_name: impl Into<String>, role: MemberRole) -> Self {
        Self {
            uuid,
            display_name: display_name.into(),
            role,
            contact_channel: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let trimmed = self.display_name.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::new("display_name", "must not be empty"));
        }
        if trimmed.chars().count() > DISPLAY_NAME_MAX_CHARS {
            return Err(ValidationError::new(
                "display_name",
                format!("must be at most {DISPLAY_NAME_MAX_CHARS} characters"),
            ));
        }
        Ok(())
    }

    /// Channel notifications for this member should be queued on.
    ///
    /// Blank or missing preferences fall back to the default channel.
    pub fn notify_channel(&self) -> String {
        self.contact_channel
            .as_deref()
            .map(str::trim)
            .filter(|channel| !channel.is_empty())
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| DEFAULT_CONTACT_CHANNEL.to_string())
    }

    pub fn is_organizer(&self) -> bool {
        self.role == MemberRole::Admin
    }
}

/// Authenticated identity attached to every core operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub member_id: MemberId,
    pub role: MemberRole,
}

impl Actor {
    pub fn new(member_id: MemberId, role: MemberRole) -> Self {
        Self { member_id, role }
    }

    pub fn is_organizer(&self) -> bool {
        self.role == MemberRole::Admin
    }
}
