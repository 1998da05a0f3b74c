//! Proposal domain model: one item nominated for selection within a round.

use crate::model::member::MemberId;
use crate::model::round::{validate_title, RoundId};
use crate::model::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for a proposal.
pub type ProposalId = Uuid;

const AUTHOR_MAX_CHARS: usize = 255;

static COVER_URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://\S+$").expect("cover url pattern is well-formed"));

/// An item nominated for selection within a round.
///
/// `vote_score` is derived data: it is recomputed from the full vote set and
/// written only by the tally persistence step, never trusted as
/// authoritative between writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub uuid: ProposalId,
    pub round_id: RoundId,
    pub title: String,
    pub author: Option<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub proposed_by: MemberId,
    pub vote_score: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Proposal {
    /// Creates a proposal with a generated stable ID and zero score.
    pub fn new(round_id: RoundId, proposed_by: MemberId, title: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), round_id, proposed_by, title)
    }

    /// Creates a proposal with a caller-provided stable ID.
    pub fn with_id(
        uuid: ProposalId,
        round_id: RoundId,
        proposed_by: MemberId,
        title: impl Into<String>,
    ) -> Self {
        Self {
            uuid,
            round_id,
            title: title.into(),
            author: None,
            description: None,
            cover_url: None,
            proposed_by,
            vote_score: 0,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_title(&self.title)?;

        if let Some(author) = self.author.as_deref() {
            if author.chars().count() > AUTHOR_MAX_CHARS {
                return Err(ValidationError::new(
                    "author",
                    format!("must be at most {AUTHOR_MAX_CHARS} characters"),
                ));
            }
        }

        if let Some(url) = self.cover_url.as_deref() {
            if !COVER_URL_PATTERN.is_match(url.trim()) {
                return Err(ValidationError::new(
                    "cover_url",
                    "must be an http(s) URL",
                ));
            }
        }

        if self.vote_score < 0 {
            return Err(ValidationError::new("vote_score", "must not be negative"));
        }

        Ok(())
    }
}
