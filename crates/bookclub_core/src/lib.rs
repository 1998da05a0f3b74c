//! Core domain logic for the book club decision and meeting subsystem.
//! This crate is the single source of truth for business invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod tally;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::meeting::{AvailabilityResponse, Meeting, MeetingId, MeetingStatus};
pub use model::member::{Actor, Member, MemberId, MemberRole, DEFAULT_CONTACT_CHANNEL};
pub use model::notification::{Notification, NotificationId};
pub use model::proposal::{Proposal, ProposalId};
pub use model::round::{Round, RoundId, RoundPatch, RoundStatus, VotingMethod};
pub use model::vote::{BallotEntry, Vote, APPROVAL_RANK, MAX_RANKED_BALLOT};
pub use model::ValidationError;
pub use repo::ballot_repo::{BallotRepository, SqliteBallotRepository};
pub use repo::meeting_repo::{MeetingOverview, MeetingRepository, SqliteMeetingRepository};
pub use repo::member_repo::{MemberRepository, SqliteMemberRepository};
pub use repo::notification_repo::{NotificationRepository, SqliteNotificationRepository};
pub use repo::round_repo::{
    CloseOutcome, ProposalResult, RoundRepository, RoundSummary, SqliteRoundRepository,
};
pub use repo::{RepoError, RepoResult};
pub use service::ballot_service::BallotService;
pub use service::meeting_service::{MeetingService, ProposeSlotRequest};
pub use service::notification_service::NotificationService;
pub use service::round_service::{
    CreateRoundRequest, ProposeRequest, RoundDetail, RoundResults, RoundService,
};
pub use service::{ServiceError, ServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
