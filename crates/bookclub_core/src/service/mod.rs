//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Enforce policy: who may act, and in which lifecycle state.
//!
//! # Invariants
//! - Hosts authenticate before calling in; every mutating operation takes
//!   the acting member's [`Actor`].
//! - Errors here are recoverable by the caller; nothing in this layer
//!   terminates the hosting process.

use crate::model::member::Actor;
use crate::model::ValidationError;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod ballot_service;
pub mod meeting_service;
pub mod notification_service;
pub mod round_service;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Use-case level error taxonomy.
///
/// `Conflict` is deliberately distinct from `Policy`: a conflicted caller
/// lost a race and may refresh and no-op, while a policy rejection will not
/// succeed on retry without a state change.
#[derive(Debug)]
pub enum ServiceError {
    /// The referenced record does not resolve.
    NotFound { entity: &'static str, id: Uuid },
    /// Input rejected before any write.
    Validation(ValidationError),
    /// Action not permitted in the current state or for this actor.
    Policy(String),
    /// Lost a race against a concurrent unit of work; state is consistent
    /// but was decided by the winner.
    Conflict(String),
    /// Storage-layer failure surfaced unchanged.
    Repo(RepoError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Policy(message) => write!(f, "operation not permitted: {message}"),
            Self::Conflict(message) => write!(f, "conflicting update: {message}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

/// Rejects non-organizer actors attempting organizer-only operations.
pub(crate) fn require_organizer(actor: &Actor, action: &str) -> ServiceResult<()> {
    if actor.is_organizer() {
        Ok(())
    } else {
        Err(ServiceError::Policy(format!(
            "{action} requires organizer privileges"
        )))
    }
}
