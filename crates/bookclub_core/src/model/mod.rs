//! Domain models for the decision and meeting subsystems.
//!
//! # Responsibility
//! - Define the canonical records persisted by the repositories.
//! - Keep field-level validation next to the data it constrains.
//!
//! # Invariants
//! - Models carry stable `uuid` identities; identifiers are never reused.
//! - Timestamps are epoch milliseconds, populated by storage on read.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod meeting;
pub mod member;
pub mod notification;
pub mod proposal;
pub mod round;
pub mod vote;

/// Field-level validation failure, rejected before any write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Name of the offending field.
    pub field: &'static str,
    /// Human-readable reason.
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid `{}`: {}", self.field, self.message)
    }
}

impl Error for ValidationError {}
