//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repository writes enforce model validation before persistence.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.
//! - Cross-record aggregate writes (ballot replace, round close, meeting
//!   confirmation fan-out) run inside immediate transactions.

use crate::db::DbError;
use crate::model::proposal::{Proposal, ProposalId};
use crate::model::round::{RoundId, VotingMethod};
use crate::model::vote::Vote;
use crate::model::ValidationError;
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod ballot_repo;
pub mod meeting_repo;
pub mod member_repo;
pub mod notification_repo;
pub mod round_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Db(DbError),
    NotFound(Uuid),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "record not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} has not been migrated to {expected_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "required table `{table}` does not exist")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Rejects connections whose schema has not been migrated by [`crate::db`].
pub(crate) fn ensure_schema_ready(
    conn: &Connection,
    required_tables: &[&'static str],
) -> RepoResult<()> {
    let expected = crate::db::migrations::latest_version();
    let actual: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual == 0 {
        return Err(RepoError::UninitializedConnection {
            expected_version: expected,
            actual_version: actual,
        });
    }

    for table in required_tables {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    Ok(())
}

pub(crate) fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

/// In-memory snapshot handed to the pure tally functions.
pub(crate) struct TallySnapshot {
    pub method: VotingMethod,
    pub proposals: Vec<Proposal>,
    pub votes: Vec<Vote>,
}

/// Loads the round's voting method, proposals and votes in one pass.
///
/// Proposals are ordered by creation so tie-breaking stays deterministic.
/// Returns `None` when the round does not exist. Intended to run inside a
/// transaction owned by the caller.
pub(crate) fn load_tally_snapshot(
    conn: &Connection,
    round_id: RoundId,
) -> RepoResult<Option<TallySnapshot>> {
    let round_uuid = round_id.to_string();
    let method = {
        let mut stmt = conn.prepare("SELECT voting_method FROM rounds WHERE uuid = ?1;")?;
        let mut rows = stmt.query([round_uuid.as_str()])?;
        match rows.next()? {
            Some(row) => {
                let value: String = row.get(0)?;
                round_repo::parse_voting_method(&value)?
            }
            None => return Ok(None),
        }
    };

    let mut stmt = conn.prepare(&format!(
        "{} WHERE round_uuid = ?1 ORDER BY created_at ASC, uuid ASC;",
        round_repo::PROPOSAL_SELECT_SQL
    ))?;
    let mut rows = stmt.query([round_uuid.as_str()])?;
    let mut proposals = Vec::new();
    while let Some(row) = rows.next()? {
        proposals.push(round_repo::parse_proposal_row(row)?);
    }

    let mut stmt = conn.prepare(&format!(
        "{} WHERE round_uuid = ?1;",
        ballot_repo::VOTE_SELECT_SQL
    ))?;
    let mut rows = stmt.query([round_uuid.as_str()])?;
    let mut votes = Vec::new();
    while let Some(row) = rows.next()? {
        votes.push(ballot_repo::parse_vote_row(row)?);
    }

    Ok(Some(TallySnapshot {
        method,
        proposals,
        votes,
    }))
}

/// Writes a freshly computed scoreboard.
///
/// Covers every proposal of the round because the tally zero-fills; a
/// concurrent reader therefore never observes a mix of old and new scores
/// when this runs inside the caller's transaction.
pub(crate) fn persist_scores(
    conn: &Connection,
    scores: &BTreeMap<ProposalId, i64>,
) -> RepoResult<()> {
    let mut stmt = conn.prepare("UPDATE proposals SET vote_score = ?2 WHERE uuid = ?1;")?;
    for (proposal_id, score) in scores {
        stmt.execute(params![proposal_id.to_string(), score])?;
    }
    Ok(())
}
