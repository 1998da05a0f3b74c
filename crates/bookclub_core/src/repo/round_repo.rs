//! Round/proposal repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over rounds and their proposals.
//! - Own the transactional close: final tally, winner write and the
//!   status compare-and-swap happen as one unit.
//!
//! # Invariants
//! - Write paths validate models before SQL mutations.
//! - `winning_proposal_uuid` is written only by [`RoundRepository::finalize_round`],
//!   guarded by `status='open'` so exactly one concurrent closer wins.

use crate::model::proposal::{Proposal, ProposalId};
use crate::model::round::{validate_title, Round, RoundId, RoundPatch, RoundStatus, VotingMethod};
use crate::model::ValidationError;
use crate::repo::{
    ensure_schema_ready, load_tally_snapshot, parse_uuid, persist_scores, RepoError, RepoResult,
};
use crate::tally;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, TransactionBehavior};
use serde::{Deserialize, Serialize};

pub(crate) const PROPOSAL_SELECT_SQL: &str = "SELECT
    uuid,
    round_uuid,
    title,
    author,
    description,
    cover_url,
    proposed_by,
    vote_score,
    created_at,
    updated_at
FROM proposals";

const ROUND_SELECT_SQL: &str = "SELECT
    uuid,
    title,
    voting_method,
    status,
    deadline,
    winning_proposal_uuid,
    created_by,
    created_at,
    updated_at
FROM rounds";

/// Round listing read model: one row per round with aggregate context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub round: Round,
    pub created_by_name: String,
    pub proposal_count: i64,
    /// Title/author of the winning proposal, present once the round closed
    /// with a winner.
    pub winning_title: Option<String>,
    pub winning_author: Option<String>,
}

/// Tallied results read model: one row per proposal with per-rank counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalResult {
    pub proposal: Proposal,
    pub proposed_by_name: String,
    pub vote_count: i64,
    pub first_place_votes: i64,
    pub second_place_votes: i64,
    pub third_place_votes: i64,
    pub is_winner: bool,
}

/// Outcome of a close attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// This caller won the transition; carries the recorded winner.
    Closed(Option<ProposalId>),
    /// Another unit of work flipped the round first; nothing was written.
    LostRace,
}

/// Repository interface for round lifecycle and proposal operations.
pub trait RoundRepository {
    fn create_round(&self, round: &Round) -> RepoResult<RoundId>;
    fn get_round(&self, id: RoundId) -> RepoResult<Option<Round>>;
    fn list_round_summaries(&self) -> RepoResult<Vec<RoundSummary>>;
    /// Applies title/deadline/status edits. Transition legality is the
    /// service's concern; this writes what it is given.
    fn update_round(&self, id: RoundId, patch: &RoundPatch) -> RepoResult<()>;
    fn create_proposal(&self, proposal: &Proposal) -> RepoResult<ProposalId>;
    fn get_proposal(&self, id: ProposalId) -> RepoResult<Option<Proposal>>;
    fn list_proposals(&self, round_id: RoundId) -> RepoResult<Vec<Proposal>>;
    fn delete_proposal(&self, id: ProposalId) -> RepoResult<()>;
    fn round_results(&self, round_id: RoundId) -> RepoResult<Vec<ProposalResult>>;
    /// Recomputes scores, picks the winner, and flips status open→closed in
    /// one transaction guarded by `status='open'`.
    fn finalize_round(&mut self, round_id: RoundId) -> RepoResult<CloseOutcome>;
}

/// SQLite-backed round repository.
pub struct SqliteRoundRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteRoundRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn, &["rounds", "proposals", "votes", "members"])?;
        Ok(Self { conn })
    }
}

impl RoundRepository for SqliteRoundRepository<'_> {
    fn create_round(&self, round: &Round) -> RepoResult<RoundId> {
        round.validate()?;

        self.conn.execute(
            "INSERT INTO rounds (uuid, title, voting_method, status, deadline, created_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                round.uuid.to_string(),
                round.title.trim(),
                voting_method_to_db(round.voting_method),
                round_status_to_db(round.status),
                round.deadline,
                round.created_by.to_string(),
            ],
        )?;

        Ok(round.uuid)
    }

    fn get_round(&self, id: RoundId) -> RepoResult<Option<Round>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ROUND_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_round_row(row)?));
        }
        Ok(None)
    }

    fn list_round_summaries(&self) -> RepoResult<Vec<RoundSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                r.uuid,
                r.title,
                r.voting_method,
                r.status,
                r.deadline,
                r.winning_proposal_uuid,
                r.created_by,
                r.created_at,
                r.updated_at,
                m.display_name AS created_by_name,
                COUNT(DISTINCT p.uuid) AS proposal_count,
                wp.title AS winning_title,
                wp.author AS winning_author
             FROM rounds r
             JOIN members m ON m.uuid = r.created_by
             LEFT JOIN proposals p ON p.round_uuid = r.uuid
             LEFT JOIN proposals wp ON wp.uuid = r.winning_proposal_uuid
             GROUP BY r.uuid
             ORDER BY r.created_at DESC, r.uuid ASC;",
        )?;

        let mut rows = stmt.query([])?;
        let mut summaries = Vec::new();
        while let Some(row) = rows.next()? {
            summaries.push(RoundSummary {
                round: parse_round_row(row)?,
                created_by_name: row.get("created_by_name")?,
                proposal_count: row.get("proposal_count")?,
                winning_title: row.get("winning_title")?,
                winning_author: row.get("winning_author")?,
            });
        }

        Ok(summaries)
    }

    fn update_round(&self, id: RoundId, patch: &RoundPatch) -> RepoResult<()> {
        if patch.is_empty() {
            return Err(RepoError::Validation(ValidationError::new(
                "patch",
                "no fields to update",
            )));
        }

        let mut assignments: Vec<&'static str> = Vec::new();
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(title) = patch.title.as_deref() {
            validate_title(title)?;
            assignments.push("title = ?");
            bind_values.push(Value::Text(title.trim().to_string()));
        }
        if let Some(deadline) = patch.deadline {
            assignments.push("deadline = ?");
            bind_values.push(match deadline {
                Some(value) => Value::Integer(value),
                None => Value::Null,
            });
        }
        if let Some(status) = patch.status {
            assignments.push("status = ?");
            bind_values.push(Value::Text(round_status_to_db(status).to_string()));
        }

        let sql = format!(
            "UPDATE rounds
             SET {}, updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?;",
            assignments.join(", ")
        );
        bind_values.push(Value::Text(id.to_string()));

        let changed = self.conn.execute(&sql, params_from_iter(bind_values))?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }

    fn create_proposal(&self, proposal: &Proposal) -> RepoResult<ProposalId> {
        proposal.validate()?;

        self.conn.execute(
            "INSERT INTO proposals (
                uuid,
                round_uuid,
                title,
                author,
                description,
                cover_url,
                proposed_by,
                vote_score
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                proposal.uuid.to_string(),
                proposal.round_id.to_string(),
                proposal.title.trim(),
                proposal.author.as_deref().map(str::trim),
                proposal.description.as_deref().map(str::trim),
                proposal.cover_url.as_deref().map(str::trim),
                proposal.proposed_by.to_string(),
                proposal.vote_score,
            ],
        )?;

        Ok(proposal.uuid)
    }

    fn get_proposal(&self, id: ProposalId) -> RepoResult<Option<Proposal>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PROPOSAL_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_proposal_row(row)?));
        }
        Ok(None)
    }

    fn list_proposals(&self, round_id: RoundId) -> RepoResult<Vec<Proposal>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PROPOSAL_SELECT_SQL}
             WHERE round_uuid = ?1
             ORDER BY vote_score DESC, created_at ASC;"
        ))?;
        let mut rows = stmt.query([round_id.to_string()])?;
        let mut proposals = Vec::new();
        while let Some(row) = rows.next()? {
            proposals.push(parse_proposal_row(row)?);
        }
        Ok(proposals)
    }

    fn delete_proposal(&self, id: ProposalId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM proposals WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn round_results(&self, round_id: RoundId) -> RepoResult<Vec<ProposalResult>> {
        let round = self
            .get_round(round_id)?
            .ok_or(RepoError::NotFound(round_id))?;

        let mut stmt = self.conn.prepare(
            "SELECT
                p.uuid,
                p.round_uuid,
                p.title,
                p.author,
                p.description,
                p.cover_url,
                p.proposed_by,
                p.vote_score,
                p.created_at,
                p.updated_at,
                m.display_name AS proposed_by_name,
                COUNT(v.rank) AS vote_count,
                COUNT(CASE WHEN v.rank = 1 THEN 1 END) AS first_place_votes,
                COUNT(CASE WHEN v.rank = 2 THEN 1 END) AS second_place_votes,
                COUNT(CASE WHEN v.rank = 3 THEN 1 END) AS third_place_votes
             FROM proposals p
             JOIN members m ON m.uuid = p.proposed_by
             LEFT JOIN votes v ON v.proposal_uuid = p.uuid AND v.round_uuid = ?1
             WHERE p.round_uuid = ?1
             GROUP BY p.uuid
             ORDER BY p.vote_score DESC, p.created_at ASC;",
        )?;

        let mut rows = stmt.query([round_id.to_string()])?;
        let mut results = Vec::new();
        while let Some(row) = rows.next()? {
            let proposal = parse_proposal_row(row)?;
            let is_winner = round.winning_proposal_id == Some(proposal.uuid);
            results.push(ProposalResult {
                proposal,
                proposed_by_name: row.get("proposed_by_name")?,
                vote_count: row.get("vote_count")?,
                first_place_votes: row.get("first_place_votes")?,
                second_place_votes: row.get("second_place_votes")?,
                third_place_votes: row.get("third_place_votes")?,
                is_winner,
            });
        }

        Ok(results)
    }

    fn finalize_round(&mut self, round_id: RoundId) -> RepoResult<CloseOutcome> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let snapshot =
            load_tally_snapshot(&tx, round_id)?.ok_or(RepoError::NotFound(round_id))?;
        let scores = tally::score_proposals(snapshot.method, &snapshot.proposals, &snapshot.votes);
        let winner = tally::determine_winner(snapshot.method, &snapshot.proposals, &snapshot.votes);
        persist_scores(&tx, &scores)?;

        let changed = tx.execute(
            "UPDATE rounds
             SET
                status = 'closed',
                winning_proposal_uuid = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1
               AND status = 'open';",
            params![round_id.to_string(), winner.map(|id| id.to_string())],
        )?;

        if changed == 0 {
            // Dropping the transaction rolls the score writes back; the
            // winner recorded by whoever won the race stays authoritative.
            return Ok(CloseOutcome::LostRace);
        }

        tx.commit()?;
        Ok(CloseOutcome::Closed(winner))
    }
}

pub(crate) fn voting_method_to_db(method: VotingMethod) -> &'static str {
    match method {
        VotingMethod::Approval => "approval",
        VotingMethod::RankedChoice => "ranked_choice",
    }
}

pub(crate) fn parse_voting_method(value: &str) -> RepoResult<VotingMethod> {
    match value {
        "approval" => Ok(VotingMethod::Approval),
        "ranked_choice" => Ok(VotingMethod::RankedChoice),
        other => Err(RepoError::InvalidData(format!(
            "invalid voting method `{other}` in rounds.voting_method"
        ))),
    }
}

pub(crate) fn round_status_to_db(status: RoundStatus) -> &'static str {
    match status {
        RoundStatus::Open => "open",
        RoundStatus::Closed => "closed",
        RoundStatus::Archived => "archived",
    }
}

pub(crate) fn parse_round_status(value: &str) -> RepoResult<RoundStatus> {
    match value {
        "open" => Ok(RoundStatus::Open),
        "closed" => Ok(RoundStatus::Closed),
        "archived" => Ok(RoundStatus::Archived),
        other => Err(RepoError::InvalidData(format!(
            "invalid round status `{other}` in rounds.status"
        ))),
    }
}

fn parse_round_row(row: &Row<'_>) -> RepoResult<Round> {
    let uuid_text: String = row.get("uuid")?;
    let method_text: String = row.get("voting_method")?;
    let status_text: String = row.get("status")?;
    let created_by_text: String = row.get("created_by")?;
    let winning_text: Option<String> = row.get("winning_proposal_uuid")?;

    let winning_proposal_id = match winning_text {
        Some(value) => Some(parse_uuid(&value, "rounds.winning_proposal_uuid")?),
        None => None,
    };

    Ok(Round {
        uuid: parse_uuid(&uuid_text, "rounds.uuid")?,
        title: row.get("title")?,
        voting_method: parse_voting_method(&method_text)?,
        status: parse_round_status(&status_text)?,
        deadline: row.get("deadline")?,
        winning_proposal_id,
        created_by: parse_uuid(&created_by_text, "rounds.created_by")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub(crate) fn parse_proposal_row(row: &Row<'_>) -> RepoResult<Proposal> {
    let uuid_text: String = row.get("uuid")?;
    let round_text: String = row.get("round_uuid")?;
    let proposer_text: String = row.get("proposed_by")?;

    Ok(Proposal {
        uuid: parse_uuid(&uuid_text, "proposals.uuid")?,
        round_id: parse_uuid(&round_text, "proposals.round_uuid")?,
        title: row.get("title")?,
        author: row.get("author")?,
        description: row.get("description")?,
        cover_url: row.get("cover_url")?,
        proposed_by: parse_uuid(&proposer_text, "proposals.proposed_by")?,
        vote_score: row.get("vote_score")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
