//! Vote repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Replace one member's ballot for a round atomically.
//! - Keep the derived scoreboard consistent with the vote set.
//!
//! # Invariants
//! - `replace_ballot` deletes, inserts and rescores inside one immediate
//!   transaction; a concurrent reader sees the old ballot or the new one,
//!   never a mix.
//! - At most one vote row exists per (round, member, proposal).

use crate::model::member::MemberId;
use crate::model::proposal::ProposalId;
use crate::model::round::{RoundId, RoundStatus, VotingMethod};
use crate::model::vote::Vote;
use crate::repo::round_repo::{parse_round_status, parse_voting_method};
use crate::repo::{
    ensure_schema_ready, load_tally_snapshot, parse_uuid, persist_scores, RepoError, RepoResult,
};
use crate::tally;
use rusqlite::{params, params_from_iter, Connection, Row, TransactionBehavior};

pub(crate) const VOTE_SELECT_SQL: &str = "SELECT
    round_uuid,
    member_uuid,
    proposal_uuid,
    rank,
    created_at
FROM votes";

/// Repository interface for ballot submission and vote queries.
pub trait BallotRepository {
    /// Returns the round's status and voting method, or `None` when the
    /// round does not exist.
    fn voting_context(&self, round_id: RoundId) -> RepoResult<Option<(RoundStatus, VotingMethod)>>;
    /// Counts how many of `proposal_ids` belong to the round.
    fn count_proposals_in_round(
        &self,
        round_id: RoundId,
        proposal_ids: &[ProposalId],
    ) -> RepoResult<usize>;
    /// Replaces the member's full ballot and rescores the round in one
    /// transaction. An empty ballot withdraws all of the member's votes.
    /// Returns `false` without writing when the round was no longer open
    /// once the transaction held the write lock.
    fn replace_ballot(
        &mut self,
        round_id: RoundId,
        member_id: MemberId,
        ballot: &[(ProposalId, u8)],
    ) -> RepoResult<bool>;
    /// The member's current ballot rows, ordered by rank.
    fn member_votes(&self, round_id: RoundId, member_id: MemberId) -> RepoResult<Vec<Vote>>;
}

/// SQLite-backed ballot repository.
pub struct SqliteBallotRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteBallotRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn, &["rounds", "proposals", "votes"])?;
        Ok(Self { conn })
    }
}

impl BallotRepository for SqliteBallotRepository<'_> {
    fn voting_context(&self, round_id: RoundId) -> RepoResult<Option<(RoundStatus, VotingMethod)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, voting_method FROM rounds WHERE uuid = ?1;")?;
        let mut rows = stmt.query([round_id.to_string()])?;
        if let Some(row) = rows.next()? {
            let status_text: String = row.get("status")?;
            let method_text: String = row.get("voting_method")?;
            return Ok(Some((
                parse_round_status(&status_text)?,
                parse_voting_method(&method_text)?,
            )));
        }
        Ok(None)
    }

    fn count_proposals_in_round(
        &self,
        round_id: RoundId,
        proposal_ids: &[ProposalId],
    ) -> RepoResult<usize> {
        if proposal_ids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; proposal_ids.len()].join(", ");
        let sql = format!(
            "SELECT COUNT(*)
             FROM proposals
             WHERE round_uuid = ?
               AND uuid IN ({placeholders});"
        );

        let mut bind_values = Vec::with_capacity(proposal_ids.len() + 1);
        bind_values.push(round_id.to_string());
        bind_values.extend(proposal_ids.iter().map(|id| id.to_string()));

        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(bind_values), |row| row.get(0))?;
        Ok(count as usize)
    }

    fn replace_ballot(
        &mut self,
        round_id: RoundId,
        member_id: MemberId,
        ballot: &[(ProposalId, u8)],
    ) -> RepoResult<bool> {
        let round_uuid = round_id.to_string();
        let member_uuid = member_id.to_string();

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        // Re-check under the write lock: a close that committed between the
        // caller's validation and this transaction must win.
        let status = {
            let mut stmt = tx.prepare("SELECT status FROM rounds WHERE uuid = ?1;")?;
            let mut rows = stmt.query([round_uuid.as_str()])?;
            match rows.next()? {
                Some(row) => {
                    let value: String = row.get(0)?;
                    parse_round_status(&value)?
                }
                None => return Err(RepoError::NotFound(round_id)),
            }
        };
        if status != RoundStatus::Open {
            return Ok(false);
        }

        tx.execute(
            "DELETE FROM votes WHERE round_uuid = ?1 AND member_uuid = ?2;",
            params![round_uuid.as_str(), member_uuid.as_str()],
        )?;

        for (proposal_id, rank) in ballot {
            tx.execute(
                "INSERT INTO votes (round_uuid, member_uuid, proposal_uuid, rank)
                 VALUES (?1, ?2, ?3, ?4);",
                params![
                    round_uuid.as_str(),
                    member_uuid.as_str(),
                    proposal_id.to_string(),
                    rank,
                ],
            )?;
        }

        let snapshot =
            load_tally_snapshot(&tx, round_id)?.ok_or(RepoError::NotFound(round_id))?;
        let scores = tally::score_proposals(snapshot.method, &snapshot.proposals, &snapshot.votes);
        persist_scores(&tx, &scores)?;

        tx.commit()?;
        Ok(true)
    }

    fn member_votes(&self, round_id: RoundId, member_id: MemberId) -> RepoResult<Vec<Vote>> {
        let mut stmt = self.conn.prepare(&format!(
            "{VOTE_SELECT_SQL}
             WHERE round_uuid = ?1
               AND member_uuid = ?2
             ORDER BY rank ASC;"
        ))?;
        let mut rows = stmt.query(params![round_id.to_string(), member_id.to_string()])?;
        let mut votes = Vec::new();
        while let Some(row) = rows.next()? {
            votes.push(parse_vote_row(row)?);
        }
        Ok(votes)
    }
}

pub(crate) fn parse_vote_row(row: &Row<'_>) -> RepoResult<Vote> {
    let round_text: String = row.get("round_uuid")?;
    let member_text: String = row.get("member_uuid")?;
    let proposal_text: String = row.get("proposal_uuid")?;
    let rank: i64 = row.get("rank")?;

    let rank = u8::try_from(rank).map_err(|_| {
        RepoError::InvalidData(format!("invalid rank value `{rank}` in votes.rank"))
    })?;

    Ok(Vote {
        round_id: parse_uuid(&round_text, "votes.round_uuid")?,
        member_id: parse_uuid(&member_text, "votes.member_uuid")?,
        proposal_id: parse_uuid(&proposal_text, "votes.proposal_uuid")?,
        rank,
        created_at: row.get("created_at")?,
    })
}
