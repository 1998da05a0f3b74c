//! Member directory repository.
//!
//! The host owns member profile lifecycle; the core keeps a minimal
//! directory so it can resolve display names, roles, and notification
//! channels. `upsert_member` is the boundary through which the host mirrors
//! its member records in.

use crate::model::member::{Member, MemberId, MemberRole};
use crate::repo::{ensure_schema_ready, parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

const MEMBER_SELECT_SQL: &str = "SELECT
    uuid,
    display_name,
    role,
    contact_channel,
    created_at,
    updated_at
FROM members";

/// Repository interface for the member directory.
pub trait MemberRepository {
    /// Inserts or refreshes the member record keyed by its stable ID.
    fn upsert_member(&self, member: &Member) -> RepoResult<MemberId>;
    fn get_member(&self, id: MemberId) -> RepoResult<Option<Member>>;
    fn list_members(&self) -> RepoResult<Vec<Member>>;
}

/// SQLite-backed member directory.
pub struct SqliteMemberRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMemberRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn, &["members"])?;
        Ok(Self { conn })
    }
}

impl MemberRepository for SqliteMemberRepository<'_> {
    fn upsert_member(&self, member: &Member) -> RepoResult<MemberId> {
        member.validate()?;

        self.conn.execute(
            "INSERT INTO members (uuid, display_name, role, contact_channel)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (uuid) DO UPDATE SET
                display_name = excluded.display_name,
                role = excluded.role,
                contact_channel = excluded.contact_channel,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                member.uuid.to_string(),
                member.display_name.trim(),
                member_role_to_db(member.role),
                member.contact_channel.as_deref().map(str::trim),
            ],
        )?;

        Ok(member.uuid)
    }

    fn get_member(&self, id: MemberId) -> RepoResult<Option<Member>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{MEMBER_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_member_row(row)?));
        }
        Ok(None)
    }

    fn list_members(&self) -> RepoResult<Vec<Member>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{MEMBER_SELECT_SQL} ORDER BY display_name ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut members = Vec::new();
        while let Some(row) = rows.next()? {
            members.push(parse_member_row(row)?);
        }
        Ok(members)
    }
}

pub(crate) fn member_role_to_db(role: MemberRole) -> &'static str {
    match role {
        MemberRole::Member => "member",
        MemberRole::Admin => "admin",
    }
}

pub(crate) fn parse_member_role(value: &str) -> RepoResult<MemberRole> {
    match value {
        "member" => Ok(MemberRole::Member),
        "admin" => Ok(MemberRole::Admin),
        other => Err(RepoError::InvalidData(format!(
            "invalid member role `{other}` in members.role"
        ))),
    }
}

pub(crate) fn parse_member_row(row: &Row<'_>) -> RepoResult<Member> {
    let uuid_text: String = row.get("uuid")?;
    let role_text: String = row.get("role")?;

    Ok(Member {
        uuid: parse_uuid(&uuid_text, "members.uuid")?,
        display_name: row.get("display_name")?,
        role: parse_member_role(&role_text)?,
        contact_channel: row.get("contact_channel")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
