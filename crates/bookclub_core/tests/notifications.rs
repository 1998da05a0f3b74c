use bookclub_core::db::open_db_in_memory;
use bookclub_core::repo::notification_repo::normalize_notification_limit;
use bookclub_core::{
    Actor, Member, MemberRepository, MemberRole, NotificationService, Round, RoundStatus,
    ServiceError, SqliteMemberRepository, SqliteNotificationRepository, VotingMethod,
};
use rusqlite::Connection;

fn seed_member(conn: &Connection, name: &str, role: MemberRole) -> Actor {
    let member = Member::new(name, role);
    let repo = SqliteMemberRepository::try_new(conn).unwrap();
    repo.upsert_member(&member).unwrap();
    Actor::new(member.uuid, role)
}

#[test]
fn broadcast_reaches_every_member_on_their_channel() {
    let mut conn = open_db_in_memory().unwrap();
    let admin = seed_member(&conn, "organizer", MemberRole::Admin);
    let alice = seed_member(&conn, "alice", MemberRole::Member);
    seed_member(&conn, "bob", MemberRole::Member);

    let repo = SqliteNotificationRepository::try_new(&mut conn).unwrap();
    let mut service = NotificationService::new(repo);

    let written = service
        .broadcast(&admin, Some("Schedule change"), "We moved to Thursdays.")
        .unwrap();
    assert_eq!(written, 3);

    let for_alice = service.notifications_for(&alice, None, 0).unwrap();
    assert_eq!(for_alice.len(), 1);
    assert_eq!(for_alice[0].channel, "email");
    assert_eq!(for_alice[0].subject.as_deref(), Some("Schedule change"));
    assert_eq!(for_alice[0].body, "We moved to Thursdays.");
    assert_eq!(for_alice[0].member_id, alice.member_id);
}

#[test]
fn broadcast_requires_organizer_and_a_body() {
    let mut conn = open_db_in_memory().unwrap();
    let admin = seed_member(&conn, "organizer", MemberRole::Admin);
    let alice = seed_member(&conn, "alice", MemberRole::Member);

    let repo = SqliteNotificationRepository::try_new(&mut conn).unwrap();
    let mut service = NotificationService::new(repo);

    let err = service.broadcast(&alice, None, "hello").unwrap_err();
    assert!(matches!(err, ServiceError::Policy(_)));

    let err = service.broadcast(&admin, None, "   ").unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}

#[test]
fn notifications_list_newest_first_with_pagination() {
    let mut conn = open_db_in_memory().unwrap();
    let admin = seed_member(&conn, "organizer", MemberRole::Admin);

    {
        let repo = SqliteNotificationRepository::try_new(&mut conn).unwrap();
        let mut service = NotificationService::new(repo);
        service.broadcast(&admin, None, "first").unwrap();
        service.broadcast(&admin, None, "second").unwrap();
    }

    // Pin timestamps so ordering does not depend on sub-millisecond timing.
    conn.execute(
        "UPDATE notifications SET created_at = 1000 WHERE body = 'first';",
        [],
    )
    .unwrap();
    conn.execute(
        "UPDATE notifications SET created_at = 2000 WHERE body = 'second';",
        [],
    )
    .unwrap();

    let repo = SqliteNotificationRepository::try_new(&mut conn).unwrap();
    let service = NotificationService::new(repo);

    let all = service.notifications_for(&admin, None, 0).unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].body, "second");
    assert_eq!(all[1].body, "first");

    let page = service.notifications_for(&admin, Some(1), 1).unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].body, "first");
}

#[test]
fn list_limits_are_clamped() {
    assert_eq!(normalize_notification_limit(None), 20);
    assert_eq!(normalize_notification_limit(Some(0)), 20);
    assert_eq!(normalize_notification_limit(Some(7)), 7);
    assert_eq!(normalize_notification_limit(Some(500)), 100);
}

#[test]
fn domain_models_serialize_with_snake_case_enums() {
    let admin = Member::new("organizer", MemberRole::Admin);
    let round = Round::new(
        "Next book",
        VotingMethod::RankedChoice,
        None,
        admin.uuid,
    );

    let value = serde_json::to_value(&round).unwrap();
    assert_eq!(value["voting_method"], "ranked_choice");
    assert_eq!(value["status"], "open");
    assert!(value["winning_proposal_id"].is_null());

    let parsed: Round = serde_json::from_value(value).unwrap();
    assert_eq!(parsed.status, RoundStatus::Open);
}
