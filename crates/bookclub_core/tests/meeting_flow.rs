use bookclub_core::db::open_db_in_memory;
use bookclub_core::{
    Actor, AvailabilityResponse, CreateRoundRequest, Meeting, MeetingService, Member,
    MemberRepository, MemberRole, NotificationService, ProposeSlotRequest, Round, RoundId,
    RoundService, ServiceError, ServiceResult, SqliteMeetingRepository, SqliteMemberRepository,
    SqliteNotificationRepository, SqliteRoundRepository, VotingMethod,
};
use rusqlite::Connection;

const SLOT_EPOCH_MS: i64 = 1_735_689_600_000; // 2025-01-01 00:00 UTC

fn seed_member(conn: &Connection, name: &str, role: MemberRole) -> Actor {
    seed_member_with_channel(conn, name, role, None)
}

fn seed_member_with_channel(
    conn: &Connection,
    name: &str,
    role: MemberRole,
    channel: Option<&str>,
) -> Actor {
    let mut member = Member::new(name, role);
    member.contact_channel = channel.map(str::to_string);
    let repo = SqliteMemberRepository::try_new(conn).unwrap();
    repo.upsert_member(&member).unwrap();
    Actor::new(member.uuid, role)
}

fn create_round(conn: &mut Connection, actor: &Actor) -> Round {
    let repo = SqliteRoundRepository::try_new(conn).unwrap();
    RoundService::new(repo)
        .create_round(
            actor,
            &CreateRoundRequest {
                title: "Next book".to_string(),
                voting_method: VotingMethod::Approval,
                deadline: None,
            },
        )
        .unwrap()
}

fn propose_slot(conn: &mut Connection, actor: &Actor, round_id: RoundId) -> Meeting {
    let repo = SqliteMeetingRepository::try_new(conn).unwrap();
    MeetingService::new(repo)
        .propose_slot(
            actor,
            round_id,
            &ProposeSlotRequest {
                scheduled_at: SLOT_EPOCH_MS,
                location: Some("Library annex".to_string()),
                ..ProposeSlotRequest::default()
            },
        )
        .unwrap()
}

fn respond(
    conn: &mut Connection,
    actor: &Actor,
    meeting: &Meeting,
    response: AvailabilityResponse,
) {
    let repo = SqliteMeetingRepository::try_new(conn).unwrap();
    MeetingService::new(repo)
        .respond(actor, meeting.uuid, response)
        .unwrap();
}

fn confirm(conn: &mut Connection, actor: &Actor, meeting: &Meeting) -> ServiceResult<Meeting> {
    let repo = SqliteMeetingRepository::try_new(conn).unwrap();
    MeetingService::new(repo).confirm(actor, meeting.uuid)
}

fn notification_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM notifications;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn slots_may_be_proposed_even_after_voting_closes() {
    let mut conn = open_db_in_memory().unwrap();
    let admin = seed_member(&conn, "organizer", MemberRole::Admin);
    let alice = seed_member(&conn, "alice", MemberRole::Member);

    let round = create_round(&mut conn, &admin);
    {
        let repo = SqliteRoundRepository::try_new(&mut conn).unwrap();
        RoundService::new(repo).close_round(&admin, round.uuid).unwrap();
    }

    let meeting = propose_slot(&mut conn, &alice, round.uuid);
    assert!(!meeting.is_confirmed());
    assert_eq!(meeting.location.as_deref(), Some("Library annex"));
}

#[test]
fn repeated_responses_keep_one_row_with_the_latest_answer() {
    let mut conn = open_db_in_memory().unwrap();
    let admin = seed_member(&conn, "organizer", MemberRole::Admin);
    let alice = seed_member(&conn, "alice", MemberRole::Member);
    let bob = seed_member(&conn, "bob", MemberRole::Member);

    let round = create_round(&mut conn, &admin);
    let meeting = propose_slot(&mut conn, &alice, round.uuid);

    respond(&mut conn, &alice, &meeting, AvailabilityResponse::Yes);
    respond(&mut conn, &alice, &meeting, AvailabilityResponse::No);
    respond(&mut conn, &bob, &meeting, AvailabilityResponse::Maybe);

    let row_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM availability WHERE meeting_uuid = ?1;",
            [meeting.uuid.to_string()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(row_count, 2);

    let repo = SqliteMeetingRepository::try_new(&mut conn).unwrap();
    let overviews = MeetingService::new(repo)
        .meetings_for_round(&alice, round.uuid)
        .unwrap();
    assert_eq!(overviews.len(), 1);
    let overview = &overviews[0];
    assert_eq!(overview.yes_count, 0);
    assert_eq!(overview.maybe_count, 1);
    assert_eq!(overview.no_count, 1);
    assert_eq!(overview.my_response, Some(AvailabilityResponse::No));
    assert_eq!(overview.proposed_by_name, "alice");
}

#[test]
fn confirmation_fans_out_one_notification_per_member() {
    let mut conn = open_db_in_memory().unwrap();
    let admin = seed_member(&conn, "organizer", MemberRole::Admin);
    let alice = seed_member_with_channel(&conn, "alice", MemberRole::Member, Some(" SMS "));
    let _bob = seed_member(&conn, "bob", MemberRole::Member);

    let round = create_round(&mut conn, &admin);
    let meeting = propose_slot(&mut conn, &admin, round.uuid);

    let confirmed = confirm(&mut conn, &admin, &meeting).unwrap();
    assert!(confirmed.is_confirmed());
    assert_eq!(notification_count(&conn), 3);

    let repo = SqliteNotificationRepository::try_new(&mut conn).unwrap();
    let service = NotificationService::new(repo);

    let for_alice = service.notifications_for(&alice, None, 0).unwrap();
    assert_eq!(for_alice.len(), 1);
    // Preferred channel is trimmed and lowercased; unset falls back to email.
    assert_eq!(for_alice[0].channel, "sms");
    assert_eq!(for_alice[0].subject.as_deref(), Some("Meeting confirmed"));
    assert!(for_alice[0].body.contains("2025-01-01"));
    assert!(for_alice[0].body.contains("Library annex"));

    let for_admin = service.notifications_for(&admin, None, 0).unwrap();
    assert_eq!(for_admin.len(), 1);
    assert_eq!(for_admin[0].channel, "email");
}

#[test]
fn reconfirming_is_a_policy_error_without_duplicate_fan_out() {
    let mut conn = open_db_in_memory().unwrap();
    let admin = seed_member(&conn, "organizer", MemberRole::Admin);
    seed_member(&conn, "alice", MemberRole::Member);

    let round = create_round(&mut conn, &admin);
    let meeting = propose_slot(&mut conn, &admin, round.uuid);

    confirm(&mut conn, &admin, &meeting).unwrap();
    let first_count = notification_count(&conn);

    let err = confirm(&mut conn, &admin, &meeting).unwrap_err();
    assert!(matches!(err, ServiceError::Policy(_)));
    assert_eq!(notification_count(&conn), first_count);
}

#[test]
fn confirming_requires_organizer_role() {
    let mut conn = open_db_in_memory().unwrap();
    let admin = seed_member(&conn, "organizer", MemberRole::Admin);
    let alice = seed_member(&conn, "alice", MemberRole::Member);

    let round = create_round(&mut conn, &admin);
    let meeting = propose_slot(&mut conn, &alice, round.uuid);

    let err = confirm(&mut conn, &alice, &meeting).unwrap_err();
    assert!(matches!(err, ServiceError::Policy(_)));
    assert_eq!(notification_count(&conn), 0);
}

#[test]
fn slot_deletion_is_limited_to_proposer_or_organizer_while_proposed() {
    let mut conn = open_db_in_memory().unwrap();
    let admin = seed_member(&conn, "organizer", MemberRole::Admin);
    let alice = seed_member(&conn, "alice", MemberRole::Member);
    let bob = seed_member(&conn, "bob", MemberRole::Member);

    let round = create_round(&mut conn, &admin);
    let of_alice = propose_slot(&mut conn, &alice, round.uuid);
    let of_bob = propose_slot(&mut conn, &bob, round.uuid);

    {
        let repo = SqliteMeetingRepository::try_new(&mut conn).unwrap();
        let service = MeetingService::new(repo);

        let err = service.delete_slot(&bob, of_alice.uuid).unwrap_err();
        assert!(matches!(err, ServiceError::Policy(_)));

        service.delete_slot(&alice, of_alice.uuid).unwrap();
        service.delete_slot(&admin, of_bob.uuid).unwrap();
    }

    let confirmed = propose_slot(&mut conn, &alice, round.uuid);
    confirm(&mut conn, &admin, &confirmed).unwrap();

    let repo = SqliteMeetingRepository::try_new(&mut conn).unwrap();
    let err = MeetingService::new(repo)
        .delete_slot(&admin, confirmed.uuid)
        .unwrap_err();
    assert!(matches!(err, ServiceError::Policy(_)));
}

#[test]
fn meetings_for_an_unknown_round_are_not_found() {
    let mut conn = open_db_in_memory().unwrap();
    let alice = seed_member(&conn, "alice", MemberRole::Member);

    let repo = SqliteMeetingRepository::try_new(&mut conn).unwrap();
    let err = MeetingService::new(repo)
        .meetings_for_round(&alice, uuid::Uuid::new_v4())
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { entity: "round", .. }));
}

#[test]
fn meetings_list_orders_by_scheduled_time() {
    let mut conn = open_db_in_memory().unwrap();
    let admin = seed_member(&conn, "organizer", MemberRole::Admin);
    let alice = seed_member(&conn, "alice", MemberRole::Member);

    let round = create_round(&mut conn, &admin);

    let later = {
        let repo = SqliteMeetingRepository::try_new(&mut conn).unwrap();
        MeetingService::new(repo)
            .propose_slot(
                &alice,
                round.uuid,
                &ProposeSlotRequest {
                    scheduled_at: SLOT_EPOCH_MS + 86_400_000,
                    ..ProposeSlotRequest::default()
                },
            )
            .unwrap()
    };
    let earlier = propose_slot(&mut conn, &alice, round.uuid);

    let repo = SqliteMeetingRepository::try_new(&mut conn).unwrap();
    let overviews = MeetingService::new(repo)
        .meetings_for_round(&alice, round.uuid)
        .unwrap();
    assert_eq!(overviews.len(), 2);
    assert_eq!(overviews[0].meeting.uuid, earlier.uuid);
    assert_eq!(overviews[1].meeting.uuid, later.uuid);
}
