//! Invitations, RSVPs, removal, and host transfer.

mod common;

use uuid::Uuid;

use potluck_core::{ErrorKind, MealStore};
use potluck_db::models::{Course, ParticipantRole, RsvpStatus};

use common::{Table, kind};

async fn role_of(table: &Table, user: Uuid) -> Option<(ParticipantRole, RsvpStatus)> {
    table
        .store
        .get_participant(table.meal.id, user)
        .await
        .unwrap()
        .map(|p| (p.role, p.rsvp_status))
}

async fn accepted_hosts(table: &Table) -> usize {
    table
        .store
        .list_participants(table.meal.id)
        .await
        .unwrap()
        .iter()
        .filter(|p| p.is_accepted_host())
        .count()
}

// ---------------------------------------------------------------------------
// Invitations and RSVPs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn creator_is_accepted_host() {
    let table = Table::new().await;
    assert_eq!(
        role_of(&table, table.host).await,
        Some((ParticipantRole::Host, RsvpStatus::Accepted))
    );
}

#[tokio::test]
async fn invite_skips_host_existing_and_duplicates() {
    let table = Table::new().await;
    let existing = table.guest().await;
    let fresh = Uuid::new_v4();

    let invited = table
        .engine
        .participants
        .invite(table.meal.id, table.host, &[table.host, existing, fresh, fresh])
        .await
        .unwrap();

    assert_eq!(invited.len(), 1);
    assert_eq!(invited[0].user_id, fresh);
    assert_eq!(invited[0].rsvp_status, RsvpStatus::Pending);
    assert_eq!(invited[0].invited_by, Some(table.host));
    assert_eq!(
        role_of(&table, existing).await,
        Some((ParticipantRole::Attendee, RsvpStatus::Accepted)),
        "re-inviting must not reset an existing RSVP"
    );
}

#[tokio::test]
async fn only_host_invites() {
    let table = Table::new().await;
    let guest = table.guest().await;
    let result = table
        .engine
        .participants
        .invite(table.meal.id, guest, &[Uuid::new_v4()])
        .await;
    assert_eq!(kind(result), ErrorKind::PermissionDenied);
}

#[tokio::test]
async fn respond_records_timestamp() {
    let table = Table::new().await;
    let user = table.invited().await;

    let maybe = table
        .engine
        .participants
        .respond(table.meal.id, user, RsvpStatus::Maybe)
        .await
        .unwrap();
    assert_eq!(maybe.participant.rsvp_status, RsvpStatus::Maybe);
    assert!(maybe.participant.responded_at.is_some());
    assert!(maybe.released.is_empty());

    let declined = table
        .engine
        .participants
        .respond(table.meal.id, user, RsvpStatus::Declined)
        .await
        .unwrap();
    assert_eq!(declined.participant.rsvp_status, RsvpStatus::Declined);
}

#[tokio::test]
async fn respond_rejects_pending_and_strangers() {
    let table = Table::new().await;
    let user = table.invited().await;
    let participants = &table.engine.participants;

    assert_eq!(
        kind(participants.respond(table.meal.id, user, RsvpStatus::Pending).await),
        ErrorKind::Validation
    );
    assert_eq!(
        kind(
            participants
                .respond(table.meal.id, Uuid::new_v4(), RsvpStatus::Accepted)
                .await
        ),
        ErrorKind::NotFound
    );
}

#[tokio::test]
async fn respond_closed_after_completion() {
    let table = Table::new().await;
    let guest = table.guest().await;
    table
        .engine
        .meals
        .complete(table.meal.id, table.host)
        .await
        .unwrap();

    let result = table
        .engine
        .participants
        .respond(table.meal.id, guest, RsvpStatus::Declined)
        .await;
    assert_eq!(kind(result), ErrorKind::InvalidState);
}

#[tokio::test]
async fn stepping_back_releases_open_slots() {
    for response in [RsvpStatus::Declined, RsvpStatus::Maybe] {
        let table = Table::new().await;
        let guest = table.guest().await;
        let claimed = table.slot(Course::Main).await;
        let assigned = table.slot(Course::Side).await;
        table.engine.items.claim(claimed.id, guest).await.unwrap();
        table
            .engine
            .items
            .assign(assigned.id, table.host, guest)
            .await
            .unwrap();

        let change = table
            .engine
            .participants
            .respond(table.meal.id, guest, response)
            .await
            .unwrap();
        assert_eq!(change.participant.rsvp_status, response);
        assert_eq!(change.released.released_claims, 1);
        assert_eq!(change.released.cleared_assignments, 1);

        assert_eq!(table.item(claimed.id).await.claimed_by, None);
        assert_eq!(table.item(assigned.id).await.assigned_to, None);
    }
}

#[tokio::test]
async fn stepping_back_keeps_completed_dishes() {
    let table = Table::new().await;
    let guest = table.guest().await;
    let (cooked, dish) = table.cooked(guest, Course::Dessert).await;

    let change = table
        .engine
        .participants
        .respond(table.meal.id, guest, RsvpStatus::Declined)
        .await
        .unwrap();
    assert!(change.released.is_empty());

    let kept = table.item(cooked.id).await;
    assert_eq!(kept.claimed_by, Some(guest));
    assert_eq!(kept.dish_id, Some(dish));
}

#[tokio::test]
async fn store_refuses_slots_to_non_accepted_users() {
    let table = Table::new().await;
    let pending = table.invited().await;
    let declined = table.guest().await;
    table
        .engine
        .participants
        .respond(table.meal.id, declined, RsvpStatus::Declined)
        .await
        .unwrap();
    let slot = table.slot(Course::Main).await;

    for user in [pending, declined, Uuid::new_v4()] {
        assert!(
            table
                .store
                .claim_plan_item(slot.id, user, None, None)
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            table
                .store
                .set_assignment(slot.id, None, Some(user))
                .await
                .unwrap()
                .is_none()
        );
    }
    let untouched = table.item(slot.id).await;
    assert_eq!(untouched.claimed_by, None);
    assert_eq!(untouched.assigned_to, None);
}

// ---------------------------------------------------------------------------
// Host invariant
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sole_host_cannot_step_back() {
    let table = Table::new().await;
    for response in [RsvpStatus::Maybe, RsvpStatus::Declined] {
        let result = table
            .engine
            .participants
            .respond(table.meal.id, table.host, response)
            .await;
        assert_eq!(kind(result), ErrorKind::InvalidState);
    }
    assert_eq!(accepted_hosts(&table).await, 1);
}

#[tokio::test]
async fn store_refuses_to_strip_last_host() {
    let table = Table::new().await;
    let store = &table.store;

    assert!(
        store
            .update_rsvp(table.meal.id, table.host, RsvpStatus::Declined)
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        store
            .delete_participant(table.meal.id, table.host)
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(accepted_hosts(&table).await, 1);
}

#[tokio::test]
async fn host_cannot_remove_self() {
    let table = Table::new().await;
    let result = table
        .engine
        .participants
        .remove(table.meal.id, table.host, table.host)
        .await;
    assert_eq!(kind(result), ErrorKind::PermissionDenied);
    assert_eq!(accepted_hosts(&table).await, 1);
}

#[tokio::test]
async fn transfer_requires_accepted_target() {
    let table = Table::new().await;
    let guest = table.invited().await;
    let participants = &table.engine.participants;

    let result = participants.transfer_host(table.meal.id, table.host, guest).await;
    assert_eq!(kind(result), ErrorKind::PermissionDenied);
    assert_eq!(
        role_of(&table, table.host).await,
        Some((ParticipantRole::Host, RsvpStatus::Accepted))
    );

    participants
        .respond(table.meal.id, guest, RsvpStatus::Accepted)
        .await
        .unwrap();
    participants
        .transfer_host(table.meal.id, table.host, guest)
        .await
        .unwrap();

    assert_eq!(
        role_of(&table, guest).await,
        Some((ParticipantRole::Host, RsvpStatus::Accepted))
    );
    assert_eq!(
        role_of(&table, table.host).await,
        Some((ParticipantRole::Attendee, RsvpStatus::Accepted))
    );
    assert_eq!(accepted_hosts(&table).await, 1);
}

#[tokio::test]
async fn transfer_moves_authority() {
    let table = Table::new().await;
    let guest = table.guest().await;
    let participants = &table.engine.participants;
    participants
        .transfer_host(table.meal.id, table.host, guest)
        .await
        .unwrap();

    // The old host is now an ordinary attendee.
    assert_eq!(
        kind(participants.invite(table.meal.id, table.host, &[Uuid::new_v4()]).await),
        ErrorKind::PermissionDenied
    );
    participants
        .respond(table.meal.id, table.host, RsvpStatus::Declined)
        .await
        .unwrap();

    // The new host is bound by the same rule.
    assert_eq!(
        kind(participants.respond(table.meal.id, guest, RsvpStatus::Declined).await),
        ErrorKind::InvalidState
    );
    participants
        .invite(table.meal.id, guest, &[Uuid::new_v4()])
        .await
        .unwrap();
}

#[tokio::test]
async fn only_host_transfers() {
    let table = Table::new().await;
    let guest_a = table.guest().await;
    let guest_b = table.guest().await;
    let result = table
        .engine
        .participants
        .transfer_host(table.meal.id, guest_a, guest_b)
        .await;
    assert_eq!(kind(result), ErrorKind::PermissionDenied);
}

// ---------------------------------------------------------------------------
// Removal
// ---------------------------------------------------------------------------

#[tokio::test]
async fn remove_releases_claims_and_assignments() {
    let table = Table::new().await;
    let guest = table.guest().await;
    let claimed = table.slot(Course::Main).await;
    let assigned = table.slot(Course::Side).await;
    let recipe = table.recipe(guest, "Cornbread").await;
    table
        .engine
        .items
        .volunteer(claimed.id, guest, recipe)
        .await
        .unwrap();
    table
        .engine
        .items
        .assign(assigned.id, table.host, guest)
        .await
        .unwrap();

    let removal = table
        .engine
        .participants
        .remove(table.meal.id, table.host, guest)
        .await
        .unwrap();
    assert_eq!(removal.released_claims, 1);
    assert_eq!(removal.cleared_assignments, 1);

    assert_eq!(role_of(&table, guest).await, None);
    let released = table.item(claimed.id).await;
    assert_eq!(released.claimed_by, None);
    assert_eq!(released.recipe_id, None);
    assert_eq!(table.item(assigned.id).await.assigned_to, None);
}

#[tokio::test]
async fn remove_refused_while_holding_completed_dish() {
    let table = Table::new().await;
    let guest = table.guest().await;
    table.cooked(guest, Course::Dessert).await;

    let result = table
        .engine
        .participants
        .remove(table.meal.id, table.host, guest)
        .await;
    assert_eq!(kind(result), ErrorKind::InvalidState);
    assert!(role_of(&table, guest).await.is_some());
}

#[tokio::test]
async fn failed_remove_leaves_member_and_slots_intact() {
    let table = Table::new().await;
    let guest = table.guest().await;
    let claimed = table.slot(Course::Main).await;
    let assigned = table.slot(Course::Side).await;
    table.engine.items.claim(claimed.id, guest).await.unwrap();
    table
        .engine
        .items
        .assign(assigned.id, table.host, guest)
        .await
        .unwrap();

    table.store.fail_next("delete_participant");
    let result = table
        .engine
        .participants
        .remove(table.meal.id, table.host, guest)
        .await;
    assert_eq!(kind(result), ErrorKind::Store);

    assert_eq!(
        role_of(&table, guest).await,
        Some((ParticipantRole::Attendee, RsvpStatus::Accepted))
    );
    assert_eq!(table.item(claimed.id).await.claimed_by, Some(guest));
    assert_eq!(table.item(assigned.id).await.assigned_to, Some(guest));
}

#[tokio::test]
async fn store_delete_guards_completed_dishes() {
    let table = Table::new().await;
    let guest = table.guest().await;
    let (cooked, _) = table.cooked(guest, Course::Main).await;
    let open = table.slot(Course::Side).await;
    table.engine.items.claim(open.id, guest).await.unwrap();

    assert!(
        table
            .store
            .delete_participant(table.meal.id, guest)
            .await
            .unwrap()
            .is_none()
    );
    assert!(role_of(&table, guest).await.is_some());
    assert_eq!(table.item(cooked.id).await.claimed_by, Some(guest));
    assert_eq!(table.item(open.id).await.claimed_by, Some(guest));
}

#[tokio::test]
async fn remove_requires_host_and_member() {
    let table = Table::new().await;
    let guest_a = table.guest().await;
    let guest_b = table.guest().await;
    let participants = &table.engine.participants;

    assert_eq!(
        kind(participants.remove(table.meal.id, guest_a, guest_b).await),
        ErrorKind::PermissionDenied
    );
    assert_eq!(
        kind(participants.remove(table.meal.id, table.host, Uuid::new_v4()).await),
        ErrorKind::NotFound
    );
}

#[tokio::test]
async fn removed_guest_can_no_longer_claim() {
    let table = Table::new().await;
    let guest = table.guest().await;
    let slot = table.slot(Course::Main).await;
    table
        .engine
        .participants
        .remove(table.meal.id, table.host, guest)
        .await
        .unwrap();

    let result = table.engine.items.claim(slot.id, guest).await;
    assert_eq!(kind(result), ErrorKind::PermissionDenied);
}

#[tokio::test]
async fn roster_lists_host_first() {
    let table = Table::new().await;
    let guest = table.guest().await;
    table.store.upsert_profile(guest, "Ada").await.unwrap();

    let roster = table
        .engine
        .participants
        .roster(table.meal.id, guest)
        .await
        .unwrap();
    assert_eq!(roster.len(), 2);
    assert_eq!(roster[0].user_id, table.host);
    assert_eq!(roster[0].role, ParticipantRole::Host);
    assert_eq!(roster[1].display_name, "Ada");

    let outsider = table
        .engine
        .participants
        .roster(table.meal.id, Uuid::new_v4())
        .await;
    assert_eq!(kind(outsider), ErrorKind::PermissionDenied);
}
