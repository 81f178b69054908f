//! Database query functions for the `meal_participants` table.
//!
//! Every write that could remove the last accepted host carries that
//! condition in its WHERE clause, so the check is evaluated against the
//! same snapshot as the write.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    Participant, ParticipantProfile, ParticipantRole, ReleasedSlots, RsvpStatus,
};
use crate::queries::plan_items;

/// Insert a membership row. `responded_at` is stamped unless the RSVP is
/// still `pending`.
pub async fn insert_participant(
    pool: &PgPool,
    meal_id: Uuid,
    user_id: Uuid,
    role: ParticipantRole,
    rsvp_status: RsvpStatus,
    invited_by: Option<Uuid>,
) -> Result<Participant> {
    let participant = sqlx::query_as::<_, Participant>(
        "INSERT INTO meal_participants (meal_id, user_id, role, rsvp_status, invited_by, responded_at) \
         VALUES ($1, $2, $3, $4, $5, CASE WHEN $4 = 'pending' THEN NULL ELSE now() END) \
         RETURNING *",
    )
    .bind(meal_id)
    .bind(user_id)
    .bind(role)
    .bind(rsvp_status)
    .bind(invited_by)
    .fetch_one(pool)
    .await
    .context("failed to insert participant")?;

    Ok(participant)
}

/// Invite a batch of users as pending attendees.
///
/// Uses `ON CONFLICT DO NOTHING`, so users who are already members are
/// skipped. Returns only the rows actually inserted.
pub async fn insert_invitations(
    pool: &PgPool,
    meal_id: Uuid,
    invited_by: Uuid,
    user_ids: &[Uuid],
) -> Result<Vec<Participant>> {
    let participants = sqlx::query_as::<_, Participant>(
        "INSERT INTO meal_participants (meal_id, user_id, role, rsvp_status, invited_by) \
         SELECT $1, u, 'attendee', 'pending', $2 FROM UNNEST($3::uuid[]) AS u \
         ON CONFLICT (meal_id, user_id) DO NOTHING \
         RETURNING *",
    )
    .bind(meal_id)
    .bind(invited_by)
    .bind(user_ids)
    .fetch_all(pool)
    .await
    .context("failed to insert invitations")?;

    Ok(participants)
}

/// Fetch one membership row.
pub async fn get_participant(
    pool: &PgPool,
    meal_id: Uuid,
    user_id: Uuid,
) -> Result<Option<Participant>> {
    let participant = sqlx::query_as::<_, Participant>(
        "SELECT * FROM meal_participants WHERE meal_id = $1 AND user_id = $2",
    )
    .bind(meal_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch participant")?;

    Ok(participant)
}

/// List all members of a meal in invitation order.
pub async fn list_participants(pool: &PgPool, meal_id: Uuid) -> Result<Vec<Participant>> {
    let participants = sqlx::query_as::<_, Participant>(
        "SELECT * FROM meal_participants WHERE meal_id = $1 ORDER BY invited_at ASC, user_id ASC",
    )
    .bind(meal_id)
    .fetch_all(pool)
    .await
    .context("failed to list participants")?;

    Ok(participants)
}

/// Participant listing joined with profile names (server-side procedure).
pub async fn list_participant_profiles(
    pool: &PgPool,
    meal_id: Uuid,
) -> Result<Vec<ParticipantProfile>> {
    let rows = sqlx::query_as::<_, ParticipantProfile>("SELECT * FROM get_meal_participants($1)")
        .bind(meal_id)
        .fetch_all(pool)
        .await
        .context("failed to list participant profiles")?;

    Ok(rows)
}

/// Record an RSVP response.
///
/// A host may only move away from `accepted` while another accepted host
/// remains. A response other than `accepted` also releases the user's open
/// claims and assignments in the same transaction, so no slot is held by
/// someone who is not coming. Returns `None` when the row is missing or the
/// host guard fails.
pub async fn update_rsvp(
    pool: &PgPool,
    meal_id: Uuid,
    user_id: Uuid,
    rsvp_status: RsvpStatus,
) -> Result<Option<(Participant, ReleasedSlots)>> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    let participant = sqlx::query_as::<_, Participant>(
        "UPDATE meal_participants p \
         SET rsvp_status = $3, responded_at = now() \
         WHERE p.meal_id = $1 AND p.user_id = $2 \
           AND (p.role = 'attendee' OR $3 = 'accepted' OR EXISTS ( \
               SELECT 1 FROM meal_participants o \
               WHERE o.meal_id = $1 AND o.user_id <> $2 \
                 AND o.role = 'host' AND o.rsvp_status = 'accepted')) \
         RETURNING *",
    )
    .bind(meal_id)
    .bind(user_id)
    .bind(rsvp_status)
    .fetch_optional(&mut *tx)
    .await
    .context("failed to update rsvp")?;

    let Some(participant) = participant else {
        tx.rollback().await.context("failed to roll back rsvp")?;
        return Ok(None);
    };

    let released = if rsvp_status == RsvpStatus::Accepted {
        ReleasedSlots::default()
    } else {
        plan_items::release_open_slots(&mut *tx, meal_id, user_id).await?
    };

    tx.commit().await.context("failed to commit transaction")?;
    Ok(Some((participant, released)))
}

/// Remove a member and take back their open claims and assignments in one
/// transaction.
///
/// The delete is guarded twice: hosts are only removed while another
/// accepted host remains, and nobody is removed while they hold a
/// completed slot. Returns `None` (and changes nothing) when either guard
/// fails or the row is gone.
pub async fn delete_participant(
    pool: &PgPool,
    meal_id: Uuid,
    user_id: Uuid,
) -> Result<Option<ReleasedSlots>> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    let result = sqlx::query(
        "DELETE FROM meal_participants p \
         WHERE p.meal_id = $1 AND p.user_id = $2 \
           AND (p.role = 'attendee' OR EXISTS ( \
               SELECT 1 FROM meal_participants o \
               WHERE o.meal_id = $1 AND o.user_id <> $2 \
                 AND o.role = 'host' AND o.rsvp_status = 'accepted')) \
           AND NOT EXISTS ( \
               SELECT 1 FROM plan_items i \
               WHERE i.meal_id = $1 AND i.claimed_by = $2 AND i.dish_id IS NOT NULL)",
    )
    .bind(meal_id)
    .bind(user_id)
    .execute(&mut *tx)
    .await
    .context("failed to delete participant")?;

    if result.rows_affected() == 0 {
        tx.rollback().await.context("failed to roll back removal")?;
        return Ok(None);
    }

    let released = plan_items::release_open_slots(&mut *tx, meal_id, user_id).await?;
    tx.commit().await.context("failed to commit transaction")?;
    Ok(Some(released))
}

/// Swap the host role from `from_user` to `to_user` in one statement.
///
/// Both rows must qualify (`from_user` is the host, `to_user` is an
/// accepted attendee); otherwise the transaction is rolled back and
/// `false` is returned, leaving roles untouched.
pub async fn transfer_host(
    pool: &PgPool,
    meal_id: Uuid,
    from_user: Uuid,
    to_user: Uuid,
) -> Result<bool> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    let result = sqlx::query(
        "UPDATE meal_participants \
         SET role = CASE WHEN user_id = $2 THEN 'attendee' ELSE 'host' END \
         WHERE meal_id = $1 \
           AND ((user_id = $2 AND role = 'host') \
             OR (user_id = $3 AND role = 'attendee' AND rsvp_status = 'accepted'))",
    )
    .bind(meal_id)
    .bind(from_user)
    .bind(to_user)
    .execute(&mut *tx)
    .await
    .context("failed to transfer host role")?;

    if result.rows_affected() != 2 {
        tx.rollback().await.context("failed to roll back host transfer")?;
        return Ok(false);
    }

    tx.commit().await.context("failed to commit transaction")?;
    Ok(true)
}
