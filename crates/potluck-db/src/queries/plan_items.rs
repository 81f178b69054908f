//! Database query functions for the `plan_items` table.
//!
//! State-changing queries are conditional writes: the WHERE clause repeats
//! the precondition the caller checked, and `None` (or 0 rows) means the
//! row changed underneath the caller.

use anyhow::{Context, Result};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::{MealDish, NewPlanItem, PlanItem, ReleasedSlots};

/// Insert a batch of dish slots inside one transaction. Either every slot
/// is created or none is.
pub async fn insert_plan_items(
    pool: &PgPool,
    meal_id: Uuid,
    created_by: Uuid,
    items: &[NewPlanItem],
) -> Result<Vec<PlanItem>> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;
    let mut inserted = Vec::with_capacity(items.len());

    for item in items {
        let row = sqlx::query_as::<_, PlanItem>(
            "INSERT INTO plan_items (meal_id, course, name, is_main_dish, assigned_to, assigned_at, created_by) \
             VALUES ($1, $2, $3, $4, $5, CASE WHEN $5::uuid IS NULL THEN NULL ELSE now() END, $6) \
             RETURNING *",
        )
        .bind(meal_id)
        .bind(item.course)
        .bind(&item.name)
        .bind(item.is_main_dish)
        .bind(item.assigned_to)
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await
        .with_context(|| format!("failed to insert plan item ({})", item.course))?;
        inserted.push(row);
    }

    tx.commit().await.context("failed to commit transaction")?;
    Ok(inserted)
}

/// Fetch a single plan item by ID.
pub async fn get_plan_item(pool: &PgPool, id: Uuid) -> Result<Option<PlanItem>> {
    let item = sqlx::query_as::<_, PlanItem>("SELECT * FROM plan_items WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch plan item")?;

    Ok(item)
}

/// List all plan items for a meal, main dishes first, then creation order.
pub async fn list_plan_items(pool: &PgPool, meal_id: Uuid) -> Result<Vec<PlanItem>> {
    let items = sqlx::query_as::<_, PlanItem>(
        "SELECT * FROM plan_items WHERE meal_id = $1 \
         ORDER BY is_main_dish DESC, created_at ASC, id ASC",
    )
    .bind(meal_id)
    .fetch_all(pool)
    .await
    .context("failed to list plan items")?;

    Ok(items)
}

/// Dishes linked to the meal, sorted by course (server-side procedure).
pub async fn list_meal_dishes(pool: &PgPool, meal_id: Uuid) -> Result<Vec<MealDish>> {
    let dishes = sqlx::query_as::<_, MealDish>("SELECT * FROM get_meal_dishes($1)")
        .bind(meal_id)
        .fetch_all(pool)
        .await
        .context("failed to list meal dishes")?;

    Ok(dishes)
}

/// Delete a slot that nobody has claimed yet.
pub async fn delete_plan_item(pool: &PgPool, id: Uuid) -> Result<u64> {
    let result = sqlx::query(
        "DELETE FROM plan_items WHERE id = $1 AND claimed_by IS NULL AND dish_id IS NULL",
    )
    .bind(id)
    .execute(pool)
    .await
    .context("failed to delete plan item")?;

    Ok(result.rows_affected())
}

/// Change the assignee of an unclaimed slot (`None` unassigns).
///
/// Only applies when the slot is still unclaimed, has no dish, and is
/// assigned to `expected` (`IS NOT DISTINCT FROM` so `NULL` matches `NULL`).
/// A new assignee must be an accepted member; the membership row is share
/// locked so a concurrent RSVP change waits for this write and then sweeps it.
pub async fn set_assignment(
    pool: &PgPool,
    id: Uuid,
    expected: Option<Uuid>,
    assignee: Option<Uuid>,
) -> Result<Option<PlanItem>> {
    let item = sqlx::query_as::<_, PlanItem>(
        "UPDATE plan_items \
         SET assigned_to = $1, \
             assigned_at = CASE WHEN $1::uuid IS NULL THEN NULL ELSE now() END \
         WHERE id = $2 \
           AND claimed_by IS NULL AND dish_id IS NULL \
           AND assigned_to IS NOT DISTINCT FROM $3 \
           AND ($1::uuid IS NULL OR EXISTS ( \
               SELECT 1 FROM meal_participants p \
               WHERE p.meal_id = plan_items.meal_id AND p.user_id = $1 \
                 AND p.rsvp_status = 'accepted' \
               FOR SHARE)) \
         RETURNING *",
    )
    .bind(assignee)
    .bind(id)
    .bind(expected)
    .fetch_optional(pool)
    .await
    .context("failed to set plan item assignment")?;

    Ok(item)
}

/// Claim a slot, optionally attaching a recipe in the same write.
///
/// The linearization point for concurrent claimers: only applies while
/// `claimed_by IS NULL`, the assignee still matches what the caller saw,
/// and the claimer is still an accepted member (or the host). The
/// membership row is share locked for the same reason as in
/// [`set_assignment`].
pub async fn claim_plan_item(
    pool: &PgPool,
    id: Uuid,
    claimer: Uuid,
    expected_assignee: Option<Uuid>,
    recipe_id: Option<Uuid>,
) -> Result<Option<PlanItem>> {
    let item = sqlx::query_as::<_, PlanItem>(
        "UPDATE plan_items \
         SET claimed_by = $1, claimed_at = now(), recipe_id = $2 \
         WHERE id = $3 \
           AND claimed_by IS NULL AND dish_id IS NULL \
           AND assigned_to IS NOT DISTINCT FROM $4 \
           AND EXISTS ( \
               SELECT 1 FROM meal_participants p \
               WHERE p.meal_id = plan_items.meal_id AND p.user_id = $1 \
                 AND (p.rsvp_status = 'accepted' OR p.role = 'host') \
               FOR SHARE) \
         RETURNING *",
    )
    .bind(claimer)
    .bind(recipe_id)
    .bind(id)
    .bind(expected_assignee)
    .fetch_optional(pool)
    .await
    .context("failed to claim plan item")?;

    Ok(item)
}

/// Release a claim. Clears the claimer, the claim timestamp, and the
/// recipe together.
pub async fn release_plan_item(
    pool: &PgPool,
    id: Uuid,
    expected_claimer: Uuid,
) -> Result<Option<PlanItem>> {
    let item = sqlx::query_as::<_, PlanItem>(
        "UPDATE plan_items \
         SET claimed_by = NULL, claimed_at = NULL, recipe_id = NULL \
         WHERE id = $1 AND claimed_by = $2 AND dish_id IS NULL \
         RETURNING *",
    )
    .bind(id)
    .bind(expected_claimer)
    .fetch_optional(pool)
    .await
    .context("failed to release plan item")?;

    Ok(item)
}

/// Attach or replace the recipe on a slot held by `claimer`.
pub async fn set_plan_item_recipe(
    pool: &PgPool,
    id: Uuid,
    claimer: Uuid,
    recipe_id: Uuid,
) -> Result<Option<PlanItem>> {
    let item = sqlx::query_as::<_, PlanItem>(
        "UPDATE plan_items SET recipe_id = $1 \
         WHERE id = $2 AND claimed_by = $3 AND dish_id IS NULL \
         RETURNING *",
    )
    .bind(recipe_id)
    .bind(id)
    .bind(claimer)
    .fetch_optional(pool)
    .await
    .context("failed to set plan item recipe")?;

    Ok(item)
}

/// Link a cooked dish to a slot held by `claimer`.
///
/// In the same transaction the dish post is attached to the meal and, if
/// the meal has already published its meal post, a `same_meal` edge is
/// recorded between the two. Returns `None` (and changes nothing) when the
/// slot precondition no longer holds.
pub async fn complete_plan_item(
    pool: &PgPool,
    id: Uuid,
    claimer: Uuid,
    dish_id: Uuid,
) -> Result<Option<PlanItem>> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    let item = sqlx::query_as::<_, PlanItem>(
        "UPDATE plan_items SET dish_id = $1, completed_at = now() \
         WHERE id = $2 AND claimed_by = $3 AND dish_id IS NULL \
         RETURNING *",
    )
    .bind(dish_id)
    .bind(id)
    .bind(claimer)
    .fetch_optional(&mut *tx)
    .await
    .context("failed to complete plan item")?;

    let Some(item) = item else {
        tx.rollback().await.context("failed to roll back completion")?;
        return Ok(None);
    };

    sqlx::query("UPDATE posts SET meal_id = $1 WHERE id = $2 AND kind = 'dish'")
        .bind(item.meal_id)
        .bind(dish_id)
        .execute(&mut *tx)
        .await
        .context("failed to attach dish to meal")?;

    sqlx::query(
        "INSERT INTO post_relationships (post_a, post_b, kind) \
         SELECT LEAST(mp.id, $2), GREATEST(mp.id, $2), 'same_meal' \
         FROM posts mp WHERE mp.meal_id = $1 AND mp.kind = 'meal' AND mp.id <> $2 \
         ON CONFLICT DO NOTHING",
    )
    .bind(item.meal_id)
    .bind(dish_id)
    .execute(&mut *tx)
    .await
    .context("failed to relate dish to meal post")?;

    tx.commit().await.context("failed to commit transaction")?;
    Ok(Some(item))
}

/// Take back the open (not completed) claims and assignments a user holds
/// in a meal. Runs on the caller's connection so it shares the transaction
/// that changed the user's membership.
pub(crate) async fn release_open_slots(
    conn: &mut PgConnection,
    meal_id: Uuid,
    user_id: Uuid,
) -> Result<ReleasedSlots> {
    let claims = sqlx::query(
        "UPDATE plan_items \
         SET claimed_by = NULL, claimed_at = NULL, recipe_id = NULL \
         WHERE meal_id = $1 AND claimed_by = $2 AND dish_id IS NULL",
    )
    .bind(meal_id)
    .bind(user_id)
    .execute(&mut *conn)
    .await
    .context("failed to release claims for user")?;

    let assignments = sqlx::query(
        "UPDATE plan_items SET assigned_to = NULL, assigned_at = NULL \
         WHERE meal_id = $1 AND assigned_to = $2 AND dish_id IS NULL",
    )
    .bind(meal_id)
    .bind(user_id)
    .execute(&mut *conn)
    .await
    .context("failed to clear assignments for user")?;

    Ok(ReleasedSlots {
        released_claims: claims.rows_affected(),
        cleared_assignments: assignments.rows_affected(),
    })
}

/// Count the completed slots a user contributed to a meal.
pub async fn count_completed_for_user(
    pool: &PgPool,
    meal_id: Uuid,
    user_id: Uuid,
) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM plan_items \
         WHERE meal_id = $1 AND claimed_by = $2 AND dish_id IS NOT NULL",
    )
    .bind(meal_id)
    .bind(user_id)
    .fetch_one(pool)
    .await
    .context("failed to count completed plan items")?;

    Ok(row.0)
}
