//! Database query functions for the `meals` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Meal, MealChanges, NewMeal};

/// Insert a new meal row in `planning`. Returns the inserted meal with
/// server-generated defaults (id, status, timestamps).
pub async fn insert_meal(pool: &PgPool, created_by: Uuid, meal: &NewMeal) -> Result<Meal> {
    let meal = sqlx::query_as::<_, Meal>(
        "INSERT INTO meals (title, description, location, scheduled_at, created_by) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING *",
    )
    .bind(&meal.title)
    .bind(&meal.description)
    .bind(&meal.location)
    .bind(meal.scheduled_at)
    .bind(created_by)
    .fetch_one(pool)
    .await
    .context("failed to insert meal")?;

    Ok(meal)
}

/// Fetch a meal by its ID.
pub async fn get_meal(pool: &PgPool, id: Uuid) -> Result<Option<Meal>> {
    let meal = sqlx::query_as::<_, Meal>("SELECT * FROM meals WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch meal")?;

    Ok(meal)
}

/// List the meals a user participates in, soonest scheduled first.
pub async fn list_meals_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Meal>> {
    let meals = sqlx::query_as::<_, Meal>(
        "SELECT m.* FROM meals m \
         JOIN meal_participants mp ON mp.meal_id = m.id \
         WHERE mp.user_id = $1 \
         ORDER BY m.scheduled_at ASC, m.created_at ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("failed to list meals for user")?;

    Ok(meals)
}

/// Apply a partial update to a meal's descriptive fields. Status is never
/// touched here. Returns `None` when the meal does not exist.
pub async fn update_meal(pool: &PgPool, id: Uuid, changes: &MealChanges) -> Result<Option<Meal>> {
    let meal = sqlx::query_as::<_, Meal>(
        "UPDATE meals \
         SET title = COALESCE($1, title), \
             description = COALESCE($2, description), \
             location = COALESCE($3, location), \
             scheduled_at = COALESCE($4, scheduled_at), \
             updated_at = now() \
         WHERE id = $5 \
         RETURNING *",
    )
    .bind(&changes.title)
    .bind(&changes.description)
    .bind(&changes.location)
    .bind(changes.scheduled_at)
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("failed to update meal")?;

    Ok(meal)
}

/// Mark a meal `completed` and discard every invitation still `pending`,
/// inside one transaction. Idempotent: a second call keeps the original
/// `completed_at` and finds nothing left to discard.
///
/// Returns the meal with the number of invitations discarded, or `None`
/// when the meal does not exist.
pub async fn complete_meal(pool: &PgPool, id: Uuid) -> Result<Option<(Meal, u64)>> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    let meal = sqlx::query_as::<_, Meal>(
        "UPDATE meals \
         SET status = 'completed', \
             completed_at = COALESCE(completed_at, now()), \
             updated_at = now() \
         WHERE id = $1 \
         RETURNING *",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await
    .context("failed to complete meal")?;

    let Some(meal) = meal else {
        tx.rollback().await.context("failed to roll back completion")?;
        return Ok(None);
    };

    let discarded = sqlx::query(
        "DELETE FROM meal_participants WHERE meal_id = $1 AND rsvp_status = 'pending'",
    )
    .bind(id)
    .execute(&mut *tx)
    .await
    .context("failed to delete pending participants")?;

    tx.commit().await.context("failed to commit transaction")?;
    Ok(Some((meal, discarded.rows_affected())))
}

/// Null the meal back-reference on every dish post attached to the meal.
///
/// Returns the IDs of the detached dishes so a failed delete can re-attach
/// them.
pub async fn detach_meal_dishes(pool: &PgPool, meal_id: Uuid) -> Result<Vec<Uuid>> {
    let rows: Vec<(Uuid,)> = sqlx::query_as(
        "UPDATE posts SET meal_id = NULL \
         WHERE meal_id = $1 AND kind = 'dish' \
         RETURNING id",
    )
    .bind(meal_id)
    .fetch_all(pool)
    .await
    .context("failed to detach meal dishes")?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Re-attach previously detached dishes. Only dishes that are still
/// unattached are touched.
pub async fn reattach_dishes(pool: &PgPool, meal_id: Uuid, dish_ids: &[Uuid]) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE posts SET meal_id = $1 \
         WHERE id = ANY($2) AND kind = 'dish' AND meal_id IS NULL",
    )
    .bind(meal_id)
    .bind(dish_ids)
    .execute(pool)
    .await
    .context("failed to re-attach meal dishes")?;

    Ok(result.rows_affected())
}

/// Delete a meal and its meal post inside one transaction.
///
/// Participants, plan items, and photos cascade through their foreign
/// keys; relationship edges touching the meal post cascade with it.
/// Returns the number of meal rows deleted (0 or 1).
pub async fn delete_meal(pool: &PgPool, id: Uuid) -> Result<u64> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    sqlx::query("DELETE FROM posts WHERE meal_id = $1 AND kind = 'meal'")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("failed to delete meal post")?;

    let result = sqlx::query("DELETE FROM meals WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("failed to delete meal")?;

    tx.commit().await.context("failed to commit transaction")?;

    Ok(result.rows_affected())
}
