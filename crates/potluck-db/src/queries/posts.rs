//! Database query functions for `profiles`, `recipes`, and `posts`.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Post, Profile, Recipe};

/// Create or rename a profile.
pub async fn upsert_profile(pool: &PgPool, id: Uuid, display_name: &str) -> Result<Profile> {
    let profile = sqlx::query_as::<_, Profile>(
        "INSERT INTO profiles (id, display_name) VALUES ($1, $2) \
         ON CONFLICT (id) DO UPDATE SET display_name = EXCLUDED.display_name \
         RETURNING *",
    )
    .bind(id)
    .bind(display_name)
    .fetch_one(pool)
    .await
    .context("failed to upsert profile")?;

    Ok(profile)
}

/// Insert a recipe owned by `owner_id`.
pub async fn insert_recipe(pool: &PgPool, owner_id: Uuid, title: &str) -> Result<Recipe> {
    let recipe = sqlx::query_as::<_, Recipe>(
        "INSERT INTO recipes (owner_id, title) VALUES ($1, $2) RETURNING *",
    )
    .bind(owner_id)
    .bind(title)
    .fetch_one(pool)
    .await
    .context("failed to insert recipe")?;

    Ok(recipe)
}

/// Fetch a recipe by ID.
pub async fn get_recipe(pool: &PgPool, id: Uuid) -> Result<Option<Recipe>> {
    let recipe = sqlx::query_as::<_, Recipe>("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch recipe")?;

    Ok(recipe)
}

/// Insert a standalone dish post (not yet attached to any meal).
pub async fn insert_dish_post(
    pool: &PgPool,
    author_id: Uuid,
    recipe_id: Option<Uuid>,
    caption: Option<&str>,
) -> Result<Post> {
    let post = sqlx::query_as::<_, Post>(
        "INSERT INTO posts (author_id, kind, recipe_id, caption) \
         VALUES ($1, 'dish', $2, $3) \
         RETURNING *",
    )
    .bind(author_id)
    .bind(recipe_id)
    .bind(caption)
    .fetch_one(pool)
    .await
    .context("failed to insert dish post")?;

    Ok(post)
}

/// Fetch a post by ID.
pub async fn get_post(pool: &PgPool, id: Uuid) -> Result<Option<Post>> {
    let post = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch post")?;

    Ok(post)
}

/// The most recent posts, newest first.
pub async fn list_recent_posts(pool: &PgPool, limit: i64) -> Result<Vec<Post>> {
    let posts = sqlx::query_as::<_, Post>(
        "SELECT * FROM posts ORDER BY created_at DESC, id ASC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("failed to list recent posts")?;

    Ok(posts)
}

/// Fetch a specific set of posts.
pub async fn get_posts(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Post>> {
    let posts = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
        .context("failed to fetch posts")?;

    Ok(posts)
}

/// Ask the server-side policy whether `user_id` may add `dish_id` to `meal_id`.
pub async fn can_add_dish_to_meal(
    pool: &PgPool,
    dish_id: Uuid,
    meal_id: Uuid,
    user_id: Uuid,
) -> Result<bool> {
    let allowed: bool = sqlx::query_scalar("SELECT can_add_dish_to_meal($1, $2, $3)")
        .bind(dish_id)
        .bind(meal_id)
        .bind(user_id)
        .fetch_one(pool)
        .await
        .context("failed to evaluate dish policy")?;

    Ok(allowed)
}

/// Publish (or fetch the existing) meal post and relate it to every dish
/// already attached to the meal, in one transaction.
pub async fn publish_meal_post(
    pool: &PgPool,
    meal_id: Uuid,
    author_id: Uuid,
    caption: Option<&str>,
) -> Result<Post> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    let inserted = sqlx::query_as::<_, Post>(
        "INSERT INTO posts (author_id, kind, meal_id, caption) \
         VALUES ($1, 'meal', $2, $3) \
         ON CONFLICT (meal_id) WHERE kind = 'meal' DO NOTHING \
         RETURNING *",
    )
    .bind(author_id)
    .bind(meal_id)
    .bind(caption)
    .fetch_optional(&mut *tx)
    .await
    .context("failed to insert meal post")?;

    let post = match inserted {
        Some(post) => post,
        None => sqlx::query_as::<_, Post>(
            "SELECT * FROM posts WHERE meal_id = $1 AND kind = 'meal'",
        )
        .bind(meal_id)
        .fetch_one(&mut *tx)
        .await
        .context("failed to fetch existing meal post")?,
    };

    sqlx::query(
        "INSERT INTO post_relationships (post_a, post_b, kind) \
         SELECT LEAST($1::uuid, d.id), GREATEST($1::uuid, d.id), 'same_meal' \
         FROM posts d WHERE d.meal_id = $2 AND d.kind = 'dish' \
         ON CONFLICT DO NOTHING",
    )
    .bind(post.id)
    .bind(meal_id)
    .execute(&mut *tx)
    .await
    .context("failed to relate meal post to dishes")?;

    tx.commit().await.context("failed to commit transaction")?;
    Ok(post)
}
