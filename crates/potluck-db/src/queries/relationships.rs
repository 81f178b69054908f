//! Database query functions for the `post_relationships` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{PostRelationship, RelationshipKind};

/// Record an edge between two posts. The pair is normalized so `(a, b)` and
/// `(b, a)` are the same edge; inserting an existing edge returns it.
pub async fn insert_relationship(
    pool: &PgPool,
    a: Uuid,
    b: Uuid,
    kind: RelationshipKind,
) -> Result<PostRelationship> {
    let (post_a, post_b) = PostRelationship::normalize(a, b);
    let edge = sqlx::query_as::<_, PostRelationship>(
        "INSERT INTO post_relationships (post_a, post_b, kind) VALUES ($1, $2, $3) \
         ON CONFLICT (post_a, post_b, kind) DO UPDATE SET kind = EXCLUDED.kind \
         RETURNING *",
    )
    .bind(post_a)
    .bind(post_b)
    .bind(kind)
    .fetch_one(pool)
    .await
    .context("failed to insert post relationship")?;

    Ok(edge)
}

/// Remove an edge. Returns the number of rows deleted.
pub async fn delete_relationship(
    pool: &PgPool,
    a: Uuid,
    b: Uuid,
    kind: RelationshipKind,
) -> Result<u64> {
    let (post_a, post_b) = PostRelationship::normalize(a, b);
    let result = sqlx::query(
        "DELETE FROM post_relationships WHERE post_a = $1 AND post_b = $2 AND kind = $3",
    )
    .bind(post_a)
    .bind(post_b)
    .bind(kind)
    .execute(pool)
    .await
    .context("failed to delete post relationship")?;

    Ok(result.rows_affected())
}

/// Every edge with at least one endpoint in `post_ids`.
pub async fn list_relationships_for_posts(
    pool: &PgPool,
    post_ids: &[Uuid],
) -> Result<Vec<PostRelationship>> {
    let edges = sqlx::query_as::<_, PostRelationship>(
        "SELECT * FROM post_relationships \
         WHERE post_a = ANY($1) OR post_b = ANY($1) \
         ORDER BY created_at ASC, id ASC",
    )
    .bind(post_ids)
    .fetch_all(pool)
    .await
    .context("failed to list post relationships")?;

    Ok(edges)
}
