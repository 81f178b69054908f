//! Feed assembly and post relationship management.

use std::collections::{BTreeSet, HashSet};

use uuid::Uuid;

use potluck_db::models::{Post, PostRelationship, RelationshipKind};

use crate::error::{Entity, PotluckError, Result};
use crate::grouping::{FeedUnit, group_posts_for_feed};
use crate::store::MealStore;

pub const MAX_FEED_LIMIT: i64 = 200;

/// Posts pulled in through edges, beyond the recent window, per assembly.
pub const MAX_LINKED_POSTS: usize = 200;

/// Load the `limit` most recent posts, then follow relationship edges to
/// the posts they link to (even when those fall outside the window) and
/// group each connected set into a single feed unit.
pub async fn assemble(store: &dyn MealStore, limit: i64) -> Result<Vec<FeedUnit<Post>>> {
    if !(1..=MAX_FEED_LIMIT).contains(&limit) {
        return Err(PotluckError::Validation(format!(
            "feed limit must be between 1 and {MAX_FEED_LIMIT}"
        )));
    }
    let mut posts = store.list_recent_posts(limit).await?;
    let mut loaded: HashSet<Uuid> = posts.iter().map(|p| p.id).collect();
    let mut edge_ids = HashSet::new();
    let mut edges = Vec::new();
    let mut frontier: Vec<Uuid> = posts.iter().map(|p| p.id).collect();
    let mut linked = 0;

    while !frontier.is_empty() {
        let found = store.list_relationships_for_posts(&frontier).await?;
        let mut missing = BTreeSet::new();
        for edge in found {
            if !edge_ids.insert(edge.id) {
                continue;
            }
            for end in [edge.post_a, edge.post_b] {
                if !loaded.contains(&end) {
                    missing.insert(end);
                }
            }
            edges.push(edge);
        }
        let budget = MAX_LINKED_POSTS - linked;
        if missing.len() > budget {
            tracing::debug!(
                skipped = missing.len() - budget,
                "linked post budget exhausted; feed groups may be partial"
            );
        }
        let wanted: Vec<Uuid> = missing.into_iter().take(budget).collect();
        if wanted.is_empty() {
            break;
        }
        let neighbours = store.get_posts(&wanted).await?;
        linked += wanted.len();
        loaded.extend(wanted.iter().copied());
        frontier = neighbours.iter().map(|p| p.id).collect();
        posts.extend(neighbours);
    }

    tracing::debug!(posts = posts.len(), linked, edges = edges.len(), "assembling feed");
    Ok(group_posts_for_feed(posts, &edges))
}

async fn load_pair(store: &dyn MealStore, actor: Uuid, a: Uuid, b: Uuid) -> Result<()> {
    if a == b {
        return Err(PotluckError::Validation(
            "a post cannot be related to itself".to_owned(),
        ));
    }
    let mut authored = false;
    for id in [a, b] {
        let post = store
            .get_post(id)
            .await?
            .ok_or_else(|| PotluckError::not_found(Entity::Post, id))?;
        authored |= post.author_id == actor;
    }
    if !authored {
        return Err(PotluckError::PermissionDenied(
            "you can only relate posts when you wrote one of them".to_owned(),
        ));
    }
    Ok(())
}

/// Record an edge between two posts. Relating an already related pair
/// returns the existing edge.
pub async fn relate(
    store: &dyn MealStore,
    actor: Uuid,
    a: Uuid,
    b: Uuid,
    kind: RelationshipKind,
) -> Result<PostRelationship> {
    load_pair(store, actor, a, b).await?;
    let edge = store.insert_relationship(a, b, kind).await?;
    tracing::info!(post_a = %edge.post_a, post_b = %edge.post_b, kind = %kind, actor = %actor, "posts related");
    Ok(edge)
}

/// Remove an edge. Returns whether one existed.
pub async fn unrelate(
    store: &dyn MealStore,
    actor: Uuid,
    a: Uuid,
    b: Uuid,
    kind: RelationshipKind,
) -> Result<bool> {
    load_pair(store, actor, a, b).await?;
    let removed = store.delete_relationship(a, b, kind).await? > 0;
    if removed {
        tracing::info!(post_a = %a, post_b = %b, kind = %kind, actor = %actor, "posts unrelated");
    }
    Ok(removed)
}
