//! Connected-component grouping of related posts.
//!
//! Nodes are anything with an ID and a timestamp; edges are unordered ID
//! pairs. Components are found by an iterative depth-first walk with a
//! visited set, so cycles and long chains are both fine. Edges touching an
//! ID outside the input set are ignored.
//!
//! Output is deterministic for a given node and edge set, independent of
//! input order: members are ordered oldest first (ties by ID), units by
//! their newest member descending (ties by anchor ID).

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use potluck_db::models::{Post, PostRelationship};

/// Something that can sit in the feed graph.
pub trait FeedNode {
    fn node_id(&self) -> Uuid;
    fn timestamp(&self) -> DateTime<Utc>;
}

impl FeedNode for Post {
    fn node_id(&self) -> Uuid {
        self.id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// One entry of the assembled feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeedUnit<T> {
    Single { item: T },
    /// Two or more connected items, oldest first. The first is the anchor.
    Grouped { members: Vec<T> },
}

impl<T: FeedNode> FeedUnit<T> {
    pub fn anchor(&self) -> &T {
        match self {
            Self::Single { item } => item,
            // Grouped units are built with at least two members.
            Self::Grouped { members } => &members[0],
        }
    }

    pub fn members(&self) -> &[T] {
        match self {
            Self::Single { item } => std::slice::from_ref(item),
            Self::Grouped { members } => members,
        }
    }

    /// Newest timestamp in the unit; the feed is sorted by this.
    pub fn latest(&self) -> DateTime<Utc> {
        self.members()
            .iter()
            .map(FeedNode::timestamp)
            .max()
            .unwrap_or_else(|| self.anchor().timestamp())
    }
}

/// Group `nodes` into connected components over `edges`.
pub fn group<T: FeedNode>(nodes: Vec<T>, edges: &[(Uuid, Uuid)]) -> Vec<FeedUnit<T>> {
    let mut by_id: BTreeMap<Uuid, T> = BTreeMap::new();
    for node in nodes {
        by_id.entry(node.node_id()).or_insert(node);
    }

    let mut adjacency: BTreeMap<Uuid, BTreeSet<Uuid>> = BTreeMap::new();
    for &(a, b) in edges {
        if a == b || !by_id.contains_key(&a) || !by_id.contains_key(&b) {
            continue;
        }
        adjacency.entry(a).or_default().insert(b);
        adjacency.entry(b).or_default().insert(a);
    }

    let ids: Vec<Uuid> = by_id.keys().copied().collect();
    let mut visited = HashSet::with_capacity(ids.len());
    let mut components: Vec<Vec<Uuid>> = Vec::new();

    for start in ids {
        if !visited.insert(start) {
            continue;
        }
        let mut component = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            component.push(id);
            for &next in adjacency.get(&id).into_iter().flatten() {
                if visited.insert(next) {
                    stack.push(next);
                }
            }
        }
        components.push(component);
    }

    let mut units: Vec<FeedUnit<T>> = components
        .into_iter()
        .map(|component| {
            let mut members: Vec<T> = component
                .into_iter()
                .filter_map(|id| by_id.remove(&id))
                .collect();
            members.sort_by_key(|m| (m.timestamp(), m.node_id()));
            if members.len() == 1 {
                FeedUnit::Single {
                    item: members.remove(0),
                }
            } else {
                FeedUnit::Grouped { members }
            }
        })
        .collect();

    units.sort_by_key(|u| (Reverse(u.latest()), u.anchor().node_id()));
    units
}

/// Group posts by their relationship edges, of any kind.
pub fn group_posts_for_feed(posts: Vec<Post>, edges: &[PostRelationship]) -> Vec<FeedUnit<Post>> {
    let pairs: Vec<(Uuid, Uuid)> = edges.iter().map(|e| (e.post_a, e.post_b)).collect();
    group(posts, &pairs)
}
