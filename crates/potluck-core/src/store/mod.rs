//! The `MealStore` trait -- the repository interface the engine is built on.
//!
//! Every component receives a store explicitly instead of reaching for a
//! global client. [`PgStore`] talks to PostgreSQL through the query
//! functions in `potluck_db::queries`; [`MemoryStore`] keeps everything in
//! process for tests and demos.
//!
//! State-changing methods that return `Option<_>` or a row count are
//! conditional writes: `None` / `0` / `false` means the precondition
//! encoded in the write did not hold when the store evaluated it.

pub mod memory;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use potluck_db::models::{
    Meal, MealChanges, MealDish, NewMeal, NewPlanItem, Participant, ParticipantProfile,
    ParticipantRole, PlanItem, Post, PostRelationship, Profile, Recipe, RelationshipKind,
    ReleasedSlots, RsvpStatus,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Read/write access to meals, participants, plan items, and the posts
/// and recipes they reference.
#[async_trait]
pub trait MealStore: Send + Sync {
    // -- meals -------------------------------------------------------------

    async fn insert_meal(&self, created_by: Uuid, meal: &NewMeal) -> Result<Meal>;
    async fn get_meal(&self, id: Uuid) -> Result<Option<Meal>>;
    async fn list_meals_for_user(&self, user_id: Uuid) -> Result<Vec<Meal>>;
    async fn update_meal(&self, id: Uuid, changes: &MealChanges) -> Result<Option<Meal>>;
    /// Set status `completed` (keeping the first `completed_at`) and discard
    /// pending invitations in one step; returns the number discarded.
    async fn complete_meal(&self, id: Uuid) -> Result<Option<(Meal, u64)>>;
    /// Null `meal_id` on attached dish posts; returns the detached IDs.
    async fn detach_meal_dishes(&self, meal_id: Uuid) -> Result<Vec<Uuid>>;
    async fn reattach_dishes(&self, meal_id: Uuid, dish_ids: &[Uuid]) -> Result<u64>;
    /// Delete the meal, its meal post, and everything that cascades.
    async fn delete_meal(&self, id: Uuid) -> Result<u64>;

    // -- participants ------------------------------------------------------

    async fn insert_participant(
        &self,
        meal_id: Uuid,
        user_id: Uuid,
        role: ParticipantRole,
        rsvp_status: RsvpStatus,
        invited_by: Option<Uuid>,
    ) -> Result<Participant>;
    /// Insert pending attendees, skipping existing members.
    async fn insert_invitations(
        &self,
        meal_id: Uuid,
        invited_by: Uuid,
        user_ids: &[Uuid],
    ) -> Result<Vec<Participant>>;
    async fn get_participant(&self, meal_id: Uuid, user_id: Uuid) -> Result<Option<Participant>>;
    async fn list_participants(&self, meal_id: Uuid) -> Result<Vec<Participant>>;
    async fn list_participant_profiles(&self, meal_id: Uuid) -> Result<Vec<ParticipantProfile>>;
    /// Guarded: a host cannot leave `accepted` while no other accepted host
    /// remains. Leaving `accepted` releases open claims and assignments in
    /// the same step.
    async fn update_rsvp(
        &self,
        meal_id: Uuid,
        user_id: Uuid,
        rsvp_status: RsvpStatus,
    ) -> Result<Option<(Participant, ReleasedSlots)>>;
    /// Delete the membership and release open claims and assignments in one
    /// step. Guarded: a host row is only deleted while another accepted host
    /// remains, and nobody holding a completed slot is deleted.
    async fn delete_participant(&self, meal_id: Uuid, user_id: Uuid)
    -> Result<Option<ReleasedSlots>>;
    /// Atomically swap host and attendee roles; `false` if either row fails
    /// its precondition.
    async fn transfer_host(&self, meal_id: Uuid, from_user: Uuid, to_user: Uuid) -> Result<bool>;

    // -- plan items --------------------------------------------------------

    /// All-or-nothing batch insert.
    async fn insert_plan_items(
        &self,
        meal_id: Uuid,
        created_by: Uuid,
        items: &[NewPlanItem],
    ) -> Result<Vec<PlanItem>>;
    async fn get_plan_item(&self, id: Uuid) -> Result<Option<PlanItem>>;
    async fn list_plan_items(&self, meal_id: Uuid) -> Result<Vec<PlanItem>>;
    async fn list_meal_dishes(&self, meal_id: Uuid) -> Result<Vec<MealDish>>;
    async fn delete_plan_item(&self, id: Uuid) -> Result<u64>;
    async fn set_assignment(
        &self,
        id: Uuid,
        expected: Option<Uuid>,
        assignee: Option<Uuid>,
    ) -> Result<Option<PlanItem>>;
    /// Guarded on the claimer still being an accepted member or the host.
    async fn claim_plan_item(
        &self,
        id: Uuid,
        claimer: Uuid,
        expected_assignee: Option<Uuid>,
        recipe_id: Option<Uuid>,
    ) -> Result<Option<PlanItem>>;
    async fn release_plan_item(&self, id: Uuid, expected_claimer: Uuid) -> Result<Option<PlanItem>>;
    async fn set_plan_item_recipe(
        &self,
        id: Uuid,
        claimer: Uuid,
        recipe_id: Uuid,
    ) -> Result<Option<PlanItem>>;
    /// Link the dish, attach it to the meal, and relate it to the meal post.
    async fn complete_plan_item(
        &self,
        id: Uuid,
        claimer: Uuid,
        dish_id: Uuid,
    ) -> Result<Option<PlanItem>>;
    async fn count_completed_for_user(&self, meal_id: Uuid, user_id: Uuid) -> Result<i64>;

    // -- profiles, recipes, posts ------------------------------------------

    async fn upsert_profile(&self, id: Uuid, display_name: &str) -> Result<Profile>;
    async fn insert_recipe(&self, owner_id: Uuid, title: &str) -> Result<Recipe>;
    async fn get_recipe(&self, id: Uuid) -> Result<Option<Recipe>>;
    async fn insert_dish_post(
        &self,
        author_id: Uuid,
        recipe_id: Option<Uuid>,
        caption: Option<&str>,
    ) -> Result<Post>;
    async fn get_post(&self, id: Uuid) -> Result<Option<Post>>;
    async fn get_posts(&self, ids: &[Uuid]) -> Result<Vec<Post>>;
    async fn list_recent_posts(&self, limit: i64) -> Result<Vec<Post>>;
    async fn can_add_dish_to_meal(&self, dish_id: Uuid, meal_id: Uuid, user_id: Uuid)
    -> Result<bool>;
    async fn publish_meal_post(
        &self,
        meal_id: Uuid,
        author_id: Uuid,
        caption: Option<&str>,
    ) -> Result<Post>;

    // -- relationships -----------------------------------------------------

    async fn insert_relationship(
        &self,
        a: Uuid,
        b: Uuid,
        kind: RelationshipKind,
    ) -> Result<PostRelationship>;
    async fn delete_relationship(&self, a: Uuid, b: Uuid, kind: RelationshipKind) -> Result<u64>;
    async fn list_relationships_for_posts(&self, post_ids: &[Uuid])
    -> Result<Vec<PostRelationship>>;
}

// Compile-time assertion: MealStore must be usable as `dyn MealStore`.
const _: () = {
    fn _assert_object_safe(_: &dyn MealStore) {}
};
