//! [`MealStore`] backed by PostgreSQL.
//!
//! A thin adapter: each method forwards to the matching function in
//! `potluck_db::queries`, which owns the SQL (including the conditional
//! WHERE clauses and multi-statement transactions).

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use potluck_db::models::{
    Meal, MealChanges, MealDish, NewMeal, NewPlanItem, Participant, ParticipantProfile,
    ParticipantRole, PlanItem, Post, PostRelationship, Profile, Recipe, RelationshipKind,
    ReleasedSlots, RsvpStatus,
};
use potluck_db::queries::{meals, participants, plan_items, posts, relationships};

use super::MealStore;

/// PostgreSQL implementation of [`MealStore`].
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MealStore for PgStore {
    async fn insert_meal(&self, created_by: Uuid, meal: &NewMeal) -> Result<Meal> {
        meals::insert_meal(&self.pool, created_by, meal).await
    }

    async fn get_meal(&self, id: Uuid) -> Result<Option<Meal>> {
        meals::get_meal(&self.pool, id).await
    }

    async fn list_meals_for_user(&self, user_id: Uuid) -> Result<Vec<Meal>> {
        meals::list_meals_for_user(&self.pool, user_id).await
    }

    async fn update_meal(&self, id: Uuid, changes: &MealChanges) -> Result<Option<Meal>> {
        meals::update_meal(&self.pool, id, changes).await
    }

    async fn complete_meal(&self, id: Uuid) -> Result<Option<(Meal, u64)>> {
        meals::complete_meal(&self.pool, id).await
    }

    async fn detach_meal_dishes(&self, meal_id: Uuid) -> Result<Vec<Uuid>> {
        meals::detach_meal_dishes(&self.pool, meal_id).await
    }

    async fn reattach_dishes(&self, meal_id: Uuid, dish_ids: &[Uuid]) -> Result<u64> {
        meals::reattach_dishes(&self.pool, meal_id, dish_ids).await
    }

    async fn delete_meal(&self, id: Uuid) -> Result<u64> {
        meals::delete_meal(&self.pool, id).await
    }

    async fn insert_participant(
        &self,
        meal_id: Uuid,
        user_id: Uuid,
        role: ParticipantRole,
        rsvp_status: RsvpStatus,
        invited_by: Option<Uuid>,
    ) -> Result<Participant> {
        participants::insert_participant(&self.pool, meal_id, user_id, role, rsvp_status, invited_by).await
    }

    async fn insert_invitations(
        &self,
        meal_id: Uuid,
        invited_by: Uuid,
        user_ids: &[Uuid],
    ) -> Result<Vec<Participant>> {
        participants::insert_invitations(&self.pool, meal_id, invited_by, user_ids).await
    }

    async fn get_participant(&self, meal_id: Uuid, user_id: Uuid) -> Result<Option<Participant>> {
        participants::get_participant(&self.pool, meal_id, user_id).await
    }

    async fn list_participants(&self, meal_id: Uuid) -> Result<Vec<Participant>> {
        participants::list_participants(&self.pool, meal_id).await
    }

    async fn list_participant_profiles(&self, meal_id: Uuid) -> Result<Vec<ParticipantProfile>> {
        participants::list_participant_profiles(&self.pool, meal_id).await
    }

    async fn update_rsvp(
        &self,
        meal_id: Uuid,
        user_id: Uuid,
        rsvp_status: RsvpStatus,
    ) -> Result<Option<(Participant, ReleasedSlots)>> {
        participants::update_rsvp(&self.pool, meal_id, user_id, rsvp_status).await
    }

    async fn delete_participant(
        &self,
        meal_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ReleasedSlots>> {
        participants::delete_participant(&self.pool, meal_id, user_id).await
    }

    async fn transfer_host(&self, meal_id: Uuid, from_user: Uuid, to_user: Uuid) -> Result<bool> {
        participants::transfer_host(&self.pool, meal_id, from_user, to_user).await
    }

    async fn insert_plan_items(
        &self,
        meal_id: Uuid,
        created_by: Uuid,
        items: &[NewPlanItem],
    ) -> Result<Vec<PlanItem>> {
        plan_items::insert_plan_items(&self.pool, meal_id, created_by, items).await
    }

    async fn get_plan_item(&self, id: Uuid) -> Result<Option<PlanItem>> {
        plan_items::get_plan_item(&self.pool, id).await
    }

    async fn list_plan_items(&self, meal_id: Uuid) -> Result<Vec<PlanItem>> {
        plan_items::list_plan_items(&self.pool, meal_id).await
    }

    async fn list_meal_dishes(&self, meal_id: Uuid) -> Result<Vec<MealDish>> {
        plan_items::list_meal_dishes(&self.pool, meal_id).await
    }

    async fn delete_plan_item(&self, id: Uuid) -> Result<u64> {
        plan_items::delete_plan_item(&self.pool, id).await
    }

    async fn set_assignment(
        &self,
        id: Uuid,
        expected: Option<Uuid>,
        assignee: Option<Uuid>,
    ) -> Result<Option<PlanItem>> {
        plan_items::set_assignment(&self.pool, id, expected, assignee).await
    }

    async fn claim_plan_item(
        &self,
        id: Uuid,
        claimer: Uuid,
        expected_assignee: Option<Uuid>,
        recipe_id: Option<Uuid>,
    ) -> Result<Option<PlanItem>> {
        plan_items::claim_plan_item(&self.pool, id, claimer, expected_assignee, recipe_id).await
    }

    async fn release_plan_item(&self, id: Uuid, expected_claimer: Uuid) -> Result<Option<PlanItem>> {
        plan_items::release_plan_item(&self.pool, id, expected_claimer).await
    }

    async fn set_plan_item_recipe(
        &self,
        id: Uuid,
        claimer: Uuid,
        recipe_id: Uuid,
    ) -> Result<Option<PlanItem>> {
        plan_items::set_plan_item_recipe(&self.pool, id, claimer, recipe_id).await
    }

    async fn complete_plan_item(
        &self,
        id: Uuid,
        claimer: Uuid,
        dish_id: Uuid,
    ) -> Result<Option<PlanItem>> {
        plan_items::complete_plan_item(&self.pool, id, claimer, dish_id).await
    }

    async fn count_completed_for_user(&self, meal_id: Uuid, user_id: Uuid) -> Result<i64> {
        plan_items::count_completed_for_user(&self.pool, meal_id, user_id).await
    }

    async fn upsert_profile(&self, id: Uuid, display_name: &str) -> Result<Profile> {
        posts::upsert_profile(&self.pool, id, display_name).await
    }

    async fn insert_recipe(&self, owner_id: Uuid, title: &str) -> Result<Recipe> {
        posts::insert_recipe(&self.pool, owner_id, title).await
    }

    async fn get_recipe(&self, id: Uuid) -> Result<Option<Recipe>> {
        posts::get_recipe(&self.pool, id).await
    }

    async fn insert_dish_post(
        &self,
        author_id: Uuid,
        recipe_id: Option<Uuid>,
        caption: Option<&str>,
    ) -> Result<Post> {
        posts::insert_dish_post(&self.pool, author_id, recipe_id, caption).await
    }

    async fn get_post(&self, id: Uuid) -> Result<Option<Post>> {
        posts::get_post(&self.pool, id).await
    }

    async fn get_posts(&self, ids: &[Uuid]) -> Result<Vec<Post>> {
        posts::get_posts(&self.pool, ids).await
    }

    async fn list_recent_posts(&self, limit: i64) -> Result<Vec<Post>> {
        posts::list_recent_posts(&self.pool, limit).await
    }

    async fn can_add_dish_to_meal(
        &self,
        dish_id: Uuid,
        meal_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool> {
        posts::can_add_dish_to_meal(&self.pool, dish_id, meal_id, user_id).await
    }

    async fn publish_meal_post(
        &self,
        meal_id: Uuid,
        author_id: Uuid,
        caption: Option<&str>,
    ) -> Result<Post> {
        posts::publish_meal_post(&self.pool, meal_id, author_id, caption).await
    }

    async fn insert_relationship(
        &self,
        a: Uuid,
        b: Uuid,
        kind: RelationshipKind,
    ) -> Result<PostRelationship> {
        relationships::insert_relationship(&self.pool, a, b, kind).await
    }

    async fn delete_relationship(&self, a: Uuid, b: Uuid, kind: RelationshipKind) -> Result<u64> {
        relationships::delete_relationship(&self.pool, a, b, kind).await
    }

    async fn list_relationships_for_posts(&self, post_ids: &[Uuid]) -> Result<Vec<PostRelationship>> {
        relationships::list_relationships_for_posts(&self.pool, post_ids).await
    }
}
