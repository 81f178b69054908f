//! In-process [`MealStore`] for tests and demos.
//!
//! All state sits behind one mutex, so every method is atomic with respect
//! to every other; conditional writes re-check their precondition under the
//! lock exactly like the SQL WHERE clauses in `potluck_db::queries`.
//! Foreign-key and CHECK constraints of the schema are mirrored as errors.
//!
//! Timestamps come from a logical clock that advances one millisecond per
//! write, so ordering by `created_at` is deterministic.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use potluck_db::models::{
    Meal, MealChanges, MealDish, MealStatus, NewMeal, NewPlanItem, Participant,
    ParticipantProfile, ParticipantRole, PlanItem, Post, PostKind, PostRelationship, Profile,
    Recipe, RelationshipKind, ReleasedSlots, RsvpStatus,
};

use super::MealStore;

#[derive(Default)]
struct State {
    tick: i64,
    profiles: HashMap<Uuid, Profile>,
    meals: HashMap<Uuid, Meal>,
    participants: Vec<Participant>,
    plan_items: Vec<PlanItem>,
    recipes: HashMap<Uuid, Recipe>,
    posts: HashMap<Uuid, Post>,
    relationships: Vec<PostRelationship>,
}

impl State {
    fn now(&mut self) -> DateTime<Utc> {
        self.tick += 1;
        let epoch = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_default();
        epoch + Duration::milliseconds(self.tick)
    }

    fn has_other_accepted_host(&self, meal_id: Uuid, user_id: Uuid) -> bool {
        self.participants
            .iter()
            .any(|p| p.meal_id == meal_id && p.user_id != user_id && p.is_accepted_host())
    }

    fn participant(&self, meal_id: Uuid, user_id: Uuid) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| p.meal_id == meal_id && p.user_id == user_id)
    }

    /// Membership of `user_id` in the meal that owns slot `item_id`.
    fn slot_member(&self, item_id: Uuid, user_id: Uuid) -> Option<&Participant> {
        let item = self.plan_items.iter().find(|i| i.id == item_id)?;
        self.participant(item.meal_id, user_id)
    }

    /// Mirrors `plan_items::release_open_slots`.
    fn release_open_slots(&mut self, meal_id: Uuid, user_id: Uuid) -> ReleasedSlots {
        let mut released = ReleasedSlots::default();
        for item in self
            .plan_items
            .iter_mut()
            .filter(|i| i.meal_id == meal_id && i.dish_id.is_none())
        {
            if item.claimed_by == Some(user_id) {
                item.claimed_by = None;
                item.claimed_at = None;
                item.recipe_id = None;
                released.released_claims += 1;
            }
            if item.assigned_to == Some(user_id) {
                item.assigned_to = None;
                item.assigned_at = None;
                released.cleared_assignments += 1;
            }
        }
        released
    }

    fn participant_mut(&mut self, meal_id: Uuid, user_id: Uuid) -> Option<&mut Participant> {
        self.participants
            .iter_mut()
            .find(|p| p.meal_id == meal_id && p.user_id == user_id)
    }

    fn item_mut(&mut self, id: Uuid) -> Option<&mut PlanItem> {
        self.plan_items.iter_mut().find(|i| i.id == id)
    }

    fn meal_post_id(&self, meal_id: Uuid) -> Option<Uuid> {
        self.posts
            .values()
            .find(|p| p.kind == PostKind::Meal && p.meal_id == Some(meal_id))
            .map(|p| p.id)
    }

    /// `INSERT ... ON CONFLICT DO NOTHING` into `post_relationships`.
    fn relate(&mut self, a: Uuid, b: Uuid, kind: RelationshipKind) -> Result<PostRelationship> {
        if a == b {
            bail!("post_relationships check violated: a post cannot relate to itself");
        }
        if !self.posts.contains_key(&a) || !self.posts.contains_key(&b) {
            bail!("post_relationships foreign key violated: unknown post");
        }
        let (post_a, post_b) = PostRelationship::normalize(a, b);
        if let Some(existing) = self
            .relationships
            .iter()
            .find(|r| r.post_a == post_a && r.post_b == post_b && r.kind == kind)
        {
            return Ok(existing.clone());
        }
        let edge = PostRelationship {
            id: Uuid::new_v4(),
            post_a,
            post_b,
            kind,
            created_at: self.now(),
        };
        self.relationships.push(edge.clone());
        Ok(edge)
    }

    fn remove_post(&mut self, id: Uuid) {
        self.posts.remove(&id);
        self.relationships.retain(|r| !r.touches(id));
        for item in self.plan_items.iter_mut().filter(|i| i.dish_id == Some(id)) {
            item.dish_id = None;
        }
    }
}

/// In-memory [`MealStore`].
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    faults: Mutex<HashSet<&'static str>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call to the named store method fail with an error, as
    /// if the database connection had dropped.
    pub fn fail_next(&self, operation: &'static str) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.insert(operation);
        }
    }

    /// Number of meals currently stored, orphans included.
    pub fn meal_count(&self) -> usize {
        self.state.lock().map(|s| s.meals.len()).unwrap_or(0)
    }

    fn state(&self, operation: &'static str) -> Result<MutexGuard<'_, State>> {
        let injected = self
            .faults
            .lock()
            .map_err(|_| anyhow!("fault registry poisoned"))?
            .remove(operation);
        if injected {
            bail!("injected failure in {operation}");
        }
        self.state
            .lock()
            .map_err(|_| anyhow!("memory store poisoned"))
    }
}

#[async_trait]
impl MealStore for MemoryStore {
    async fn insert_meal(&self, created_by: Uuid, meal: &NewMeal) -> Result<Meal> {
        let mut state = self.state("insert_meal")?;
        if meal.title.trim().is_empty() {
            bail!("meals check violated: title must not be blank");
        }
        let now = state.now();
        let row = Meal {
            id: Uuid::new_v4(),
            title: meal.title.clone(),
            description: meal.description.clone(),
            location: meal.location.clone(),
            scheduled_at: meal.scheduled_at,
            status: MealStatus::Planning,
            created_by,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        state.meals.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_meal(&self, id: Uuid) -> Result<Option<Meal>> {
        let state = self.state("get_meal")?;
        Ok(state.meals.get(&id).cloned())
    }

    async fn list_meals_for_user(&self, user_id: Uuid) -> Result<Vec<Meal>> {
        let state = self.state("list_meals_for_user")?;
        let mut meals: Vec<Meal> = state
            .participants
            .iter()
            .filter(|p| p.user_id == user_id)
            .filter_map(|p| state.meals.get(&p.meal_id).cloned())
            .collect();
        meals.sort_by_key(|m| (m.scheduled_at, m.created_at));
        Ok(meals)
    }

    async fn update_meal(&self, id: Uuid, changes: &MealChanges) -> Result<Option<Meal>> {
        let mut state = self.state("update_meal")?;
        if matches!(&changes.title, Some(t) if t.trim().is_empty()) {
            bail!("meals check violated: title must not be blank");
        }
        let now = state.now();
        let Some(meal) = state.meals.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = &changes.title {
            meal.title = title.clone();
        }
        if let Some(description) = &changes.description {
            meal.description = Some(description.clone());
        }
        if let Some(location) = &changes.location {
            meal.location = Some(location.clone());
        }
        if let Some(scheduled_at) = changes.scheduled_at {
            meal.scheduled_at = scheduled_at;
        }
        meal.updated_at = now;
        Ok(Some(meal.clone()))
    }

    async fn complete_meal(&self, id: Uuid) -> Result<Option<(Meal, u64)>> {
        let mut state = self.state("complete_meal")?;
        let now = state.now();
        let Some(meal) = state.meals.get_mut(&id) else {
            return Ok(None);
        };
        meal.status = MealStatus::Completed;
        meal.completed_at.get_or_insert(now);
        meal.updated_at = now;
        let meal = meal.clone();

        let before = state.participants.len();
        state
            .participants
            .retain(|p| !(p.meal_id == id && p.rsvp_status == RsvpStatus::Pending));
        let discarded = (before - state.participants.len()) as u64;
        Ok(Some((meal, discarded)))
    }

    async fn detach_meal_dishes(&self, meal_id: Uuid) -> Result<Vec<Uuid>> {
        let mut state = self.state("detach_meal_dishes")?;
        let mut detached = Vec::new();
        for post in state.posts.values_mut() {
            if post.kind == PostKind::Dish && post.meal_id == Some(meal_id) {
                post.meal_id = None;
                detached.push(post.id);
            }
        }
        detached.sort();
        Ok(detached)
    }

    async fn reattach_dishes(&self, meal_id: Uuid, dish_ids: &[Uuid]) -> Result<u64> {
        let mut state = self.state("reattach_dishes")?;
        let mut count = 0;
        for id in dish_ids {
            if let Some(post) = state.posts.get_mut(id)
                && post.kind == PostKind::Dish
                && post.meal_id.is_none()
            {
                post.meal_id = Some(meal_id);
                count += 1;
            }
        }
        Ok(count)
    }

    async fn delete_meal(&self, id: Uuid) -> Result<u64> {
        let mut state = self.state("delete_meal")?;
        if let Some(post_id) = state.meal_post_id(id) {
            state.remove_post(post_id);
        }
        if state.meals.remove(&id).is_none() {
            return Ok(0);
        }
        state.participants.retain(|p| p.meal_id != id);
        state.plan_items.retain(|i| i.meal_id != id);
        for post in state.posts.values_mut() {
            if post.meal_id == Some(id) {
                post.meal_id = None;
            }
        }
        Ok(1)
    }

    async fn insert_participant(
        &self,
        meal_id: Uuid,
        user_id: Uuid,
        role: ParticipantRole,
        rsvp_status: RsvpStatus,
        invited_by: Option<Uuid>,
    ) -> Result<Participant> {
        let mut state = self.state("insert_participant")?;
        if !state.meals.contains_key(&meal_id) {
            bail!("meal_participants foreign key violated: meal {meal_id} does not exist");
        }
        if state.participant_mut(meal_id, user_id).is_some() {
            bail!("meal_participants primary key violated: ({meal_id}, {user_id})");
        }
        let now = state.now();
        let row = Participant {
            meal_id,
            user_id,
            role,
            rsvp_status,
            invited_by,
            invited_at: now,
            responded_at: (rsvp_status != RsvpStatus::Pending).then_some(now),
        };
        state.participants.push(row.clone());
        Ok(row)
    }

    async fn insert_invitations(
        &self,
        meal_id: Uuid,
        invited_by: Uuid,
        user_ids: &[Uuid],
    ) -> Result<Vec<Participant>> {
        let mut state = self.state("insert_invitations")?;
        if !state.meals.contains_key(&meal_id) {
            bail!("meal_participants foreign key violated: meal {meal_id} does not exist");
        }
        let mut inserted = Vec::new();
        for &user_id in user_ids {
            if state.participant_mut(meal_id, user_id).is_some() {
                continue;
            }
            let row = Participant {
                meal_id,
                user_id,
                role: ParticipantRole::Attendee,
                rsvp_status: RsvpStatus::Pending,
                invited_by: Some(invited_by),
                invited_at: state.now(),
                responded_at: None,
            };
            state.participants.push(row.clone());
            inserted.push(row);
        }
        Ok(inserted)
    }

    async fn get_participant(&self, meal_id: Uuid, user_id: Uuid) -> Result<Option<Participant>> {
        let state = self.state("get_participant")?;
        Ok(state
            .participants
            .iter()
            .find(|p| p.meal_id == meal_id && p.user_id == user_id)
            .cloned())
    }

    async fn list_participants(&self, meal_id: Uuid) -> Result<Vec<Participant>> {
        let state = self.state("list_participants")?;
        Ok(state
            .participants
            .iter()
            .filter(|p| p.meal_id == meal_id)
            .cloned()
            .collect())
    }

    async fn list_participant_profiles(&self, meal_id: Uuid) -> Result<Vec<ParticipantProfile>> {
        let state = self.state("list_participant_profiles")?;
        let mut rows: Vec<ParticipantProfile> = state
            .participants
            .iter()
            .filter(|p| p.meal_id == meal_id)
            .map(|p| ParticipantProfile {
                user_id: p.user_id,
                display_name: state
                    .profiles
                    .get(&p.user_id)
                    .map(|profile| profile.display_name.clone())
                    .unwrap_or_else(|| p.user_id.to_string()),
                role: p.role,
                rsvp_status: p.rsvp_status,
                invited_at: p.invited_at,
                responded_at: p.responded_at,
            })
            .collect();
        rows.sort_by_key(|r| (r.role != ParticipantRole::Host, r.invited_at));
        Ok(rows)
    }

    async fn update_rsvp(
        &self,
        meal_id: Uuid,
        user_id: Uuid,
        rsvp_status: RsvpStatus,
    ) -> Result<Option<(Participant, ReleasedSlots)>> {
        let mut state = self.state("update_rsvp")?;
        let other_host = state.has_other_accepted_host(meal_id, user_id);
        let now = state.now();
        let Some(participant) = state.participant_mut(meal_id, user_id) else {
            return Ok(None);
        };
        let allowed = participant.role == ParticipantRole::Attendee
            || rsvp_status == RsvpStatus::Accepted
            || other_host;
        if !allowed {
            return Ok(None);
        }
        participant.rsvp_status = rsvp_status;
        participant.responded_at = Some(now);
        let participant = participant.clone();

        let released = if rsvp_status == RsvpStatus::Accepted {
            ReleasedSlots::default()
        } else {
            state.release_open_slots(meal_id, user_id)
        };
        Ok(Some((participant, released)))
    }

    async fn delete_participant(
        &self,
        meal_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ReleasedSlots>> {
        let mut state = self.state("delete_participant")?;
        let other_host = state.has_other_accepted_host(meal_id, user_id);
        let holds_completed = state.plan_items.iter().any(|i| {
            i.meal_id == meal_id && i.claimed_by == Some(user_id) && i.dish_id.is_some()
        });
        let deletable = state
            .participant(meal_id, user_id)
            .is_some_and(|p| p.role == ParticipantRole::Attendee || other_host);
        if !deletable || holds_completed {
            return Ok(None);
        }
        state
            .participants
            .retain(|p| !(p.meal_id == meal_id && p.user_id == user_id));
        Ok(Some(state.release_open_slots(meal_id, user_id)))
    }

    async fn transfer_host(&self, meal_id: Uuid, from_user: Uuid, to_user: Uuid) -> Result<bool> {
        let mut state = self.state("transfer_host")?;
        let from_ok = state
            .participant_mut(meal_id, from_user)
            .is_some_and(|p| p.role == ParticipantRole::Host);
        let to_ok = from_user != to_user
            && state.participant_mut(meal_id, to_user).is_some_and(|p| {
                p.role == ParticipantRole::Attendee && p.rsvp_status == RsvpStatus::Accepted
            });
        if !(from_ok && to_ok) {
            return Ok(false);
        }
        if let Some(p) = state.participant_mut(meal_id, from_user) {
            p.role = ParticipantRole::Attendee;
        }
        if let Some(p) = state.participant_mut(meal_id, to_user) {
            p.role = ParticipantRole::Host;
        }
        Ok(true)
    }

    async fn insert_plan_items(
        &self,
        meal_id: Uuid,
        created_by: Uuid,
        items: &[NewPlanItem],
    ) -> Result<Vec<PlanItem>> {
        let mut state = self.state("insert_plan_items")?;
        if !state.meals.contains_key(&meal_id) {
            bail!("plan_items foreign key violated: meal {meal_id} does not exist");
        }
        let mut inserted = Vec::with_capacity(items.len());
        for spec in items {
            let now = state.now();
            inserted.push(PlanItem {
                id: Uuid::new_v4(),
                meal_id,
                course: spec.course,
                name: spec.name.clone(),
                is_main_dish: spec.is_main_dish,
                assigned_to: spec.assigned_to,
                assigned_at: spec.assigned_to.map(|_| now),
                claimed_by: None,
                claimed_at: None,
                recipe_id: None,
                dish_id: None,
                completed_at: None,
                created_by,
                created_at: now,
            });
        }
        state.plan_items.extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn get_plan_item(&self, id: Uuid) -> Result<Option<PlanItem>> {
        let state = self.state("get_plan_item")?;
        Ok(state.plan_items.iter().find(|i| i.id == id).cloned())
    }

    async fn list_plan_items(&self, meal_id: Uuid) -> Result<Vec<PlanItem>> {
        let state = self.state("list_plan_items")?;
        let mut items: Vec<PlanItem> = state
            .plan_items
            .iter()
            .filter(|i| i.meal_id == meal_id)
            .cloned()
            .collect();
        items.sort_by_key(|i| (!i.is_main_dish, i.created_at, i.id));
        Ok(items)
    }

    async fn list_meal_dishes(&self, meal_id: Uuid) -> Result<Vec<MealDish>> {
        let state = self.state("list_meal_dishes")?;
        let mut items: Vec<&PlanItem> = state
            .plan_items
            .iter()
            .filter(|i| i.meal_id == meal_id)
            .collect();
        items.sort_by_key(|i| (i.course, !i.is_main_dish, i.created_at));
        Ok(items
            .into_iter()
            .filter_map(|i| {
                let dish_id = i.dish_id?;
                Some(MealDish {
                    plan_item_id: i.id,
                    course: i.course,
                    name: i.name.clone(),
                    is_main_dish: i.is_main_dish,
                    claimed_by: i.claimed_by,
                    recipe_id: i.recipe_id,
                    recipe_title: i
                        .recipe_id
                        .and_then(|r| state.recipes.get(&r))
                        .map(|r| r.title.clone()),
                    dish_id,
                    completed_at: i.completed_at,
                })
            })
            .collect())
    }

    async fn delete_plan_item(&self, id: Uuid) -> Result<u64> {
        let mut state = self.state("delete_plan_item")?;
        let before = state.plan_items.len();
        state
            .plan_items
            .retain(|i| !(i.id == id && i.claimed_by.is_none() && i.dish_id.is_none()));
        Ok((before - state.plan_items.len()) as u64)
    }

    async fn set_assignment(
        &self,
        id: Uuid,
        expected: Option<Uuid>,
        assignee: Option<Uuid>,
    ) -> Result<Option<PlanItem>> {
        let mut state = self.state("set_assignment")?;
        if let Some(assignee) = assignee {
            let accepted = state
                .slot_member(id, assignee)
                .is_some_and(|p| p.rsvp_status == RsvpStatus::Accepted);
            if !accepted {
                return Ok(None);
            }
        }
        let now = state.now();
        let Some(item) = state.item_mut(id) else {
            return Ok(None);
        };
        if item.claimed_by.is_some() || item.dish_id.is_some() || item.assigned_to != expected {
            return Ok(None);
        }
        item.assigned_to = assignee;
        item.assigned_at = assignee.map(|_| now);
        Ok(Some(item.clone()))
    }

    async fn claim_plan_item(
        &self,
        id: Uuid,
        claimer: Uuid,
        expected_assignee: Option<Uuid>,
        recipe_id: Option<Uuid>,
    ) -> Result<Option<PlanItem>> {
        let mut state = self.state("claim_plan_item")?;
        if let Some(recipe_id) = recipe_id
            && !state.recipes.contains_key(&recipe_id)
        {
            bail!("plan_items foreign key violated: recipe {recipe_id} does not exist");
        }
        let member = state
            .slot_member(id, claimer)
            .is_some_and(|p| {
                p.rsvp_status == RsvpStatus::Accepted || p.role == ParticipantRole::Host
            });
        if !member {
            return Ok(None);
        }
        let now = state.now();
        let Some(item) = state.item_mut(id) else {
            return Ok(None);
        };
        if item.claimed_by.is_some()
            || item.dish_id.is_some()
            || item.assigned_to != expected_assignee
        {
            return Ok(None);
        }
        item.claimed_by = Some(claimer);
        item.claimed_at = Some(now);
        item.recipe_id = recipe_id;
        Ok(Some(item.clone()))
    }

    async fn release_plan_item(&self, id: Uuid, expected_claimer: Uuid) -> Result<Option<PlanItem>> {
        let mut state = self.state("release_plan_item")?;
        let Some(item) = state.item_mut(id) else {
            return Ok(None);
        };
        if item.claimed_by != Some(expected_claimer) || item.dish_id.is_some() {
            return Ok(None);
        }
        item.claimed_by = None;
        item.claimed_at = None;
        item.recipe_id = None;
        Ok(Some(item.clone()))
    }

    async fn set_plan_item_recipe(
        &self,
        id: Uuid,
        claimer: Uuid,
        recipe_id: Uuid,
    ) -> Result<Option<PlanItem>> {
        let mut state = self.state("set_plan_item_recipe")?;
        if !state.recipes.contains_key(&recipe_id) {
            bail!("plan_items foreign key violated: recipe {recipe_id} does not exist");
        }
        let Some(item) = state.item_mut(id) else {
            return Ok(None);
        };
        if item.claimed_by != Some(claimer) || item.dish_id.is_some() {
            return Ok(None);
        }
        item.recipe_id = Some(recipe_id);
        Ok(Some(item.clone()))
    }

    async fn complete_plan_item(
        &self,
        id: Uuid,
        claimer: Uuid,
        dish_id: Uuid,
    ) -> Result<Option<PlanItem>> {
        let mut state = self.state("complete_plan_item")?;
        if !state.posts.contains_key(&dish_id) {
            bail!("plan_items foreign key violated: post {dish_id} does not exist");
        }
        let now = state.now();
        let Some(item) = state.item_mut(id) else {
            return Ok(None);
        };
        if item.claimed_by != Some(claimer) || item.dish_id.is_some() {
            return Ok(None);
        }
        item.dish_id = Some(dish_id);
        item.completed_at = Some(now);
        let item = item.clone();

        if let Some(post) = state.posts.get_mut(&dish_id)
            && post.kind == PostKind::Dish
        {
            post.meal_id = Some(item.meal_id);
        }
        if let Some(meal_post) = state.meal_post_id(item.meal_id)
            && meal_post != dish_id
        {
            state.relate(meal_post, dish_id, RelationshipKind::SameMeal)?;
        }
        Ok(Some(item))
    }

    async fn count_completed_for_user(&self, meal_id: Uuid, user_id: Uuid) -> Result<i64> {
        let state = self.state("count_completed_for_user")?;
        Ok(state
            .plan_items
            .iter()
            .filter(|i| {
                i.meal_id == meal_id && i.claimed_by == Some(user_id) && i.dish_id.is_some()
            })
            .count() as i64)
    }

    async fn upsert_profile(&self, id: Uuid, display_name: &str) -> Result<Profile> {
        let mut state = self.state("upsert_profile")?;
        let now = state.now();
        let profile = state.profiles.entry(id).or_insert_with(|| Profile {
            id,
            display_name: String::new(),
            created_at: now,
        });
        profile.display_name = display_name.to_owned();
        Ok(profile.clone())
    }

    async fn insert_recipe(&self, owner_id: Uuid, title: &str) -> Result<Recipe> {
        let mut state = self.state("insert_recipe")?;
        if title.trim().is_empty() {
            bail!("recipes check violated: title must not be blank");
        }
        let recipe = Recipe {
            id: Uuid::new_v4(),
            owner_id,
            title: title.to_owned(),
            created_at: state.now(),
        };
        state.recipes.insert(recipe.id, recipe.clone());
        Ok(recipe)
    }

    async fn get_recipe(&self, id: Uuid) -> Result<Option<Recipe>> {
        let state = self.state("get_recipe")?;
        Ok(state.recipes.get(&id).cloned())
    }

    async fn insert_dish_post(
        &self,
        author_id: Uuid,
        recipe_id: Option<Uuid>,
        caption: Option<&str>,
    ) -> Result<Post> {
        let mut state = self.state("insert_dish_post")?;
        if let Some(recipe_id) = recipe_id
            && !state.recipes.contains_key(&recipe_id)
        {
            bail!("posts foreign key violated: recipe {recipe_id} does not exist");
        }
        let post = Post {
            id: Uuid::new_v4(),
            author_id,
            kind: PostKind::Dish,
            meal_id: None,
            recipe_id,
            caption: caption.map(str::to_owned),
            created_at: state.now(),
        };
        state.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn get_post(&self, id: Uuid) -> Result<Option<Post>> {
        let state = self.state("get_post")?;
        Ok(state.posts.get(&id).cloned())
    }

    async fn get_posts(&self, ids: &[Uuid]) -> Result<Vec<Post>> {
        let state = self.state("get_posts")?;
        Ok(ids.iter().filter_map(|id| state.posts.get(id).cloned()).collect())
    }

    async fn list_recent_posts(&self, limit: i64) -> Result<Vec<Post>> {
        let state = self.state("list_recent_posts")?;
        let mut posts: Vec<Post> = state.posts.values().cloned().collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        posts.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        Ok(posts)
    }

    async fn can_add_dish_to_meal(
        &self,
        dish_id: Uuid,
        meal_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool> {
        let state = self.state("can_add_dish_to_meal")?;
        let member = state.meals.contains_key(&meal_id)
            && state.participants.iter().any(|p| {
                p.meal_id == meal_id
                    && p.user_id == user_id
                    && p.rsvp_status == RsvpStatus::Accepted
            });
        let dish_ok = state.posts.get(&dish_id).is_some_and(|d| {
            d.kind == PostKind::Dish
                && d.author_id == user_id
                && d.meal_id.is_none_or(|m| m == meal_id)
        });
        Ok(member && dish_ok)
    }

    async fn publish_meal_post(
        &self,
        meal_id: Uuid,
        author_id: Uuid,
        caption: Option<&str>,
    ) -> Result<Post> {
        let mut state = self.state("publish_meal_post")?;
        if !state.meals.contains_key(&meal_id) {
            bail!("posts foreign key violated: meal {meal_id} does not exist");
        }
        let post_id = match state.meal_post_id(meal_id) {
            Some(id) => id,
            None => {
                let post = Post {
                    id: Uuid::new_v4(),
                    author_id,
                    kind: PostKind::Meal,
                    meal_id: Some(meal_id),
                    recipe_id: None,
                    caption: caption.map(str::to_owned),
                    created_at: state.now(),
                };
                let id = post.id;
                state.posts.insert(id, post);
                id
            }
        };
        let dishes: Vec<Uuid> = state
            .posts
            .values()
            .filter(|p| p.kind == PostKind::Dish && p.meal_id == Some(meal_id))
            .map(|p| p.id)
            .collect();
        for dish in dishes {
            state.relate(post_id, dish, RelationshipKind::SameMeal)?;
        }
        state
            .posts
            .get(&post_id)
            .cloned()
            .ok_or_else(|| anyhow!("meal post {post_id} vanished"))
    }

    async fn insert_relationship(
        &self,
        a: Uuid,
        b: Uuid,
        kind: RelationshipKind,
    ) -> Result<PostRelationship> {
        let mut state = self.state("insert_relationship")?;
        state.relate(a, b, kind)
    }

    async fn delete_relationship(&self, a: Uuid, b: Uuid, kind: RelationshipKind) -> Result<u64> {
        let mut state = self.state("delete_relationship")?;
        let (post_a, post_b) = PostRelationship::normalize(a, b);
        let before = state.relationships.len();
        state
            .relationships
            .retain(|r| !(r.post_a == post_a && r.post_b == post_b && r.kind == kind));
        Ok((before - state.relationships.len()) as u64)
    }

    async fn list_relationships_for_posts(
        &self,
        post_ids: &[Uuid],
    ) -> Result<Vec<PostRelationship>> {
        let state = self.state("list_relationships_for_posts")?;
        let wanted: HashSet<&Uuid> = post_ids.iter().collect();
        Ok(state
            .relationships
            .iter()
            .filter(|r| wanted.contains(&r.post_a) || wanted.contains(&r.post_b))
            .cloned()
            .collect())
    }
}
