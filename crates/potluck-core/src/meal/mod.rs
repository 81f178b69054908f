//! Meal aggregate lifecycle: create, read, update, complete, delete.
//!
//! Creation and deletion each span two store calls with no shared
//! transaction, so both carry an explicit compensating action:
//!
//! - create: insert meal, insert host participant; if the second insert
//!   fails the meal is deleted again.
//! - delete: detach dishes, delete meal; if the delete fails the detached
//!   dishes are re-attached.
//!
//! Completion needs no compensation: the status change and the purge of
//! pending invitations are one store call, and the follow-up publication
//! is idempotent, so a failed completion is finished by retrying it.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use potluck_db::models::{
    Meal, MealChanges, MealStatus, NewMeal, Participant, ParticipantRole, PlanItem, Post,
    RsvpStatus,
};

use crate::error::{Entity, PotluckError, Result};
use crate::lookup;
use crate::permission;
use crate::store::MealStore;

/// A meal with its roster and slots.
#[derive(Debug, Clone, Serialize)]
pub struct MealDetails {
    pub meal: Meal,
    pub participants: Vec<Participant>,
    pub items: Vec<PlanItem>,
}

impl MealDetails {
    pub fn host(&self) -> Option<&Participant> {
        self.participants.iter().find(|p| p.is_accepted_host())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Completion {
    pub meal: Meal,
    /// Pending invitations discarded by this call.
    pub discarded_invitations: u64,
    pub post: Post,
}

#[derive(Debug, Clone, Serialize)]
pub struct Deletion {
    pub meal_id: Uuid,
    /// Dish posts that outlive the meal.
    pub detached_dishes: Vec<Uuid>,
}

pub struct MealLifecycle {
    store: Arc<dyn MealStore>,
}

impl MealLifecycle {
    pub fn new(store: Arc<dyn MealStore>) -> Self {
        Self { store }
    }

    async fn load_as_host(&self, meal_id: Uuid, actor: Uuid) -> Result<Meal> {
        let store = self.store.as_ref();
        let meal = lookup::meal(store, meal_id).await?;
        let membership = lookup::membership(store, meal_id, actor).await?;
        permission::can_manage_meal(membership.as_ref())?;
        Ok(meal)
    }

    /// Create a meal in `planning` with `user` as its accepted host.
    pub async fn create(&self, user: Uuid, input: NewMeal) -> Result<Meal> {
        let title = input.title.trim().to_owned();
        if title.is_empty() {
            return Err(PotluckError::Validation("meal title is required".to_owned()));
        }
        let input = NewMeal { title, ..input };

        let meal = self.store.insert_meal(user, &input).await?;
        let host = self
            .store
            .insert_participant(
                meal.id,
                user,
                ParticipantRole::Host,
                RsvpStatus::Accepted,
                None,
            )
            .await;

        if let Err(e) = host {
            tracing::warn!(
                meal_id = %meal.id,
                actor = %user,
                error = %e,
                "host insert failed, deleting meal"
            );
            if let Err(cleanup) = self.store.delete_meal(meal.id).await {
                tracing::error!(
                    meal_id = %meal.id,
                    error = %cleanup,
                    "compensating delete failed; meal left without a host"
                );
            }
            return Err(PotluckError::Store(e));
        }

        tracing::info!(meal_id = %meal.id, actor = %user, title = %meal.title, "meal created");
        Ok(meal)
    }

    pub async fn get(&self, meal_id: Uuid, actor: Uuid) -> Result<MealDetails> {
        let store = self.store.as_ref();
        let meal = lookup::meal(store, meal_id).await?;
        let membership = lookup::membership(store, meal_id, actor).await?;
        permission::can_view(membership.as_ref())?;

        let participants = store.list_participants(meal_id).await?;
        let items = store.list_plan_items(meal_id).await?;
        Ok(MealDetails {
            meal,
            participants,
            items,
        })
    }

    /// Meals the user belongs to in any role, soonest first.
    pub async fn list_for_user(&self, user: Uuid) -> Result<Vec<Meal>> {
        Ok(self.store.list_meals_for_user(user).await?)
    }

    /// Change descriptive fields. Never touches the status.
    pub async fn update(&self, meal_id: Uuid, actor: Uuid, changes: MealChanges) -> Result<Meal> {
        if changes.is_empty() {
            return Err(PotluckError::Validation("nothing to update".to_owned()));
        }
        if changes.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(PotluckError::Validation("meal title cannot be blank".to_owned()));
        }
        self.load_as_host(meal_id, actor).await?;

        let changes = MealChanges {
            title: changes.title.map(|t| t.trim().to_owned()),
            ..changes
        };
        let meal = self
            .store
            .update_meal(meal_id, &changes)
            .await?
            .ok_or_else(|| PotluckError::not_found(Entity::Meal, meal_id))?;
        tracing::info!(meal_id = %meal_id, actor = %actor, "meal updated");
        Ok(meal)
    }

    /// Mark the meal completed, discard unanswered invitations, and publish
    /// its feed post. Safe to call again: later calls change nothing.
    pub async fn complete(&self, meal_id: Uuid, actor: Uuid) -> Result<Completion> {
        let before = self.load_as_host(meal_id, actor).await?;

        let (meal, discarded_invitations) = self
            .store
            .complete_meal(meal_id)
            .await?
            .ok_or_else(|| PotluckError::not_found(Entity::Meal, meal_id))?;
        // Publication is a separate store call. If it fails the meal is
        // already completed; calling complete again publishes the post.
        let post = self
            .store
            .publish_meal_post(meal_id, actor, Some(meal.title.as_str()))
            .await?;

        if before.status == MealStatus::Planning {
            tracing::info!(
                meal_id = %meal_id,
                actor = %actor,
                discarded_invitations,
                post_id = %post.id,
                "meal completed"
            );
        } else {
            tracing::debug!(meal_id = %meal_id, discarded_invitations, "meal already completed");
        }
        Ok(Completion {
            meal,
            discarded_invitations,
            post,
        })
    }

    /// Delete the meal and everything owned by it. Dish posts survive,
    /// detached from the meal.
    pub async fn delete(&self, meal_id: Uuid, actor: Uuid) -> Result<Deletion> {
        self.load_as_host(meal_id, actor).await?;

        let detached_dishes = self.store.detach_meal_dishes(meal_id).await?;
        let deleted = match self.store.delete_meal(meal_id).await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(
                    meal_id = %meal_id,
                    dishes = detached_dishes.len(),
                    error = %e,
                    "meal delete failed, re-attaching dishes"
                );
                if let Err(cleanup) = self.store.reattach_dishes(meal_id, &detached_dishes).await
                {
                    tracing::error!(
                        meal_id = %meal_id,
                        error = %cleanup,
                        "compensating re-attach failed; dishes left detached"
                    );
                }
                return Err(PotluckError::Store(e));
            }
        };
        if deleted == 0 {
            return Err(PotluckError::not_found(Entity::Meal, meal_id));
        }

        tracing::info!(
            meal_id = %meal_id,
            actor = %actor,
            detached = detached_dishes.len(),
            "meal deleted"
        );
        Ok(Deletion {
            meal_id,
            detached_dishes,
        })
    }
}
