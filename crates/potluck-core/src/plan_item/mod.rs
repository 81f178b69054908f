//! Dish slot state machine.
//!
//! Every operation follows the same protocol: read the slot, its meal, and
//! the actor's membership; ask [`crate::permission`] for a decision; check
//! the edge against [`state::is_valid_transition`]; then issue one
//! conditional write whose WHERE clause restates the precondition. When
//! the write matches nothing the slot is re-read to tell a vanished row
//! (`NotFound`) from a concurrent writer (`Conflict`).

pub mod state;

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use potluck_db::models::{
    Meal, MealDish, NewPlanItem, Participant, PlanItem, PlanItemStatus, PostKind, RsvpStatus,
};

use crate::error::{Entity, PotluckError, Result};
use crate::lookup;
use crate::permission;
use crate::store::MealStore;

pub use state::{InconsistentSlot, SlotState, is_valid_transition};

/// Slot counts by derived status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub total: usize,
    pub unclaimed: usize,
    pub assigned: usize,
    pub claimed: usize,
    pub has_recipe: usize,
    pub completed: usize,
}

impl Progress {
    pub fn tally<'a>(items: impl IntoIterator<Item = &'a PlanItem>) -> Self {
        let mut progress = Self::default();
        for item in items {
            progress.total += 1;
            match item.status() {
                PlanItemStatus::Unclaimed => progress.unclaimed += 1,
                PlanItemStatus::Assigned => progress.assigned += 1,
                PlanItemStatus::Claimed => progress.claimed += 1,
                PlanItemStatus::HasRecipe => progress.has_recipe += 1,
                PlanItemStatus::Completed => progress.completed += 1,
            }
        }
        progress
    }

    /// Slots somebody has taken on, whether or not they are cooked yet.
    pub fn covered(&self) -> usize {
        self.claimed + self.has_recipe + self.completed
    }
}

/// Everything one slot operation needs to decide.
struct Slot {
    meal: Meal,
    item: PlanItem,
    membership: Option<Participant>,
    state: SlotState,
}

impl From<InconsistentSlot> for PotluckError {
    fn from(err: InconsistentSlot) -> Self {
        PotluckError::InvalidState(err.to_string())
    }
}

pub struct PlanItemStateMachine {
    store: Arc<dyn MealStore>,
}

impl PlanItemStateMachine {
    pub fn new(store: Arc<dyn MealStore>) -> Self {
        Self { store }
    }

    async fn load(&self, item_id: Uuid, actor: Uuid) -> Result<Slot> {
        let store = self.store.as_ref();
        let item = lookup::plan_item(store, item_id).await?;
        let meal = lookup::meal(store, item.meal_id).await?;
        let membership = lookup::membership(store, meal.id, actor).await?;
        let state = SlotState::try_from(&item)?;
        tracing::debug!(
            item_id = %item_id,
            actor = %actor,
            status = %state.status(),
            "loaded slot"
        );
        Ok(Slot {
            meal,
            item,
            membership,
            state,
        })
    }

    fn check_edge(item: &PlanItem, from: PlanItemStatus, to: PlanItemStatus) -> Result<()> {
        if is_valid_transition(from, to) {
            Ok(())
        } else {
            Err(PotluckError::InvalidState(format!(
                "{} cannot move from {from} to {to}",
                item.label()
            )))
        }
    }

    /// Classify a conditional write that matched no row.
    async fn lost_race(&self, item_id: Uuid, actor: Uuid, action: &str) -> PotluckError {
        match self.store.get_plan_item(item_id).await {
            Ok(None) => PotluckError::not_found(Entity::PlanItem, item_id),
            Ok(Some(current)) => {
                tracing::warn!(
                    item_id = %item_id,
                    actor = %actor,
                    status = %current.status(),
                    action,
                    "lost race on slot"
                );
                PotluckError::Conflict(format!(
                    "{} changed before it could be {action} (now {})",
                    current.label(),
                    current.status()
                ))
            }
            Err(e) => PotluckError::Store(e),
        }
    }

    /// Accepted participants of the meal, for assignee validation.
    async fn require_accepted(&self, meal_id: Uuid, user_id: Uuid) -> Result<()> {
        let accepted = self
            .store
            .get_participant(meal_id, user_id)
            .await?
            .is_some_and(|p| p.rsvp_status == RsvpStatus::Accepted);
        if accepted {
            Ok(())
        } else {
            Err(PotluckError::Validation(format!(
                "{user_id} is not an accepted participant of this meal"
            )))
        }
    }

    async fn require_recipe(&self, recipe_id: Uuid) -> Result<()> {
        match self.store.get_recipe(recipe_id).await? {
            Some(_) => Ok(()),
            None => Err(PotluckError::not_found(Entity::Recipe, recipe_id)),
        }
    }

    // -- creation ----------------------------------------------------------

    pub async fn add_item(&self, meal_id: Uuid, actor: Uuid, spec: NewPlanItem) -> Result<PlanItem> {
        let mut created = self.add_items(meal_id, actor, &[spec]).await?;
        created
            .pop()
            .ok_or_else(|| PotluckError::Store(anyhow::anyhow!("insert returned no slot")))
    }

    /// Add several slots at once. Either all are created or none are.
    pub async fn add_items(
        &self,
        meal_id: Uuid,
        actor: Uuid,
        specs: &[NewPlanItem],
    ) -> Result<Vec<PlanItem>> {
        if specs.is_empty() {
            return Err(PotluckError::Validation(
                "at least one dish slot is required".to_owned(),
            ));
        }
        if specs
            .iter()
            .any(|s| s.name.as_deref().is_some_and(|n| n.trim().is_empty()))
        {
            return Err(PotluckError::Validation(
                "slot names must not be blank".to_owned(),
            ));
        }

        let store = self.store.as_ref();
        let meal = lookup::meal(store, meal_id).await?;
        let membership = lookup::membership(store, meal_id, actor).await?;
        permission::can_add_items(membership.as_ref(), &meal)?;

        let participants = store.list_participants(meal_id).await?;
        for assignee in specs.iter().filter_map(|s| s.assigned_to) {
            let accepted = participants
                .iter()
                .any(|p| p.user_id == assignee && p.rsvp_status == RsvpStatus::Accepted);
            if !accepted {
                return Err(PotluckError::Validation(format!(
                    "{assignee} is not an accepted participant of this meal"
                )));
            }
        }

        let created = store.insert_plan_items(meal_id, actor, specs).await?;
        tracing::info!(
            meal_id = %meal_id,
            actor = %actor,
            count = created.len(),
            "dish slots added"
        );
        Ok(created)
    }

    // -- assignment --------------------------------------------------------

    pub async fn assign(&self, item_id: Uuid, actor: Uuid, assignee: Uuid) -> Result<PlanItem> {
        let slot = self.load(item_id, actor).await?;
        permission::can_assign(slot.membership.as_ref(), &slot.meal, &slot.item)?;
        Self::check_edge(&slot.item, slot.state.status(), PlanItemStatus::Assigned)?;
        self.require_accepted(slot.meal.id, assignee).await?;

        match self
            .store
            .set_assignment(item_id, slot.item.assigned_to, Some(assignee))
            .await?
        {
            Some(item) => {
                tracing::info!(item_id = %item_id, actor = %actor, assignee = %assignee, "slot assigned");
                Ok(item)
            }
            None => Err(self.lost_race(item_id, actor, "assigned").await),
        }
    }

    pub async fn unassign(&self, item_id: Uuid, actor: Uuid) -> Result<PlanItem> {
        let slot = self.load(item_id, actor).await?;
        permission::can_assign(slot.membership.as_ref(), &slot.meal, &slot.item)?;
        let SlotState::Assigned { to } = slot.state else {
            return Err(PotluckError::InvalidState(format!(
                "{} is not assigned",
                slot.item.label()
            )));
        };
        Self::check_edge(&slot.item, slot.state.status(), PlanItemStatus::Unclaimed)?;

        match self.store.set_assignment(item_id, Some(to), None).await? {
            Some(item) => {
                tracing::info!(item_id = %item_id, actor = %actor, previous = %to, "slot unassigned");
                Ok(item)
            }
            None => Err(self.lost_race(item_id, actor, "unassigned").await),
        }
    }

    // -- claiming ----------------------------------------------------------

    /// Take responsibility for a slot. The write only lands while the slot
    /// is unclaimed and still carries the assignment seen by the pre-check,
    /// so of several simultaneous claimers exactly one wins.
    pub async fn claim(&self, item_id: Uuid, actor: Uuid) -> Result<PlanItem> {
        self.claim_with(item_id, actor, None).await
    }

    /// Claim and attach a recipe in a single write.
    pub async fn volunteer(&self, item_id: Uuid, actor: Uuid, recipe_id: Uuid) -> Result<PlanItem> {
        self.require_recipe(recipe_id).await?;
        self.claim_with(item_id, actor, Some(recipe_id)).await
    }

    async fn claim_with(
        &self,
        item_id: Uuid,
        actor: Uuid,
        recipe_id: Option<Uuid>,
    ) -> Result<PlanItem> {
        let slot = self.load(item_id, actor).await?;
        permission::can_claim(actor, slot.membership.as_ref(), &slot.meal, &slot.item)?;
        let target = match recipe_id {
            Some(_) => PlanItemStatus::HasRecipe,
            None => PlanItemStatus::Claimed,
        };
        Self::check_edge(&slot.item, slot.state.status(), target)?;

        match self
            .store
            .claim_plan_item(item_id, actor, slot.item.assigned_to, recipe_id)
            .await?
        {
            Some(item) => {
                tracing::info!(
                    item_id = %item_id,
                    actor = %actor,
                    status = %item.status(),
                    "slot claimed"
                );
                Ok(item)
            }
            None => Err(self.lost_race(item_id, actor, "claimed").await),
        }
    }

    /// Release a claim. Clears the claimer and any recipe together.
    pub async fn unclaim(&self, item_id: Uuid, actor: Uuid) -> Result<PlanItem> {
        let slot = self.load(item_id, actor).await?;
        permission::can_unclaim(actor, slot.membership.as_ref(), &slot.meal, &slot.item)?;
        let Some(claimer) = slot.state.claimer() else {
            return Err(PotluckError::InvalidState(format!(
                "{} is not claimed",
                slot.item.label()
            )));
        };
        let target = match slot.item.assigned_to {
            Some(_) => PlanItemStatus::Assigned,
            None => PlanItemStatus::Unclaimed,
        };
        Self::check_edge(&slot.item, slot.state.status(), target)?;

        match self.store.release_plan_item(item_id, claimer).await? {
            Some(item) => {
                tracing::info!(
                    item_id = %item_id,
                    actor = %actor,
                    claimer = %claimer,
                    "slot released"
                );
                Ok(item)
            }
            None => Err(self.lost_race(item_id, actor, "released").await),
        }
    }

    /// Attach or replace the recipe on a slot the actor holds.
    pub async fn attach_recipe(
        &self,
        item_id: Uuid,
        actor: Uuid,
        recipe_id: Uuid,
    ) -> Result<PlanItem> {
        let slot = self.load(item_id, actor).await?;
        permission::can_attach_recipe(actor, &slot.meal, &slot.item)?;
        Self::check_edge(&slot.item, slot.state.status(), PlanItemStatus::HasRecipe)?;
        self.require_recipe(recipe_id).await?;

        match self
            .store
            .set_plan_item_recipe(item_id, actor, recipe_id)
            .await?
        {
            Some(item) => {
                tracing::info!(item_id = %item_id, actor = %actor, recipe_id = %recipe_id, "recipe attached");
                Ok(item)
            }
            None => Err(self.lost_race(item_id, actor, "given a recipe").await),
        }
    }

    /// Link the cooked dish. Terminal: the slot cannot change afterwards.
    pub async fn complete(&self, item_id: Uuid, actor: Uuid, dish_id: Uuid) -> Result<PlanItem> {
        let slot = self.load(item_id, actor).await?;
        permission::can_complete(actor, &slot.item)?;
        Self::check_edge(&slot.item, slot.state.status(), PlanItemStatus::Completed)?;

        let dish = self
            .store
            .get_post(dish_id)
            .await?
            .ok_or_else(|| PotluckError::not_found(Entity::Dish, dish_id))?;
        if dish.kind != PostKind::Dish {
            return Err(PotluckError::Validation(format!(
                "post {dish_id} is a {} post, not a dish",
                dish.kind
            )));
        }
        if dish.author_id != actor {
            return Err(PotluckError::PermissionDenied(
                "you can only link a dish you posted".to_owned(),
            ));
        }
        if !self
            .store
            .can_add_dish_to_meal(dish_id, slot.meal.id, actor)
            .await?
        {
            return Err(PotluckError::PermissionDenied(
                "this dish cannot be added to this meal".to_owned(),
            ));
        }

        match self.store.complete_plan_item(item_id, actor, dish_id).await? {
            Some(item) => {
                tracing::info!(item_id = %item_id, actor = %actor, dish_id = %dish_id, "slot completed");
                Ok(item)
            }
            None => Err(self.lost_race(item_id, actor, "completed").await),
        }
    }

    /// Delete an open slot.
    pub async fn remove_item(&self, item_id: Uuid, actor: Uuid) -> Result<()> {
        let slot = self.load(item_id, actor).await?;
        permission::can_delete_item(slot.membership.as_ref(), &slot.meal, &slot.item)?;

        if self.store.delete_plan_item(item_id).await? == 0 {
            return Err(self.lost_race(item_id, actor, "removed").await);
        }
        tracing::info!(item_id = %item_id, actor = %actor, "slot removed");
        Ok(())
    }

    // -- reads -------------------------------------------------------------

    async fn require_member(&self, meal_id: Uuid, actor: Uuid) -> Result<()> {
        let store = self.store.as_ref();
        lookup::meal(store, meal_id).await?;
        let membership = lookup::membership(store, meal_id, actor).await?;
        permission::can_view(membership.as_ref())?;
        Ok(())
    }

    pub async fn list(&self, meal_id: Uuid, actor: Uuid) -> Result<Vec<PlanItem>> {
        self.require_member(meal_id, actor).await?;
        Ok(self.store.list_plan_items(meal_id).await?)
    }

    /// Completed slots with their dishes, in serving order.
    pub async fn dishes(&self, meal_id: Uuid, actor: Uuid) -> Result<Vec<MealDish>> {
        self.require_member(meal_id, actor).await?;
        Ok(self.store.list_meal_dishes(meal_id).await?)
    }

    pub async fn progress(&self, meal_id: Uuid, actor: Uuid) -> Result<Progress> {
        let items = self.list(meal_id, actor).await?;
        Ok(Progress::tally(&items))
    }
}
