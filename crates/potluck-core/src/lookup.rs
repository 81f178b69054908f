//! Row loaders shared by the engine components. Missing rows become
//! [`PotluckError::NotFound`].

use uuid::Uuid;

use potluck_db::models::{Meal, Participant, PlanItem};

use crate::error::{Entity, PotluckError, Result};
use crate::store::MealStore;

pub(crate) async fn meal(store: &dyn MealStore, meal_id: Uuid) -> Result<Meal> {
    store
        .get_meal(meal_id)
        .await?
        .ok_or_else(|| PotluckError::not_found(Entity::Meal, meal_id))
}

pub(crate) async fn plan_item(store: &dyn MealStore, item_id: Uuid) -> Result<PlanItem> {
    store
        .get_plan_item(item_id)
        .await?
        .ok_or_else(|| PotluckError::not_found(Entity::PlanItem, item_id))
}

/// The user's own membership row, if any.
pub(crate) async fn membership(
    store: &dyn MealStore,
    meal_id: Uuid,
    user_id: Uuid,
) -> Result<Option<Participant>> {
    Ok(store.get_participant(meal_id, user_id).await?)
}

pub(crate) async fn participant(
    store: &dyn MealStore,
    meal_id: Uuid,
    user_id: Uuid,
) -> Result<Participant> {
    membership(store, meal_id, user_id)
        .await?
        .ok_or_else(|| PotluckError::not_found(Entity::Participant, user_id))
}
