//! Explicit slot state recomputed from a `plan_items` row.
//!
//! The row stores nullable columns; [`SlotState`] is the only place those
//! columns are interpreted, and it refuses combinations the schema forbids
//! (a recipe or dish without a claimer).

use thiserror::Error;
use uuid::Uuid;

use potluck_db::models::{PlanItem, PlanItemStatus};

/// The state of a dish slot, carrying the data each state implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Unclaimed,
    Assigned {
        to: Uuid,
    },
    Claimed {
        by: Uuid,
        assigned_to: Option<Uuid>,
    },
    HasRecipe {
        by: Uuid,
        recipe: Uuid,
        assigned_to: Option<Uuid>,
    },
    Completed {
        by: Uuid,
        dish: Uuid,
        recipe: Option<Uuid>,
    },
}

/// A row whose columns do not describe any legal slot state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InconsistentSlot {
    #[error("plan item {0} has a recipe but no claimer")]
    RecipeWithoutClaim(Uuid),
    #[error("plan item {0} has a dish but no claimer")]
    DishWithoutClaim(Uuid),
}

impl TryFrom<&PlanItem> for SlotState {
    type Error = InconsistentSlot;

    fn try_from(item: &PlanItem) -> Result<Self, Self::Error> {
        match (item.claimed_by, item.dish_id, item.recipe_id) {
            (Some(by), Some(dish), recipe) => Ok(Self::Completed { by, dish, recipe }),
            (None, Some(_), _) => Err(InconsistentSlot::DishWithoutClaim(item.id)),
            (Some(by), None, Some(recipe)) => Ok(Self::HasRecipe {
                by,
                recipe,
                assigned_to: item.assigned_to,
            }),
            (None, None, Some(_)) => Err(InconsistentSlot::RecipeWithoutClaim(item.id)),
            (Some(by), None, None) => Ok(Self::Claimed {
                by,
                assigned_to: item.assigned_to,
            }),
            (None, None, None) => Ok(match item.assigned_to {
                Some(to) => Self::Assigned { to },
                None => Self::Unclaimed,
            }),
        }
    }
}

impl SlotState {
    pub fn status(&self) -> PlanItemStatus {
        match self {
            Self::Unclaimed => PlanItemStatus::Unclaimed,
            Self::Assigned { .. } => PlanItemStatus::Assigned,
            Self::Claimed { .. } => PlanItemStatus::Claimed,
            Self::HasRecipe { .. } => PlanItemStatus::HasRecipe,
            Self::Completed { .. } => PlanItemStatus::Completed,
        }
    }

    pub fn claimer(&self) -> Option<Uuid> {
        match self {
            Self::Claimed { by, .. } | Self::HasRecipe { by, .. } | Self::Completed { by, .. } => {
                Some(*by)
            }
            Self::Unclaimed | Self::Assigned { .. } => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Whether `from -> to` is an edge of the slot state graph:
///
/// ```text
/// unclaimed  -> assigned                  (assign)
/// assigned   -> unclaimed | assigned      (unassign, reassign)
/// unclaimed  -> claimed | has_recipe      (claim, volunteer)
/// assigned   -> claimed | has_recipe      (claim, volunteer)
/// claimed    -> has_recipe                (attach recipe)
/// has_recipe -> has_recipe                (change recipe)
/// claimed    -> unclaimed | assigned      (release)
/// has_recipe -> unclaimed | assigned      (release)
/// claimed    -> completed                 (link dish)
/// has_recipe -> completed                 (link dish)
/// ```
///
/// `completed` has no outgoing edges. Release lands on `assigned` when the
/// slot still carries an assignment.
pub fn is_valid_transition(from: PlanItemStatus, to: PlanItemStatus) -> bool {
    use PlanItemStatus::*;
    matches!(
        (from, to),
        (Unclaimed, Assigned)
            | (Assigned, Unclaimed)
            | (Assigned, Assigned)
            | (Unclaimed | Assigned, Claimed | HasRecipe)
            | (Claimed | HasRecipe, HasRecipe)
            | (Claimed | HasRecipe, Unclaimed | Assigned)
            | (Claimed | HasRecipe, Completed)
    )
}
