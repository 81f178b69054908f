//! Coordination engine for shared meal planning.
//!
//! A host creates a meal, invites guests, and splits the meal into dish
//! slots that move through `unclaimed -> assigned -> claimed -> has_recipe
//! -> completed`. Every component works against an injected [`MealStore`].

pub mod error;
pub mod feed;
pub mod grouping;
mod lookup;
pub mod meal;
pub mod menu;
pub mod participant;
pub mod permission;
pub mod plan_item;
pub mod store;

use std::sync::Arc;

pub use error::{Entity, ErrorKind, PotluckError, Result};
pub use meal::MealLifecycle;
pub use participant::{ParticipantCoordinator, RsvpChange};
pub use plan_item::PlanItemStateMachine;
pub use store::{MealStore, MemoryStore, PgStore};

/// All engine components wired to one store.
pub struct Engine {
    pub meals: MealLifecycle,
    pub participants: ParticipantCoordinator,
    pub items: PlanItemStateMachine,
    store: Arc<dyn MealStore>,
}

impl Engine {
    pub fn new(store: Arc<dyn MealStore>) -> Self {
        Self {
            meals: MealLifecycle::new(Arc::clone(&store)),
            participants: ParticipantCoordinator::new(Arc::clone(&store)),
            items: PlanItemStateMachine::new(Arc::clone(&store)),
            store,
        }
    }

    pub fn store(&self) -> &dyn MealStore {
        self.store.as_ref()
    }
}
