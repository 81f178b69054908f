//! Fixture shared by the engine tests: an in-memory store, an engine over
//! it, and a meal hosted by a fresh user.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use potluck_core::{Engine, ErrorKind, MealStore, MemoryStore, PotluckError};
use potluck_db::models::{Course, Meal, NewMeal, NewPlanItem, PlanItem, RsvpStatus};

pub struct Table {
    pub store: Arc<MemoryStore>,
    pub engine: Engine,
    pub host: Uuid,
    pub meal: Meal,
}

pub fn new_meal(title: &str) -> NewMeal {
    NewMeal {
        title: title.to_owned(),
        description: None,
        location: Some("Backyard".to_owned()),
        scheduled_at: Utc::now() + Duration::days(3),
    }
}

pub fn engine() -> (Arc<MemoryStore>, Engine) {
    let store = Arc::new(MemoryStore::new());
    let shared: Arc<dyn MealStore> = store.clone();
    (store, Engine::new(shared))
}

impl Table {
    /// "Sunday Dinner", hosted by a new user, in `planning`.
    pub async fn new() -> Self {
        let (store, engine) = engine();
        let host = Uuid::new_v4();
        let meal = engine
            .meals
            .create(host, new_meal("Sunday Dinner"))
            .await
            .expect("meal should be created");
        Self {
            store,
            engine,
            host,
            meal,
        }
    }

    /// Invite a new user and leave the invitation pending.
    pub async fn invited(&self) -> Uuid {
        let user = Uuid::new_v4();
        let invited = self
            .engine
            .participants
            .invite(self.meal.id, self.host, &[user])
            .await
            .expect("invite should succeed");
        assert_eq!(invited.len(), 1);
        user
    }

    /// Invite a new user who accepts.
    pub async fn guest(&self) -> Uuid {
        let user = self.invited().await;
        self.engine
            .participants
            .respond(self.meal.id, user, RsvpStatus::Accepted)
            .await
            .expect("accept should succeed");
        user
    }

    pub async fn slot(&self, course: Course) -> PlanItem {
        self.engine
            .items
            .add_item(self.meal.id, self.host, NewPlanItem::course(course))
            .await
            .expect("host should add a slot")
    }

    pub async fn item(&self, id: Uuid) -> PlanItem {
        self.store
            .get_plan_item(id)
            .await
            .expect("store read")
            .expect("slot should exist")
    }

    pub async fn recipe(&self, owner: Uuid, title: &str) -> Uuid {
        self.store
            .insert_recipe(owner, title)
            .await
            .expect("recipe insert")
            .id
    }

    pub async fn dish(&self, author: Uuid) -> Uuid {
        self.store
            .insert_dish_post(author, None, Some("fresh out of the oven"))
            .await
            .expect("dish insert")
            .id
    }

    /// Claim `course` as `user` and link a new dish.
    pub async fn cooked(&self, user: Uuid, course: Course) -> (PlanItem, Uuid) {
        let slot = self.slot(course).await;
        self.engine
            .items
            .claim(slot.id, user)
            .await
            .expect("claim should succeed");
        let dish = self.dish(user).await;
        let item = self
            .engine
            .items
            .complete(slot.id, user, dish)
            .await
            .expect("complete should succeed");
        (item, dish)
    }
}

pub fn kind<T: std::fmt::Debug>(result: Result<T, PotluckError>) -> ErrorKind {
    result.expect_err("operation should fail").kind()
}
