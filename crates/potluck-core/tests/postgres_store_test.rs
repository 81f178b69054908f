//! The engine over `PgStore`.
//!
//! Needs a PostgreSQL server: either `POTLUCK_TEST_PG_URL` or a container
//! runtime for testcontainers.

use std::sync::Arc;

use chrono::{Duration, Utc};
use futures::future::join_all;
use uuid::Uuid;

use potluck_core::{Engine, ErrorKind, MealStore, PgStore, feed};
use potluck_db::models::{Course, NewMeal, NewPlanItem, PlanItemStatus, RsvpStatus};
use potluck_test_utils::{TestDb, seed_profile};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

struct PgTable {
    db: TestDb,
    engine: Arc<Engine>,
    host: Uuid,
    meal_id: Uuid,
}

impl PgTable {
    async fn new() -> Self {
        let db = TestDb::create().await;
        let store: Arc<dyn MealStore> = Arc::new(PgStore::new(db.pool.clone()));
        let engine = Arc::new(Engine::new(store));
        let host = seed_profile(&db.pool, "Host").await;
        let meal = engine
            .meals
            .create(
                host,
                NewMeal {
                    title: "Sunday Dinner".to_owned(),
                    description: None,
                    location: None,
                    scheduled_at: Utc::now() + Duration::days(2),
                },
            )
            .await
            .expect("meal should be created");
        Self {
            db,
            engine,
            host,
            meal_id: meal.id,
        }
    }

    async fn guest(&self, name: &str) -> Uuid {
        let user = seed_profile(&self.db.pool, name).await;
        self.engine
            .participants
            .invite(self.meal_id, self.host, &[user])
            .await
            .expect("invite");
        self.engine
            .participants
            .respond(self.meal_id, user, RsvpStatus::Accepted)
            .await
            .expect("accept");
        user
    }

    async fn slot(&self, course: Course) -> Uuid {
        self.engine
            .items
            .add_item(self.meal_id, self.host, NewPlanItem::course(course))
            .await
            .expect("add slot")
            .id
    }

    async fn teardown(self) {
        drop(self.engine);
        self.db.teardown().await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn claim_conflict_on_postgres() {
    let table = PgTable::new().await;
    let guest_a = table.guest("Ada").await;
    let guest_b = table.guest("Bo").await;
    let slot = table.slot(Course::Main).await;

    let claimed = table.engine.items.claim(slot, guest_a).await.unwrap();
    assert_eq!(claimed.status(), PlanItemStatus::Claimed);
    let err = table.engine.items.claim(slot, guest_b).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    table.teardown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_claims_on_postgres_have_one_winner() {
    let table = PgTable::new().await;
    let slot = table.slot(Course::Dessert).await;
    let mut guests = Vec::new();
    for i in 0..6 {
        guests.push(table.guest(&format!("Guest {i}")).await);
    }

    let attempts = guests.iter().map(|&guest| {
        let engine = Arc::clone(&table.engine);
        tokio::spawn(async move { engine.items.claim(slot, guest).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.expect("task should not panic"))
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(err.kind(), ErrorKind::Conflict, "{err}");
    }

    table.teardown().await;
}

#[tokio::test]
async fn release_clears_recipe_on_postgres() {
    let table = PgTable::new().await;
    let guest = table.guest("Ada").await;
    let slot = table.slot(Course::Side).await;
    let store = table.engine.store();
    let recipe = store.insert_recipe(guest, "Slaw").await.unwrap();

    table
        .engine
        .items
        .volunteer(slot, guest, recipe.id)
        .await
        .unwrap();
    let released = table.engine.items.unclaim(slot, table.host).await.unwrap();
    assert_eq!(released.recipe_id, None);
    assert_eq!(released.claimed_by, None);

    table.teardown().await;
}

#[tokio::test]
async fn complete_and_delete_on_postgres() {
    let table = PgTable::new().await;
    let guest = table.guest("Ada").await;
    let pending = seed_profile(&table.db.pool, "Late").await;
    table
        .engine
        .participants
        .invite(table.meal_id, table.host, &[pending])
        .await
        .unwrap();

    let slot = table.slot(Course::Main).await;
    table.engine.items.claim(slot, guest).await.unwrap();
    let store = table.engine.store();
    let dish = store.insert_dish_post(guest, None, Some("lasagna")).await.unwrap();
    table
        .engine
        .items
        .complete(slot, guest, dish.id)
        .await
        .unwrap();

    let completion = table
        .engine
        .meals
        .complete(table.meal_id, table.host)
        .await
        .unwrap();
    assert_eq!(completion.discarded_invitations, 1);
    let again = table
        .engine
        .meals
        .complete(table.meal_id, table.host)
        .await
        .unwrap();
    assert_eq!(again.post.id, completion.post.id);
    assert_eq!(again.discarded_invitations, 0);

    let units = feed::assemble(store, 20).await.unwrap();
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].members().len(), 2);

    let dishes = table
        .engine
        .items
        .dishes(table.meal_id, guest)
        .await
        .unwrap();
    assert_eq!(dishes.len(), 1);
    assert_eq!(dishes[0].dish_id, dish.id);

    let deletion = table
        .engine
        .meals
        .delete(table.meal_id, table.host)
        .await
        .unwrap();
    assert_eq!(deletion.detached_dishes, vec![dish.id]);
    let survivor = store.get_post(dish.id).await.unwrap().expect("dish survives");
    assert_eq!(survivor.meal_id, None);
    assert!(store.get_post(completion.post.id).await.unwrap().is_none());

    table.teardown().await;
}

#[tokio::test]
async fn host_transfer_on_postgres() {
    let table = PgTable::new().await;
    let pending = seed_profile(&table.db.pool, "Bo").await;
    let participants = &table.engine.participants;
    participants
        .invite(table.meal_id, table.host, &[pending])
        .await
        .unwrap();

    let result = participants
        .transfer_host(table.meal_id, table.host, pending)
        .await;
    assert_eq!(result.unwrap_err().kind(), ErrorKind::PermissionDenied);

    participants
        .respond(table.meal_id, pending, RsvpStatus::Accepted)
        .await
        .unwrap();
    participants
        .transfer_host(table.meal_id, table.host, pending)
        .await
        .unwrap();

    let roster = participants.roster(table.meal_id, table.host).await.unwrap();
    assert_eq!(roster[0].user_id, pending);
    assert_eq!(roster[0].display_name, "Bo");

    let declined = participants
        .respond(table.meal_id, pending, RsvpStatus::Declined)
        .await;
    assert_eq!(declined.unwrap_err().kind(), ErrorKind::InvalidState);

    table.teardown().await;
}
