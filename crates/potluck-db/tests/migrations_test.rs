//! Integration tests for the embedded migrations and pool helpers.
//!
//! Each test gets its own freshly migrated database from
//! `potluck_test_utils::TestDb`, so tests are isolated and idempotent.

use sqlx::Row;
use uuid::Uuid;

use potluck_db::config::DbConfig;
use potluck_db::pool;
use potluck_test_utils::{TestDb, server_url};

/// Tables created by the initial migration, alphabetically.
const EXPECTED_TABLES: &[&str] = &[
    "meal_participants",
    "meal_photos",
    "meals",
    "plan_items",
    "post_relationships",
    "posts",
    "profiles",
    "recipes",
];

const EXPECTED_FUNCTIONS: &[&str] = &[
    "can_add_dish_to_meal",
    "get_meal_dishes",
    "get_meal_participants",
];

#[tokio::test]
async fn migrations_create_all_tables() {
    let db = TestDb::create().await;

    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT tablename::text FROM pg_tables \
         WHERE schemaname = 'public' AND tablename NOT LIKE '\\_sqlx%' \
         ORDER BY tablename",
    )
    .fetch_all(&db.pool)
    .await
    .expect("should list tables");

    let tables: Vec<&str> = rows.iter().map(|(name,)| name.as_str()).collect();
    assert_eq!(tables, EXPECTED_TABLES);

    db.teardown().await;
}

#[tokio::test]
async fn migrations_create_server_functions() {
    let db = TestDb::create().await;

    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT p.proname::text FROM pg_proc p \
         JOIN pg_namespace n ON n.oid = p.pronamespace \
         WHERE n.nspname = 'public' \
         ORDER BY p.proname",
    )
    .fetch_all(&db.pool)
    .await
    .expect("should list functions");

    let functions: Vec<&str> = rows.iter().map(|(name,)| name.as_str()).collect();
    assert_eq!(functions, EXPECTED_FUNCTIONS);

    db.teardown().await;
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let db = TestDb::create().await;

    // TestDb already ran them once.
    pool::run_migrations(&db.pool)
        .await
        .expect("second migration run should be a no-op");

    for table in EXPECTED_TABLES {
        let row = sqlx::query(&format!("SELECT COUNT(*) AS cnt FROM {table}"))
            .fetch_one(&db.pool)
            .await
            .unwrap_or_else(|e| panic!("failed to count {table}: {e}"));
        let count: i64 = row.get("cnt");
        assert_eq!(count, 0, "table {table} should be empty after migrations");
    }

    db.teardown().await;
}

#[tokio::test]
async fn table_counts_covers_every_table() {
    let db = TestDb::create().await;

    let counts = pool::table_counts(&db.pool)
        .await
        .expect("table_counts should succeed");

    assert_eq!(counts.len(), EXPECTED_TABLES.len());
    for (name, count) in &counts {
        assert!(EXPECTED_TABLES.contains(&name.as_str()), "unexpected {name}");
        assert_eq!(*count, 0, "table {name} should be empty");
    }

    db.teardown().await;
}

#[tokio::test]
async fn check_constraints_reject_bad_rows() {
    let db = TestDb::create().await;

    let blank = sqlx::query(
        "INSERT INTO meals (title, scheduled_at, created_by) VALUES ('  ', now(), $1)",
    )
    .bind(Uuid::new_v4())
    .execute(&db.pool)
    .await;
    assert!(blank.is_err(), "blank meal titles are rejected");

    let meal_id: Uuid = sqlx::query_scalar(
        "INSERT INTO meals (title, scheduled_at, created_by) VALUES ('Supper', now(), $1) \
         RETURNING id",
    )
    .bind(Uuid::new_v4())
    .fetch_one(&db.pool)
    .await
    .expect("valid meal");

    let recipe_id: Uuid = sqlx::query_scalar(
        "INSERT INTO recipes (owner_id, title) VALUES ($1, 'Stew') RETURNING id",
    )
    .bind(Uuid::new_v4())
    .fetch_one(&db.pool)
    .await
    .expect("valid recipe");

    let recipe_without_claim = sqlx::query(
        "INSERT INTO plan_items (meal_id, course, recipe_id, created_by) \
         VALUES ($1, 'main', $2, $3)",
    )
    .bind(meal_id)
    .bind(recipe_id)
    .bind(Uuid::new_v4())
    .execute(&db.pool)
    .await;
    assert!(recipe_without_claim.is_err(), "a recipe needs a claimer");

    let bad_course = sqlx::query(
        "INSERT INTO plan_items (meal_id, course, created_by) VALUES ($1, 'brunch', $2)",
    )
    .bind(meal_id)
    .bind(Uuid::new_v4())
    .execute(&db.pool)
    .await;
    assert!(bad_course.is_err(), "unknown courses are rejected");

    db.teardown().await;
}

#[tokio::test]
async fn ensure_database_exists_is_idempotent() {
    let db_name = format!("potluck_test_{}", Uuid::new_v4().simple());
    let config = DbConfig::new(format!("{}/{db_name}", server_url().await));

    pool::ensure_database_exists(&config)
        .await
        .expect("first ensure should create the database");
    pool::ensure_database_exists(&config)
        .await
        .expect("second ensure should be a no-op");

    let created = pool::create_pool(&config)
        .await
        .expect("should connect to the new database");
    pool::run_migrations(&created)
        .await
        .expect("migrations should apply");
    created.close().await;

    // Reuse TestDb's teardown for the drop.
    let db = TestDb {
        pool: pool::create_pool(&config).await.expect("reconnect"),
        name: db_name,
    };
    db.teardown().await;
}
