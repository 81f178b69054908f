//! PostgreSQL harness for potluck integration tests.
//!
//! One server per test binary, one freshly migrated database per test.
//!
//! - **`POTLUCK_TEST_PG_URL`** set: use that server (e.g. a CI service
//!   container). The URL must point at the server root, without a
//!   database name.
//! - Otherwise: start a `postgres` container through testcontainers on
//!   first use and keep it for the lifetime of the binary.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use testcontainers::ContainerAsync;
use testcontainers::ImageExt;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

use potluck_db::pool;

pub const PG_URL_ENV: &str = "POTLUCK_TEST_PG_URL";

struct Server {
    base_url: String,
    _container: Option<ContainerAsync<Postgres>>,
}

static SERVER: OnceCell<Server> = OnceCell::const_new();

async fn start_server() -> Server {
    if let Ok(url) = std::env::var(PG_URL_ENV) {
        return Server {
            base_url: url.trim_end_matches('/').to_owned(),
            _container: None,
        };
    }

    let container = Postgres::default()
        .with_tag("17")
        .start()
        .await
        .expect("failed to start PostgreSQL container");
    let host = container.get_host().await.expect("container host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("container port");

    Server {
        base_url: format!("postgresql://postgres:postgres@{host}:{port}"),
        _container: Some(container),
    }
}

/// Server root URL, starting the container on first call.
pub async fn server_url() -> &'static str {
    &SERVER.get_or_init(start_server).await.base_url
}

async fn maintenance_pool() -> PgPool {
    let url = format!("{}/postgres", server_url().await);
    PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&url)
        .await
        .expect("failed to connect to maintenance database")
}

/// A migrated database private to one test.
pub struct TestDb {
    pub pool: PgPool,
    pub name: String,
}

impl TestDb {
    /// Create `potluck_test_<uuid>` and run all migrations in it.
    pub async fn create() -> Self {
        let name = format!("potluck_test_{}", Uuid::new_v4().simple());
        let maint = maintenance_pool().await;
        maint
            .execute(format!("CREATE DATABASE {name}").as_str())
            .await
            .unwrap_or_else(|e| panic!("failed to create {name}: {e}"));
        maint.close().await;

        let url = format!("{}/{name}", server_url().await);
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&url)
            .await
            .unwrap_or_else(|e| panic!("failed to connect to {name}: {e}"));
        pool::run_migrations(&pool)
            .await
            .expect("migrations should apply to a fresh database");

        Self { pool, name }
    }

    /// Close the pool and drop the database. Tolerates an already-dropped
    /// database.
    pub async fn teardown(self) {
        self.pool.close().await;
        let maint = maintenance_pool().await;
        let terminate = format!(
            "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
             WHERE datname = '{}' AND pid <> pg_backend_pid()",
            self.name
        );
        let _ = maint.execute(terminate.as_str()).await;
        let _ = maint
            .execute(format!("DROP DATABASE IF EXISTS {}", self.name).as_str())
            .await;
        maint.close().await;
    }
}

/// Insert a profile row so participant listings have a display name.
pub async fn seed_profile(pool: &PgPool, display_name: &str) -> Uuid {
    potluck_db::queries::posts::upsert_profile(pool, Uuid::new_v4(), display_name)
        .await
        .expect("profile insert")
        .id
}
