//! PostgreSQL persistence for the test run service.
//!
//! - [`models`]: `FromRow` row structs and their conversions into the
//!   domain types of `testrun_core`.
//! - [`repositories`]: zero-sized structs with async query methods that
//!   take `&PgPool` as the first argument.
//! - [`store::PgStore`]: the `testrun_core::store` traits over the
//!   repositories.
//! - [`dispatch::PgDispatchQueue`]: the dispatch gateway backed by the
//!   `dispatch_queue` table.

use sqlx::postgres::PgPoolOptions;

pub mod dispatch;
pub mod models;
pub mod repositories;
pub mod store;

pub use dispatch::PgDispatchQueue;
pub use store::PgStore;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to confirm the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await?;
    Ok(())
}

/// Apply pending migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}
