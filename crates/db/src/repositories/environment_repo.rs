//! Repository for the `environments` table.

use sqlx::PgPool;
use testrun_core::types::DbId;

use crate::models::environment::EnvironmentRow;

/// Column list for `environments` queries.
const COLUMNS: &str = "id, name, created_at";

pub struct EnvironmentRepo;

impl EnvironmentRepo {
    /// Insert an environment. Only the administrative seeding path and
    /// tests call this; the service itself treats environments as read-only.
    pub async fn create(pool: &PgPool, name: &str) -> Result<EnvironmentRow, sqlx::Error> {
        let query = format!("INSERT INTO environments (name) VALUES ($1) RETURNING {COLUMNS}");
        sqlx::query_as::<_, EnvironmentRow>(&query)
            .bind(name)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<EnvironmentRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM environments WHERE id = $1");
        sqlx::query_as::<_, EnvironmentRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all environments ordered by name.
    pub async fn list(pool: &PgPool) -> Result<Vec<EnvironmentRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM environments ORDER BY name");
        sqlx::query_as::<_, EnvironmentRow>(&query).fetch_all(pool).await
    }
}
