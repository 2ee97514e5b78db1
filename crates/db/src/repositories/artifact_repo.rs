//! Repository for the `artifacts` table.
//!
//! `path` carries the `uq_artifacts_path` constraint; a duplicate insert
//! fails with a unique violation that the store maps to a conflict.

use sqlx::PgPool;
use testrun_core::types::DbId;

use crate::models::artifact::ArtifactRow;

/// Column list for `artifacts` queries.
const COLUMNS: &str = "id, path, created_at";

/// Provides read and insert operations for artifacts. There is no
/// update or delete.
pub struct ArtifactRepo;

impl ArtifactRepo {
    /// Insert a new artifact, returning the created row.
    pub async fn create(pool: &PgPool, path: &str) -> Result<ArtifactRow, sqlx::Error> {
        let query = format!("INSERT INTO artifacts (path) VALUES ($1) RETURNING {COLUMNS}");
        sqlx::query_as::<_, ArtifactRow>(&query)
            .bind(path)
            .fetch_one(pool)
            .await
    }

    /// Find an artifact by exact logical path.
    pub async fn find_by_path(pool: &PgPool, path: &str) -> Result<Option<ArtifactRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM artifacts WHERE path = $1");
        sqlx::query_as::<_, ArtifactRow>(&query)
            .bind(path)
            .fetch_optional(pool)
            .await
    }

    /// Find every artifact whose id is in `ids`.
    pub async fn find_by_ids(pool: &PgPool, ids: &[DbId]) -> Result<Vec<ArtifactRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM artifacts WHERE id = ANY($1) ORDER BY id");
        sqlx::query_as::<_, ArtifactRow>(&query)
            .bind(ids)
            .fetch_all(pool)
            .await
    }

    /// List artifacts ordered by id.
    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<ArtifactRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM artifacts ORDER BY id LIMIT $1 OFFSET $2");
        sqlx::query_as::<_, ArtifactRow>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}
