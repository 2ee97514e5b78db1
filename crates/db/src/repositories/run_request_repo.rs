//! Repository for `run_requests` and its ordered `run_request_artifacts`
//! junction.
//!
//! Reads always join the environment name and aggregate the artifact ids
//! in `position` order into a single `path` array.

use sqlx::PgPool;
use testrun_core::run_request::NewRunRequest;
use testrun_core::status::{RunStatus, StatusId};
use testrun_core::types::DbId;

use crate::models::run_request::RunRequestRow;

/// Select list over `run_requests r JOIN environments e`.
const COLUMNS: &str = "r.id, r.requested_by, r.env_id, e.name AS env_name, r.status_id, \
     ARRAY(SELECT ra.artifact_id FROM run_request_artifacts ra \
           WHERE ra.run_request_id = r.id ORDER BY ra.position) AS path, \
     r.logs, r.created_at";

pub struct RunRequestRepo;

impl RunRequestRepo {
    /// Insert a `CREATED` run request and its artifact links in one
    /// transaction. Artifact order is preserved through `position`.
    pub async fn create(pool: &PgPool, input: &NewRunRequest) -> Result<RunRequestRow, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let id: DbId = sqlx::query_scalar(
            "INSERT INTO run_requests (requested_by, env_id, status_id) \
             VALUES ($1, $2, $3) \
             RETURNING id",
        )
        .bind(&input.requested_by)
        .bind(input.env_id)
        .bind(RunStatus::Created.id())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO run_request_artifacts (run_request_id, artifact_id, position) \
             SELECT $1, t.artifact_id, t.ord::int \
             FROM UNNEST($2::bigint[]) WITH ORDINALITY AS t(artifact_id, ord)",
        )
        .bind(id)
        .bind(&input.artifact_ids)
        .execute(&mut *tx)
        .await?;

        let query = format!(
            "SELECT {COLUMNS} FROM run_requests r \
             JOIN environments e ON e.id = r.env_id \
             WHERE r.id = $1"
        );
        let row = sqlx::query_as::<_, RunRequestRow>(&query)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row)
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<RunRequestRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM run_requests r \
             JOIN environments e ON e.id = r.env_id \
             WHERE r.id = $1"
        );
        sqlx::query_as::<_, RunRequestRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List run requests, newest first.
    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<RunRequestRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM run_requests r \
             JOIN environments e ON e.id = r.env_id \
             ORDER BY r.created_at DESC, r.id DESC \
             LIMIT $1 OFFSET $2"
        );
        sqlx::query_as::<_, RunRequestRow>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Move `id` from `expected` to `next` only if the stored status still
    /// equals `expected`. `logs` replaces the stored logs when given.
    ///
    /// Returns `None` when the row is missing or its status has moved on.
    pub async fn compare_and_set_status(
        pool: &PgPool,
        id: DbId,
        expected: StatusId,
        next: StatusId,
        logs: Option<&str>,
    ) -> Result<Option<RunRequestRow>, sqlx::Error> {
        let query = format!(
            "WITH r AS ( \
                 UPDATE run_requests \
                 SET status_id = $3, logs = COALESCE($4, logs), updated_at = NOW() \
                 WHERE id = $1 AND status_id = $2 \
                 RETURNING * \
             ) \
             SELECT {COLUMNS} FROM r \
             JOIN environments e ON e.id = r.env_id"
        );
        sqlx::query_as::<_, RunRequestRow>(&query)
            .bind(id)
            .bind(expected)
            .bind(next)
            .bind(logs)
            .fetch_optional(pool)
            .await
    }
}
