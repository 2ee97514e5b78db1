//! Repository for the `dispatch_queue` table.

use sqlx::PgPool;
use testrun_core::types::DbId;

use crate::models::dispatch::DispatchCommand;

/// Column list for `dispatch_queue` queries.
const COLUMNS: &str =
    "id, run_request_id, enqueued_at, claimed_at, claimed_by, completed_at";

pub struct DispatchQueueRepo;

impl DispatchQueueRepo {
    /// Append a dispatch command for `run_request_id`.
    pub async fn enqueue(pool: &PgPool, run_request_id: DbId) -> Result<DispatchCommand, sqlx::Error> {
        let query = format!(
            "INSERT INTO dispatch_queue (run_request_id) VALUES ($1) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DispatchCommand>(&query)
            .bind(run_request_id)
            .fetch_one(pool)
            .await
    }

    /// Atomically claim the oldest unclaimed command for `worker_name`.
    ///
    /// Uses `FOR UPDATE SKIP LOCKED` so concurrent workers never claim the
    /// same command.
    pub async fn claim_next(
        pool: &PgPool,
        worker_name: &str,
    ) -> Result<Option<DispatchCommand>, sqlx::Error> {
        let query = format!(
            "UPDATE dispatch_queue \
             SET claimed_at = NOW(), claimed_by = $1 \
             WHERE id = ( \
                 SELECT id FROM dispatch_queue \
                 WHERE claimed_at IS NULL \
                 ORDER BY enqueued_at ASC, id ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DispatchCommand>(&query)
            .bind(worker_name)
            .fetch_optional(pool)
            .await
    }

    /// Mark a claimed command as finished.
    pub async fn complete(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE dispatch_queue SET completed_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Number of commands not yet claimed.
    pub async fn pending_count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM dispatch_queue WHERE claimed_at IS NULL")
            .fetch_one(pool)
            .await
    }
}
