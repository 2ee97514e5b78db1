//! Source of dispatch commands.

use async_trait::async_trait;
use sqlx::PgPool;
use testrun_core::types::DbId;
use testrun_db::repositories::DispatchQueueRepo;

/// A claimed command: only the run-request id travels with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimedCommand {
    pub id: DbId,
    pub run_request_id: DbId,
}

#[async_trait]
pub trait CommandSource: Send + Sync {
    /// Claim the next command for `worker_name`. Two workers never
    /// receive the same command.
    async fn claim_next(&self, worker_name: &str) -> Result<Option<ClaimedCommand>, sqlx::Error>;

    /// Mark a claimed command as finished.
    async fn complete(&self, command_id: DbId) -> Result<(), sqlx::Error>;
}

/// Commands from the `dispatch_queue` table.
pub struct PgCommandSource {
    pool: PgPool,
}

impl PgCommandSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommandSource for PgCommandSource {
    async fn claim_next(&self, worker_name: &str) -> Result<Option<ClaimedCommand>, sqlx::Error> {
        let claimed = DispatchQueueRepo::claim_next(&self.pool, worker_name).await?;
        Ok(claimed.map(|c| ClaimedCommand {
            id: c.id,
            run_request_id: c.run_request_id,
        }))
    }

    async fn complete(&self, command_id: DbId) -> Result<(), sqlx::Error> {
        DispatchQueueRepo::complete(&self.pool, command_id).await
    }
}
