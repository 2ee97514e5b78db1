//! Dispatch gateway backed by the `dispatch_queue` table.
//!
//! `enqueue` writes one row and returns; workers pick rows up with
//! [`DispatchQueueRepo::claim_next`].

use async_trait::async_trait;
use sqlx::PgPool;
use testrun_core::dispatch::{DispatchError, DispatchGateway};
use testrun_core::types::DbId;

use crate::repositories::DispatchQueueRepo;

#[derive(Clone)]
pub struct PgDispatchQueue {
    pool: PgPool,
}

impl PgDispatchQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DispatchGateway for PgDispatchQueue {
    async fn enqueue(&self, run_request_id: DbId) -> Result<(), DispatchError> {
        match DispatchQueueRepo::enqueue(&self.pool, run_request_id).await {
            Ok(command) => {
                tracing::debug!(
                    command_id = command.id,
                    run_request_id,
                    "Dispatch command enqueued",
                );
                Ok(())
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_foreign_key_violation() => {
                Err(DispatchError::Rejected {
                    run_request_id,
                    reason: "run request does not exist".into(),
                })
            }
            Err(e) => Err(DispatchError::Unavailable(e.to_string())),
        }
    }
}
