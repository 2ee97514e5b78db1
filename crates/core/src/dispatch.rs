//! Dispatch gateway: the seam between admission and execution.
//!
//! A gateway only relays a run-request id to the executor side and
//! returns. It holds no run state of its own; the executor reports back
//! through [`RunLifecycle::update`](crate::run_request::RunLifecycle::update).

use async_trait::async_trait;

use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Dispatch queue unavailable: {0}")]
    Unavailable(String),

    #[error("Dispatch rejected for run request {run_request_id}: {reason}")]
    Rejected { run_request_id: DbId, reason: String },
}

#[async_trait]
pub trait DispatchGateway: Send + Sync {
    /// Hand `run_request_id` to the executor. Must not wait for the run
    /// to start or finish.
    async fn enqueue(&self, run_request_id: DbId) -> Result<(), DispatchError>;
}
