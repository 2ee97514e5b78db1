//! Rows of the `dispatch_queue` table.

use serde::Serialize;
use sqlx::FromRow;
use testrun_core::types::{DbId, Timestamp};

/// A dispatch command. Carries nothing but the run-request id plus
/// claim bookkeeping.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DispatchCommand {
    pub id: DbId,
    pub run_request_id: DbId,
    pub enqueued_at: Timestamp,
    pub claimed_at: Option<Timestamp>,
    pub claimed_by: Option<String>,
    pub completed_at: Option<Timestamp>,
}
