//! Rows of the `platform_events` table.

use serde::Serialize;
use sqlx::FromRow;
use testrun_core::types::{DbId, Timestamp};

/// A persisted platform event.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EventRow {
    pub id: DbId,
    pub event_type: String,
    pub source_entity_type: Option<String>,
    pub source_entity_id: Option<DbId>,
    pub payload: serde_json::Value,
    pub created_at: Timestamp,
}
