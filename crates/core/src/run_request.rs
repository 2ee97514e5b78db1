//! Run requests and the executor-facing lifecycle.
//!
//! The intake side only ever inserts `CREATED` rows. Every later status
//! change goes through [`RunLifecycle::update`], which enforces the graph
//! in [`RunStatus::can_transition_to`] with a compare-and-set on the
//! stored status so concurrent callbacks for one request serialize.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::pagination::Page;
use crate::status::RunStatus;
use crate::store::Store;
use crate::types::{DbId, Timestamp};

/// Compare-and-set attempts before giving up on a contended update.
const MAX_UPDATE_ATTEMPTS: usize = 8;

/// Full run-request record, including captured logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunRequest {
    pub id: DbId,
    pub requested_by: String,
    /// Environment id.
    pub env: DbId,
    pub env_name: String,
    /// Artifact ids in submission order.
    pub path: Vec<DbId>,
    pub status: RunStatus,
    pub created_at: Timestamp,
    pub logs: String,
}

/// List view of a run request (no logs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunRequestSummary {
    pub id: DbId,
    pub requested_by: String,
    pub env: DbId,
    pub env_name: String,
    pub path: Vec<DbId>,
    pub status: RunStatus,
    pub created_at: Timestamp,
}

impl From<RunRequest> for RunRequestSummary {
    fn from(run: RunRequest) -> Self {
        Self {
            id: run.id,
            requested_by: run.requested_by,
            env: run.env,
            env_name: run.env_name,
            path: run.path,
            status: run.status,
            created_at: run.created_at,
        }
    }
}

/// Validated insert payload produced by the intake service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRunRequest {
    pub requested_by: String,
    pub env_id: DbId,
    /// Non-empty, duplicate-free, in submission order.
    pub artifact_ids: Vec<DbId>,
}

/// Executor callback payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusUpdate {
    pub status: RunStatus,
    #[serde(default)]
    pub logs: Option<String>,
}

impl StatusUpdate {
    pub fn new(status: RunStatus) -> Self {
        Self { status, logs: None }
    }

    pub fn with_logs(mut self, logs: impl Into<String>) -> Self {
        self.logs = Some(logs.into());
        self
    }
}

/// An applied status update and the status it replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub from: RunStatus,
    pub run: RunRequest,
}

/// Reads and executor-driven transitions over stored run requests.
#[derive(Clone)]
pub struct RunLifecycle {
    store: Arc<dyn Store>,
}

impl RunLifecycle {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: DbId) -> Result<RunRequest, CoreError> {
        self.store
            .find_run_request(id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "RunRequest",
                id,
            })
    }

    pub async fn list(&self, page: Page) -> Result<Vec<RunRequestSummary>, CoreError> {
        self.store.list_run_requests(page).await
    }

    /// Apply an executor status update and return the updated record.
    ///
    /// Fails with `NotFound` for unknown ids and `InvalidTransition` when
    /// the graph forbids the move (including any move out of a terminal
    /// state). Nothing is written on failure.
    pub async fn update(&self, id: DbId, update: StatusUpdate) -> Result<RunRequest, CoreError> {
        Ok(self.transition(id, update).await?.run)
    }

    /// Same as [`update`](Self::update), also reporting the status that
    /// the compare-and-set replaced.
    pub async fn transition(
        &self,
        id: DbId,
        update: StatusUpdate,
    ) -> Result<StatusChange, CoreError> {
        for _ in 0..MAX_UPDATE_ATTEMPTS {
            let current = self.get(id).await?;

            if !current.status.can_transition_to(update.status) {
                tracing::warn!(
                    run_request_id = id,
                    from = %current.status,
                    to = %update.status,
                    "Rejected run request status transition",
                );
                return Err(CoreError::InvalidTransition {
                    from: current.status,
                    to: update.status,
                });
            }

            let applied = self
                .store
                .compare_and_set_status(id, current.status, update.status, update.logs.as_deref())
                .await?;

            if let Some(updated) = applied {
                tracing::info!(
                    run_request_id = id,
                    from = %current.status,
                    to = %updated.status,
                    "Run request status updated",
                );
                return Ok(StatusChange {
                    from: current.status,
                    run: updated,
                });
            }
            // Another callback moved the row between read and write; re-read.
        }

        Err(CoreError::Conflict(format!(
            "run request {id} is being updated concurrently"
        )))
    }
}
