//! Artifact registry: one record per logical test-file path.
//!
//! Re-uploading to a path keeps its identity even though the bytes on
//! disk change. Concurrent first uploads of the same path race on the
//! store's uniqueness constraint; the loser re-reads and returns the
//! winner's record.

use std::sync::Arc;

use serde::Serialize;

use crate::error::CoreError;
use crate::pagination::Page;
use crate::store::Store;
use crate::types::{DbId, Timestamp};

/// A registered test file, identified by its path relative to the
/// application root (e.g. `user_tests/foo/test_x.py`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub id: DbId,
    pub path: String,
    #[serde(skip_serializing)]
    pub created_at: Timestamp,
}

#[derive(Clone)]
pub struct ArtifactRegistry {
    store: Arc<dyn Store>,
}

impl ArtifactRegistry {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Return the artifact registered at `logical_path`, creating it on
    /// first use.
    pub async fn resolve_or_create(&self, logical_path: &str) -> Result<Artifact, CoreError> {
        if let Some(existing) = self.store.find_artifact_by_path(logical_path).await? {
            return Ok(existing);
        }

        match self.store.insert_artifact(logical_path).await {
            Ok(created) => {
                tracing::info!(artifact_id = created.id, path = %created.path, "Artifact registered");
                Ok(created)
            }
            Err(CoreError::Conflict(_)) => {
                tracing::debug!(path = %logical_path, "Lost artifact insert race, re-resolving");
                self.store
                    .find_artifact_by_path(logical_path)
                    .await?
                    .ok_or_else(|| {
                        CoreError::Internal(format!(
                            "artifact path {logical_path} conflicted but could not be re-read"
                        ))
                    })
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch the artifacts with the given ids; unknown ids are omitted.
    pub async fn find_many(&self, ids: &[DbId]) -> Result<Vec<Artifact>, CoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.store.find_artifacts(ids).await
    }

    pub async fn list(&self, page: Page) -> Result<Vec<Artifact>, CoreError> {
        self.store.list_artifacts(page).await
    }
}
