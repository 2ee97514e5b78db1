//! Storage traits implemented by the database crate (and by the
//! in-memory store behind the `test-util` feature).
//!
//! Every method is a single-row read or write except
//! [`RunRequestStore::insert_run_request`], which must persist the run
//! request together with its ordered artifact associations atomically.

use async_trait::async_trait;

use crate::artifact::Artifact;
use crate::environment::Environment;
use crate::error::CoreError;
use crate::pagination::Page;
use crate::run_request::{NewRunRequest, RunRequest, RunRequestSummary};
use crate::status::RunStatus;
use crate::types::DbId;

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Exact-match lookup on the logical path.
    async fn find_artifact_by_path(&self, path: &str) -> Result<Option<Artifact>, CoreError>;

    /// Insert a new artifact.
    ///
    /// Must return [`CoreError::Conflict`] when another artifact already
    /// owns `path`; the uniqueness check is the store's responsibility.
    async fn insert_artifact(&self, path: &str) -> Result<Artifact, CoreError>;

    /// Fetch the artifacts whose ids appear in `ids`. Missing ids are
    /// simply absent from the result; order is unspecified.
    async fn find_artifacts(&self, ids: &[DbId]) -> Result<Vec<Artifact>, CoreError>;

    /// List artifacts ordered by id.
    async fn list_artifacts(&self, page: Page) -> Result<Vec<Artifact>, CoreError>;
}

#[async_trait]
pub trait EnvironmentStore: Send + Sync {
    async fn find_environment(&self, id: DbId) -> Result<Option<Environment>, CoreError>;

    /// List environments ordered by name.
    async fn list_environments(&self) -> Result<Vec<Environment>, CoreError>;
}

#[async_trait]
pub trait RunRequestStore: Send + Sync {
    /// Persist a run request with status `CREATED`, `created_at = now`,
    /// empty logs, and the artifacts in the order given.
    async fn insert_run_request(&self, input: &NewRunRequest) -> Result<RunRequest, CoreError>;

    async fn find_run_request(&self, id: DbId) -> Result<Option<RunRequest>, CoreError>;

    /// List run requests, newest first.
    async fn list_run_requests(&self, page: Page) -> Result<Vec<RunRequestSummary>, CoreError>;

    /// Move `id` from `expected` to `next`, optionally replacing its logs.
    ///
    /// Returns `None` without writing anything when the row does not exist
    /// or its current status is no longer `expected`.
    async fn compare_and_set_status(
        &self,
        id: DbId,
        expected: RunStatus,
        next: RunStatus,
        logs: Option<&str>,
    ) -> Result<Option<RunRequest>, CoreError>;
}

#[async_trait]
pub trait StoreHealth: Send + Sync {
    /// Cheap round trip confirming the backing store is reachable.
    async fn ping(&self) -> Result<(), CoreError>;
}

/// Everything the services need from persistence.
pub trait Store: ArtifactStore + EnvironmentStore + RunRequestStore + StoreHealth {}

impl<T> Store for T where T: ArtifactStore + EnvironmentStore + RunRequestStore + StoreHealth {}
