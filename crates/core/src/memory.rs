//! In-process implementations of the store and dispatch traits.
//!
//! Used by unit tests here and by the API integration tests, so the
//! services can be exercised without a PostgreSQL instance. Uniqueness of
//! artifact paths is enforced under the same lock as the insert, matching
//! the database constraint.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::artifact::Artifact;
use crate::dispatch::{DispatchError, DispatchGateway};
use crate::environment::Environment;
use crate::error::CoreError;
use crate::pagination::Page;
use crate::run_request::{NewRunRequest, RunRequest, RunRequestSummary};
use crate::status::RunStatus;
use crate::store::{ArtifactStore, EnvironmentStore, RunRequestStore, StoreHealth};
use crate::types::{DbId, Timestamp};

#[derive(Debug, Clone)]
struct RunRow {
    id: DbId,
    requested_by: String,
    env_id: DbId,
    artifact_ids: Vec<DbId>,
    status: RunStatus,
    created_at: Timestamp,
    logs: String,
}

#[derive(Default)]
struct Tables {
    next_id: DbId,
    artifacts: BTreeMap<DbId, Artifact>,
    artifact_paths: HashMap<String, DbId>,
    environments: BTreeMap<DbId, Environment>,
    run_requests: BTreeMap<DbId, RunRow>,
}

impl Tables {
    fn allocate_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    fn materialize(&self, row: &RunRow) -> RunRequest {
        let env_name = self
            .environments
            .get(&row.env_id)
            .map(|e| e.name.clone())
            .unwrap_or_default();
        RunRequest {
            id: row.id,
            requested_by: row.requested_by.clone(),
            env: row.env_id,
            env_name,
            path: row.artifact_ids.clone(),
            status: row.status,
            created_at: row.created_at,
            logs: row.logs.clone(),
        }
    }
}

/// Mutex-guarded tables standing in for the relational store.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    hide_path_lookup: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        // A poisoned lock only means another test thread panicked.
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert reference data the way the administrative process would.
    pub fn seed_environment(&self, name: &str) -> Environment {
        let mut tables = self.tables();
        let env = Environment {
            id: tables.allocate_id(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        tables.environments.insert(env.id, env.clone());
        env
    }

    pub fn seed_artifact(&self, path: &str) -> Artifact {
        let mut tables = self.tables();
        let artifact = Artifact {
            id: tables.allocate_id(),
            path: path.to_string(),
            created_at: Utc::now(),
        };
        tables.artifact_paths.insert(artifact.path.clone(), artifact.id);
        tables.artifacts.insert(artifact.id, artifact.clone());
        artifact
    }

    pub fn seed_run_request(&self, requested_by: &str, env_id: DbId, artifact_ids: &[DbId]) -> RunRequest {
        let mut tables = self.tables();
        let row = RunRow {
            id: tables.allocate_id(),
            requested_by: requested_by.to_string(),
            env_id,
            artifact_ids: artifact_ids.to_vec(),
            status: RunStatus::Created,
            created_at: Utc::now(),
            logs: String::new(),
        };
        let run = tables.materialize(&row);
        tables.run_requests.insert(row.id, row);
        run
    }

    /// Make the next path lookup miss, simulating a concurrent insert that
    /// lands between lookup and insert.
    pub fn hide_next_path_lookup(&self) {
        self.hide_path_lookup.store(true, Ordering::SeqCst);
    }

    pub fn artifact_count(&self) -> usize {
        self.tables().artifacts.len()
    }

    pub fn run_request_count(&self) -> usize {
        self.tables().run_requests.len()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryStore {
    async fn find_artifact_by_path(&self, path: &str) -> Result<Option<Artifact>, CoreError> {
        if self.hide_path_lookup.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        let tables = self.tables();
        Ok(tables
            .artifact_paths
            .get(path)
            .and_then(|id| tables.artifacts.get(id))
            .cloned())
    }

    async fn insert_artifact(&self, path: &str) -> Result<Artifact, CoreError> {
        let mut tables = self.tables();
        if tables.artifact_paths.contains_key(path) {
            return Err(CoreError::Conflict(format!(
                "Duplicate value violates unique constraint: uq_artifacts_path ({path})"
            )));
        }
        let artifact = Artifact {
            id: tables.allocate_id(),
            path: path.to_string(),
            created_at: Utc::now(),
        };
        tables.artifact_paths.insert(artifact.path.clone(), artifact.id);
        tables.artifacts.insert(artifact.id, artifact.clone());
        Ok(artifact)
    }

    async fn find_artifacts(&self, ids: &[DbId]) -> Result<Vec<Artifact>, CoreError> {
        let tables = self.tables();
        Ok(ids
            .iter()
            .filter_map(|id| tables.artifacts.get(id).cloned())
            .collect())
    }

    async fn list_artifacts(&self, page: Page) -> Result<Vec<Artifact>, CoreError> {
        let tables = self.tables();
        Ok(tables
            .artifacts
            .values()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EnvironmentStore for InMemoryStore {
    async fn find_environment(&self, id: DbId) -> Result<Option<Environment>, CoreError> {
        Ok(self.tables().environments.get(&id).cloned())
    }

    async fn list_environments(&self) -> Result<Vec<Environment>, CoreError> {
        let mut envs: Vec<_> = self.tables().environments.values().cloned().collect();
        envs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(envs)
    }
}

#[async_trait]
impl RunRequestStore for InMemoryStore {
    async fn insert_run_request(&self, input: &NewRunRequest) -> Result<RunRequest, CoreError> {
        let mut tables = self.tables();
        if !tables.environments.contains_key(&input.env_id) {
            return Err(CoreError::NotFound {
                entity: "Environment",
                id: input.env_id,
            });
        }
        if let Some(missing) = input
            .artifact_ids
            .iter()
            .find(|id| !tables.artifacts.contains_key(id))
        {
            return Err(CoreError::NotFound {
                entity: "Artifact",
                id: *missing,
            });
        }
        let row = RunRow {
            id: tables.allocate_id(),
            requested_by: input.requested_by.clone(),
            env_id: input.env_id,
            artifact_ids: input.artifact_ids.clone(),
            status: RunStatus::Created,
            created_at: Utc::now(),
            logs: String::new(),
        };
        let run = tables.materialize(&row);
        tables.run_requests.insert(row.id, row);
        Ok(run)
    }

    async fn find_run_request(&self, id: DbId) -> Result<Option<RunRequest>, CoreError> {
        let tables = self.tables();
        Ok(tables.run_requests.get(&id).map(|row| tables.materialize(row)))
    }

    async fn list_run_requests(&self, page: Page) -> Result<Vec<RunRequestSummary>, CoreError> {
        let tables = self.tables();
        Ok(tables
            .run_requests
            .values()
            .rev()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .map(|row| tables.materialize(row).into())
            .collect())
    }

    async fn compare_and_set_status(
        &self,
        id: DbId,
        expected: RunStatus,
        next: RunStatus,
        logs: Option<&str>,
    ) -> Result<Option<RunRequest>, CoreError> {
        let mut tables = self.tables();
        let Some(row) = tables.run_requests.get_mut(&id) else {
            return Ok(None);
        };
        if row.status != expected {
            return Ok(None);
        }
        row.status = next;
        if let Some(logs) = logs {
            row.logs = logs.to_string();
        }
        let row = row.clone();
        Ok(Some(tables.materialize(&row)))
    }
}

#[async_trait]
impl StoreHealth for InMemoryStore {
    async fn ping(&self) -> Result<(), CoreError> {
        Ok(())
    }
}

/// Gateway that records every enqueue instead of reaching an executor.
#[derive(Default)]
pub struct RecordingDispatch {
    enqueued: Mutex<Vec<DbId>>,
    attempts: AtomicUsize,
    fail_next: AtomicBool,
}

impl RecordingDispatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `enqueue` fail with `DispatchError::Unavailable`.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Ids successfully enqueued, in call order.
    pub fn enqueued(&self) -> Vec<DbId> {
        self.enqueued.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Total `enqueue` calls, including failed ones.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DispatchGateway for RecordingDispatch {
    async fn enqueue(&self, run_request_id: DbId) -> Result<(), DispatchError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(DispatchError::Unavailable("executor queue offline".into()));
        }
        self.enqueued
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(run_request_id);
        Ok(())
    }
}
