//! Executor behaviour over the in-memory store and a scripted runner.

#![cfg(unix)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use testrun_core::artifact::Artifact;
use testrun_core::environment::Environment;
use testrun_core::error::CoreError;
use testrun_core::memory::InMemoryStore;
use testrun_core::pagination::Page;
use testrun_core::run_request::{
    NewRunRequest, RunLifecycle, RunRequest, RunRequestSummary, StatusUpdate,
};
use testrun_core::status::RunStatus;
use testrun_core::store::{ArtifactStore, EnvironmentStore, RunRequestStore, Store, StoreHealth};
use testrun_core::types::DbId;
use testrun_worker::executor::Executor;
use testrun_worker::queue::{ClaimedCommand, CommandSource};
use testrun_worker::runner::TestRunner;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct VecSource {
    pending: Mutex<VecDeque<ClaimedCommand>>,
    completed: Mutex<Vec<DbId>>,
}

impl VecSource {
    fn push(&self, id: DbId, run_request_id: DbId) {
        self.pending
            .lock()
            .unwrap()
            .push_back(ClaimedCommand { id, run_request_id });
    }

    fn completed(&self) -> Vec<DbId> {
        self.completed.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandSource for VecSource {
    async fn claim_next(&self, _worker_name: &str) -> Result<Option<ClaimedCommand>, sqlx::Error> {
        Ok(self.pending.lock().unwrap().pop_front())
    }

    async fn complete(&self, command_id: DbId) -> Result<(), sqlx::Error> {
        self.completed.lock().unwrap().push(command_id);
        Ok(())
    }
}

/// Delegates to the in-memory store but fails every bulk artifact lookup.
struct BrokenArtifactLookup(Arc<InMemoryStore>);

#[async_trait]
impl ArtifactStore for BrokenArtifactLookup {
    async fn find_artifact_by_path(&self, path: &str) -> Result<Option<Artifact>, CoreError> {
        self.0.find_artifact_by_path(path).await
    }

    async fn insert_artifact(&self, path: &str) -> Result<Artifact, CoreError> {
        self.0.insert_artifact(path).await
    }

    async fn find_artifacts(&self, _ids: &[DbId]) -> Result<Vec<Artifact>, CoreError> {
        Err(CoreError::Internal("connection reset".into()))
    }

    async fn list_artifacts(&self, page: Page) -> Result<Vec<Artifact>, CoreError> {
        self.0.list_artifacts(page).await
    }
}

#[async_trait]
impl EnvironmentStore for BrokenArtifactLookup {
    async fn find_environment(&self, id: DbId) -> Result<Option<Environment>, CoreError> {
        self.0.find_environment(id).await
    }

    async fn list_environments(&self) -> Result<Vec<Environment>, CoreError> {
        self.0.list_environments().await
    }
}

#[async_trait]
impl RunRequestStore for BrokenArtifactLookup {
    async fn insert_run_request(&self, input: &NewRunRequest) -> Result<RunRequest, CoreError> {
        self.0.insert_run_request(input).await
    }

    async fn find_run_request(&self, id: DbId) -> Result<Option<RunRequest>, CoreError> {
        self.0.find_run_request(id).await
    }

    async fn list_run_requests(&self, page: Page) -> Result<Vec<RunRequestSummary>, CoreError> {
        self.0.list_run_requests(page).await
    }

    async fn compare_and_set_status(
        &self,
        id: DbId,
        expected: RunStatus,
        next: RunStatus,
        logs: Option<&str>,
    ) -> Result<Option<RunRequest>, CoreError> {
        self.0.compare_and_set_status(id, expected, next, logs).await
    }
}

#[async_trait]
impl StoreHealth for BrokenArtifactLookup {
    async fn ping(&self) -> Result<(), CoreError> {
        self.0.ping().await
    }
}

struct Fixture {
    store: Arc<InMemoryStore>,
    source: Arc<VecSource>,
    root: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            source: Arc::new(VecSource::default()),
            root: tempfile::tempdir().unwrap(),
        }
    }

    fn executor(&self, script: &str) -> Executor {
        self.executor_over(self.store.clone(), script)
    }

    fn executor_over(&self, store: Arc<dyn Store>, script: &str) -> Executor {
        let runner = TestRunner::new(
            &["sh".into(), "-c".into(), script.into(), "runner".into()],
            Duration::from_secs(10),
        );
        Executor::new(
            "worker-test",
            Duration::from_millis(10),
            self.root.path().to_path_buf(),
            self.source.clone(),
            store,
            runner,
        )
    }

    fn lifecycle(&self) -> RunLifecycle {
        RunLifecycle::new(self.store.clone())
    }
}

#[tokio::test]
async fn passing_run_ends_passed_with_logs() {
    let fx = Fixture::new();
    let env = fx.store.seed_environment("my_env");
    let a = fx.store.seed_artifact("user_tests/foo/test_a.py");
    let b = fx.store.seed_artifact("user_tests/foo/test_b.py");
    let run = fx.store.seed_run_request("Ramadan", env.id, &[b.id, a.id]);

    let status = fx
        .executor(r#"echo "$TEST_ENV"; for p in "$@"; do basename "$p"; done"#)
        .execute(run.id)
        .await
        .unwrap();

    assert_eq!(status, Some(RunStatus::Passed));
    let stored = fx.lifecycle().get(run.id).await.unwrap();
    assert_eq!(stored.status, RunStatus::Passed);
    assert_eq!(stored.logs, "my_env\ntest_b.py\ntest_a.py\n");
}

#[tokio::test]
async fn failing_tests_end_failed() {
    let fx = Fixture::new();
    let env = fx.store.seed_environment("my_env");
    let a = fx.store.seed_artifact("user_tests/foo/test_a.py");
    let run = fx.store.seed_run_request("Ramadan", env.id, &[a.id]);

    let status = fx.executor("echo '1 failed'; exit 1").execute(run.id).await.unwrap();

    assert_eq!(status, Some(RunStatus::Failed));
    assert_eq!(fx.lifecycle().get(run.id).await.unwrap().logs, "1 failed\n");
}

#[tokio::test]
async fn runner_crash_ends_errored() {
    let fx = Fixture::new();
    let env = fx.store.seed_environment("my_env");
    let a = fx.store.seed_artifact("user_tests/foo/test_a.py");
    let run = fx.store.seed_run_request("Ramadan", env.id, &[a.id]);

    let status = fx.executor("exit 4").execute(run.id).await.unwrap();

    assert_eq!(status, Some(RunStatus::Errored));
}

#[tokio::test]
async fn duplicate_command_for_finished_run_is_dropped() {
    let fx = Fixture::new();
    let env = fx.store.seed_environment("my_env");
    let a = fx.store.seed_artifact("user_tests/foo/test_a.py");
    let run = fx.store.seed_run_request("Ramadan", env.id, &[a.id]);
    fx.lifecycle()
        .update(run.id, StatusUpdate::new(RunStatus::Passed).with_logs("done"))
        .await
        .unwrap();

    let status = fx.executor("exit 1").execute(run.id).await.unwrap();

    assert_eq!(status, None);
    let stored = fx.lifecycle().get(run.id).await.unwrap();
    assert_eq!(stored.status, RunStatus::Passed);
    assert_eq!(stored.logs, "done");
}

#[tokio::test]
async fn command_for_unknown_run_is_dropped() {
    let fx = Fixture::new();

    let status = fx.executor("exit 0").execute(999).await.unwrap();

    assert_eq!(status, None);
}

#[tokio::test]
async fn drain_handles_every_command_and_completes_it() {
    let fx = Fixture::new();
    let env = fx.store.seed_environment("my_env");
    let a = fx.store.seed_artifact("user_tests/foo/test_a.py");
    let first = fx.store.seed_run_request("Ramadan", env.id, &[a.id]);
    let second = fx.store.seed_run_request("Ramadan", env.id, &[a.id]);
    fx.source.push(10, first.id);
    fx.source.push(11, second.id);
    fx.source.push(12, first.id);

    let handled = fx
        .executor("exit 0")
        .drain(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(handled, 3);
    assert_eq!(fx.source.completed(), vec![10, 11, 12]);
    for id in [first.id, second.id] {
        assert_eq!(fx.lifecycle().get(id).await.unwrap().status, RunStatus::Passed);
    }
}

#[tokio::test]
async fn store_failure_after_start_ends_errored_not_running() {
    let fx = Fixture::new();
    let env = fx.store.seed_environment("my_env");
    let a = fx.store.seed_artifact("user_tests/foo/test_a.py");
    let run = fx.store.seed_run_request("Ramadan", env.id, &[a.id]);
    fx.source.push(20, run.id);
    let broken: Arc<dyn Store> = Arc::new(BrokenArtifactLookup(fx.store.clone()));

    let handled = fx
        .executor_over(broken, "exit 0")
        .drain(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(handled, 1);
    assert_eq!(fx.source.completed(), vec![20]);
    let stored = fx.lifecycle().get(run.id).await.unwrap();
    assert_eq!(stored.status, RunStatus::Errored);
    assert!(stored.logs.contains("connection reset"), "logs: {}", stored.logs);
}

#[tokio::test]
async fn run_loop_stops_on_cancel() {
    let fx = Fixture::new();
    let executor = fx.executor("exit 0");
    let cancel = CancellationToken::new();
    cancel.cancel();

    tokio::time::timeout(Duration::from_secs(5), executor.run(cancel))
        .await
        .expect("executor should stop once cancelled");
}
