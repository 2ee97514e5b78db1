//! Executor loop.
//!
//! Polls the command source every `poll_interval` and, for each claimed
//! command, applies the executor contract through [`RunLifecycle`]:
//! mark `RUNNING`, run the artifacts against the environment, then write
//! the logs together with the terminal status.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use testrun_core::artifact::ArtifactRegistry;
use testrun_core::error::CoreError;
use testrun_core::run_request::{RunLifecycle, RunRequest, StatusUpdate};
use testrun_core::status::RunStatus;
use testrun_core::store::Store;
use testrun_core::types::DbId;
use tokio_util::sync::CancellationToken;

use crate::queue::CommandSource;
use crate::runner::TestRunner;

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("Command queue error: {0}")]
    Queue(#[from] sqlx::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub struct Executor {
    worker_name: String,
    poll_interval: Duration,
    app_root: PathBuf,
    source: Arc<dyn CommandSource>,
    lifecycle: RunLifecycle,
    registry: ArtifactRegistry,
    runner: TestRunner,
}

impl Executor {
    pub fn new(
        worker_name: impl Into<String>,
        poll_interval: Duration,
        app_root: PathBuf,
        source: Arc<dyn CommandSource>,
        store: Arc<dyn Store>,
        runner: TestRunner,
    ) -> Self {
        Self {
            worker_name: worker_name.into(),
            poll_interval,
            app_root,
            source,
            lifecycle: RunLifecycle::new(Arc::clone(&store)),
            registry: ArtifactRegistry::new(store),
            runner,
        }
    }

    /// Run the poll loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        tracing::info!(
            worker = %self.worker_name,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Executor started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Executor shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.drain(&cancel).await {
                        tracing::error!(error = %e, "Executor cycle failed");
                    }
                }
            }
        }
    }

    /// Claim and execute commands until the queue is empty or shutdown is
    /// requested. Returns how many commands were handled.
    pub async fn drain(&self, cancel: &CancellationToken) -> Result<usize, ExecutorError> {
        let mut handled = 0;
        while !cancel.is_cancelled() {
            let Some(command) = self.source.claim_next(&self.worker_name).await? else {
                break;
            };
            tracing::info!(
                command_id = command.id,
                run_request_id = command.run_request_id,
                "Dispatch command claimed",
            );

            if let Err(e) = self.execute(command.run_request_id).await {
                tracing::error!(
                    run_request_id = command.run_request_id,
                    error = %e,
                    "Run request execution failed",
                );
            }
            self.source.complete(command.id).await?;
            handled += 1;
        }
        Ok(handled)
    }

    /// Execute one run request. Returns the terminal status written, or
    /// `None` when the command was dropped (unknown or already started).
    pub async fn execute(&self, run_request_id: DbId) -> Result<Option<RunStatus>, CoreError> {
        let run = match self
            .lifecycle
            .update(run_request_id, StatusUpdate::new(RunStatus::Running))
            .await
        {
            Ok(run) => run,
            Err(CoreError::InvalidTransition { from, .. }) => {
                tracing::warn!(
                    run_request_id,
                    status = %from,
                    "Dropping duplicate dispatch command",
                );
                return Ok(None);
            }
            Err(CoreError::NotFound { .. }) => {
                tracing::warn!(run_request_id, "Dropping command for unknown run request");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        match self.run_to_completion(&run).await {
            Ok(status) => Ok(status),
            Err(e) => {
                tracing::error!(run_request_id, error = %e, "Executor failed after start");
                self.mark_errored(run_request_id, e).await
            }
        }
    }

    /// Run a request already marked `RUNNING` and write its terminal status.
    async fn run_to_completion(&self, run: &RunRequest) -> Result<Option<RunStatus>, CoreError> {
        let run_request_id = run.id;
        let by_id: HashMap<DbId, String> = self
            .registry
            .find_many(&run.path)
            .await?
            .into_iter()
            .map(|a| (a.id, a.path))
            .collect();
        let paths: Vec<String> = run
            .path
            .iter()
            .filter_map(|id| by_id.get(id).cloned())
            .collect();

        let outcome = self.runner.run(&self.app_root, &run.env_name, &paths).await;
        tracing::info!(
            run_request_id,
            env = %run.env_name,
            artifact_count = paths.len(),
            status = %outcome.status,
            "Test run finished",
        );

        let finished = self
            .lifecycle
            .update(
                run_request_id,
                StatusUpdate::new(outcome.status).with_logs(outcome.logs),
            )
            .await;

        match finished {
            Ok(run) => Ok(Some(run.status)),
            Err(CoreError::InvalidTransition { from, .. }) => {
                tracing::warn!(
                    run_request_id,
                    status = %from,
                    "Run request was finalized elsewhere; discarding result",
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Best-effort move of a started run to `ERRORED`.
    /// The original failure is returned if this write fails too.
    async fn mark_errored(
        &self,
        run_request_id: DbId,
        cause: CoreError,
    ) -> Result<Option<RunStatus>, CoreError> {
        let update =
            StatusUpdate::new(RunStatus::Errored).with_logs(format!("executor error: {cause}"));
        match self.lifecycle.update(run_request_id, update).await {
            Ok(run) => Ok(Some(run.status)),
            Err(CoreError::InvalidTransition { from, .. }) => {
                tracing::warn!(
                    run_request_id,
                    status = %from,
                    "Run request was finalized elsewhere; not marking errored",
                );
                Ok(None)
            }
            Err(e) => {
                tracing::error!(run_request_id, error = %e, "Could not mark run request errored");
                Err(cause)
            }
        }
    }
}
