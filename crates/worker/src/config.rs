use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Recorded as `claimed_by` on dispatch commands.
    pub worker_name: String,
    pub poll_interval: Duration,
    /// Runner command line, split on whitespace. Artifact paths are
    /// appended as trailing arguments.
    pub test_runner: Vec<String>,
    /// Wall-clock bound on a single run.
    pub run_timeout: Duration,
    /// Directory the runner executes in; artifact paths are relative to it.
    pub app_root: PathBuf,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var            | Default              |
    /// |--------------------|----------------------|
    /// | `WORKER_NAME`      | `worker-{pid}`       |
    /// | `POLL_INTERVAL_MS` | `1000`               |
    /// | `TEST_RUNNER`      | `python -m pytest`   |
    /// | `RUN_TIMEOUT_SECS` | `600`                |
    /// | `APP_ROOT`         | `.`                  |
    pub fn from_env() -> Self {
        let worker_name = std::env::var("WORKER_NAME")
            .unwrap_or_else(|_| format!("worker-{}", std::process::id()));

        let poll_interval_ms: u64 = std::env::var("POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "1000".into())
            .parse()
            .expect("POLL_INTERVAL_MS must be a valid u64");

        let test_runner: Vec<String> = std::env::var("TEST_RUNNER")
            .unwrap_or_else(|_| "python -m pytest".into())
            .split_whitespace()
            .map(str::to_string)
            .collect();
        assert!(!test_runner.is_empty(), "TEST_RUNNER must not be empty");

        let run_timeout_secs: u64 = std::env::var("RUN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "600".into())
            .parse()
            .expect("RUN_TIMEOUT_SECS must be a valid u64");

        let app_root = PathBuf::from(std::env::var("APP_ROOT").unwrap_or_else(|_| ".".into()));

        Self {
            worker_name,
            poll_interval: Duration::from_millis(poll_interval_ms),
            test_runner,
            run_timeout: Duration::from_secs(run_timeout_secs),
            app_root,
        }
    }
}
