//! Test runner process management.
//!
//! The runner is invoked as `{program} {args...} {paths...}` in the
//! application root with `TEST_ENV` naming the target environment.
//! stdout and stderr are captured together into the run's logs.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use testrun_core::status::RunStatus;
use tokio::process::Command;

/// Environment variable carrying the environment name to the runner.
pub const TEST_ENV_VAR: &str = "TEST_ENV";

/// Result of one runner invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Always terminal.
    pub status: RunStatus,
    pub logs: String,
}

/// Map a process exit code to a terminal status.
///
/// `0` is a pass and `1` means tests ran and failed (pytest's convention).
/// Anything else, including death by signal, is an error in the run itself.
pub fn status_for_exit_code(code: Option<i32>) -> RunStatus {
    match code {
        Some(0) => RunStatus::Passed,
        Some(1) => RunStatus::Failed,
        _ => RunStatus::Errored,
    }
}

#[derive(Debug, Clone)]
pub struct TestRunner {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl TestRunner {
    /// Build from a split command line. An empty command line yields a
    /// runner whose every run errors.
    pub fn new(command_line: &[String], timeout: Duration) -> Self {
        let (program, args) = match command_line.split_first() {
            Some((program, args)) => (program.clone(), args.to_vec()),
            None => (String::new(), Vec::new()),
        };
        Self {
            program,
            args,
            timeout,
        }
    }

    /// Run the artifacts at `paths` (relative to `app_root`) against
    /// `env_name`. Never fails: spawn errors and timeouts become `ERRORED`
    /// with the cause written to the logs.
    pub async fn run(&self, app_root: &Path, env_name: &str, paths: &[String]) -> RunOutcome {
        let targets: Vec<PathBuf> = paths.iter().map(|p| app_root.join(p)).collect();

        let child = Command::new(&self.program)
            .args(&self.args)
            .args(&targets)
            .current_dir(app_root)
            .env(TEST_ENV_VAR, env_name)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(program = %self.program, error = %e, "Failed to spawn test runner");
                return RunOutcome {
                    status: RunStatus::Errored,
                    logs: format!("failed to start test runner `{}`: {e}", self.program),
                };
            }
        };

        // Dropping the future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return RunOutcome {
                    status: RunStatus::Errored,
                    logs: format!("failed to collect test runner output: {e}"),
                };
            }
            Err(_) => {
                tracing::warn!(timeout_secs = self.timeout.as_secs(), "Test run timed out");
                return RunOutcome {
                    status: RunStatus::Errored,
                    logs: format!("test run exceeded {}s and was killed", self.timeout.as_secs()),
                };
            }
        };

        let mut logs = String::from_utf8_lossy(&output.stdout).into_owned();
        logs.push_str(&String::from_utf8_lossy(&output.stderr));

        RunOutcome {
            status: status_for_exit_code(output.status.code()),
            logs,
        }
    }
}
