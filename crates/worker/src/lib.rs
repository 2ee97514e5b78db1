//! Executor side of the test run service.
//!
//! - [`config::WorkerConfig`]: environment-driven settings.
//! - [`queue`]: where dispatch commands come from (`dispatch_queue` in
//!   production).
//! - [`runner::TestRunner`]: spawns the test command and maps its exit
//!   status to a terminal run status.
//! - [`executor::Executor`]: the poll loop applying the executor contract
//!   through the run lifecycle.

pub mod config;
pub mod executor;
pub mod queue;
pub mod runner;
