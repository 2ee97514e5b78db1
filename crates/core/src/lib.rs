//! Domain core for the test run service.
//!
//! Holds the run-request lifecycle (status machine, intake, executor
//! updates), the artifact registry and environment catalog, the upload
//! rules for test files, and the storage / dispatch traits that the
//! database and worker crates implement.

pub mod artifact;
pub mod dispatch;
pub mod environment;
pub mod error;
pub mod intake;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod pagination;
pub mod run_request;
pub mod status;
pub mod store;
pub mod types;
pub mod upload;
