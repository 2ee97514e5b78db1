//! Row structs for each table.
//!
//! Each submodule contains a `FromRow` struct matching the query column
//! list of its repository, plus the conversion into the corresponding
//! `testrun_core` domain type.

pub mod artifact;
pub mod dispatch;
pub mod environment;
pub mod event;
pub mod run_request;
