//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods
//! that accept `&PgPool` as the first argument.

pub mod artifact_repo;
pub mod dispatch_queue_repo;
pub mod environment_repo;
pub mod event_repo;
pub mod run_request_repo;

pub use artifact_repo::ArtifactRepo;
pub use dispatch_queue_repo::DispatchQueueRepo;
pub use environment_repo::EnvironmentRepo;
pub use event_repo::EventRepo;
pub use run_request_repo::RunRequestRepo;
