//! Event bus for the test run service.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`PlatformEvent`]: the event envelope, plus the names of the events
//!   the service emits in [`event_types`].
//! - [`EventPersistence`]: background task that writes every event to the
//!   `platform_events` table.

pub mod bus;
pub mod persistence;

pub use bus::{event_types, EventBus, PlatformEvent};
pub use persistence::EventPersistence;
