//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` across the application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use testrun_core::types::DbId;

/// Event names emitted by the service.
pub mod event_types {
    /// A run request was admitted, whether or not dispatch succeeded.
    pub const RUN_REQUEST_CREATED: &str = "run_request.created";
    /// The dispatch gateway refused the command; the row stays `CREATED`.
    pub const RUN_REQUEST_DISPATCH_FAILED: &str = "run_request.dispatch_failed";
    /// An executor callback moved the status. Payload `{"from", "to"}`.
    pub const RUN_REQUEST_STATUS_CHANGED: &str = "run_request.status_changed";
    /// A test file was written. Payload `{"path"}`.
    pub const ARTIFACT_UPLOADED: &str = "artifact.uploaded";

    /// `source_entity_type` values.
    pub const ENTITY_RUN_REQUEST: &str = "run_request";
    pub const ENTITY_ARTIFACT: &str = "artifact";
}

// ---------------------------------------------------------------------------
// PlatformEvent
// ---------------------------------------------------------------------------

/// Something that happened to a run request or artifact.
///
/// Built with [`PlatformEvent::new`] and the [`with_source`](Self::with_source)
/// and [`with_payload`](Self::with_payload) builders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformEvent {
    /// Dot-separated event name, e.g. `"run_request.created"`.
    pub event_type: String,

    /// Kind of entity the event is about, one of the `ENTITY_*` names.
    pub source_entity_type: Option<String>,

    /// Database id of that entity.
    pub source_entity_id: Option<DbId>,

    /// Event-specific JSON data; an empty object when unset.
    pub payload: serde_json::Value,

    /// Creation time (UTC), stamped by [`PlatformEvent::new`].
    pub timestamp: DateTime<Utc>,
}

impl PlatformEvent {
    /// Create an event carrying only its name.
    ///
    /// Source fields start as `None` and the payload as an empty object.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            source_entity_type: None,
            source_entity_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Attach the entity the event is about.
    pub fn with_source(mut self, entity_type: impl Into<String>, entity_id: DbId) -> Self {
        self.source_entity_type = Some(entity_type.into());
        self.source_entity_id = Some(entity_id);
        self
    }

    /// Replace the JSON payload.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// ```rust
/// use testrun_events::bus::{EventBus, PlatformEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(PlatformEvent::new("run_request.created"));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<PlatformEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest unconsumed events are dropped and
    /// slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers. Dropped silently when
    /// nobody is subscribed.
    pub fn publish(&self, event: PlatformEvent) {
        // SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Receive every event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
