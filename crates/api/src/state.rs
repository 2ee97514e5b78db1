use std::sync::Arc;

use testrun_core::artifact::ArtifactRegistry;
use testrun_core::dispatch::DispatchGateway;
use testrun_core::environment::EnvironmentCatalog;
use testrun_core::intake::IntakeService;
use testrun_core::run_request::RunLifecycle;
use testrun_core::store::Store;
use testrun_events::EventBus;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; every service holds its store behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub intake: IntakeService,
    pub lifecycle: RunLifecycle,
    pub registry: ArtifactRegistry,
    pub catalog: EnvironmentCatalog,
    pub event_bus: Arc<EventBus>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Wire every service to the same store and dispatch gateway.
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn DispatchGateway>,
        event_bus: Arc<EventBus>,
        config: ServerConfig,
    ) -> Self {
        Self {
            intake: IntakeService::new(Arc::clone(&store), gateway),
            lifecycle: RunLifecycle::new(Arc::clone(&store)),
            registry: ArtifactRegistry::new(Arc::clone(&store)),
            catalog: EnvironmentCatalog::new(Arc::clone(&store)),
            store,
            event_bus,
            config: Arc::new(config),
        }
    }
}
