//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use dynabot_chat::ChatOrchestrator;
use dynabot_core::config::DynabotConfig;
use dynabot_storage::SnapshotStore;

/// Shared application state.
///
/// Cheap to clone; the orchestrator serializes chat turns internally.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<DynabotConfig>,
    /// The single chat orchestrator.
    pub orchestrator: Arc<ChatOrchestrator>,
    /// Durable analytics snapshot, read by `GET /analytics`.
    pub snapshots: SnapshotStore,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: DynabotConfig, orchestrator: ChatOrchestrator) -> Self {
        let snapshots = SnapshotStore::new(config.store_paths().analytics);
        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            snapshots,
            start_time: Instant::now(),
        }
    }
}
