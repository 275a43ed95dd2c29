use std::sync::Arc;

use linkarr_config::ConfigStore;
use linkarr_core::{AutoScanner, EventBus, IngestionEngine};

/// Shared server state: the collaborators constructed once at startup and
/// threaded through every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ConfigStore>,
    pub bus: Arc<EventBus>,
    pub engine: Arc<IngestionEngine>,
    pub auto_scanner: Arc<AutoScanner>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
