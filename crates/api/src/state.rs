use std::sync::Arc;

use crate::config::ServerConfig;
use crate::service::JourneyService;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone: everything sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Journey orchestration over the configured store and catalog.
    pub journeys: Arc<JourneyService>,
}
