use std::sync::Arc;

use crate::config::WsConfig;
use crate::ws::hub::Hub;

/// Shared application state passed to all handlers via axum State extractor.
///
/// The hub is constructed once at startup; any component that needs to
/// publish realtime events receives this state (or a clone of the hub
/// `Arc`) by injection rather than through a global.
#[derive(Clone)]
pub struct AppState {
    /// Connection registry and event fan-out point.
    pub hub: Arc<Hub>,
    /// Transport tuning from the [ws] config section.
    pub ws: WsConfig,
}
