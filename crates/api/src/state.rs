use std::sync::Arc;

use genbroker_pipeline::Broker;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; the broker holds its collaborators behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Submission and status lookup.
    pub broker: Broker,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}
