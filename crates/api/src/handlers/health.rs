use axum::extract::State;
use axum::Json;
use genbroker_core::provider::ProviderId;
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok` when the store answers, `degraded` otherwise.
    pub status: &'static str,
    pub version: &'static str,
    pub store_healthy: bool,
    /// Providers with credentials configured.
    pub providers: Vec<ProviderId>,
    /// Free slots in the job queue.
    pub queue_available: usize,
}

/// GET /health -- service, store, and provider health.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_healthy = match state.broker.store_health().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Store health check failed");
            false
        }
    };

    Json(HealthResponse {
        status: if store_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        store_healthy,
        providers: state.broker.orchestrator().providers().configured(),
        queue_available: state.broker.queue().available(),
    })
}
