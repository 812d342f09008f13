use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Probe the remote store and report whether flushes can currently succeed.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_play_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "remote store health check failed");
            }
        }
        Err(_) => warn!("remote store unavailable (degraded mode)"),
    }

    HealthResponse::from_degraded(state.is_degraded().await)
}
