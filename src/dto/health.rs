use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" when the remote store is reachable, "degraded" otherwise.
    pub status: String,
    /// Whether local writes can currently be flushed.
    pub remote_available: bool,
}

impl HealthResponse {
    pub fn from_degraded(degraded: bool) -> Self {
        Self {
            status: if degraded { "degraded" } else { "ok" }.to_string(),
            remote_available: !degraded,
        }
    }
}
