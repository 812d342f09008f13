/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Play cache operations exposed to HTTP handlers.
pub mod play_service;
/// Remote store connection supervisor toggling degraded mode.
pub mod storage_supervisor;
