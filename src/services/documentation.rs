use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the play sync service.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::plays::cached_play,
        crate::routes::plays::possibly_stale_play,
        crate::routes::plays::write_play,
        crate::routes::plays::flush_play,
        crate::routes::plays::dirty_state,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::play::CacheStatus,
            crate::dto::play::PlayLookupResponse,
            crate::dto::play::WritePlayRequest,
            crate::dto::play::WritePlayResponse,
            crate::dto::play::DirtyResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "plays", description = "Local-first play cache and remote sync"),
    )
)]
pub struct ApiDoc;
