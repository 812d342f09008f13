use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    routing::{get, post},
};

use crate::{
    dto::play::{DirtyResponse, PlayLookupResponse, UserQuery, WritePlayRequest, WritePlayResponse},
    error::AppError,
    services::play_service,
    state::SharedState,
};

/// Routes reading, writing and flushing cached plays.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/plays/{puzzle_id}", get(possibly_stale_play).put(write_play))
        .route("/plays/{puzzle_id}/cached", get(cached_play))
        .route("/plays/{puzzle_id}/flush", post(flush_play))
        .route("/plays/{puzzle_id}/dirty", get(dirty_state))
}

/// Look up a play in the local cache only.
#[utoipa::path(
    get,
    path = "/plays/{puzzle_id}/cached",
    tag = "plays",
    params(
        ("puzzle_id" = String, Path, description = "Puzzle the play belongs to"),
        UserQuery
    ),
    responses(
        (status = 200, description = "Cache lookup result", body = PlayLookupResponse),
        (status = 500, description = "Local cache is corrupt")
    )
)]
pub async fn cached_play(
    State(state): State<SharedState>,
    Path(puzzle_id): Path<String>,
    Query(query): Query<UserQuery>,
) -> Result<Json<PlayLookupResponse>, AppError> {
    let found = play_service::cached_play(&state, query.identity(), puzzle_id)?;
    Ok(Json(found))
}

/// Resolve a play from the cache, reading through to the remote store on a miss.
#[utoipa::path(
    get,
    path = "/plays/{puzzle_id}",
    tag = "plays",
    params(
        ("puzzle_id" = String, Path, description = "Puzzle the play belongs to"),
        UserQuery
    ),
    responses(
        (status = 200, description = "Play, or null when none exists", body = PlayLookupResponse),
        (status = 503, description = "Remote store unavailable")
    )
)]
pub async fn possibly_stale_play(
    State(state): State<SharedState>,
    Path(puzzle_id): Path<String>,
    Query(query): Query<UserQuery>,
) -> Result<Json<PlayLookupResponse>, AppError> {
    let found = play_service::possibly_stale_play(&state, query.identity(), puzzle_id).await?;
    Ok(Json(found))
}

/// Record a play (or a confirmed absence) in the local cache.
#[utoipa::path(
    put,
    path = "/plays/{puzzle_id}",
    tag = "plays",
    params(("puzzle_id" = String, Path, description = "Puzzle the play belongs to")),
    request_body = WritePlayRequest,
    responses(
        (status = 200, description = "Write accepted", body = WritePlayResponse),
        (status = 400, description = "Malformed body or invalid play")
    )
)]
pub async fn write_play(
    State(state): State<SharedState>,
    Path(puzzle_id): Path<String>,
    payload: Result<Json<WritePlayRequest>, JsonRejection>,
) -> Result<Json<WritePlayResponse>, AppError> {
    let Json(payload) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    let written = play_service::write_play(&state, puzzle_id, payload)?;
    Ok(Json(written))
}

/// Push a dirty play to the remote store.
#[utoipa::path(
    post,
    path = "/plays/{puzzle_id}/flush",
    tag = "plays",
    params(
        ("puzzle_id" = String, Path, description = "Puzzle the play belongs to"),
        UserQuery
    ),
    responses(
        (status = 200, description = "Play flushed", body = DirtyResponse),
        (status = 409, description = "Play is clean or not cached"),
        (status = 503, description = "Remote store unavailable")
    )
)]
pub async fn flush_play(
    State(state): State<SharedState>,
    Path(puzzle_id): Path<String>,
    Query(query): Query<UserQuery>,
) -> Result<Json<DirtyResponse>, AppError> {
    let flushed = play_service::flush_play(&state, query.identity(), puzzle_id).await?;
    Ok(Json(flushed))
}

/// Report whether a play awaits a flush.
#[utoipa::path(
    get,
    path = "/plays/{puzzle_id}/dirty",
    tag = "plays",
    params(
        ("puzzle_id" = String, Path, description = "Puzzle the play belongs to"),
        UserQuery
    ),
    responses((status = 200, description = "Dirty flag", body = DirtyResponse))
)]
pub async fn dirty_state(
    State(state): State<SharedState>,
    Path(puzzle_id): Path<String>,
    Query(query): Query<UserQuery>,
) -> Result<Json<DirtyResponse>, AppError> {
    let dirty = play_service::dirty_state(&state, query.identity(), puzzle_id)?;
    Ok(Json(dirty))
}
