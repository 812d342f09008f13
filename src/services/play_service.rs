use tracing::debug;

use crate::{
    dao::models::PlayRecord,
    dto::play::{DirtyResponse, PlayLookupResponse, WritePlayRequest, WritePlayResponse},
    error::ServiceError,
    state::{CachedPlay, Identity, SharedState},
};

fn ensure_puzzle_id(puzzle_id: &str) -> Result<(), ServiceError> {
    if puzzle_id.trim().is_empty() {
        return Err(ServiceError::InvalidInput("puzzle id must not be empty".into()));
    }
    Ok(())
}

fn require_identity(identity: Option<Identity>) -> Result<Identity, ServiceError> {
    identity.ok_or_else(|| ServiceError::InvalidInput("a signed-in user is required".into()))
}

/// Look up the cached play without contacting the remote store.
pub fn cached_play(
    state: &SharedState,
    identity: Option<Identity>,
    puzzle_id: String,
) -> Result<PlayLookupResponse, ServiceError> {
    ensure_puzzle_id(&puzzle_id)?;
    let cached = state.plays().get_cached(identity.as_ref(), &puzzle_id)?;
    Ok(PlayLookupResponse::from_cached(puzzle_id, cached))
}

/// Resolve a play from the cache, falling back to the remote store.
///
/// Only a cache miss for a signed-in user needs the remote store, so degraded
/// mode is reported for that case alone.
pub async fn possibly_stale_play(
    state: &SharedState,
    identity: Option<Identity>,
    puzzle_id: String,
) -> Result<PlayLookupResponse, ServiceError> {
    ensure_puzzle_id(&puzzle_id)?;
    let plays = state.plays();
    let play = match state.play_store().await {
        Some(store) => {
            plays
                .get_possibly_stale(store.as_ref(), identity.as_ref(), &puzzle_id)
                .await?
        }
        None => {
            let cached = plays.get_cached(identity.as_ref(), &puzzle_id)?;
            match (cached, &identity) {
                (CachedPlay::Unknown, Some(_)) => {
                    return Err(ServiceError::Degraded);
                }
                (cached, _) => cached.into_play(),
            }
        }
    };
    Ok(PlayLookupResponse::from_resolved(puzzle_id, play))
}

/// Record a play locally; the remote store is only touched by a flush.
pub fn write_play(
    state: &SharedState,
    puzzle_id: String,
    request: WritePlayRequest,
) -> Result<WritePlayResponse, ServiceError> {
    ensure_puzzle_id(&puzzle_id)?;
    let identity = request
        .user
        .filter(|uid| !uid.is_empty())
        .map(Identity::new);
    let play: Option<PlayRecord> = request.play;

    let outcome = state
        .plays()
        .write(identity.as_ref(), &puzzle_id, play, request.clean)?;
    let dirty = identity
        .as_ref()
        .is_some_and(|identity| state.plays().is_dirty(identity, &puzzle_id));
    debug!(%puzzle_id, ?outcome, dirty, "play written");
    Ok(WritePlayResponse::from_outcome(outcome, dirty))
}

/// Push a dirty play to the remote store.
pub async fn flush_play(
    state: &SharedState,
    identity: Option<Identity>,
    puzzle_id: String,
) -> Result<DirtyResponse, ServiceError> {
    ensure_puzzle_id(&puzzle_id)?;
    let identity = require_identity(identity)?;
    let store = state.require_play_store().await?;
    state
        .plays()
        .flush(store.as_ref(), &identity, &puzzle_id)
        .await?;
    let dirty = state.plays().is_dirty(&identity, &puzzle_id);
    Ok(DirtyResponse { puzzle_id, dirty })
}

/// Report whether a play awaits a flush.
pub fn dirty_state(
    state: &SharedState,
    identity: Option<Identity>,
    puzzle_id: String,
) -> Result<DirtyResponse, ServiceError> {
    ensure_puzzle_id(&puzzle_id)?;
    let identity = require_identity(identity)?;
    let dirty = state.plays().is_dirty(&identity, &puzzle_id);
    Ok(DirtyResponse { puzzle_id, dirty })
}
