// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user API routes: favorites, sync and profile.

use crate::error::Result;
use crate::models::{Movie, Profile, ProfilePatch};
use crate::services::{AddOutcome, SyncReport};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/users/{id}/favorites",
            get(list_favorites).post(add_favorite),
        )
        .route(
            "/api/users/{id}/favorites/{movie_id}",
            delete(remove_favorite),
        )
        .route("/api/users/{id}/sync", post(sync_favorites))
        .route("/api/users/{id}/profile", get(get_profile).put(update_profile))
}

// ─── Favorites ───────────────────────────────────────────────

async fn list_favorites(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Movie>>> {
    Ok(Json(state.favorites.list(&user_id)?))
}

#[derive(Debug, Serialize)]
pub struct AddFavoriteResponse {
    pub outcome: AddOutcome,
}

/// Add a favorite. 201 if it was new, 200 if it was already there.
async fn add_favorite(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(movie): Json<Movie>,
) -> Result<(StatusCode, Json<AddFavoriteResponse>)> {
    let (outcome, _task) = state.favorites.add(&user_id, movie)?;
    let status = match outcome {
        AddOutcome::Added => StatusCode::CREATED,
        AddOutcome::AlreadyPresent => StatusCode::OK,
    };
    Ok((status, Json(AddFavoriteResponse { outcome })))
}

async fn remove_favorite(
    State(state): State<Arc<AppState>>,
    Path((user_id, movie_id)): Path<(String, String)>,
) -> Result<StatusCode> {
    state.favorites.remove(&user_id, &movie_id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Sync ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    /// False if the remote could not be reached; nothing was changed
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<SyncReport>,
}

/// Run a reconciliation now.
async fn sync_favorites(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<(StatusCode, Json<SyncResponse>)> {
    match state.sync.reconcile(&user_id).await {
        Ok(report) => Ok((
            StatusCode::OK,
            Json(SyncResponse {
                completed: true,
                report: Some(report),
            }),
        )),
        Err(e) if e.is_remote_unavailable() => {
            tracing::info!(user_id, error = %e, "Sync deferred, remote unavailable");
            Ok((
                StatusCode::ACCEPTED,
                Json(SyncResponse {
                    completed: false,
                    report: None,
                }),
            ))
        }
        Err(e) => Err(e),
    }
}

// ─── Profile ─────────────────────────────────────────────────

async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Profile>> {
    Ok(Json(state.profiles.get_profile(&user_id)?))
}

/// Partial profile update; omitted fields are left unchanged.
async fn update_profile(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(patch): Json<ProfilePatch>,
) -> Result<Json<Profile>> {
    state.profiles.update_profile(&user_id, patch)?;
    Ok(Json(state.profiles.get_profile(&user_id)?))
}
