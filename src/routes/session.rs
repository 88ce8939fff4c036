// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sign-in/sign-out and app lifecycle events from the UI shell.

use crate::error::{AppError, Result};
use crate::models::Identity;
use crate::services::SessionState;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/session/sign-in", post(sign_in))
        .route("/api/session/sign-out", post(sign_out))
        .route("/api/lifecycle/{event}", post(lifecycle_event))
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user_id: String,
    pub session: SessionState,
}

/// Sign-in completed by the identity provider.
async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(identity): Json<Identity>,
) -> Result<Json<SessionResponse>> {
    // Background work continues after the response
    let _tasks = state.accounts.sign_in(&identity).await?;

    Ok(Json(SessionResponse {
        session: state.sessions.state(&identity.user_id),
        user_id: identity.user_id,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SignOutRequest {
    pub user_id: String,
}

async fn sign_out(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignOutRequest>,
) -> Result<Json<SessionResponse>> {
    if req.user_id.trim().is_empty() {
        return Err(AppError::BadRequest("user_id must not be empty".to_string()));
    }
    state.accounts.sign_out(&req.user_id)?;

    Ok(Json(SessionResponse {
        session: state.sessions.state(&req.user_id),
        user_id: req.user_id,
    }))
}

/// Lifecycle signals the shell can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Foreground,
    Background,
    ScreenStarted,
    ScreenStopped,
    ScreenResumed,
}

impl FromStr for LifecycleEvent {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "foreground" => Ok(Self::Foreground),
            "background" => Ok(Self::Background),
            "screen-started" => Ok(Self::ScreenStarted),
            "screen-stopped" => Ok(Self::ScreenStopped),
            "screen-resumed" => Ok(Self::ScreenResumed),
            other => Err(AppError::BadRequest(format!(
                "unknown lifecycle event: {other}"
            ))),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LifecycleResponse {
    pub foreground: bool,
    pub current_user: Option<String>,
}

/// Lifecycle edges are acknowledged immediately; their effects run in the
/// background.
async fn lifecycle_event(
    State(state): State<Arc<AppState>>,
    Path(event): Path<String>,
) -> Result<(StatusCode, Json<LifecycleResponse>)> {
    let event: LifecycleEvent = event.parse()?;
    tracing::debug!(?event, "Lifecycle event");

    let lifecycle = &state.lifecycle;
    match event {
        LifecycleEvent::Foreground => {
            lifecycle.on_foreground()?;
        }
        LifecycleEvent::Background => {
            lifecycle.on_background()?;
        }
        LifecycleEvent::ScreenStarted => {
            lifecycle.screen_started()?;
        }
        LifecycleEvent::ScreenStopped => {
            lifecycle.screen_stopped();
        }
        LifecycleEvent::ScreenResumed => {
            lifecycle.screen_resumed();
        }
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(LifecycleResponse {
            foreground: lifecycle.is_foreground(),
            current_user: lifecycle.current_user(),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lifecycle_event() {
        assert_eq!(
            "screen-stopped".parse::<LifecycleEvent>().unwrap(),
            LifecycleEvent::ScreenStopped
        );
        assert!(matches!(
            "destroyed".parse::<LifecycleEvent>(),
            Err(AppError::BadRequest(_))
        ));
    }
}
