// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP route handlers for the local bridge API.

pub mod api;
pub mod session;

use crate::AppState;
use axum::http::{header, Method, Uri};
use axum::{middleware, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub build_id: String,
    /// Whether a UI screen is currently visible
    pub foreground: bool,
}

/// Health check response
async fn health_check(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> Json<HealthResponse> {
    let build_id = option_env!("BUILD_ID").unwrap_or("unknown").to_string();
    Json(HealthResponse {
        status: "ok".to_string(),
        build_id,
        foreground: state.lifecycle.is_foreground(),
    })
}

/// Whether a browser `Origin` may call the bridge: the configured UI shell,
/// or plain-http localhost on any port.
pub fn is_allowed_origin(origin: &str, frontend_url: &str) -> bool {
    if origin == frontend_url {
        return true;
    }
    let Ok(uri) = origin.parse::<Uri>() else {
        return false;
    };
    uri.scheme_str() == Some("http")
        && matches!(uri.host(), Some("localhost" | "127.0.0.1"))
        && uri.authority().is_some_and(|a| !a.as_str().contains('@'))
        && uri.path_and_query().map_or(true, |p| matches!(p.as_str(), "" | "/"))
}

/// Build the complete router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS layer - allow requests from the UI shell and localhost (for dev)
    let frontend_url = state.config.frontend_url.clone();
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::AllowOrigin::predicate(
            move |origin: &axum::http::HeaderValue, _request_parts: &axum::http::request::Parts| {
                is_allowed_origin(origin.to_str().unwrap_or(""), &frontend_url)
            },
        ))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    Router::new()
        .route("/health", get(health_check))
        .merge(session::routes())
        .merge(api::routes())
        .layer(middleware::from_fn(
            crate::middleware::security::add_security_headers,
        ))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRONTEND: &str = "https://app.example.com";

    #[test]
    fn test_localhost_origins_allowed() {
        assert!(is_allowed_origin("http://localhost", FRONTEND));
        assert!(is_allowed_origin("http://localhost:5173", FRONTEND));
        assert!(is_allowed_origin("http://127.0.0.1:8080", FRONTEND));
        assert!(is_allowed_origin(FRONTEND, FRONTEND));
    }

    #[test]
    fn test_lookalike_origins_rejected() {
        assert!(!is_allowed_origin("http://localhost.attacker.example", FRONTEND));
        assert!(!is_allowed_origin("http://127.0.0.1.nip.io", FRONTEND));
        assert!(!is_allowed_origin("http://localhost@attacker.example", FRONTEND));
        assert!(!is_allowed_origin("https://localhost", FRONTEND));
        assert!(!is_allowed_origin("https://app.example.com.evil", FRONTEND));
        assert!(!is_allowed_origin("null", FRONTEND));
        assert!(!is_allowed_origin("", FRONTEND));
    }
}
