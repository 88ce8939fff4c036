// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.
//!
//! The variants follow how each failure is recovered:
//! - `LocalStore` fails the triggering action, the process keeps running.
//! - `RemoteUnavailable` is logged and swallowed by fire-and-forget paths.
//! - `Crypto` is turned into "value unavailable" by readers.
//! - `NotFound` is a no-op wherever presence was only assumed.

use crate::services::crypto::CryptoError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Local store error: {0}")]
    LocalStore(String),

    #[error("Remote store unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Encryption error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// True for connectivity/auth failures of the remote store.
    ///
    /// These never reach the user; local state stays authoritative until the
    /// next successful sync.
    pub fn is_remote_unavailable(&self) -> bool {
        matches!(self, AppError::RemoteUnavailable(_))
    }

    /// True when the error only means "the thing was not there".
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        AppError::LocalStore(e.to_string())
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::LocalStore(msg) => {
                tracing::error!(error = %msg, "Local store error");
                (StatusCode::INTERNAL_SERVER_ERROR, "could_not_save", None)
            }
            AppError::RemoteUnavailable(msg) => {
                tracing::warn!(error = %msg, "Remote store unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, "remote_unavailable", None)
            }
            AppError::Crypto(err) => {
                tracing::warn!(error = %err, "Encryption error");
                (StatusCode::INTERNAL_SERVER_ERROR, "encryption_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers and services
pub type Result<T> = std::result::Result<T, AppError>;
