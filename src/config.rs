// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! A `.env` file is honored for local development. Without a GCP project the
//! remote store runs in-process, which is only useful for development.

use std::env;
use std::time::Duration;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path of the local SQLite database
    pub db_path: String,
    /// Path of the device-local encryption key
    pub key_path: String,
    /// GCP project hosting Firestore (None = in-memory remote)
    pub gcp_project_id: Option<String>,
    /// Port for the local bridge API
    pub port: u16,
    /// UI shell origin allowed by CORS
    pub frontend_url: String,

    // --- Sync timing ---
    /// Delay between sign-in and the first reconciliation
    pub sync_settle: Duration,
    /// How long the app may sit with no visible screen before it counts as backgrounded
    pub lifecycle_debounce: Duration,
    /// Period of the foreground reconciliation sweep
    pub sync_interval: Duration,
    /// Upper bound on any single remote store call
    pub remote_timeout: Duration,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            db_path: ":memory:".to_string(),
            key_path: "test.key".to_string(),
            gcp_project_id: None,
            port: 8080,
            frontend_url: "http://localhost:5173".to_string(),
            sync_settle: Duration::from_secs(3),
            lifecycle_debounce: Duration::from_millis(1500),
            sync_interval: Duration::from_secs(300),
            remote_timeout: Duration::from_secs(15),
        }
    }
}

impl Config {
    /// Config used by tests; never touches the environment.
    pub fn test_default() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            db_path: env::var("MARQUEE_DB_PATH").unwrap_or_else(|_| "marquee.db".to_string()),
            key_path: env::var("MARQUEE_KEY_PATH").unwrap_or_else(|_| "marquee.key".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            port: parse_var("PORT", 8080)?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            sync_settle: Duration::from_secs(parse_var("SYNC_SETTLE_SECS", 3)?),
            lifecycle_debounce: Duration::from_millis(parse_var("LIFECYCLE_DEBOUNCE_MS", 1500)?),
            sync_interval: Duration::from_secs(parse_var("SYNC_INTERVAL_SECS", 300)?),
            remote_timeout: Duration::from_secs(parse_var("REMOTE_TIMEOUT_SECS", 15)?),
        })
    }
}

/// Read a numeric variable, falling back to `default` when unset.
fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1:?}")]
    Invalid(&'static str, String),
}
