// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fire-and-forget remote writes.
//!
//! Remote store writes never block the caller and never fail the action
//! that triggered them. Each one runs as its own tokio task; the handle is
//! returned so callers (mostly tests) can wait for it if they care.

use std::future::Future;

use tokio::task::JoinHandle;

use crate::error::Result;

/// Handle of a spawned remote write. Dropping it does not cancel the write.
pub type RemoteTask = JoinHandle<()>;

/// Wait for a spawned task. Returns false, after logging, if it panicked or
/// was cancelled.
pub async fn join_logged(operation: &'static str, task: JoinHandle<()>) -> bool {
    match task.await {
        Ok(()) => true,
        Err(e) if e.is_cancelled() => {
            tracing::debug!(operation, "Task cancelled");
            false
        }
        Err(e) => {
            tracing::error!(operation, error = %e, "Task panicked");
            false
        }
    }
}

/// Spawn `fut` and log its outcome.
///
/// Connectivity failures are expected (the local store stays authoritative
/// until the next reconciliation) and logged at warn; anything else is an
/// error.
pub fn spawn_remote<T, F>(operation: &'static str, user_id: String, fut: F) -> RemoteTask
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(async move {
        match fut.await {
            Ok(_) => tracing::debug!(user_id, operation, "Remote write completed"),
            Err(e) if e.is_remote_unavailable() => {
                tracing::warn!(user_id, operation, error = %e, "Remote write skipped, will sync later")
            }
            Err(e) => tracing::error!(user_id, operation, error = %e, "Remote write failed"),
        }
    })
}
