// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Favorites reconciliation between the local and the remote store.
//!
//! Reconciliation is a union merge: whatever one side has and the other
//! lacks is copied over. Absence never implies deletion. The only deletions
//! that reach the remote are explicit removals, which are recorded locally
//! until the remote confirms them so a reconcile cannot resurrect them.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;

use dashmap::DashSet;
use futures_util::{stream, StreamExt};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::db::{LocalStore, SharedRemote};
use crate::error::{AppError, Result};
use crate::models::Movie;

const MAX_CONCURRENT_REMOTE_OPS: usize = 8;

/// What one reconciliation did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Local favorites written to the remote
    pub uploaded: usize,
    /// Remote favorites inserted locally
    pub downloaded: usize,
    /// Uploads that failed (retried on the next reconcile)
    pub upload_failures: usize,
    /// Pending remote deletions confirmed in this pass
    pub deletions_confirmed: usize,
}

/// Bidirectional favorites sync.
#[derive(Clone)]
pub struct FavoritesSyncEngine {
    local: Arc<LocalStore>,
    remote: SharedRemote,
    /// Users with a background reconcile running
    in_flight: Arc<DashSet<String>>,
}

impl FavoritesSyncEngine {
    pub fn new(local: Arc<LocalStore>, remote: SharedRemote) -> Self {
        Self {
            local,
            remote,
            in_flight: Arc::new(DashSet::new()),
        }
    }

    /// Reconcile one user's favorites.
    ///
    /// Fails with `RemoteUnavailable` if the remote list cannot be read, in
    /// which case nothing was changed. Individual upload failures are counted
    /// in the report, not returned.
    pub async fn reconcile(&self, user_id: &str) -> Result<SyncReport> {
        // 1. Read both sides; the local read is quick and does not suspend
        let local_read = async {
            Ok::<_, AppError>((
                self.local.get_favorites(user_id)?,
                self.local.pending_deletions(user_id)?,
            ))
        };
        let (local_result, remote_result) =
            tokio::join!(local_read, self.remote.get_favorites(user_id));

        let (local_movies, pending) = local_result?;
        let remote_movies = remote_result?;

        let mut report = SyncReport::default();

        // 2. Finish deletions the remote has not confirmed yet
        if !pending.is_empty() {
            report.deletions_confirmed = self.retry_pending_deletions(user_id, &pending).await?;
        }
        let pending: HashSet<&str> = pending.iter().map(String::as_str).collect();

        let local_ids: HashSet<&str> = local_movies.iter().map(|m| m.id.as_str()).collect();
        let remote_ids: HashSet<&str> = remote_movies.iter().map(|m| m.id.as_str()).collect();

        // 3. Upload what only the local side has
        let to_upload: Vec<Movie> = local_movies
            .iter()
            .filter(|m| !remote_ids.contains(m.id.as_str()))
            .cloned()
            .collect();

        let local = self.local.clone();
        let remote = self.remote.clone();
        let uid = user_id.to_string();
        let results: Vec<Result<bool>> = stream::iter(to_upload)
            .map(move |movie| upload_favorite(local.clone(), remote.clone(), uid.clone(), movie))
            .buffer_unordered(MAX_CONCURRENT_REMOTE_OPS)
            .collect()
            .await;

        for result in results {
            match result {
                Ok(true) => report.uploaded += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(user_id, error = %e, "Favorite upload failed");
                    report.upload_failures += 1;
                }
            }
        }

        // 4. Insert what only the remote side has, skipping removals in flight
        for movie in remote_movies.iter().filter(|m| {
            !local_ids.contains(m.id.as_str()) && !pending.contains(m.id.as_str())
        }) {
            if self.local.add_favorite(movie, user_id)? {
                report.downloaded += 1;
            }
        }

        tracing::info!(
            user_id,
            uploaded = report.uploaded,
            downloaded = report.downloaded,
            upload_failures = report.upload_failures,
            deletions_confirmed = report.deletions_confirmed,
            "Favorites reconciled"
        );

        Ok(report)
    }

    /// Start a reconcile in the background unless one is already running
    /// for this user. Returns `None` when skipped.
    pub fn reconcile_in_background(&self, user_id: &str) -> Option<JoinHandle<()>> {
        if !self.in_flight.insert(user_id.to_string()) {
            tracing::debug!(user_id, "Reconcile already in flight, skipping");
            return None;
        }

        let guard = InFlight {
            users: self.in_flight.clone(),
            user_id: user_id.to_string(),
        };
        let engine = self.clone();
        Some(tokio::spawn(async move {
            let user_id = guard.user_id.as_str();
            if let Err(e) = engine.reconcile(user_id).await {
                if e.is_remote_unavailable() {
                    tracing::warn!(user_id, error = %e, "Reconcile deferred, remote unavailable");
                } else {
                    tracing::error!(user_id, error = %e, "Reconcile failed");
                }
            }
        }))
    }

    /// Delete favorites from the remote that were removed locally while the
    /// remote was unreachable. Returns how many were confirmed.
    async fn retry_pending_deletions(&self, user_id: &str, pending: &[String]) -> Result<usize> {
        let remote = self.remote.clone();
        let uid = user_id.to_string();
        let results: Vec<(String, Result<()>)> = stream::iter(pending.to_vec())
            .map(move |movie_id| {
                let remote = remote.clone();
                let uid = uid.clone();
                async move {
                    let result = remote.delete_favorite(&uid, &movie_id).await;
                    (movie_id, result)
                }
            })
            .buffer_unordered(MAX_CONCURRENT_REMOTE_OPS)
            .collect()
            .await;

        let mut confirmed = 0;
        for (movie_id, result) in results {
            match result {
                Ok(()) => {
                    self.local.clear_pending_deletion(&movie_id, user_id)?;
                    confirmed += 1;
                }
                Err(e) => {
                    tracing::warn!(user_id, movie_id, error = %e, "Pending favorite deletion still failing")
                }
            }
        }
        Ok(confirmed)
    }
}

/// Keeps a user marked as reconciling until the task ends, however it ends.
struct InFlight {
    users: Arc<DashSet<String>>,
    user_id: String,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.users.remove(&self.user_id);
    }
}

/// Upload one local-only favorite. Returns false if it was skipped.
///
/// The local snapshot may be stale by the time the upload runs: a favorite
/// removed in the meantime is not uploaded, and one removed while the upload
/// was in flight is deleted again from the remote.
async fn upload_favorite(
    local: Arc<LocalStore>,
    remote: SharedRemote,
    user_id: String,
    movie: Movie,
) -> Result<bool> {
    if !still_wanted(&local, &user_id, &movie.id)? {
        tracing::debug!(user_id, movie_id = %movie.id, "Favorite removed during reconcile, not uploading");
        return Ok(false);
    }

    remote.set_favorite(&user_id, &movie).await?;

    if !still_wanted(&local, &user_id, &movie.id)? {
        tracing::info!(user_id, movie_id = %movie.id, "Favorite removed during upload, deleting remote copy");
        local.mark_pending_deletion(&movie.id, &user_id, Utc::now())?;
        remote.delete_favorite(&user_id, &movie.id).await?;
        local.clear_pending_deletion(&movie.id, &user_id)?;
        return Ok(false);
    }
    Ok(true)
}

fn still_wanted(local: &LocalStore, user_id: &str, movie_id: &str) -> Result<bool> {
    Ok(local.favorite_exists(movie_id, user_id)?
        && !local.pending_deletions(user_id)?.iter().any(|id| id == movie_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryRemote, RemoteStore};

    fn engine() -> (FavoritesSyncEngine, Arc<LocalStore>, Arc<MemoryRemote>) {
        let local = Arc::new(LocalStore::open_in_memory().unwrap());
        let remote = Arc::new(MemoryRemote::new());
        let engine = FavoritesSyncEngine::new(local.clone(), remote.clone());
        (engine, local, remote)
    }

    #[tokio::test]
    async fn test_reconcile_empty_user() {
        let (engine, _, _) = engine();
        assert_eq!(engine.reconcile("nobody").await.unwrap(), SyncReport::default());
    }

    #[tokio::test]
    async fn test_offline_reconcile_changes_nothing() {
        let (engine, local, remote) = engine();
        local.add_favorite(&Movie::new("m1", "Alien"), "u1").unwrap();
        remote.set_online(false);

        let err = engine.reconcile("u1").await.unwrap_err();
        assert!(err.is_remote_unavailable());

        remote.set_online(true);
        assert!(remote.get_favorites("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pending_deletion_is_not_resurrected() {
        let (engine, local, remote) = engine();
        let movie = Movie::new("m1", "Alien");
        remote.set_favorite("u1", &movie).await.unwrap();
        local
            .mark_pending_deletion("m1", "u1", chrono::Utc::now())
            .unwrap();

        let report = engine.reconcile("u1").await.unwrap();

        assert_eq!(report.deletions_confirmed, 1);
        assert_eq!(report.downloaded, 0);
        assert!(local.get_favorites("u1").unwrap().is_empty());
        assert!(remote.get_favorites("u1").await.unwrap().is_empty());
        assert!(local.pending_deletions("u1").unwrap().is_empty());
    }
}
