// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Explicit favorite add/remove.
//!
//! The local store is written first and decides the outcome; the remote
//! copy follows in the background.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::db::{LocalStore, SharedRemote};
use crate::error::{AppError, Result};
use crate::models::Movie;
use crate::services::tasks::{spawn_remote, RemoteTask};

/// Outcome of adding a favorite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddOutcome {
    Added,
    AlreadyPresent,
}

#[derive(Clone)]
pub struct FavoritesService {
    local: Arc<LocalStore>,
    remote: SharedRemote,
}

impl FavoritesService {
    pub fn new(local: Arc<LocalStore>, remote: SharedRemote) -> Self {
        Self { local, remote }
    }

    pub fn list(&self, user_id: &str) -> Result<Vec<Movie>> {
        self.local.get_favorites(user_id)
    }

    /// Add a favorite locally and upload it.
    ///
    /// Adding a movie that is already a favorite changes nothing and starts
    /// no remote write.
    pub fn add(&self, user_id: &str, movie: Movie) -> Result<(AddOutcome, Option<RemoteTask>)> {
        if movie.id.trim().is_empty() {
            return Err(AppError::BadRequest("movie id must not be empty".to_string()));
        }

        if !self.local.add_favorite(&movie, user_id)? {
            return Ok((AddOutcome::AlreadyPresent, None));
        }

        tracing::info!(user_id, movie_id = %movie.id, "Favorite added");

        let remote = self.remote.clone();
        let uid = user_id.to_string();
        let task = spawn_remote("set_favorite", user_id.to_string(), async move {
            remote.set_favorite(&uid, &movie).await
        });
        Ok((AddOutcome::Added, Some(task)))
    }

    /// Remove a favorite locally and from the remote.
    ///
    /// The remote deletion stays pending until it succeeds, here or in a
    /// later reconcile. Returns whether a local favorite was removed.
    pub fn remove(&self, user_id: &str, movie_id: &str) -> Result<(bool, RemoteTask)> {
        let removed = self.local.remove_favorite(movie_id, user_id)?;
        self.local
            .mark_pending_deletion(movie_id, user_id, Utc::now())?;

        if removed {
            tracing::info!(user_id, movie_id, "Favorite removed");
        }

        let local = self.local.clone();
        let remote = self.remote.clone();
        let uid = user_id.to_string();
        let mid = movie_id.to_string();
        let task = spawn_remote("delete_favorite", user_id.to_string(), async move {
            remote.delete_favorite(&uid, &mid).await?;
            local.clear_pending_deletion(&mid, &uid)
        });
        Ok((removed, task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryRemote, RemoteStore};

    fn service() -> (FavoritesService, Arc<LocalStore>, Arc<MemoryRemote>) {
        let local = Arc::new(LocalStore::open_in_memory().unwrap());
        let remote = Arc::new(MemoryRemote::new());
        (FavoritesService::new(local.clone(), remote.clone()), local, remote)
    }

    #[tokio::test]
    async fn test_add_twice_uploads_once() {
        let (service, _, remote) = service();

        let (outcome, task) = service.add("u1", Movie::new("m1", "Alien")).unwrap();
        assert_eq!(outcome, AddOutcome::Added);
        task.unwrap().await.unwrap();

        let (outcome, task) = service.add("u1", Movie::new("m1", "Alien")).unwrap();
        assert_eq!(outcome, AddOutcome::AlreadyPresent);
        assert!(task.is_none());

        assert_eq!(remote.get_favorites("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_movie_id_rejected() {
        let (service, _, _) = service();
        assert!(matches!(
            service.add("u1", Movie::new("  ", "Nothing")),
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_clears_pending_once_remote_confirms() {
        let (service, local, remote) = service();
        let (_, task) = service.add("u1", Movie::new("m1", "Alien")).unwrap();
        task.unwrap().await.unwrap();

        let (removed, task) = service.remove("u1", "m1").unwrap();
        assert!(removed);
        task.await.unwrap();

        assert!(remote.get_favorites("u1").await.unwrap().is_empty());
        assert!(local.pending_deletions("u1").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_offline_stays_pending() {
        let (service, local, remote) = service();
        local.add_favorite(&Movie::new("m1", "Alien"), "u1").unwrap();
        remote.set_online(false);

        let (removed, task) = service.remove("u1", "m1").unwrap();
        assert!(removed);
        task.await.unwrap();

        assert_eq!(local.pending_deletions("u1").unwrap(), vec!["m1".to_string()]);
    }
}
