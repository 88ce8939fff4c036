// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process remote store.
//!
//! Stands in for Firestore when no GCP project is configured and in tests.
//! Connectivity can be switched off (`set_online(false)`) or calls can be
//! made to hang forever (`set_stalled(true)`).

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::RemoteStore;
use crate::error::{AppError, Result};
use crate::models::activity_log::{append_entry, close_last_open};
use crate::models::{ActivityLogEntry, AppendOutcome, CloseOutcome, Movie, User, UserDocument};

#[derive(Default)]
struct Documents {
    users: HashMap<String, UserDocument>,
    /// user id -> movie id -> movie
    favorites: HashMap<String, BTreeMap<String, Movie>>,
}

/// Remote store kept in memory.
pub struct MemoryRemote {
    docs: RwLock<Documents>,
    online: AtomicBool,
    stalled: AtomicBool,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(Documents::default()),
            online: AtomicBool::new(true),
            stalled: AtomicBool::new(false),
        }
    }

    /// Simulate losing or regaining connectivity.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Make subsequent calls hang forever, as a dead connection would.
    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    async fn check_reachable(&self) -> Result<()> {
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if !self.online.load(Ordering::SeqCst) {
            return Err(AppError::RemoteUnavailable("remote is offline".to_string()));
        }
        Ok(())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Documents>> {
        self.docs
            .read()
            .map_err(|_| AppError::Internal(anyhow::anyhow!("memory remote lock poisoned")))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Documents>> {
        self.docs
            .write()
            .map_err(|_| AppError::Internal(anyhow::anyhow!("memory remote lock poisoned")))
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn get_user_document(&self, user_id: &str) -> Result<Option<UserDocument>> {
        self.check_reachable().await?;
        Ok(self.read()?.users.get(user_id).cloned())
    }

    async fn upsert_user_document(&self, doc: &UserDocument) -> Result<()> {
        self.check_reachable().await?;
        self.write()?
            .users
            .insert(doc.user_id.clone(), doc.clone());
        Ok(())
    }

    async fn merge_user_profile(&self, user: &User) -> Result<bool> {
        self.check_reachable().await?;
        let mut docs = self.write()?;
        let created = !docs.users.contains_key(&user.id);
        docs.users
            .entry(user.id.clone())
            .or_insert_with(|| UserDocument::new(&user.id))
            .merge_profile(user);
        Ok(created)
    }

    async fn get_favorites(&self, user_id: &str) -> Result<Vec<Movie>> {
        self.check_reachable().await?;
        Ok(self
            .read()?
            .favorites
            .get(user_id)
            .map(|movies| movies.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn set_favorite(&self, user_id: &str, movie: &Movie) -> Result<()> {
        self.check_reachable().await?;
        self.write()?
            .favorites
            .entry(user_id.to_string())
            .or_default()
            .insert(movie.id.clone(), movie.clone());
        Ok(())
    }

    async fn delete_favorite(&self, user_id: &str, movie_id: &str) -> Result<()> {
        self.check_reachable().await?;
        if let Some(movies) = self.write()?.favorites.get_mut(user_id) {
            movies.remove(movie_id);
        }
        Ok(())
    }

    async fn append_activity_log(
        &self,
        user_id: &str,
        entry: ActivityLogEntry,
    ) -> Result<AppendOutcome> {
        self.check_reachable().await?;
        let mut docs = self.write()?;
        let created_document = !docs.users.contains_key(user_id);
        let doc = docs
            .users
            .entry(user_id.to_string())
            .or_insert_with(|| UserDocument::new(user_id));
        let healed_open_entry = append_entry(&mut doc.activity_log, entry);
        Ok(AppendOutcome {
            created_document,
            healed_open_entry,
        })
    }

    async fn close_last_open_activity_log(
        &self,
        user_id: &str,
        close_time: DateTime<Utc>,
    ) -> Result<CloseOutcome> {
        self.check_reachable().await?;
        let mut docs = self.write()?;
        Ok(match docs.users.get_mut(user_id) {
            Some(doc) => close_last_open(&mut doc.activity_log, close_time),
            None => CloseOutcome::NothingToClose,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offline_calls_fail_as_unavailable() {
        let remote = MemoryRemote::new();
        remote.set_online(false);
        let err = remote.get_favorites("u1").await.unwrap_err();
        assert!(err.is_remote_unavailable());

        remote.set_online(true);
        assert!(remote.get_favorites("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_creates_document() {
        let remote = MemoryRemote::new();
        let outcome = remote
            .append_activity_log("u1", ActivityLogEntry::open(Utc::now()))
            .await
            .unwrap();
        assert!(outcome.created_document);
        assert!(!outcome.healed_open_entry);

        let doc = remote.get_user_document("u1").await.unwrap().unwrap();
        assert_eq!(doc.user_id, "u1");
        assert_eq!(doc.activity_log.len(), 1);
    }

    #[tokio::test]
    async fn test_close_without_document() {
        let remote = MemoryRemote::new();
        let outcome = remote
            .close_last_open_activity_log("ghost", Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome, CloseOutcome::NothingToClose);
        assert!(remote.get_user_document("ghost").await.unwrap().is_none());
    }
}
