// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Remote (cloud) document store abstraction.
//!
//! The remote mirrors users, their favorites and their activity log for
//! multi-device access. It is only reachable when online and every call may
//! fail on its own; callers never roll back local state because of it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::models::{ActivityLogEntry, AppendOutcome, CloseOutcome, Movie, User, UserDocument};

/// Shared handle to the configured remote store.
pub type SharedRemote = Arc<dyn RemoteStore>;

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch `users/{user_id}`.
    async fn get_user_document(&self, user_id: &str) -> Result<Option<UserDocument>>;

    /// Replace `users/{user_id}` entirely.
    async fn upsert_user_document(&self, doc: &UserDocument) -> Result<()>;

    /// Atomically copy the profile fields a local user has onto
    /// `users/{id}`, creating the document if needed. The activity log and
    /// fields the local user lacks are left alone. Returns whether the
    /// document was created.
    async fn merge_user_profile(&self, user: &User) -> Result<bool>;

    /// All documents under `favorites/{user_id}/movies`.
    async fn get_favorites(&self, user_id: &str) -> Result<Vec<Movie>>;

    async fn set_favorite(&self, user_id: &str, movie: &Movie) -> Result<()>;

    /// Delete one favorite. Deleting a missing favorite succeeds.
    async fn delete_favorite(&self, user_id: &str, movie_id: &str) -> Result<()>;

    /// Atomically append to the activity log.
    ///
    /// Creates the user document if it does not exist and closes a dangling
    /// open entry with the new entry's login time first.
    async fn append_activity_log(
        &self,
        user_id: &str,
        entry: ActivityLogEntry,
    ) -> Result<AppendOutcome>;

    /// Atomically set the logout time of the last entry if it is open.
    async fn close_last_open_activity_log(
        &self,
        user_id: &str,
        close_time: DateTime<Utc>,
    ) -> Result<CloseOutcome>;
}

/// Bounds every call of the wrapped store.
///
/// A call that does not finish in time becomes `RemoteUnavailable`; the
/// underlying request is dropped.
pub struct TimeoutRemote {
    inner: SharedRemote,
    timeout: Duration,
}

impl TimeoutRemote {
    pub fn new(inner: SharedRemote, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T: Send>(
        &self,
        operation: &'static str,
        fut: impl std::future::Future<Output = Result<T>> + Send,
    ) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(AppError::RemoteUnavailable(format!(
                "{operation} timed out after {:?}",
                self.timeout
            ))),
        }
    }
}

#[async_trait]
impl RemoteStore for TimeoutRemote {
    async fn get_user_document(&self, user_id: &str) -> Result<Option<UserDocument>> {
        self.bounded("get_user_document", self.inner.get_user_document(user_id))
            .await
    }

    async fn upsert_user_document(&self, doc: &UserDocument) -> Result<()> {
        self.bounded("upsert_user_document", self.inner.upsert_user_document(doc))
            .await
    }

    async fn merge_user_profile(&self, user: &User) -> Result<bool> {
        self.bounded("merge_user_profile", self.inner.merge_user_profile(user))
            .await
    }

    async fn get_favorites(&self, user_id: &str) -> Result<Vec<Movie>> {
        self.bounded("get_favorites", self.inner.get_favorites(user_id))
            .await
    }

    async fn set_favorite(&self, user_id: &str, movie: &Movie) -> Result<()> {
        self.bounded("set_favorite", self.inner.set_favorite(user_id, movie))
            .await
    }

    async fn delete_favorite(&self, user_id: &str, movie_id: &str) -> Result<()> {
        self.bounded("delete_favorite", self.inner.delete_favorite(user_id, movie_id))
            .await
    }

    async fn append_activity_log(
        &self,
        user_id: &str,
        entry: ActivityLogEntry,
    ) -> Result<AppendOutcome> {
        self.bounded(
            "append_activity_log",
            self.inner.append_activity_log(user_id, entry),
        )
        .await
    }

    async fn close_last_open_activity_log(
        &self,
        user_id: &str,
        close_time: DateTime<Utc>,
    ) -> Result<CloseOutcome> {
        self.bounded(
            "close_last_open_activity_log",
            self.inner.close_last_open_activity_log(user_id, close_time),
        )
        .await
    }
}
