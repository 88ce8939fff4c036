// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Login/logout bookkeeping.
//!
//! Each user moves between `NoSession`, `Open` and `Closed`. Every edge is
//! written to the local store synchronously and mirrored to the remote
//! activity log in the background.
//!
//! Repeated events in the same state:
//! - login while `Open` only refreshes the local `last_login`
//! - logout while `Closed` does nothing at all
//!
//! Remote writes for one user run in the order their events were
//! registered: each write waits for the previous one to finish (or be
//! dropped) before touching the activity log.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::oneshot;

use crate::db::{LocalStore, SharedRemote};
use crate::error::Result;
use crate::models::{ActivityLogEntry, CloseOutcome};
use crate::services::tasks::{spawn_remote, RemoteTask};

/// Per-user session state, as seen by this process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    NoSession,
    Open,
    Closed,
}

/// What the tracker remembers about one user.
#[derive(Debug, Default)]
struct UserSession {
    state: SessionState,
    /// Resolves once the most recently spawned remote write is done.
    last_write: Option<oneshot::Receiver<()>>,
}

impl UserSession {
    /// Spawn `fut` behind every remote write already queued for this user.
    fn spawn_ordered<T, F>(&mut self, operation: &'static str, user_id: &str, fut: F) -> RemoteTask
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (done, done_rx) = oneshot::channel::<()>();
        let previous = self.last_write.replace(done_rx);

        spawn_remote(operation, user_id.to_string(), async move {
            // Dropped with this future, which releases the next write
            let _done = done;
            if let Some(previous) = previous {
                // The sender is never used, so this resolves on drop
                previous.await.ok();
            }
            fut.await
        })
    }
}

/// Shared per-user session states.
type SessionStates = Arc<DashMap<String, UserSession>>;

#[derive(Clone)]
pub struct SessionActivityTracker {
    local: Arc<LocalStore>,
    remote: SharedRemote,
    states: SessionStates,
}

impl SessionActivityTracker {
    pub fn new(local: Arc<LocalStore>, remote: SharedRemote) -> Self {
        Self {
            local,
            remote,
            states: Arc::new(DashMap::new()),
        }
    }

    pub fn state(&self, user_id: &str) -> SessionState {
        self.states
            .get(user_id)
            .map(|s| s.state)
            .unwrap_or_default()
    }

    /// Record a login at `time`.
    ///
    /// Returns the remote append task, or `None` if the session was already
    /// open. A failed local write leaves the state unchanged.
    pub fn register_login(
        &self,
        user_id: &str,
        time: DateTime<Utc>,
    ) -> Result<Option<RemoteTask>> {
        // The entry guard serializes events for this user
        let mut session = self.states.entry(user_id.to_string()).or_default();

        self.local.register_login(user_id, time)?;

        if session.state == SessionState::Open {
            tracing::debug!(user_id, "Session already open, refreshed last login");
            return Ok(None);
        }
        let previous = std::mem::replace(&mut session.state, SessionState::Open);

        tracing::info!(user_id, ?previous, "Session opened");

        let remote = self.remote.clone();
        let uid = user_id.to_string();
        let task = session.spawn_ordered("append_activity_log", user_id, async move {
            let outcome = remote
                .append_activity_log(&uid, ActivityLogEntry::open(time))
                .await?;
            if outcome.healed_open_entry {
                tracing::info!(user_id = uid, "Closed dangling session with new login time");
            }
            if outcome.created_document {
                tracing::debug!(user_id = uid, "Created remote user document");
            }
            Ok(outcome)
        });
        Ok(Some(task))
    }

    /// Record a logout at `time`.
    ///
    /// Returns the remote close task, or `None` if the session was already
    /// closed.
    pub fn register_logout(
        &self,
        user_id: &str,
        time: DateTime<Utc>,
    ) -> Result<Option<RemoteTask>> {
        let mut session = self.states.entry(user_id.to_string()).or_default();

        if session.state == SessionState::Closed {
            tracing::debug!(user_id, "Session already closed, ignoring logout");
            return Ok(None);
        }

        self.local.register_logout(user_id, time)?;
        session.state = SessionState::Closed;

        tracing::info!(user_id, "Session closed");

        let remote = self.remote.clone();
        let uid = user_id.to_string();
        let task = session.spawn_ordered(
            "close_last_open_activity_log",
            user_id,
            async move {
                let outcome = remote.close_last_open_activity_log(&uid, time).await?;
                match outcome {
                    CloseOutcome::Closed => {}
                    CloseOutcome::Stale => {
                        tracing::warn!(user_id = uid, "Ignored logout older than the open session")
                    }
                    CloseOutcome::AlreadyClosed | CloseOutcome::NothingToClose => {
                        tracing::debug!(user_id = uid, ?outcome, "No open session to close")
                    }
                }
                Ok(outcome)
            },
        );
        Ok(Some(task))
    }
}
