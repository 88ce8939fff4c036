// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! App lifecycle to session edges.
//!
//! The UI reports screens becoming visible and hidden. The process counts as
//! foregrounded while at least one screen is visible. Going from zero to one
//! visible screen is a login edge; dropping to zero is a logout edge, but
//! only once nothing became visible again within the debounce window, so
//! navigating between screens does not open a new session every time.
//!
//! While foregrounded with a signed-in user, favorites are reconciled
//! periodically.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::config::Config;
use crate::error::Result;
use crate::services::session::SessionActivityTracker;
use crate::services::sync::FavoritesSyncEngine;
use crate::services::tasks::{join_logged, RemoteTask};

#[derive(Default)]
struct CoordinatorState {
    current_user: Option<String>,
    visible_screens: usize,
    foreground: bool,
    /// Bumped on every visibility change; a pending background edge only
    /// fires if nothing changed while it waited
    generation: u64,
    sweep: Option<JoinHandle<()>>,
}

struct Inner {
    sessions: SessionActivityTracker,
    sync: FavoritesSyncEngine,
    settle: Duration,
    debounce: Duration,
    sweep_interval: Duration,
    state: Mutex<CoordinatorState>,
}

/// Translates foreground/background transitions into session events and
/// schedules reconciliation.
#[derive(Clone)]
pub struct LifecycleCoordinator {
    inner: Arc<Inner>,
}

impl LifecycleCoordinator {
    pub fn new(
        config: &Config,
        sessions: SessionActivityTracker,
        sync: FavoritesSyncEngine,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                sessions,
                sync,
                settle: config.sync_settle,
                debounce: config.lifecycle_debounce,
                sweep_interval: config.sync_interval,
                state: Mutex::new(CoordinatorState::default()),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, CoordinatorState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current_user(&self) -> Option<String> {
        self.state().current_user.clone()
    }

    pub fn is_foreground(&self) -> bool {
        self.state().foreground
    }

    // ─── Account edges ───────────────────────────────────────────

    /// Remember the signed-in user and reconcile once the settle window
    /// has passed.
    pub fn signed_in(&self, user_id: &str) -> JoinHandle<()> {
        {
            let mut state = self.state();
            state.current_user = Some(user_id.to_string());
            state.foreground = true;
        }
        self.start_sweep();

        let this = self.clone();
        let user_id = user_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(this.inner.settle).await;
            if this.current_user().as_deref() != Some(user_id.as_str()) {
                tracing::debug!(user_id, "User changed during settle window, skipping sync");
                return;
            }
            if let Some(task) = this.inner.sync.reconcile_in_background(&user_id) {
                join_logged("reconcile", task).await;
            }
        })
    }

    pub fn signed_out(&self) {
        self.state().current_user = None;
        self.stop_sweep();
    }

    // ─── Process edges ───────────────────────────────────────────

    /// The app became visible: open the session and reconcile.
    pub fn on_foreground(&self) -> Result<Option<RemoteTask>> {
        let user = {
            let mut state = self.state();
            state.foreground = true;
            state.current_user.clone()
        };
        self.start_sweep();

        let Some(user_id) = user else {
            return Ok(None);
        };
        tracing::debug!(user_id, "App foregrounded");
        let task = self.inner.sessions.register_login(&user_id, Utc::now())?;
        self.inner.sync.reconcile_in_background(&user_id);
        Ok(task)
    }

    /// The app went to the background: close the session.
    pub fn on_background(&self) -> Result<Option<RemoteTask>> {
        let user = {
            let mut state = self.state();
            state.foreground = false;
            state.current_user.clone()
        };
        self.stop_sweep();

        let Some(user_id) = user else {
            return Ok(None);
        };
        tracing::debug!(user_id, "App backgrounded");
        self.inner.sessions.register_logout(&user_id, Utc::now())
    }

    /// The process is going away. Closes the session if it is open.
    pub fn shutdown(&self) -> Result<Option<RemoteTask>> {
        if self.is_foreground() {
            self.on_background()
        } else {
            self.stop_sweep();
            Ok(None)
        }
    }

    // ─── Screen signals ──────────────────────────────────────────

    pub fn screen_started(&self) -> Result<Option<RemoteTask>> {
        let becomes_foreground = {
            let mut state = self.state();
            state.visible_screens += 1;
            state.generation += 1;
            state.visible_screens == 1 && !state.foreground
        };
        if becomes_foreground {
            self.on_foreground()
        } else {
            Ok(None)
        }
    }

    /// A screen was hidden. Returns the pending background check, if the
    /// last visible screen went away.
    pub fn screen_stopped(&self) -> Option<JoinHandle<()>> {
        let generation = {
            let mut state = self.state();
            state.visible_screens = state.visible_screens.saturating_sub(1);
            state.generation += 1;
            if state.visible_screens > 0 || !state.foreground {
                return None;
            }
            state.generation
        };

        let this = self.clone();
        Some(tokio::spawn(async move {
            tokio::time::sleep(this.inner.debounce).await;
            let still_hidden = {
                let state = this.state();
                state.generation == generation && state.visible_screens == 0 && state.foreground
            };
            if !still_hidden {
                tracing::debug!("Screen became visible again within debounce window");
                return;
            }
            match this.on_background() {
                Ok(Some(task)) => {
                    join_logged("close_last_open_activity_log", task).await;
                }
                Ok(None) => {}
                Err(e) => tracing::error!(error = %e, "Failed to record logout"),
            }
        }))
    }

    /// A screen came back into view; refresh favorites.
    pub fn screen_resumed(&self) -> Option<JoinHandle<()>> {
        let user_id = self.current_user()?;
        self.inner.sync.reconcile_in_background(&user_id)
    }

    // ─── Periodic sweep ──────────────────────────────────────────

    fn start_sweep(&self) {
        let mut state = self.state();
        if state.sweep.is_some() || state.current_user.is_none() {
            return;
        }

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let period = self.inner.sweep_interval;
        state.sweep = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let this = LifecycleCoordinator { inner };
                if let Some(user_id) = this.current_user() {
                    tracing::debug!(user_id, "Periodic favorites sweep");
                    this.inner.sync.reconcile_in_background(&user_id);
                }
            }
        }));
    }

    fn stop_sweep(&self) {
        if let Some(handle) = self.state().sweep.take() {
            handle.abort();
        }
    }
}
