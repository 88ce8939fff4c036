// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Marquee sync core: favorites and session sync for a movie catalog app.
//!
//! The local SQLite store is the device's source of truth. A cloud document
//! store mirrors users, favorites and login/logout history across devices and
//! is written in the background; losing connectivity only delays
//! convergence.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use std::sync::Arc;

use config::Config;
use db::{LocalStore, SharedRemote};
use services::{
    AccountService, EncryptionService, FavoritesService, FavoritesSyncEngine,
    LifecycleCoordinator, ProfileService, SessionActivityTracker,
};

/// Shared application state, built once at startup.
pub struct AppState {
    pub config: Config,
    pub local: Arc<LocalStore>,
    pub remote: SharedRemote,
    pub favorites: FavoritesService,
    pub sync: FavoritesSyncEngine,
    pub sessions: SessionActivityTracker,
    pub profiles: ProfileService,
    pub lifecycle: LifecycleCoordinator,
    pub accounts: AccountService,
}

impl AppState {
    /// Wire up all services around the given stores.
    pub fn new(
        config: Config,
        local: Arc<LocalStore>,
        remote: SharedRemote,
        crypto: EncryptionService,
    ) -> Self {
        let favorites = FavoritesService::new(local.clone(), remote.clone());
        let sync = FavoritesSyncEngine::new(local.clone(), remote.clone());
        let sessions = SessionActivityTracker::new(local.clone(), remote.clone());
        let profiles = ProfileService::new(local.clone(), remote.clone(), crypto);
        let lifecycle = LifecycleCoordinator::new(&config, sessions.clone(), sync.clone());
        let accounts = AccountService::new(profiles.clone(), sessions.clone(), lifecycle.clone());

        Self {
            config,
            local,
            remote,
            favorites,
            sync,
            sessions,
            profiles,
            lifecycle,
            accounts,
        }
    }
}
