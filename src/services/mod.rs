// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod account;
pub mod crypto;
pub mod favorites;
pub mod lifecycle;
pub mod profile;
pub mod session;
pub mod sync;
pub mod tasks;

pub use account::{AccountService, SignInTasks};
pub use crypto::{CryptoError, EncryptionService};
pub use favorites::{AddOutcome, FavoritesService};
pub use lifecycle::LifecycleCoordinator;
pub use profile::ProfileService;
pub use session::{SessionActivityTracker, SessionState};
pub use sync::{FavoritesSyncEngine, SyncReport};
pub use tasks::{join_logged, spawn_remote, RemoteTask};
