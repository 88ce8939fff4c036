// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_sync::config::Config;
use marquee_sync::db::{FirestoreRemote, LocalStore, MemoryRemote, RemoteStore, SharedRemote};
use marquee_sync::error::Result;
use marquee_sync::models::{ActivityLogEntry, AppendOutcome, CloseOutcome, Movie, User, UserDocument};
use marquee_sync::routes::create_router;
use marquee_sync::services::EncryptionService;
use marquee_sync::AppState;
use std::sync::Arc;
use std::time::Duration;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a Firestore remote connected to the emulator.
#[allow(dead_code)]
pub async fn test_firestore() -> FirestoreRemote {
    FirestoreRemote::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Everything a test needs to drive the core and inspect both stores.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub local: Arc<LocalStore>,
    pub remote: Arc<MemoryRemote>,
}

/// Create a test app with an in-memory local store and remote.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with(Arc::new(LocalStore::open_in_memory().unwrap()))
}

/// Create a test app around an existing local store.
#[allow(dead_code)]
pub fn create_test_app_with(local: Arc<LocalStore>) -> TestApp {
    let remote = Arc::new(MemoryRemote::new());
    build_test_app(local, remote.clone(), remote)
}

/// Create a test app whose remote calls take extra time.
///
/// `TestApp::remote` is the underlying store, so tests can inspect it
/// without the added latency.
#[allow(dead_code)]
pub fn create_delayed_test_app(delays: Delays) -> TestApp {
    let local = Arc::new(LocalStore::open_in_memory().unwrap());
    let remote = Arc::new(MemoryRemote::new());
    let delayed = Arc::new(DelayedRemote {
        inner: remote.clone(),
        delays,
    });
    build_test_app(local, remote, delayed)
}

fn build_test_app(
    local: Arc<LocalStore>,
    remote: Arc<MemoryRemote>,
    wired: SharedRemote,
) -> TestApp {
    let crypto = EncryptionService::ephemeral().unwrap();
    let state = Arc::new(AppState::new(
        Config::test_default(),
        local.clone(),
        wired,
        crypto,
    ));

    TestApp {
        router: create_router(state.clone()),
        state,
        local,
        remote,
    }
}

/// Extra latency per remote operation.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Delays {
    pub get_favorites: Duration,
    pub set_favorite: Duration,
    pub append_activity_log: Duration,
}

/// Remote store that sleeps before delegating, to reorder concurrent calls.
pub struct DelayedRemote {
    inner: Arc<MemoryRemote>,
    delays: Delays,
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[async_trait]
impl RemoteStore for DelayedRemote {
    async fn get_user_document(&self, user_id: &str) -> Result<Option<UserDocument>> {
        self.inner.get_user_document(user_id).await
    }

    async fn upsert_user_document(&self, doc: &UserDocument) -> Result<()> {
        self.inner.upsert_user_document(doc).await
    }

    async fn merge_user_profile(&self, user: &User) -> Result<bool> {
        self.inner.merge_user_profile(user).await
    }

    async fn get_favorites(&self, user_id: &str) -> Result<Vec<Movie>> {
        pause(self.delays.get_favorites).await;
        self.inner.get_favorites(user_id).await
    }

    async fn set_favorite(&self, user_id: &str, movie: &Movie) -> Result<()> {
        pause(self.delays.set_favorite).await;
        self.inner.set_favorite(user_id, movie).await
    }

    async fn delete_favorite(&self, user_id: &str, movie_id: &str) -> Result<()> {
        self.inner.delete_favorite(user_id, movie_id).await
    }

    async fn append_activity_log(
        &self,
        user_id: &str,
        entry: ActivityLogEntry,
    ) -> Result<AppendOutcome> {
        pause(self.delays.append_activity_log).await;
        self.inner.append_activity_log(user_id, entry).await
    }

    async fn close_last_open_activity_log(
        &self,
        user_id: &str,
        close_time: DateTime<Utc>,
    ) -> Result<CloseOutcome> {
        self.inner
            .close_last_open_activity_log(user_id, close_time)
            .await
    }
}

/// Movie with a bit of metadata, as a provider would return it.
#[allow(dead_code)]
pub fn movie(id: &str, title: &str) -> Movie {
    Movie {
        id: id.to_string(),
        title: title.to_string(),
        image: Some(format!("https://img.example/{id}.jpg")),
        plot: format!("Plot of {title}"),
        rating: 7.5,
        release_date: "1999-10-15".to_string(),
    }
}

/// Unique user id for test isolation against a shared emulator.
#[allow(dead_code)]
pub fn unique_user_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("test-user-{nanos}")
}
