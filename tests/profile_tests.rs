// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profiles: encryption at rest, partial updates and multi-device pulls.

use std::sync::Arc;

use marquee_sync::db::{LocalStore, MemoryRemote, RemoteStore};
use marquee_sync::models::{Identity, ProfilePatch, UserDocument, UserPatch};
use marquee_sync::services::{CryptoError, EncryptionService, ProfileService};

mod common;
use common::create_test_app;

fn identity(user_id: &str) -> Identity {
    Identity {
        user_id: user_id.to_string(),
        name: Some("Grace".to_string()),
        email: Some("grace@example.com".to_string()),
    }
}

#[test]
fn test_device_key_persists_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let key_path = dir.path().join("keys").join("device.key");

    let first = EncryptionService::load_or_create(&key_path).unwrap();
    let ciphertext = first.encrypt("221B Baker Street").unwrap();

    let second = EncryptionService::load_or_create(&key_path).unwrap();
    assert_eq!(second.decrypt(&ciphertext).unwrap(), "221B Baker Street");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&key_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[test]
fn test_ciphertext_from_another_install_fails() {
    let ours = EncryptionService::ephemeral().unwrap();
    let theirs = EncryptionService::ephemeral().unwrap();
    let ciphertext = theirs.encrypt("555-0199").unwrap();

    assert!(matches!(
        ours.decrypt(&ciphertext),
        Err(CryptoError::Authentication)
    ));
}

#[test]
fn test_corrupt_key_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let key_path = dir.path().join("device.key");
    std::fs::write(&key_path, "not a key").unwrap();

    assert!(matches!(
        EncryptionService::load_or_create(&key_path),
        Err(CryptoError::KeyStore(_))
    ));
}

#[tokio::test]
async fn test_partial_profile_update_keeps_other_fields() {
    let app = create_test_app();
    let profiles = &app.state.profiles;
    profiles.ensure_user(&identity("u1")).await.unwrap();

    profiles
        .update_profile(
            "u1",
            ProfilePatch {
                address: Some("1 Loop Rd".to_string()),
                phone: Some("555-0100".to_string()),
                ..Default::default()
            },
        )
        .unwrap()
        .await
        .unwrap();

    profiles
        .update_profile(
            "u1",
            ProfilePatch {
                name: Some("Grace H.".to_string()),
                ..Default::default()
            },
        )
        .unwrap()
        .await
        .unwrap();

    let profile = profiles.get_profile("u1").unwrap();
    assert_eq!(profile.name.as_deref(), Some("Grace H."));
    assert_eq!(profile.email.as_deref(), Some("grace@example.com"));
    assert_eq!(profile.address.as_deref(), Some("1 Loop Rd"));
    assert_eq!(profile.phone.as_deref(), Some("555-0100"));
}

#[tokio::test]
async fn test_unset_fields_have_no_placeholder() {
    let app = create_test_app();
    app.state.profiles.ensure_user(&identity("u1")).await.unwrap();

    let profile = app.state.profiles.get_profile("u1").unwrap();
    assert_eq!(profile.address, None);
    assert_eq!(profile.phone, None);
    assert_eq!(profile.image, None);
}

#[tokio::test]
async fn test_remote_copy_holds_ciphertext_and_keeps_activity_log() {
    let app = create_test_app();
    let profiles = &app.state.profiles;
    profiles
        .ensure_user(&identity("u1"))
        .await
        .unwrap()
        .unwrap()
        .await
        .unwrap();
    app.state
        .sessions
        .register_login("u1", chrono::Utc::now())
        .unwrap()
        .unwrap()
        .await
        .unwrap();

    profiles
        .update_profile(
            "u1",
            ProfilePatch {
                phone: Some("555-0100".to_string()),
                ..Default::default()
            },
        )
        .unwrap()
        .await
        .unwrap();

    let doc = app.remote.get_user_document("u1").await.unwrap().unwrap();
    let phone = doc.phone.clone().unwrap();
    assert_ne!(phone, "555-0100");
    assert_eq!(doc.activity_log.len(), 1);
    assert_eq!(doc.name.as_deref(), Some("Grace"));
}

#[tokio::test]
async fn test_undecryptable_field_reads_as_none() {
    let app = create_test_app();
    app.state.profiles.ensure_user(&identity("u1")).await.unwrap();

    // Written by another install
    let foreign = EncryptionService::ephemeral().unwrap();
    app.local
        .upsert_user(
            "u1",
            &UserPatch {
                address: Some(foreign.encrypt("Elsewhere 9").unwrap()),
                phone: Some("garbage".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

    let profile = app.state.profiles.get_profile("u1").unwrap();
    assert_eq!(profile.address, None);
    assert_eq!(profile.phone, None);
    assert_eq!(profile.name.as_deref(), Some("Grace"));
}

#[tokio::test]
async fn test_second_device_pulls_existing_remote_user() {
    let remote = Arc::new(MemoryRemote::new());
    let mut doc = UserDocument::new("u1");
    doc.name = Some("Grace from phone".to_string());
    doc.image = Some("https://img.example/grace.png".to_string());
    remote.upsert_user_document(&doc).await.unwrap();

    let local = Arc::new(LocalStore::open_in_memory().unwrap());
    let profiles = ProfileService::new(
        local.clone(),
        remote.clone(),
        EncryptionService::ephemeral().unwrap(),
    );

    let task = profiles.ensure_user(&identity("u1")).await.unwrap();
    assert!(task.is_none(), "nothing to push when the remote already has the user");

    let user = local.get_user("u1").unwrap().unwrap();
    assert_eq!(user.name.as_deref(), Some("Grace from phone"));
    assert_eq!(user.email.as_deref(), Some("grace@example.com"));
    assert_eq!(user.image.as_deref(), Some("https://img.example/grace.png"));
}

#[tokio::test]
async fn test_offline_first_sign_in_creates_local_user() {
    let app = create_test_app();
    app.remote.set_online(false);

    let task = app.state.profiles.ensure_user(&identity("u1")).await.unwrap();
    task.unwrap().await.unwrap();

    assert!(app.local.user_exists("u1").unwrap());
    app.remote.set_online(true);
    assert!(app.remote.get_user_document("u1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_empty_user_id_rejected() {
    let app = create_test_app();
    let err = app
        .state
        .profiles
        .ensure_user(&identity(""))
        .await
        .unwrap_err();
    assert!(matches!(err, marquee_sync::error::AppError::BadRequest(_)));
}
