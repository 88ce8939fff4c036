// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User profile management.
//!
//! Address and phone are encrypted before they reach either store and only
//! decrypted when a profile is read for display. Unset fields stay unset;
//! no placeholder text is ever stored.

use std::sync::Arc;

use crate::db::{LocalStore, SharedRemote};
use crate::error::{AppError, Result};
use crate::models::{Identity, Profile, ProfilePatch, User, UserPatch};
use crate::services::crypto::EncryptionService;
use crate::services::tasks::{spawn_remote, RemoteTask};

#[derive(Clone)]
pub struct ProfileService {
    local: Arc<LocalStore>,
    remote: SharedRemote,
    crypto: EncryptionService,
}

impl ProfileService {
    pub fn new(local: Arc<LocalStore>, remote: SharedRemote, crypto: EncryptionService) -> Self {
        Self {
            local,
            remote,
            crypto,
        }
    }

    /// Make sure the signed-in user exists locally and remotely.
    ///
    /// A user unknown on this device is pulled from the remote if another
    /// device created it; otherwise it is created from the identity and
    /// pushed up in the background.
    pub async fn ensure_user(&self, identity: &Identity) -> Result<Option<RemoteTask>> {
        let user_id = identity.user_id.as_str();
        if user_id.trim().is_empty() {
            return Err(AppError::BadRequest("user id must not be empty".to_string()));
        }

        let identity_patch = UserPatch {
            name: identity.name.clone(),
            email: identity.email.clone(),
            ..Default::default()
        };

        if self.local.user_exists(user_id)? {
            if !identity_patch.is_empty() {
                self.local.upsert_user(user_id, &identity_patch)?;
            }
            return Ok(None);
        }

        match self.pull_remote(user_id).await {
            Ok(true) => {
                tracing::info!(user_id, "Restored user from remote");
                // Fill in what the remote document lacks
                let stored = self.require_user(user_id)?;
                let patch = UserPatch {
                    name: stored.name.is_none().then(|| identity.name.clone()).flatten(),
                    email: stored.email.is_none().then(|| identity.email.clone()).flatten(),
                    ..Default::default()
                };
                if !patch.is_empty() {
                    self.local.upsert_user(user_id, &patch)?;
                }
                return Ok(None);
            }
            Ok(false) => {}
            Err(e) if e.is_remote_unavailable() => {
                tracing::warn!(user_id, error = %e, "Remote unavailable, creating user locally");
            }
            Err(e) => return Err(e),
        }

        self.local.upsert_user(user_id, &identity_patch)?;
        tracing::info!(user_id, "Created user");
        Ok(Some(self.push_profile(user_id)))
    }

    /// Apply a profile edit locally and mirror it to the remote.
    pub fn update_profile(&self, user_id: &str, patch: ProfilePatch) -> Result<RemoteTask> {
        if !self.local.user_exists(user_id)? {
            return Err(AppError::NotFound(format!("user {user_id}")));
        }

        let user_patch = UserPatch {
            name: patch.name,
            email: patch.email,
            address: self.crypto.encrypt_opt(patch.address.as_deref())?,
            phone: self.crypto.encrypt_opt(patch.phone.as_deref())?,
            image: patch.image,
            ..Default::default()
        };
        self.local.upsert_user(user_id, &user_patch)?;
        tracing::info!(user_id, "Profile updated");

        Ok(self.push_profile(user_id))
    }

    /// Profile with address and phone decrypted.
    ///
    /// A field that does not decrypt with this device's key is returned as
    /// `None`.
    pub fn get_profile(&self, user_id: &str) -> Result<Profile> {
        let user = self.require_user(user_id)?;
        Ok(Profile {
            address: self.decrypt_field(user_id, "address", user.address.as_deref()),
            phone: self.decrypt_field(user_id, "phone", user.phone.as_deref()),
            user_id: user.id,
            name: user.name,
            email: user.email,
            image: user.image,
            last_login: user.last_login,
            last_logout: user.last_logout,
        })
    }

    /// Copy the remote profile into the local store.
    ///
    /// Ciphertext is copied as-is. Returns false if there is no remote
    /// document.
    pub async fn pull_remote(&self, user_id: &str) -> Result<bool> {
        let Some(doc) = self.remote.get_user_document(user_id).await? else {
            return Ok(false);
        };
        self.local.upsert_user(user_id, &doc.profile_patch())?;
        Ok(true)
    }

    /// Spawn a read-merge-write of the local profile onto the remote.
    fn push_profile(&self, user_id: &str) -> RemoteTask {
        let local = self.local.clone();
        let remote = self.remote.clone();
        let uid = user_id.to_string();
        spawn_remote("merge_user_profile", user_id.to_string(), async move {
            let user = local
                .get_user(&uid)?
                .ok_or_else(|| AppError::NotFound(format!("user {uid}")))?;
            remote.merge_user_profile(&user).await
        })
    }

    fn require_user(&self, user_id: &str) -> Result<User> {
        self.local
            .get_user(user_id)?
            .ok_or_else(|| AppError::NotFound(format!("user {user_id}")))
    }

    fn decrypt_field(&self, user_id: &str, field: &'static str, value: Option<&str>) -> Option<String> {
        let ciphertext = value?;
        match self.crypto.decrypt(ciphertext) {
            Ok(plaintext) => Some(plaintext),
            Err(e) => {
                tracing::warn!(user_id, field, error = %e, "Could not decrypt profile field");
                None
            }
        }
    }
}
