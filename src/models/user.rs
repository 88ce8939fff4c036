// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ActivityLogEntry;

/// What the identity provider hands over after a successful sign-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// Stable external identity (primary key in every store)
    pub user_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// User row as kept in the local store.
///
/// `address` and `phone` hold ciphertext. A user created by a bare
/// login/logout event has no name or email yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub last_logout: Option<DateTime<Utc>>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub image: Option<String>,
}

/// Partial update of a user: `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub last_logout: Option<DateTime<Utc>>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub image: Option<String>,
}

impl UserPatch {
    pub fn login(time: DateTime<Utc>) -> Self {
        Self {
            last_login: Some(time),
            ..Default::default()
        }
    }

    pub fn logout(time: DateTime<Utc>) -> Self {
        Self {
            last_logout: Some(time),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// User document stored at `users/{userId}`.
///
/// Writes replace the whole document, so callers that only want to touch
/// profile fields must read it first and carry `activity_log` over.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserDocument {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Ciphertext
    #[serde(default)]
    pub address: Option<String>,
    /// Ciphertext
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub activity_log: Vec<ActivityLogEntry>,
}

impl UserDocument {
    /// Fresh document with an empty log.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    /// Overwrite profile fields from a local user, keeping the activity log.
    ///
    /// Fields the local user does not have are left as they are remotely.
    pub fn merge_profile(&mut self, user: &User) {
        fn take(dst: &mut Option<String>, src: &Option<String>) {
            if src.is_some() {
                dst.clone_from(src);
            }
        }
        take(&mut self.name, &user.name);
        take(&mut self.email, &user.email);
        take(&mut self.address, &user.address);
        take(&mut self.phone, &user.phone);
        take(&mut self.image, &user.image);
    }

    /// Profile fields as a local patch (ciphertext copied verbatim).
    pub fn profile_patch(&self) -> UserPatch {
        UserPatch {
            name: self.name.clone(),
            email: self.email.clone(),
            address: self.address.clone(),
            phone: self.phone.clone(),
            image: self.image.clone(),
            ..Default::default()
        }
    }
}

/// UI-facing profile with address and phone decrypted.
///
/// A field that could not be decrypted (foreign key, corruption) is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub image: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub last_logout: Option<DateTime<Utc>>,
}

/// Profile edit from the UI, in plaintext. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_user() -> User {
        User {
            id: "u1".to_string(),
            name: Some("Ada".to_string()),
            email: None,
            last_login: None,
            last_logout: None,
            address: Some("cipher-address".to_string()),
            phone: None,
            image: None,
        }
    }

    #[test]
    fn test_merge_profile_keeps_activity_log_and_unset_fields() {
        let mut doc = UserDocument::new("u1");
        doc.email = Some("ada@example.com".to_string());
        doc.activity_log.push(ActivityLogEntry::open(Utc::now()));

        doc.merge_profile(&local_user());

        assert_eq!(doc.name.as_deref(), Some("Ada"));
        assert_eq!(doc.email.as_deref(), Some("ada@example.com"));
        assert_eq!(doc.address.as_deref(), Some("cipher-address"));
        assert_eq!(doc.activity_log.len(), 1);
    }

    #[test]
    fn test_patch_helpers() {
        let now = Utc::now();
        let patch = UserPatch::login(now);
        assert_eq!(patch.last_login, Some(now));
        assert!(patch.last_logout.is_none());
        assert!(!patch.is_empty());
        assert!(UserPatch::default().is_empty());
    }

    #[test]
    fn test_user_document_field_names() {
        let json = serde_json::to_value(UserDocument::new("abc")).unwrap();
        assert_eq!(json["userId"], "abc");
        assert!(json["activity_log"].as_array().unwrap().is_empty());
    }
}
