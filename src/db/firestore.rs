// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore implementation of the remote store.
//!
//! Layout:
//! - `users/{userId}`: profile fields plus `activity_log`
//! - `favorites/{userId}/movies/{movieId}`: one document per favorite
//!
//! Activity log changes are read-modify-write inside a Firestore
//! transaction so a concurrent login and logout cannot lose each other's
//! update. Contended commits are retried a few times.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use firestore::errors::FirestoreError;
use firestore::FirestoreConsistencySelector;

use crate::db::{collections, RemoteStore};
use crate::error::{AppError, Result};
use crate::models::activity_log::{append_entry, close_last_open};
use crate::models::{
    ActivityLogEntry, AppendOutcome, CloseOutcome, FavoriteDocument, Movie, User, UserDocument,
};

/// Commit attempts before a contended transaction is given up.
const MAX_TRANSACTION_ATTEMPTS: u32 = 3;

/// Firestore-backed remote store.
#[derive(Clone)]
pub struct FirestoreRemote {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreRemote {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| unavailable("connect to Firestore", e))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| unavailable("connect to Firestore Emulator", e))?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Offline client: every call fails with `RemoteUnavailable`.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb> {
        self.client.as_ref().ok_or_else(|| {
            AppError::RemoteUnavailable("Firestore not connected (offline mode)".to_string())
        })
    }

    /// Run `apply` on the current user document inside a transaction.
    ///
    /// `apply` returns the document to write back (or `None` to leave it
    /// alone) and a result. It may run more than once if the commit is
    /// contended, always on freshly read data.
    async fn modify_user_document<R, F>(
        &self,
        user_id: &str,
        operation: &'static str,
        mut apply: F,
    ) -> Result<R>
    where
        F: FnMut(Option<UserDocument>) -> (Option<UserDocument>, R) + Send,
        R: Send,
    {
        let client = self.get_client()?;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| remote_error("begin transaction", e))?;

            // Reads through this handle are registered with the transaction
            let tx_client = client.clone_with_consistency_selector(
                FirestoreConsistencySelector::Transaction(transaction.transaction_id().clone()),
            );
            let current: Option<UserDocument> = tx_client
                .fluent()
                .select()
                .by_id_in(collections::USERS)
                .obj()
                .one(user_id)
                .await
                .map_err(|e| remote_error("read user in transaction", e))?;

            let (updated, result) = apply(current);
            let Some(doc) = updated else {
                if let Err(e) = transaction.rollback().await {
                    tracing::warn!(user_id, operation, error = %e, "Transaction rollback failed");
                }
                return Ok(result);
            };

            client
                .fluent()
                .update()
                .in_col(collections::USERS)
                .document_id(user_id)
                .object(&doc)
                .add_to_transaction(&mut transaction)
                .map_err(|e| remote_error("add user to transaction", e))?;

            match transaction.commit().await {
                Ok(_) => return Ok(result),
                Err(e) if attempt < MAX_TRANSACTION_ATTEMPTS => {
                    tracing::warn!(
                        user_id,
                        operation,
                        attempt,
                        error = %e,
                        "Transaction commit failed, retrying"
                    );
                }
                Err(e) => return Err(remote_error(operation, e)),
            }
        }
    }
}

fn unavailable(context: &str, e: impl std::fmt::Display) -> AppError {
    AppError::RemoteUnavailable(format!("Failed to {context}: {e}"))
}

/// Classify a Firestore failure.
///
/// Documents that do not decode (or requests we built wrong) will fail the
/// same way on every retry, so they are internal errors rather than
/// connectivity problems.
fn remote_error(context: &str, e: FirestoreError) -> AppError {
    match e {
        FirestoreError::DeserializeError(_)
        | FirestoreError::SerializeError(_)
        | FirestoreError::InvalidParametersError(_) => {
            AppError::Internal(anyhow::anyhow!("Failed to {context}: {e}"))
        }
        other => unavailable(context, other),
    }
}

/// Movie ids come from external providers; keep them path-safe.
fn favorite_doc_id(movie_id: &str) -> String {
    urlencoding::encode(movie_id).into_owned()
}

#[async_trait]
impl RemoteStore for FirestoreRemote {
    async fn get_user_document(&self, user_id: &str) -> Result<Option<UserDocument>> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| remote_error("get user", e))
    }

    async fn upsert_user_document(&self, doc: &UserDocument) -> Result<()> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&doc.user_id)
            .object(doc)
            .execute()
            .await
            .map_err(|e| remote_error("upsert user", e))?;
        Ok(())
    }

    async fn merge_user_profile(&self, user: &User) -> Result<bool> {
        self.modify_user_document(&user.id, "merge user profile", |current| {
            let created = current.is_none();
            let mut doc = current.unwrap_or_else(|| UserDocument::new(&user.id));
            doc.merge_profile(user);
            (Some(doc), created)
        })
        .await
    }

    async fn get_favorites(&self, user_id: &str) -> Result<Vec<Movie>> {
        let client = self.get_client()?;
        let parent_path = client
            .parent_path(collections::FAVORITES, user_id)
            .map_err(|e| remote_error("build favorites path", e))?;

        let docs: Vec<FavoriteDocument> = client
            .fluent()
            .select()
            .from(collections::MOVIES)
            .parent(&parent_path)
            .obj()
            .query()
            .await
            .map_err(|e| remote_error("list favorites", e))?;

        Ok(docs.into_iter().map(Movie::from).collect())
    }

    async fn set_favorite(&self, user_id: &str, movie: &Movie) -> Result<()> {
        let client = self.get_client()?;
        let parent_path = client
            .parent_path(collections::FAVORITES, user_id)
            .map_err(|e| remote_error("build favorites path", e))?;

        let _: () = client
            .fluent()
            .update()
            .in_col(collections::MOVIES)
            .document_id(favorite_doc_id(&movie.id))
            .parent(&parent_path)
            .object(&FavoriteDocument::from(movie))
            .execute()
            .await
            .map_err(|e| remote_error("set favorite", e))?;
        Ok(())
    }

    async fn delete_favorite(&self, user_id: &str, movie_id: &str) -> Result<()> {
        let client = self.get_client()?;
        let parent_path = client
            .parent_path(collections::FAVORITES, user_id)
            .map_err(|e| remote_error("build favorites path", e))?;

        client
            .fluent()
            .delete()
            .from(collections::MOVIES)
            .document_id(favorite_doc_id(movie_id))
            .parent(&parent_path)
            .execute()
            .await
            .map_err(|e| remote_error("delete favorite", e))?;
        Ok(())
    }

    async fn append_activity_log(
        &self,
        user_id: &str,
        entry: ActivityLogEntry,
    ) -> Result<AppendOutcome> {
        self.modify_user_document(user_id, "append activity log", |current| {
            let created_document = current.is_none();
            let mut doc = current.unwrap_or_else(|| UserDocument::new(user_id));
            let healed_open_entry = append_entry(&mut doc.activity_log, entry.clone());
            (
                Some(doc),
                AppendOutcome {
                    created_document,
                    healed_open_entry,
                },
            )
        })
        .await
    }

    async fn close_last_open_activity_log(
        &self,
        user_id: &str,
        close_time: DateTime<Utc>,
    ) -> Result<CloseOutcome> {
        self.modify_user_document(user_id, "close activity log", |current| {
            let Some(mut doc) = current else {
                return (None, CloseOutcome::NothingToClose);
            };
            match close_last_open(&mut doc.activity_log, close_time) {
                CloseOutcome::Closed => (Some(doc), CloseOutcome::Closed),
                other => (None, other),
            }
        })
        .await
    }
}
