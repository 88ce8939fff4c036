// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sign-in and sign-out.

use chrono::Utc;

use crate::error::Result;
use crate::models::Identity;
use crate::services::lifecycle::LifecycleCoordinator;
use crate::services::profile::ProfileService;
use crate::services::session::SessionActivityTracker;
use crate::services::tasks::RemoteTask;

/// Background work started by a sign-in, for callers that want to wait.
pub struct SignInTasks {
    pub profile: Option<RemoteTask>,
    pub session: Option<RemoteTask>,
    /// Reconcile scheduled after the settle window
    pub initial_sync: tokio::task::JoinHandle<()>,
}

#[derive(Clone)]
pub struct AccountService {
    profiles: ProfileService,
    sessions: SessionActivityTracker,
    lifecycle: LifecycleCoordinator,
}

impl AccountService {
    pub fn new(
        profiles: ProfileService,
        sessions: SessionActivityTracker,
        lifecycle: LifecycleCoordinator,
    ) -> Self {
        Self {
            profiles,
            sessions,
            lifecycle,
        }
    }

    /// Handle a successful sign-in from the identity provider.
    pub async fn sign_in(&self, identity: &Identity) -> Result<SignInTasks> {
        let profile = self.profiles.ensure_user(identity).await?;
        let session = self
            .sessions
            .register_login(&identity.user_id, Utc::now())?;
        let initial_sync = self.lifecycle.signed_in(&identity.user_id);

        tracing::info!(user_id = %identity.user_id, "User signed in");

        Ok(SignInTasks {
            profile,
            session,
            initial_sync,
        })
    }

    /// Close the session and forget the current user.
    pub fn sign_out(&self, user_id: &str) -> Result<Option<RemoteTask>> {
        let task = self.sessions.register_logout(user_id, Utc::now())?;
        if self.lifecycle.current_user().as_deref() == Some(user_id) {
            self.lifecycle.signed_out();
        }
        tracing::info!(user_id, "User signed out");
        Ok(task)
    }
}
