// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity_log;
pub mod movie;
pub mod user;

pub use activity_log::{ActivityLogEntry, AppendOutcome, CloseOutcome};
pub use movie::{FavoriteDocument, Movie, UNKNOWN_RATING};
pub use user::{Identity, Profile, ProfilePatch, User, UserDocument, UserPatch};
