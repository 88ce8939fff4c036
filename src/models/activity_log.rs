// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Per-user login/logout activity log.
//!
//! Invariant: only the last entry may be open (no logout time). The helpers
//! here are the only code that mutates a log, and both remote backends call
//! them inside a single atomic update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time_utils::deserialize_optional_timestamp;

/// One login/logout pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub login_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub logout_time: Option<DateTime<Utc>>,
}

impl ActivityLogEntry {
    /// New open session starting at `login_time`.
    pub fn open(login_time: DateTime<Utc>) -> Self {
        Self {
            login_time: Some(login_time),
            logout_time: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.logout_time.is_none()
    }
}

/// Result of appending an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    /// The user document did not exist and was created
    pub created_document: bool,
    /// A dangling open entry was closed with the new login time
    pub healed_open_entry: bool,
}

/// Result of closing the last open entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed,
    /// Last entry already had a logout time
    AlreadyClosed,
    /// Log is empty or the user has no document
    NothingToClose,
    /// Close time predates the open entry's login (delivered out of order)
    Stale,
}

/// Append `entry`, closing a dangling open entry first.
///
/// The dangling entry is closed with the new entry's login time, which is
/// the best available bound for a session that was never logged out.
/// Returns whether such a heal happened.
pub fn append_entry(log: &mut Vec<ActivityLogEntry>, entry: ActivityLogEntry) -> bool {
    let mut healed = false;
    if let Some(last) = log.last_mut() {
        if last.is_open() {
            last.logout_time = entry.login_time.or(Some(Utc::now()));
            healed = true;
        }
    }
    log.push(entry);
    healed
}

/// Close the last entry if it is open.
pub fn close_last_open(log: &mut [ActivityLogEntry], close_time: DateTime<Utc>) -> CloseOutcome {
    let Some(last) = log.last_mut() else {
        return CloseOutcome::NothingToClose;
    };
    if !last.is_open() {
        return CloseOutcome::AlreadyClosed;
    }
    if last.login_time.is_some_and(|login| close_time < login) {
        return CloseOutcome::Stale;
    }
    last.logout_time = Some(close_time);
    CloseOutcome::Closed
}

/// Number of open entries (0 or 1 in a healthy log).
pub fn open_entries(log: &[ActivityLogEntry]) -> usize {
    log.iter().filter(|e| e.is_open()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_entry_accepts_legacy_and_rfc3339_times() {
        let entry: ActivityLogEntry = serde_json::from_value(serde_json::json!({
            "login_time": "2025-03-01 08:00:00",
            "logout_time": "2025-03-01T09:00:00Z",
        }))
        .unwrap();
        assert_eq!(entry.login_time, Some(at(8)));
        assert_eq!(entry.logout_time, Some(at(9)));
    }

    #[test]
    fn test_entry_missing_or_null_times_are_none() {
        let entry: ActivityLogEntry = serde_json::from_value(serde_json::json!({
            "login_time": "2025-03-01 08:00:00",
            "logout_time": null,
        }))
        .unwrap();
        assert!(entry.is_open());

        let entry: ActivityLogEntry = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(entry.login_time, None);
    }

    #[test]
    fn test_entry_rejects_unparseable_time() {
        let result = serde_json::from_value::<ActivityLogEntry>(
            serde_json::json!({"login_time": "last tuesday"}),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_append_to_empty_log() {
        let mut log = Vec::new();
        let healed = append_entry(&mut log, ActivityLogEntry::open(at(8)));
        assert!(!healed);
        assert_eq!(log, vec![ActivityLogEntry::open(at(8))]);
    }

    #[test]
    fn test_append_heals_dangling_entry() {
        let mut log = vec![ActivityLogEntry::open(at(8))];
        let healed = append_entry(&mut log, ActivityLogEntry::open(at(10)));

        assert!(healed);
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].logout_time, Some(at(10)));
        assert_eq!(log[1], ActivityLogEntry::open(at(10)));
        assert_eq!(open_entries(&log), 1);
    }

    #[test]
    fn test_close_open_entry() {
        let mut log = vec![ActivityLogEntry::open(at(8))];
        assert_eq!(close_last_open(&mut log, at(9)), CloseOutcome::Closed);
        assert_eq!(log[0].logout_time, Some(at(9)));
    }

    #[test]
    fn test_close_twice_is_noop() {
        let mut log = vec![ActivityLogEntry::open(at(8))];
        close_last_open(&mut log, at(9));
        let snapshot = log.clone();

        assert_eq!(close_last_open(&mut log, at(11)), CloseOutcome::AlreadyClosed);
        assert_eq!(log, snapshot);
    }

    #[test]
    fn test_close_empty_log() {
        let mut log: Vec<ActivityLogEntry> = Vec::new();
        assert_eq!(close_last_open(&mut log, at(9)), CloseOutcome::NothingToClose);
    }

    #[test]
    fn test_stale_close_leaves_newer_session_open() {
        // Logout at 9 arrives after a re-login at 10 already healed and reopened.
        let mut log = vec![ActivityLogEntry::open(at(8))];
        append_entry(&mut log, ActivityLogEntry::open(at(10)));

        assert_eq!(close_last_open(&mut log, at(9)), CloseOutcome::Stale);
        assert!(log[1].is_open());
    }

    #[test]
    fn test_serialized_field_names() {
        let json = serde_json::to_value(ActivityLogEntry::open(at(8))).unwrap();
        assert_eq!(json["login_time"], "2025-03-01T08:00:00Z");
        assert!(json["logout_time"].is_null());
    }
}
