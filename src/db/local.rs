// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local durable store (SQLite).
//!
//! Synchronous and single-writer: every call takes the connection lock for
//! the duration of one statement or transaction. This is the device's source
//! of truth; the remote store only ever catches up with it.
//!
//! Schema changes are additive only. Each migration step is applied in its
//! own transaction and recorded in `schema_version`.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};

use crate::error::{AppError, Result};
use crate::models::{Movie, User, UserPatch, UNKNOWN_RATING};
use crate::time_utils::{format_utc_rfc3339, parse_timestamp};

/// Current schema version
const SCHEMA_VERSION: i32 = 3;

const FAVORITE_COLUMNS: &str = "movie_id, title, image_url, plot, rating, release_date";
const USER_COLUMNS: &str =
    "user_id, name, email, last_login, last_logout, address, phone, image";

/// SQLite-backed store for users and favorites.
pub struct LocalStore {
    conn: Mutex<Connection>,
}

impl LocalStore {
    /// Open or create the database at the given path.
    pub fn open(path: &str) -> Result<Self> {
        tracing::debug!(path, "Opening local store");
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Private in-memory database (tests, ephemeral sessions).
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
        Self::migrate(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::LocalStore("connection lock poisoned".to_string()))
    }

    // ─── Migrations ──────────────────────────────────────────────

    /// Run database migrations
    fn migrate(conn: &mut Connection) -> Result<()> {
        let current_version = Self::get_schema_version(conn)?;
        if current_version >= SCHEMA_VERSION {
            return Ok(());
        }

        tracing::info!(
            current = current_version,
            target = SCHEMA_VERSION,
            "Running local store migrations"
        );

        let steps: [(i32, fn(&Transaction<'_>) -> Result<()>); 3] = [
            (1, Self::migrate_v1),
            (2, Self::migrate_v2),
            (3, Self::migrate_v3),
        ];
        for (version, step) in steps {
            if current_version < version {
                let tx = conn.transaction()?;
                step(&tx)?;
                tx.execute(
                    "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                    params![version],
                )?;
                tx.commit()?;
            }
        }

        tracing::info!("Local store migrations complete");
        Ok(())
    }

    /// Get current schema version (0 if no schema exists)
    fn get_schema_version(conn: &Connection) -> Result<i32> {
        let table_exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            [],
            |row| row.get(0),
        )?;

        if !table_exists {
            return Ok(0);
        }

        Ok(conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<i32>>(0).map(|v| v.unwrap_or(0))
        })?)
    }

    /// Migration to version 1: users with session timestamps, favorites
    fn migrate_v1(tx: &Transaction<'_>) -> Result<()> {
        tx.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS users (
                user_id TEXT PRIMARY KEY,
                name TEXT,
                email TEXT,
                last_login TEXT,
                last_logout TEXT
            );

            CREATE TABLE IF NOT EXISTS favorites (
                movie_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                title TEXT,
                image_url TEXT,
                release_date TEXT,
                plot TEXT,
                rating REAL,
                PRIMARY KEY (movie_id, user_id)
            );
            CREATE INDEX IF NOT EXISTS idx_favorites_user_id ON favorites(user_id);
            "#,
        )?;
        Ok(())
    }

    /// Migration to version 2: profile columns (encrypted address/phone, image)
    fn migrate_v2(tx: &Transaction<'_>) -> Result<()> {
        add_column_if_missing(tx, "users", "address", "TEXT")?;
        add_column_if_missing(tx, "users", "phone", "TEXT")?;
        add_column_if_missing(tx, "users", "image", "TEXT")?;
        Ok(())
    }

    /// Migration to version 3: removals not yet confirmed by the remote store
    fn migrate_v3(tx: &Transaction<'_>) -> Result<()> {
        tx.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS pending_favorite_deletions (
                movie_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                requested_at TEXT NOT NULL,
                PRIMARY KEY (movie_id, user_id)
            );
            "#,
        )?;
        Ok(())
    }

    // ─── Favorites ───────────────────────────────────────────────

    /// All favorites of a user, oldest first. Unknown users have none.
    pub fn get_favorites(&self, user_id: &str) -> Result<Vec<Movie>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {FAVORITE_COLUMNS} FROM favorites WHERE user_id = ?1 ORDER BY rowid"
        ))?;
        let movies = stmt
            .query_map(params![user_id], movie_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(movies)
    }

    pub fn favorite_exists(&self, movie_id: &str, user_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        Ok(conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM favorites WHERE movie_id = ?1 AND user_id = ?2)",
            params![movie_id, user_id],
            |row| row.get(0),
        )?)
    }

    /// Insert a favorite unless the pair already exists.
    ///
    /// An existing row is never overwritten. Re-adding a movie also cancels
    /// a pending remote deletion for it. Returns true if a row was inserted.
    pub fn add_favorite(&self, movie: &Movie, user_id: &str) -> Result<bool> {
        if movie.id.is_empty() {
            return Err(AppError::BadRequest("movie id must not be empty".to_string()));
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO favorites
                (movie_id, user_id, title, image_url, release_date, plot, rating)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                movie.id,
                user_id,
                movie.title,
                movie.image,
                movie.release_date,
                movie.plot,
                movie.rating,
            ],
        )?;
        tx.execute(
            "DELETE FROM pending_favorite_deletions WHERE movie_id = ?1 AND user_id = ?2",
            params![movie.id, user_id],
        )?;
        tx.commit()?;

        if inserted == 0 {
            tracing::debug!(user_id, movie_id = %movie.id, "Favorite already stored");
        }
        Ok(inserted > 0)
    }

    /// Delete a favorite. Returns false if it was not there.
    pub fn remove_favorite(&self, movie_id: &str, user_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM favorites WHERE movie_id = ?1 AND user_id = ?2",
            params![movie_id, user_id],
        )?;
        Ok(removed > 0)
    }

    // ─── Pending remote deletions ────────────────────────────────

    /// Remember that the remote copy of a favorite still has to be deleted.
    pub fn mark_pending_deletion(
        &self,
        movie_id: &str,
        user_id: &str,
        requested_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO pending_favorite_deletions (movie_id, user_id, requested_at)
             VALUES (?1, ?2, ?3)",
            params![movie_id, user_id, format_utc_rfc3339(requested_at)],
        )?;
        Ok(())
    }

    pub fn clear_pending_deletion(&self, movie_id: &str, user_id: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM pending_favorite_deletions WHERE movie_id = ?1 AND user_id = ?2",
            params![movie_id, user_id],
        )?;
        Ok(())
    }

    /// Movie ids removed locally whose remote deletion is unconfirmed.
    pub fn pending_deletions(&self, user_id: &str) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT movie_id FROM pending_favorite_deletions WHERE user_id = ?1 ORDER BY requested_at",
        )?;
        let ids = stmt
            .query_map(params![user_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    // ─── Users ───────────────────────────────────────────────────

    pub fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
                params![user_id],
                user_from_row,
            )
            .optional()?)
    }

    pub fn user_exists(&self, user_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        Ok(conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE user_id = ?1)",
            params![user_id],
            |row| row.get(0),
        )?)
    }

    /// Insert the user if absent, else update only the fields set in `patch`.
    pub fn upsert_user(&self, user_id: &str, patch: &UserPatch) -> Result<()> {
        if user_id.is_empty() {
            return Err(AppError::BadRequest("user id must not be empty".to_string()));
        }
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO users (user_id, name, email, last_login, last_logout, address, phone, image)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(user_id) DO UPDATE SET
                name = COALESCE(excluded.name, name),
                email = COALESCE(excluded.email, email),
                last_login = COALESCE(excluded.last_login, last_login),
                last_logout = COALESCE(excluded.last_logout, last_logout),
                address = COALESCE(excluded.address, address),
                phone = COALESCE(excluded.phone, phone),
                image = COALESCE(excluded.image, image)",
            params![
                user_id,
                patch.name,
                patch.email,
                patch.last_login.map(format_utc_rfc3339),
                patch.last_logout.map(format_utc_rfc3339),
                patch.address,
                patch.phone,
                patch.image,
            ],
        )?;
        Ok(())
    }

    /// Set only `last_login`, creating a minimal user if needed.
    pub fn register_login(&self, user_id: &str, time: DateTime<Utc>) -> Result<()> {
        self.upsert_user(user_id, &UserPatch::login(time))
    }

    /// Set only `last_logout`, creating a minimal user if needed.
    pub fn register_logout(&self, user_id: &str, time: DateTime<Utc>) -> Result<()> {
        self.upsert_user(user_id, &UserPatch::logout(time))
    }
}

/// Add a nullable column unless the table already has it.
fn add_column_if_missing(
    tx: &Transaction<'_>,
    table: &str,
    column: &str,
    decl: &str,
) -> Result<()> {
    let exists: bool = tx.query_row(
        &format!("SELECT EXISTS(SELECT 1 FROM pragma_table_info('{table}') WHERE name = ?1)"),
        params![column],
        |row| row.get(0),
    )?;
    if !exists {
        tx.execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {column} {decl};"))?;
    }
    Ok(())
}

fn movie_from_row(row: &Row<'_>) -> rusqlite::Result<Movie> {
    Ok(Movie {
        id: row.get(0)?,
        title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        image: row.get(2)?,
        plot: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        rating: row.get::<_, Option<f64>>(4)?.unwrap_or(UNKNOWN_RATING),
        release_date: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let timestamp = |idx: usize| -> rusqlite::Result<Option<DateTime<Utc>>> {
        Ok(row
            .get::<_, Option<String>>(idx)?
            .as_deref()
            .and_then(parse_timestamp))
    };
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        last_login: timestamp(3)?,
        last_logout: timestamp(4)?,
        address: row.get(5)?,
        phone: row.get(6)?,
        image: row.get(7)?,
    })
}
