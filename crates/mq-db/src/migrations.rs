//! Embedded SQL migrations and runner.
//!
//! Migrations are stored as `&str` constants and executed in order.  A
//! `schema_migrations` table tracks which versions have been applied.

use rusqlite::Connection;
use mq_core::{Error, Result};

/// V1: accounts, login sessions and viewing profiles.
const V1_ACCOUNTS: &str = r#"
CREATE TABLE users (
    id            TEXT PRIMARY KEY,
    username      TEXT UNIQUE NOT NULL,
    email         TEXT UNIQUE,
    password_hash TEXT NOT NULL,
    role          TEXT NOT NULL DEFAULT 'user',
    created_at    TEXT NOT NULL
);

CREATE TABLE sessions (
    id         TEXT PRIMARY KEY,
    user_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    token      TEXT UNIQUE NOT NULL,
    expires_at TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE profiles (
    id         TEXT PRIMARY KEY,
    user_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    name       TEXT NOT NULL,
    avatar     TEXT,
    is_kids    INTEGER NOT NULL DEFAULT 0,
    in_use     INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    UNIQUE (user_id, name)
);

CREATE INDEX idx_sessions_user ON sessions(user_id);
CREATE INDEX idx_profiles_user ON profiles(user_id);
"#;

/// V2: catalog titles (movies, series, episodes) and actor metadata.
const V2_CATALOG: &str = r#"
CREATE TABLE titles (
    id              TEXT PRIMARY KEY,
    kind            TEXT NOT NULL,
    name            TEXT NOT NULL,
    sort_name       TEXT,
    overview        TEXT,
    year            INTEGER,
    genre           TEXT,
    runtime_minutes INTEGER,
    rating          REAL,
    thumbnail_url   TEXT,
    video_path      TEXT,
    parent_id       TEXT REFERENCES titles(id) ON DELETE CASCADE,
    season_number   INTEGER,
    episode_number  INTEGER,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE actors (
    id         TEXT PRIMARY KEY,
    name       TEXT NOT NULL,
    bio        TEXT,
    photo_url  TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE title_actors (
    title_id      TEXT NOT NULL REFERENCES titles(id) ON DELETE CASCADE,
    actor_id      TEXT NOT NULL REFERENCES actors(id) ON DELETE CASCADE,
    character     TEXT,
    billing_order INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (title_id, actor_id)
);

CREATE INDEX idx_titles_kind   ON titles(kind);
CREATE INDEX idx_titles_parent ON titles(parent_id);
CREATE INDEX idx_titles_genre  ON titles(genre);
CREATE INDEX idx_title_actors_actor ON title_actors(actor_id);
"#;

/// V3: per-profile favorites and watchlist, user playlists.
const V3_LIBRARY: &str = r#"
CREATE TABLE favorites (
    profile_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    title_id   TEXT NOT NULL REFERENCES titles(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    PRIMARY KEY (profile_id, title_id)
);

CREATE TABLE watchlist (
    profile_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    title_id   TEXT NOT NULL REFERENCES titles(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    PRIMARY KEY (profile_id, title_id)
);

CREATE TABLE playlists (
    id         TEXT PRIMARY KEY,
    user_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    profile_id TEXT REFERENCES profiles(id) ON DELETE SET NULL,
    name       TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE playlist_entries (
    playlist_id TEXT NOT NULL REFERENCES playlists(id) ON DELETE CASCADE,
    title_id    TEXT NOT NULL REFERENCES titles(id) ON DELETE CASCADE,
    position    INTEGER NOT NULL,
    added_at    TEXT NOT NULL,
    PRIMARY KEY (playlist_id, title_id)
);

CREATE INDEX idx_favorites_profile ON favorites(profile_id);
CREATE INDEX idx_watchlist_profile ON watchlist(profile_id);
CREATE INDEX idx_playlists_user    ON playlists(user_id);
"#;

/// V4: resume positions and per-day view counters.
const V4_PLAYBACK: &str = r#"
CREATE TABLE watch_time (
    user_id       TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    profile_id    TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    title_id      TEXT NOT NULL REFERENCES titles(id) ON DELETE CASCADE,
    position_secs REAL NOT NULL DEFAULT 0.0,
    duration_secs REAL,
    updated_at    TEXT NOT NULL,
    PRIMARY KEY (user_id, profile_id, title_id)
);

CREATE TABLE title_views (
    title_id  TEXT NOT NULL REFERENCES titles(id) ON DELETE CASCADE,
    view_date TEXT NOT NULL,
    count     INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (title_id, view_date)
);

CREATE INDEX idx_watch_time_profile ON watch_time(user_id, profile_id);
CREATE INDEX idx_title_views_date   ON title_views(view_date);
"#;

/// Ordered list of (version, sql) pairs.
const MIGRATIONS: &[(i64, &str)] = &[
    (1, V1_ACCOUNTS),
    (2, V2_CATALOG),
    (3, V3_LIBRARY),
    (4, V4_PLAYBACK),
];

/// Run all pending migrations on `conn`.
///
/// Creates the `schema_migrations` tracking table if it does not exist,
/// then applies each outstanding migration inside a transaction.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .map_err(|e| Error::database(format!("Failed to create schema_migrations: {e}")))?;

    for &(version, sql) in MIGRATIONS {
        let already: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM schema_migrations WHERE version = ?1",
                [version],
                |row| row.get(0),
            )
            .map_err(|e| Error::database(e.to_string()))?;

        if already {
            continue;
        }

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::database(e.to_string()))?;

        tx.execute_batch(sql)
            .map_err(|e| Error::database(format!("Migration V{version} failed: {e}")))?;

        tx.execute(
            "INSERT INTO schema_migrations (version) VALUES (?1)",
            [version],
        )
        .map_err(|e| Error::database(e.to_string()))?;

        tx.commit().map_err(|e| Error::database(e.to_string()))?;

        tracing::debug!("Applied migration V{version}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let applied: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(applied, MIGRATIONS.len() as i64);
    }

    #[test]
    fn all_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn).unwrap();

        let tables = [
            "users",
            "sessions",
            "profiles",
            "titles",
            "actors",
            "title_actors",
            "favorites",
            "watchlist",
            "playlists",
            "playlist_entries",
            "watch_time",
            "title_views",
            "schema_migrations",
        ];
        for t in &tables {
            let exists: bool = conn
                .query_row(
                    "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name=?1",
                    [t],
                    |row| row.get(0),
                )
                .unwrap();
            assert!(exists, "table {t} should exist");
        }
    }
}
