//! Per-profile watchlist ("my list").

use rusqlite::Connection;
use mq_core::{Error, ProfileId, Result, TitleId};

use super::{is_foreign_key_violation, now_ts};
use crate::models::Title;

/// Add a title to the watchlist. Adding a title already on the list keeps
/// its original position and returns false.
pub fn add(conn: &Connection, profile_id: ProfileId, title_id: TitleId) -> Result<bool> {
    let n = conn
        .execute(
            "INSERT INTO watchlist (profile_id, title_id, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(profile_id, title_id) DO NOTHING",
            rusqlite::params![profile_id.to_string(), title_id.to_string(), now_ts()],
        )
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                Error::not_found("title", title_id)
            } else {
                Error::database(e.to_string())
            }
        })?;
    Ok(n > 0)
}

pub fn remove(conn: &Connection, profile_id: ProfileId, title_id: TitleId) -> Result<bool> {
    let n = conn
        .execute(
            "DELETE FROM watchlist WHERE profile_id = ?1 AND title_id = ?2",
            rusqlite::params![profile_id.to_string(), title_id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

pub fn contains(conn: &Connection, profile_id: ProfileId, title_id: TitleId) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM watchlist WHERE profile_id = ?1 AND title_id = ?2)",
        rusqlite::params![profile_id.to_string(), title_id.to_string()],
        |row| row.get(0),
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// Watchlisted titles, newest addition first.
pub fn list(conn: &Connection, profile_id: ProfileId, limit: i64) -> Result<Vec<Title>> {
    let mut stmt = conn
        .prepare(
            "SELECT t.id, t.kind, t.name, t.sort_name, t.overview, t.year, t.genre,
                    t.runtime_minutes, t.rating, t.thumbnail_url, t.video_path, t.parent_id,
                    t.season_number, t.episode_number, t.created_at, t.updated_at
             FROM watchlist w
             JOIN titles t ON t.id = w.title_id
             WHERE w.profile_id = ?1
             ORDER BY w.created_at DESC, w.rowid DESC
             LIMIT ?2",
        )
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map(rusqlite::params![profile_id.to_string(), limit], Title::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}
