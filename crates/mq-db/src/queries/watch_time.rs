//! Resume positions per (user, profile, title).

use rusqlite::{Connection, OptionalExtension};
use mq_core::{Error, ProfileId, Result, TitleId, UserId};

use super::{is_foreign_key_violation, now_ts};
use crate::models::WatchTime;

const COLS: &str = "user_id, profile_id, title_id, position_secs, duration_secs, updated_at";

/// Fraction of the duration past which a title counts as finished and
/// drops out of "continue watching".
pub const FINISHED_RATIO: f64 = 0.95;

/// Store the playback position, inserting or replacing the existing row.
///
/// The position is clamped to `[0, duration]`. A missing duration keeps the
/// previously stored one.
pub fn save_progress(
    conn: &Connection,
    user_id: UserId,
    profile_id: ProfileId,
    title_id: TitleId,
    position_secs: f64,
    duration_secs: Option<f64>,
) -> Result<WatchTime> {
    let duration = duration_secs.filter(|d| d.is_finite() && *d > 0.0);
    let mut position = if position_secs.is_finite() {
        position_secs.max(0.0)
    } else {
        0.0
    };
    if let Some(d) = duration {
        position = position.min(d);
    }
    let updated_at = now_ts();

    conn.execute(
        "INSERT INTO watch_time (user_id, profile_id, title_id, position_secs, duration_secs, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(user_id, profile_id, title_id) DO UPDATE SET
            position_secs = CASE
                WHEN excluded.duration_secs IS NULL AND watch_time.duration_secs IS NOT NULL
                THEN MIN(excluded.position_secs, watch_time.duration_secs)
                ELSE excluded.position_secs END,
            duration_secs = COALESCE(excluded.duration_secs, watch_time.duration_secs),
            updated_at = excluded.updated_at",
        rusqlite::params![
            user_id.to_string(),
            profile_id.to_string(),
            title_id.to_string(),
            position,
            duration,
            updated_at
        ],
    )
    .map_err(|e| {
        if is_foreign_key_violation(&e) {
            Error::not_found("title", title_id)
        } else {
            Error::database(e.to_string())
        }
    })?;

    get_progress(conn, user_id, profile_id, title_id)?
        .ok_or_else(|| Error::Internal("progress row vanished after upsert".into()))
}

pub fn get_progress(
    conn: &Connection,
    user_id: UserId,
    profile_id: ProfileId,
    title_id: TitleId,
) -> Result<Option<WatchTime>> {
    let q = format!(
        "SELECT {COLS} FROM watch_time WHERE user_id = ?1 AND profile_id = ?2 AND title_id = ?3"
    );
    conn.query_row(
        &q,
        rusqlite::params![user_id.to_string(), profile_id.to_string(), title_id.to_string()],
        WatchTime::from_row,
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))
}

/// Titles started but not finished, most recently watched first.
pub fn list_continue_watching(
    conn: &Connection,
    user_id: UserId,
    profile_id: ProfileId,
    limit: i64,
) -> Result<Vec<WatchTime>> {
    let q = format!(
        "SELECT {COLS} FROM watch_time
         WHERE user_id = ?1 AND profile_id = ?2
           AND position_secs > 0
           AND (duration_secs IS NULL OR position_secs < duration_secs * ?3)
         ORDER BY updated_at DESC, rowid DESC
         LIMIT ?4"
    );
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map(
            rusqlite::params![user_id.to_string(), profile_id.to_string(), FINISHED_RATIO, limit],
            WatchTime::from_row,
        )
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

pub fn clear_progress(
    conn: &Connection,
    user_id: UserId,
    profile_id: ProfileId,
    title_id: TitleId,
) -> Result<bool> {
    let n = conn
        .execute(
            "DELETE FROM watch_time WHERE user_id = ?1 AND profile_id = ?2 AND title_id = ?3",
            rusqlite::params![user_id.to_string(), profile_id.to_string(), title_id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}
