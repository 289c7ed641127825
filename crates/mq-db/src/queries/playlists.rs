//! User-curated, ordered playlists.
//!
//! Entry positions are kept dense (`0..n`) after every mutation so the
//! client can treat them as list indices.

use rusqlite::{Connection, OptionalExtension};
use mq_core::{Error, PlaylistId, ProfileId, Result, TitleId, UserId};

use super::{is_foreign_key_violation, is_unique_violation, now_ts};
use crate::models::{Playlist, PlaylistEntry, Title};

const COLS: &str = "id, user_id, profile_id, name, created_at, updated_at";

/// Create an empty playlist owned by `user_id`.
pub fn create_playlist(
    conn: &Connection,
    user_id: UserId,
    profile_id: Option<ProfileId>,
    name: &str,
) -> Result<Playlist> {
    let id = PlaylistId::new();
    let now = now_ts();

    conn.execute(
        "INSERT INTO playlists (id, user_id, profile_id, name, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            id.to_string(),
            user_id.to_string(),
            profile_id.map(|p| p.to_string()),
            name,
            &now,
            &now
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(Playlist {
        id,
        user_id,
        profile_id,
        name: name.to_string(),
        created_at: now.clone(),
        updated_at: now,
    })
}

/// Get a playlist, scoped to its owner.
pub fn get_playlist(conn: &Connection, user_id: UserId, id: PlaylistId) -> Result<Option<Playlist>> {
    let q = format!("SELECT {COLS} FROM playlists WHERE id = ?1 AND user_id = ?2");
    conn.query_row(
        &q,
        rusqlite::params![id.to_string(), user_id.to_string()],
        Playlist::from_row,
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))
}

/// All playlists of a user, most recently changed first.
pub fn list_playlists(conn: &Connection, user_id: UserId) -> Result<Vec<Playlist>> {
    let q = format!(
        "SELECT {COLS} FROM playlists WHERE user_id = ?1 ORDER BY updated_at DESC, rowid DESC"
    );
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([user_id.to_string()], Playlist::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

pub fn count_playlists(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM playlists", [], |row| row.get(0))
        .map_err(|e| Error::database(e.to_string()))
}

pub fn rename_playlist(
    conn: &Connection,
    user_id: UserId,
    id: PlaylistId,
    name: &str,
) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE playlists SET name = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
            rusqlite::params![name, now_ts(), id.to_string(), user_id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

pub fn delete_playlist(conn: &Connection, user_id: UserId, id: PlaylistId) -> Result<bool> {
    let n = conn
        .execute(
            "DELETE FROM playlists WHERE id = ?1 AND user_id = ?2",
            rusqlite::params![id.to_string(), user_id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

fn touch(conn: &Connection, id: PlaylistId) -> Result<()> {
    conn.execute(
        "UPDATE playlists SET updated_at = ?1 WHERE id = ?2",
        rusqlite::params![now_ts(), id.to_string()],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

/// Rewrite positions as `0..n` following `ordered`.
fn write_positions(conn: &Connection, id: PlaylistId, ordered: &[TitleId]) -> Result<()> {
    let mut stmt = conn
        .prepare("UPDATE playlist_entries SET position = ?1 WHERE playlist_id = ?2 AND title_id = ?3")
        .map_err(|e| Error::database(e.to_string()))?;
    for (pos, title_id) in ordered.iter().enumerate() {
        stmt.execute(rusqlite::params![pos as i64, id.to_string(), title_id.to_string()])
            .map_err(|e| Error::database(e.to_string()))?;
    }
    Ok(())
}

fn entry_order(conn: &Connection, id: PlaylistId) -> Result<Vec<TitleId>> {
    Ok(list_entries(conn, id)?.into_iter().map(|e| e.title_id).collect())
}

/// Append a title at the end of the playlist.
pub fn add_entry(conn: &Connection, id: PlaylistId, title_id: TitleId) -> Result<PlaylistEntry> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::database(e.to_string()))?;

    let position: i64 = tx
        .query_row(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM playlist_entries WHERE playlist_id = ?1",
            [id.to_string()],
            |row| row.get(0),
        )
        .map_err(|e| Error::database(e.to_string()))?;
    let added_at = now_ts();

    tx.execute(
        "INSERT INTO playlist_entries (playlist_id, title_id, position, added_at)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![id.to_string(), title_id.to_string(), position, &added_at],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            Error::Conflict("Title is already in this playlist".into())
        } else if is_foreign_key_violation(&e) {
            Error::not_found("title", title_id)
        } else {
            Error::database(e.to_string())
        }
    })?;

    touch(&tx, id)?;
    tx.commit().map_err(|e| Error::database(e.to_string()))?;

    Ok(PlaylistEntry {
        playlist_id: id,
        title_id,
        position,
        added_at,
    })
}

/// Remove a title and close the gap it leaves.
pub fn remove_entry(conn: &Connection, id: PlaylistId, title_id: TitleId) -> Result<bool> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::database(e.to_string()))?;

    let n = tx
        .execute(
            "DELETE FROM playlist_entries WHERE playlist_id = ?1 AND title_id = ?2",
            rusqlite::params![id.to_string(), title_id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    if n == 0 {
        return Ok(false);
    }

    let order = entry_order(&tx, id)?;
    write_positions(&tx, id, &order)?;
    touch(&tx, id)?;
    tx.commit().map_err(|e| Error::database(e.to_string()))?;
    Ok(true)
}

/// Move a title to `new_position`, clamped to the end of the list, shifting
/// the entries in between. Returns the position actually used.
pub fn move_entry(
    conn: &Connection,
    id: PlaylistId,
    title_id: TitleId,
    new_position: i64,
) -> Result<i64> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::database(e.to_string()))?;

    let mut order = entry_order(&tx, id)?;
    let current = order
        .iter()
        .position(|t| *t == title_id)
        .ok_or_else(|| Error::not_found("playlist entry", title_id))?;

    let target = new_position.clamp(0, order.len() as i64 - 1) as usize;
    let moved = order.remove(current);
    order.insert(target, moved);

    write_positions(&tx, id, &order)?;
    touch(&tx, id)?;
    tx.commit().map_err(|e| Error::database(e.to_string()))?;
    Ok(target as i64)
}

/// Entries in playlist order.
pub fn list_entries(conn: &Connection, id: PlaylistId) -> Result<Vec<PlaylistEntry>> {
    let mut stmt = conn
        .prepare(
            "SELECT playlist_id, title_id, position, added_at FROM playlist_entries
             WHERE playlist_id = ?1 ORDER BY position ASC, added_at ASC",
        )
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([id.to_string()], PlaylistEntry::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Titles of a playlist in playlist order.
pub fn list_entry_titles(conn: &Connection, id: PlaylistId) -> Result<Vec<Title>> {
    let mut stmt = conn
        .prepare(
            "SELECT t.id, t.kind, t.name, t.sort_name, t.overview, t.year, t.genre,
                    t.runtime_minutes, t.rating, t.thumbnail_url, t.video_path, t.parent_id,
                    t.season_number, t.episode_number, t.created_at, t.updated_at
             FROM playlist_entries e
             JOIN titles t ON t.id = e.title_id
             WHERE e.playlist_id = ?1
             ORDER BY e.position ASC",
        )
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([id.to_string()], Title::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}
