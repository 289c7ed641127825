//! Per-profile favorite titles.

use rusqlite::Connection;
use mq_core::{Error, ProfileId, Result, TitleId};

use super::{is_foreign_key_violation, now_ts};
use crate::models::Title;

/// Mark a title as a favorite. Returns false if it already was one.
pub fn add_favorite(conn: &Connection, profile_id: ProfileId, title_id: TitleId) -> Result<bool> {
    let n = conn
        .execute(
            "INSERT OR IGNORE INTO favorites (profile_id, title_id, created_at)
             VALUES (?1, ?2, ?3)",
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

pub fn remove_favorite(
    conn: &Connection,
    profile_id: ProfileId,
    title_id: TitleId,
) -> Result<bool> {
    let n = conn
        .execute(
            "DELETE FROM favorites WHERE profile_id = ?1 AND title_id = ?2",
            rusqlite::params![profile_id.to_string(), title_id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

pub fn is_favorite(conn: &Connection, profile_id: ProfileId, title_id: TitleId) -> Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM favorites WHERE profile_id = ?1 AND title_id = ?2",
        rusqlite::params![profile_id.to_string(), title_id.to_string()],
        |row| row.get(0),
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// Favorite titles of a profile, most recently added first.
pub fn list_favorites(conn: &Connection, profile_id: ProfileId, limit: i64) -> Result<Vec<Title>> {
    let mut stmt = conn
        .prepare(
            "SELECT t.id, t.kind, t.name, t.sort_name, t.overview, t.year, t.genre,
                    t.runtime_minutes, t.rating, t.thumbnail_url, t.video_path, t.parent_id,
                    t.season_number, t.episode_number, t.created_at, t.updated_at
             FROM favorites f
             JOIN titles t ON t.id = f.title_id
             WHERE f.profile_id = ?1
             ORDER BY f.created_at DESC, f.rowid DESC
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;
    use crate::queries::titles::{self, TitleFields};
    use crate::queries::{profiles, users};
    use mq_core::{Role, TitleKind};

    fn setup() -> (crate::pool::PooledConnection, ProfileId) {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let user = users::create_user(&conn, "fan", None, "h", Role::User).unwrap();
        let profile = profiles::create_profile(&conn, user.id, "Fan", None, false, 5).unwrap();
        (conn, profile.id)
    }

    #[test]
    fn add_is_idempotent() {
        let (conn, pid) = setup();
        let t = titles::create_title(&conn, &TitleFields::new(TitleKind::Movie, "Heat")).unwrap();

        assert!(add_favorite(&conn, pid, t.id).unwrap());
        assert!(!add_favorite(&conn, pid, t.id).unwrap());
        assert!(is_favorite(&conn, pid, t.id).unwrap());
        assert_eq!(list_favorites(&conn, pid, 50).unwrap().len(), 1);

        assert!(remove_favorite(&conn, pid, t.id).unwrap());
        assert!(!remove_favorite(&conn, pid, t.id).unwrap());
        assert!(!is_favorite(&conn, pid, t.id).unwrap());
    }

    #[test]
    fn newest_first() {
        let (conn, pid) = setup();
        for name in ["First", "Second", "Third"] {
            let t = titles::create_title(&conn, &TitleFields::new(TitleKind::Movie, name)).unwrap();
            add_favorite(&conn, pid, t.id).unwrap();
        }
        let favs = list_favorites(&conn, pid, 2).unwrap();
        let names: Vec<_> = favs.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Third", "Second"]);
    }

    #[test]
    fn unknown_title_is_not_found() {
        let (conn, pid) = setup();
        let err = add_favorite(&conn, pid, TitleId::new()).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
