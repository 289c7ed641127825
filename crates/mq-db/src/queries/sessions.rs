//! Login session operations.

use rusqlite::{Connection, OptionalExtension};
use mq_core::{Error, Result, SessionId, UserId};

use super::now_ts;
use crate::models::Session;

const COLS: &str = "id, user_id, token, expires_at, created_at";

/// Create a new session token for a user.
pub fn create_session(
    conn: &Connection,
    user_id: UserId,
    token: &str,
    expires_at: &str,
) -> Result<Session> {
    let id = SessionId::new();
    let created_at = now_ts();

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, expires_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![id.to_string(), user_id.to_string(), token, expires_at, created_at],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(Session {
        id,
        user_id,
        token: token.to_string(),
        expires_at: expires_at.to_string(),
        created_at,
    })
}

/// Look up a session by its token value.
pub fn get_session(conn: &Connection, token: &str) -> Result<Option<Session>> {
    let q = format!("SELECT {COLS} FROM sessions WHERE token = ?1");
    conn.query_row(&q, [token], Session::from_row)
        .optional()
        .map_err(|e| Error::database(e.to_string()))
}

/// Delete a specific session by token.
pub fn delete_session(conn: &Connection, token: &str) -> Result<bool> {
    let n = conn
        .execute("DELETE FROM sessions WHERE token = ?1", [token])
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Delete every session of a user except, optionally, one token to keep.
pub fn delete_user_sessions(
    conn: &Connection,
    user_id: UserId,
    keep_token: Option<&str>,
) -> Result<usize> {
    let n = conn
        .execute(
            "DELETE FROM sessions WHERE user_id = ?1 AND (?2 IS NULL OR token != ?2)",
            rusqlite::params![user_id.to_string(), keep_token],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n)
}

/// Delete all sessions whose `expires_at` is before `now` (RFC 3339).
pub fn delete_expired_sessions(conn: &Connection, now: &str) -> Result<usize> {
    let n = conn
        .execute("DELETE FROM sessions WHERE expires_at < ?1", [now])
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;
    use crate::queries::users;
    use mq_core::Role;

    #[test]
    fn create_get_delete() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let user = users::create_user(&conn, "tok_user", None, "hash", Role::User).unwrap();

        let s = create_session(&conn, user.id, "abc123", "2099-01-01T00:00:00.000000Z").unwrap();
        assert_eq!(s.token, "abc123");

        let found = get_session(&conn, "abc123").unwrap().unwrap();
        assert_eq!(found.user_id, user.id);

        assert!(delete_session(&conn, "abc123").unwrap());
        assert!(get_session(&conn, "abc123").unwrap().is_none());
    }

    #[test]
    fn delete_expired() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let user = users::create_user(&conn, "exp_user", None, "hash", Role::User).unwrap();

        create_session(&conn, user.id, "old", "2000-01-01T00:00:00.000000Z").unwrap();
        create_session(&conn, user.id, "new", "2099-01-01T00:00:00.000000Z").unwrap();

        let deleted = delete_expired_sessions(&conn, "2025-06-01T00:00:00.000000Z").unwrap();
        assert_eq!(deleted, 1);
        assert!(get_session(&conn, "new").unwrap().is_some());
    }

    #[test]
    fn revoke_all_but_current() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let user = users::create_user(&conn, "multi", None, "hash", Role::User).unwrap();
        for t in ["a", "b", "c"] {
            create_session(&conn, user.id, t, "2099-01-01T00:00:00.000000Z").unwrap();
        }

        assert_eq!(delete_user_sessions(&conn, user.id, Some("b")).unwrap(), 2);
        assert!(get_session(&conn, "b").unwrap().is_some());
        assert_eq!(delete_user_sessions(&conn, user.id, None).unwrap(), 1);
    }

    #[test]
    fn sessions_cascade_with_user() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let user = users::create_user(&conn, "gone", None, "hash", Role::User).unwrap();
        create_session(&conn, user.id, "t", "2099-01-01T00:00:00.000000Z").unwrap();
        users::delete_user(&conn, user.id).unwrap();
        assert!(get_session(&conn, "t").unwrap().is_none());
    }
}
