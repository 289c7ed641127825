//! Viewing profile operations.
//!
//! Every account owns up to a configured number of profiles. Exactly one of
//! them may carry the `in_use` flag at a time; that profile scopes the
//! favorites, watchlist and watch progress of the account's requests.

use rusqlite::{Connection, OptionalExtension};
use mq_core::{Error, ProfileId, Result, UserId};

use super::{is_unique_violation, now_ts};
use crate::models::Profile;

const COLS: &str = "id, user_id, name, avatar, is_kids, in_use, created_at";

/// Create a profile for `user_id`, refusing once `max_per_user` exist.
///
/// The first profile of an account is created already in use.
pub fn create_profile(
    conn: &Connection,
    user_id: UserId,
    name: &str,
    avatar: Option<&str>,
    is_kids: bool,
    max_per_user: u32,
) -> Result<Profile> {
    let existing = count_profiles(conn, user_id)?;
    if existing >= i64::from(max_per_user) {
        return Err(Error::Validation(format!(
            "An account can have at most {max_per_user} profiles"
        )));
    }

    let id = ProfileId::new();
    let created_at = now_ts();
    let in_use = existing == 0;

    conn.execute(
        "INSERT INTO profiles (id, user_id, name, avatar, is_kids, in_use, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            id.to_string(),
            user_id.to_string(),
            name,
            avatar,
            is_kids as i32,
            in_use as i32,
            created_at
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            Error::Conflict(format!("A profile named '{name}' already exists"))
        } else {
            Error::database(e.to_string())
        }
    })?;

    Ok(Profile {
        id,
        user_id,
        name: name.to_string(),
        avatar: avatar.map(String::from),
        is_kids,
        in_use,
        created_at,
    })
}

/// Get a profile, scoped to its owning account.
pub fn get_profile(conn: &Connection, user_id: UserId, id: ProfileId) -> Result<Option<Profile>> {
    let q = format!("SELECT {COLS} FROM profiles WHERE id = ?1 AND user_id = ?2");
    conn.query_row(
        &q,
        rusqlite::params![id.to_string(), user_id.to_string()],
        Profile::from_row,
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))
}

/// List an account's profiles in creation order.
pub fn list_profiles(conn: &Connection, user_id: UserId) -> Result<Vec<Profile>> {
    let q = format!("SELECT {COLS} FROM profiles WHERE user_id = ?1 ORDER BY created_at, rowid");
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([user_id.to_string()], Profile::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

pub fn count_profiles(conn: &Connection, user_id: UserId) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM profiles WHERE user_id = ?1",
        [user_id.to_string()],
        |row| row.get(0),
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// Total number of profiles across all accounts.
pub fn count_all_profiles(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM profiles", [], |row| row.get(0))
        .map_err(|e| Error::database(e.to_string()))
}

/// Update name, avatar and kids flag. Returns false if the profile does not
/// belong to `user_id`.
pub fn update_profile(
    conn: &Connection,
    user_id: UserId,
    id: ProfileId,
    name: &str,
    avatar: Option<&str>,
    is_kids: bool,
) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE profiles SET name = ?1, avatar = ?2, is_kids = ?3
             WHERE id = ?4 AND user_id = ?5",
            rusqlite::params![name, avatar, is_kids as i32, id.to_string(), user_id.to_string()],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Conflict(format!("A profile named '{name}' already exists"))
            } else {
                Error::database(e.to_string())
            }
        })?;
    Ok(n > 0)
}

/// Delete a profile. Its favorites, watchlist and progress go with it.
pub fn delete_profile(conn: &Connection, user_id: UserId, id: ProfileId) -> Result<bool> {
    let n = conn
        .execute(
            "DELETE FROM profiles WHERE id = ?1 AND user_id = ?2",
            rusqlite::params![id.to_string(), user_id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Mark `id` as the profile in use, clearing the flag on every other
/// profile of the account in the same transaction.
pub fn select_profile(conn: &Connection, user_id: UserId, id: ProfileId) -> Result<Profile> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::database(e.to_string()))?;

    tx.execute(
        "UPDATE profiles SET in_use = 0 WHERE user_id = ?1",
        [user_id.to_string()],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    let n = tx
        .execute(
            "UPDATE profiles SET in_use = 1 WHERE id = ?1 AND user_id = ?2",
            rusqlite::params![id.to_string(), user_id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;

    if n == 0 {
        // Dropping the transaction rolls back the flag reset.
        return Err(Error::not_found("profile", id));
    }

    tx.commit().map_err(|e| Error::database(e.to_string()))?;

    get_profile(conn, user_id, id)?.ok_or_else(|| Error::not_found("profile", id))
}

/// The account's profile currently in use, if any.
pub fn active_profile(conn: &Connection, user_id: UserId) -> Result<Option<Profile>> {
    let q = format!("SELECT {COLS} FROM profiles WHERE user_id = ?1 AND in_use = 1 LIMIT 1");
    conn.query_row(&q, [user_id.to_string()], Profile::from_row)
        .optional()
        .map_err(|e| Error::database(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;
    use crate::queries::users;
    use mq_core::Role;

    fn setup() -> (crate::pool::PooledConnection, UserId) {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let user = users::create_user(&conn, "household", None, "h", Role::User).unwrap();
        (conn, user.id)
    }

    #[test]
    fn first_profile_is_in_use() {
        let (conn, uid) = setup();
        let first = create_profile(&conn, uid, "Mum", None, false, 5).unwrap();
        let second = create_profile(&conn, uid, "Kids", Some("fox.png"), true, 5).unwrap();
        assert!(first.in_use);
        assert!(!second.in_use);
        assert_eq!(active_profile(&conn, uid).unwrap().unwrap().id, first.id);
    }

    #[test]
    fn select_moves_in_use_flag() {
        let (conn, uid) = setup();
        let a = create_profile(&conn, uid, "A", None, false, 5).unwrap();
        let b = create_profile(&conn, uid, "B", None, false, 5).unwrap();

        let selected = select_profile(&conn, uid, b.id).unwrap();
        assert!(selected.in_use);

        let profiles = list_profiles(&conn, uid).unwrap();
        let in_use: Vec<_> = profiles.iter().filter(|p| p.in_use).collect();
        assert_eq!(in_use.len(), 1);
        assert_eq!(in_use[0].id, b.id);
        assert!(!get_profile(&conn, uid, a.id).unwrap().unwrap().in_use);
    }

    #[test]
    fn select_foreign_profile_keeps_current() {
        let (conn, uid) = setup();
        let mine = create_profile(&conn, uid, "Mine", None, false, 5).unwrap();
        let other = users::create_user(&conn, "neighbour", None, "h", Role::User).unwrap();
        let theirs = create_profile(&conn, other.id, "Theirs", None, false, 5).unwrap();

        assert!(select_profile(&conn, uid, theirs.id).is_err());
        assert_eq!(active_profile(&conn, uid).unwrap().unwrap().id, mine.id);
    }

    #[test]
    fn limit_enforced() {
        let (conn, uid) = setup();
        create_profile(&conn, uid, "1", None, false, 2).unwrap();
        create_profile(&conn, uid, "2", None, false, 2).unwrap();
        let err = create_profile(&conn, uid, "3", None, false, 2).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn duplicate_name_conflicts() {
        let (conn, uid) = setup();
        create_profile(&conn, uid, "Dad", None, false, 5).unwrap();
        let err = create_profile(&conn, uid, "Dad", None, false, 5).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn update_and_delete_are_owner_scoped() {
        let (conn, uid) = setup();
        let p = create_profile(&conn, uid, "Old", None, false, 5).unwrap();
        let stranger = users::create_user(&conn, "stranger", None, "h", Role::User).unwrap();

        assert!(!update_profile(&conn, stranger.id, p.id, "Hacked", None, false).unwrap());
        assert!(update_profile(&conn, uid, p.id, "New", Some("cat.png"), true).unwrap());
        let updated = get_profile(&conn, uid, p.id).unwrap().unwrap();
        assert_eq!(updated.name, "New");
        assert!(updated.is_kids);

        assert!(!delete_profile(&conn, stranger.id, p.id).unwrap());
        assert!(delete_profile(&conn, uid, p.id).unwrap());
        assert_eq!(count_profiles(&conn, uid).unwrap(), 0);
    }
}
