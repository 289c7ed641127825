//! User CRUD operations.

use rusqlite::{Connection, OptionalExtension};
use mq_core::{Error, Result, Role, UserId};

use super::{is_unique_violation, now_ts};
use crate::models::User;

const COLS: &str = "id, username, email, password_hash, role, created_at";

/// Create a new user and return it.
pub fn create_user(
    conn: &Connection,
    username: &str,
    email: Option<&str>,
    password_hash: &str,
    role: Role,
) -> Result<User> {
    let id = UserId::new();
    let created_at = now_ts();

    conn.execute(
        "INSERT INTO users (id, username, email, password_hash, role, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            id.to_string(),
            username,
            email,
            password_hash,
            role.as_str(),
            created_at
        ],
    )
    .map_err(|e| insert_error(e, username))?;

    Ok(User {
        id,
        username: username.to_string(),
        email: email.map(String::from),
        password_hash: password_hash.to_string(),
        role,
        created_at,
    })
}

/// Create a self-registered account. The first account in an empty database
/// becomes an admin and every later one a regular user. The emptiness check
/// runs inside the insert statement so two concurrent first registrations
/// cannot both be promoted.
pub fn register_user(
    conn: &Connection,
    username: &str,
    email: Option<&str>,
    password_hash: &str,
) -> Result<User> {
    let id = UserId::new();
    conn.execute(
        "INSERT INTO users (id, username, email, password_hash, role, created_at)
         SELECT ?1, ?2, ?3, ?4,
                CASE WHEN EXISTS (SELECT 1 FROM users) THEN ?5 ELSE ?6 END,
                ?7",
        rusqlite::params![
            id.to_string(),
            username,
            email,
            password_hash,
            Role::User.as_str(),
            Role::Admin.as_str(),
            now_ts()
        ],
    )
    .map_err(|e| insert_error(e, username))?;

    get_user_by_id(conn, id)?
        .ok_or_else(|| Error::Internal(format!("registered user {id} not found")))
}

fn insert_error(e: rusqlite::Error, username: &str) -> Error {
    if is_unique_violation(&e) {
        if e.to_string().contains("users.email") {
            Error::Conflict("Email is already registered".into())
        } else {
            Error::Conflict(format!("Username '{username}' already exists"))
        }
    } else {
        Error::database(e.to_string())
    }
}

/// Get a user by primary key.
pub fn get_user_by_id(conn: &Connection, id: UserId) -> Result<Option<User>> {
    let q = format!("SELECT {COLS} FROM users WHERE id = ?1");
    conn.query_row(&q, [id.to_string()], User::from_row)
        .optional()
        .map_err(|e| Error::database(e.to_string()))
}

/// Get a user by username.
pub fn get_user_by_username(conn: &Connection, username: &str) -> Result<Option<User>> {
    let q = format!("SELECT {COLS} FROM users WHERE username = ?1");
    conn.query_row(&q, [username], User::from_row)
        .optional()
        .map_err(|e| Error::database(e.to_string()))
}

/// Look up a user by either username or email (login form accepts both).
pub fn get_user_by_login(conn: &Connection, login: &str) -> Result<Option<User>> {
    let q = format!(
        "SELECT {COLS} FROM users WHERE username = ?1 OR lower(email) = lower(?1) LIMIT 1"
    );
    conn.query_row(&q, [login], User::from_row)
        .optional()
        .map_err(|e| Error::database(e.to_string()))
}

/// List all users ordered by username.
pub fn list_users(conn: &Connection) -> Result<Vec<User>> {
    let q = format!("SELECT {COLS} FROM users ORDER BY username ASC");
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([], User::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Total number of accounts.
pub fn count_users(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
        .map_err(|e| Error::database(e.to_string()))
}

/// Update a user's role.
pub fn update_user_role(conn: &Connection, id: UserId, role: Role) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE users SET role = ?1 WHERE id = ?2",
            rusqlite::params![role.as_str(), id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Update a user's password hash.
pub fn update_password(conn: &Connection, id: UserId, password_hash: &str) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE users SET password_hash = ?1 WHERE id = ?2",
            rusqlite::params![password_hash, id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Delete a user by ID. Sessions, profiles and everything hanging off them
/// go with it. Returns true if a row was deleted.
pub fn delete_user(conn: &Connection, id: UserId) -> Result<bool> {
    let n = conn
        .execute("DELETE FROM users WHERE id = ?1", [id.to_string()])
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}
