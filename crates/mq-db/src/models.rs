//! Rust structs mapping to database tables.
//!
//! Each model implements `from_row` for constructing itself from a
//! `rusqlite::Row` selected with the column list documented on it.

use std::str::FromStr;

use mq_core::{
    ActorId, PlaylistId, ProfileId, Role, SessionId, TitleId, TitleKind, UserId,
};
use rusqlite::types::Type;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

fn conversion_error(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

/// Parse a UUID-based ID from a text column.
fn parse_id<T: From<Uuid>>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    let uuid = Uuid::parse_str(&s).map_err(|e| conversion_error(idx, e))?;
    Ok(T::from(uuid))
}

fn parse_opt_id<T: From<Uuid>>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<T>> {
    let s: Option<String> = row.get(idx)?;
    s.map(|v| {
        Uuid::parse_str(&v)
            .map(T::from)
            .map_err(|e| conversion_error(idx, e))
    })
    .transpose()
}

/// Parse a text column through `FromStr` (roles, title kinds).
fn parse_text<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let s: String = row.get(idx)?;
    s.parse().map_err(|e| conversion_error(idx, e))
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub created_at: String,
}

impl User {
    /// Columns: id, username, email, password_hash, role, created_at
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            role: parse_text(row, 4)?,
            created_at: row.get(5)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub token: String,
    pub expires_at: String,
    pub created_at: String,
}

impl Session {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            user_id: parse_id(row, 1)?,
            token: row.get(2)?,
            expires_at: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Profile {
    pub id: ProfileId,
    pub user_id: UserId,
    pub name: String,
    pub avatar: Option<String>,
    pub is_kids: bool,
    pub in_use: bool,
    pub created_at: String,
}

impl Profile {
    /// Columns: id, user_id, name, avatar, is_kids, in_use, created_at
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            user_id: parse_id(row, 1)?,
            name: row.get(2)?,
            avatar: row.get(3)?,
            is_kids: row.get::<_, i32>(4)? != 0,
            in_use: row.get::<_, i32>(5)? != 0,
            created_at: row.get(6)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Title
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Title {
    pub id: TitleId,
    pub kind: TitleKind,
    pub name: String,
    pub sort_name: Option<String>,
    pub overview: Option<String>,
    pub year: Option<i32>,
    pub genre: Option<String>,
    pub runtime_minutes: Option<i32>,
    pub rating: Option<f64>,
    pub thumbnail_url: Option<String>,
    pub video_path: Option<String>,
    pub parent_id: Option<TitleId>,
    pub season_number: Option<i32>,
    pub episode_number: Option<i32>,
    pub created_at: String,
    pub updated_at: String,
}

impl Title {
    /// Build from a row selected as:
    /// id, kind, name, sort_name, overview, year, genre, runtime_minutes,
    /// rating, thumbnail_url, video_path, parent_id, season_number,
    /// episode_number, created_at, updated_at
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            kind: parse_text(row, 1)?,
            name: row.get(2)?,
            sort_name: row.get(3)?,
            overview: row.get(4)?,
            year: row.get(5)?,
            genre: row.get(6)?,
            runtime_minutes: row.get(7)?,
            rating: row.get(8)?,
            thumbnail_url: row.get(9)?,
            video_path: row.get(10)?,
            parent_id: parse_opt_id(row, 11)?,
            season_number: row.get(12)?,
            episode_number: row.get(13)?,
            created_at: row.get(14)?,
            updated_at: row.get(15)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Actor / cast
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    pub bio: Option<String>,
    pub photo_url: Option<String>,
    pub created_at: String,
}

impl Actor {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            name: row.get(1)?,
            bio: row.get(2)?,
            photo_url: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

/// An actor credited on a title.
#[derive(Debug, Clone)]
pub struct CastMember {
    pub actor: Actor,
    pub character: Option<String>,
    pub billing_order: i32,
}

impl CastMember {
    /// Actor columns (0..=4) followed by character, billing_order.
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            actor: Actor::from_row(row)?,
            character: row.get(5)?,
            billing_order: row.get(6)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Playlists
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Playlist {
    pub id: PlaylistId,
    pub user_id: UserId,
    pub profile_id: Option<ProfileId>,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Playlist {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            user_id: parse_id(row, 1)?,
            profile_id: parse_opt_id(row, 2)?,
            name: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PlaylistEntry {
    pub playlist_id: PlaylistId,
    pub title_id: TitleId,
    pub position: i64,
    pub added_at: String,
}

impl PlaylistEntry {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            playlist_id: parse_id(row, 0)?,
            title_id: parse_id(row, 1)?,
            position: row.get(2)?,
            added_at: row.get(3)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Watch time / views
// ---------------------------------------------------------------------------

/// Stored resume position for a (user, profile, title).
#[derive(Debug, Clone)]
pub struct WatchTime {
    pub user_id: UserId,
    pub profile_id: ProfileId,
    pub title_id: TitleId,
    pub position_secs: f64,
    pub duration_secs: Option<f64>,
    pub updated_at: String,
}

impl WatchTime {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            user_id: parse_id(row, 0)?,
            profile_id: parse_id(row, 1)?,
            title_id: parse_id(row, 2)?,
            position_secs: row.get(3)?,
            duration_secs: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

/// View counter for one title on one calendar day (`YYYY-MM-DD`).
#[derive(Debug, Clone)]
pub struct TitleView {
    pub title_id: TitleId,
    pub view_date: String,
    pub count: i64,
}

impl TitleView {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            title_id: parse_id(row, 0)?,
            view_date: row.get(1)?,
            count: row.get(2)?,
        })
    }
}
