//! Route handlers for the HTTP API.

pub mod actors;
pub mod admin;
pub mod auth;
pub mod health;
pub mod library;
pub mod playlists;
pub mod profiles;
pub mod progress;
pub mod stream;
pub mod streaming_helpers;
pub mod titles;
pub mod uploads;

use std::str::FromStr;

use mq_core::{Error, UserId};
use mq_db::models::Profile;
use rusqlite::Connection;

/// Parse a typed id from a path segment.
pub(crate) fn parse_id<T: FromStr>(raw: &str, entity: &str) -> Result<T, Error> {
    raw.parse()
        .map_err(|_| Error::Validation(format!("Invalid {entity} ID")))
}

/// The caller's profile in use. Library, progress and view endpoints are
/// scoped to it.
pub(crate) fn active_profile(conn: &Connection, user_id: UserId) -> Result<Profile, Error> {
    mq_db::queries::profiles::active_profile(conn, user_id)?
        .ok_or_else(|| Error::Validation("No profile selected; select a profile first".into()))
}
