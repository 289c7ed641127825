//! Database query modules.

pub mod actors;
pub mod favorites;
pub mod playlists;
pub mod profiles;
pub mod sessions;
pub mod stats;
pub mod titles;
pub mod users;
pub mod views;
pub mod watch_time;
pub mod watchlist;

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a timestamp as fixed-width RFC 3339 so text ordering in SQL
/// matches chronological ordering.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time in the stored timestamp format.
pub fn now_ts() -> String {
    format_ts(Utc::now())
}

/// Whether a rusqlite error is a UNIQUE or PRIMARY KEY constraint failure.
pub(crate) fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

/// Whether a rusqlite error is a FOREIGN KEY constraint failure.
pub(crate) fn is_foreign_key_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
    )
}

/// Escape `%`, `_` and `\` for use inside a `LIKE ... ESCAPE '\'` pattern.
pub(crate) fn like_pattern(query: &str) -> String {
    let mut out = String::with_capacity(query.len() + 2);
    out.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("alien"), "%alien%");
    }

    #[test]
    fn timestamps_are_fixed_width() {
        let a = now_ts();
        let b = now_ts();
        assert_eq!(a.len(), b.len());
        assert!(a.ends_with('Z'));
    }
}
