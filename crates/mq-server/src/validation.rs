//! Input validation for request payloads.
//!
//! Every check returns `mq_core::Error::Validation` with a message naming
//! the offending field, so handlers can use `?` directly.

use mq_core::{Error, Result};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;
pub const MAX_PAGE_LIMIT: i64 = 200;

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn bounded(field: &str, value: &str, min: usize, max: usize) -> Result<()> {
    let len = char_len(value.trim());
    if len < min || char_len(value) > max {
        return Err(Error::Validation(format!(
            "{field} must be between {min} and {max} characters"
        )));
    }
    Ok(())
}

/// 3 to 32 characters from `[A-Za-z0-9_.-]`.
pub fn username(value: &str) -> Result<()> {
    bounded("username", value, 3, 32)?;
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(Error::Validation(
            "username may only contain letters, digits, '_', '.' and '-'".into(),
        ));
    }
    Ok(())
}

pub fn password(value: &str) -> Result<()> {
    let len = char_len(value);
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(Error::Validation(format!(
            "password must be between {MIN_PASSWORD_LEN} and {MAX_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Exactly one `@` with non-empty local and domain parts, no whitespace.
pub fn email(value: &str) -> Result<()> {
    let invalid = || Error::Validation(format!("'{value}' is not a valid email address"));
    if value.len() > 254 || value.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    match value.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
        {
            Ok(())
        }
        _ => Err(invalid()),
    }
}

pub fn profile_name(value: &str) -> Result<()> {
    bounded("profile name", value, 1, 40)
}

pub fn title_name(value: &str) -> Result<()> {
    bounded("title name", value, 1, 200)
}

pub fn playlist_name(value: &str) -> Result<()> {
    bounded("playlist name", value, 1, 100)
}

pub fn actor_name(value: &str) -> Result<()> {
    bounded("actor name", value, 1, 200)
}

pub fn year(value: Option<i32>) -> Result<()> {
    match value {
        Some(y) if !(1870..=2100).contains(&y) => Err(Error::Validation(format!(
            "year {y} is outside 1870..=2100"
        ))),
        _ => Ok(()),
    }
}

pub fn rating(value: Option<f64>) -> Result<()> {
    match value {
        Some(r) if !(0.0..=10.0).contains(&r) => Err(Error::Validation(format!(
            "rating {r} is outside 0..=10"
        ))),
        _ => Ok(()),
    }
}

/// Clamp a requested page size to `1..=200`.
pub fn page_limit(value: Option<i64>, default: i64) -> i64 {
    value.unwrap_or(default).clamp(1, MAX_PAGE_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames() {
        assert!(username("ann").is_ok());
        assert!(username("j.doe-99_x").is_ok());
        assert!(username("ab").is_err());
        assert!(username("has space").is_err());
        assert!(username(&"a".repeat(33)).is_err());
        assert!(username("émile").is_err());
    }

    #[test]
    fn passwords() {
        assert!(password("12345678").is_ok());
        assert!(password("short").is_err());
        assert!(password(&"x".repeat(129)).is_err());
    }

    #[test]
    fn emails() {
        assert!(email("a@b.co").is_ok());
        assert!(email("no-at-sign").is_err());
        assert!(email("@domain.com").is_err());
        assert!(email("user@").is_err());
        assert!(email("a@b@c").is_err());
        assert!(email("a b@c.d").is_err());
    }

    #[test]
    fn names() {
        assert!(profile_name("Kids").is_ok());
        assert!(profile_name("   ").is_err());
        assert!(profile_name(&"k".repeat(41)).is_err());
        assert!(title_name("Heat").is_ok());
        assert!(title_name("").is_err());
        assert!(playlist_name(&"p".repeat(100)).is_ok());
        assert!(playlist_name(&"p".repeat(101)).is_err());
    }

    #[test]
    fn numeric_ranges() {
        assert!(year(None).is_ok());
        assert!(year(Some(1995)).is_ok());
        assert!(year(Some(1800)).is_err());
        assert!(rating(Some(7.5)).is_ok());
        assert!(rating(Some(10.5)).is_err());
        assert!(rating(Some(-1.0)).is_err());
    }

    #[test]
    fn limits_are_clamped() {
        assert_eq!(page_limit(None, 50), 50);
        assert_eq!(page_limit(Some(0), 50), 1);
        assert_eq!(page_limit(Some(10_000), 50), 200);
    }
}
