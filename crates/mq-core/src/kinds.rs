//! Account roles and catalog title kinds.
//!
//! Both are persisted as lowercase strings; parsing an unknown string is a
//! validation error rather than a panic.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Account role used for authorization checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(Error::Validation(format!("unknown role '{other}'"))),
        }
    }
}

/// Kind of catalog entry.
///
/// Episodes hang off a series through `parent_id` and carry season and
/// episode numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TitleKind {
    Movie,
    Series,
    Episode,
}

impl TitleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TitleKind::Movie => "movie",
            TitleKind::Series => "series",
            TitleKind::Episode => "episode",
        }
    }

    /// Whether titles of this kind can have a playable video attached.
    pub fn is_playable(&self) -> bool {
        !matches!(self, TitleKind::Series)
    }
}

impl fmt::Display for TitleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TitleKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(TitleKind::Movie),
            "series" => Ok(TitleKind::Series),
            "episode" => Ok(TitleKind::Episode),
            other => Err(Error::Validation(format!("unknown title kind '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trip() {
        for role in [Role::User, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn role_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
    }

    #[test]
    fn title_kind_parse() {
        assert_eq!("series".parse::<TitleKind>().unwrap(), TitleKind::Series);
        let err = "podcast".parse::<TitleKind>().unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn series_is_not_playable() {
        assert!(TitleKind::Movie.is_playable());
        assert!(TitleKind::Episode.is_playable());
        assert!(!TitleKind::Series.is_playable());
    }
}
