//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON. Every section
//! defaults sensibly so a completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub media: MediaConfig,
    pub profiles: ProfileConfig,
    pub activity: ActivityConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            warnings.push(format!(
                "auth.bcrypt_cost {} is outside 4..=31; bcrypt will reject it",
                self.auth.bcrypt_cost
            ));
        }

        if self.auth.session_timeout_hours == 0 {
            warnings.push("auth.session_timeout_hours is 0; sessions expire immediately".into());
        }

        if self.profiles.max_per_user == 0 {
            warnings.push("profiles.max_per_user is 0; no profile can be created".into());
        }

        if self.media.max_chunk_bytes == 0 {
            warnings.push("media.max_chunk_bytes is 0; uploads will always fail".into());
        }

        if self.media.upload_ttl_hours == 0 {
            warnings.push("media.upload_ttl_hours is 0; uploads expire at the next sweep".into());
        }

        if self.media.upload_dir == self.media.video_dir {
            warnings.push(
                "media.upload_dir equals media.video_dir; chunk cleanup may remove videos".into(),
            );
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: Option<PathBuf>,
    pub db_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            static_dir: None,
            db_path: PathBuf::from("./data/marquee.db"),
        }
    }
}

/// Authentication settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub session_timeout_hours: u64,
    pub allow_registration: bool,
    pub bcrypt_cost: u32,
    /// Requests per minute allowed on the login/register routes.
    pub api_rate_per_minute: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_timeout_hours: 24 * 7,
            allow_registration: true,
            bcrypt_cost: 12,
            api_rate_per_minute: 30,
        }
    }
}

/// Video storage and chunked upload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub video_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub max_chunk_bytes: usize,
    pub max_chunks: u32,
    /// Hours an upload may sit without a new chunk before it is discarded.
    pub upload_ttl_hours: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            video_dir: PathBuf::from("./data/videos"),
            upload_dir: PathBuf::from("./data/uploads"),
            max_chunk_bytes: 10 * 1024 * 1024,
            max_chunks: 10_000,
            upload_ttl_hours: 24,
        }
    }
}

/// Viewing profile limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub max_per_user: u32,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self { max_per_user: 5 }
    }
}

/// JSON-lines activity log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityConfig {
    pub enabled: bool,
    pub path: PathBuf,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("./data/activity.log"),
        }
    }
}
