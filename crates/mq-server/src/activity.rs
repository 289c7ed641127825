//! Append-only JSON-lines activity log.
//!
//! Each notable account or catalog action is written as one JSON object per
//! line. Logging is best-effort: failures are reported through `tracing` and
//! never surface to the caller.

use std::path::{Path, PathBuf};

use mq_core::config::ActivityConfig;
use mq_core::UserId;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Kinds of recorded activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityEvent {
    Register,
    Login,
    Logout,
    ProfileSelected,
    TitleCreated,
    TitleDeleted,
    UploadCompleted,
    RoleChanged,
    UserDeleted,
}

#[derive(Serialize)]
struct ActivityLine<'a> {
    ts: String,
    event: ActivityEvent,
    user_id: Option<String>,
    details: &'a serde_json::Value,
}

/// Serialized writer for the activity file.
#[derive(Debug)]
pub struct ActivityLog {
    path: Option<PathBuf>,
    lock: Mutex<()>,
}

impl ActivityLog {
    pub fn new(config: &ActivityConfig) -> Self {
        Self {
            path: config.enabled.then(|| config.path.clone()),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append one event.
    pub async fn record(
        &self,
        event: ActivityEvent,
        user_id: Option<UserId>,
        details: serde_json::Value,
    ) {
        let Some(path) = &self.path else {
            return;
        };

        let line = ActivityLine {
            ts: mq_db::queries::now_ts(),
            event,
            user_id: user_id.map(|u| u.to_string()),
            details: &details,
        };
        let mut json = match serde_json::to_string(&line) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Failed to serialize activity event {event:?}: {e}");
                return;
            }
        };
        json.push('\n');

        let _guard = self.lock.lock().await;
        if let Err(e) = append(path, json.as_bytes()).await {
            tracing::warn!("Failed to write activity log {}: {e}", path.display());
        }
    }
}

async fn append(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(bytes).await?;
    file.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn writes_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("activity.log");
        let log = ActivityLog::new(&ActivityConfig {
            enabled: true,
            path: path.clone(),
        });

        let uid = UserId::new();
        log.record(ActivityEvent::Login, Some(uid), json!({"username": "ann"}))
            .await;
        log.record(ActivityEvent::Logout, Some(uid), json!({})).await;

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "login");
        assert_eq!(lines[0]["user_id"], uid.to_string());
        assert_eq!(lines[0]["details"]["username"], "ann");
        assert_eq!(lines[1]["event"], "logout");
    }

    #[tokio::test]
    async fn disabled_log_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activity.log");
        let log = ActivityLog::new(&ActivityConfig {
            enabled: false,
            path: path.clone(),
        });
        log.record(ActivityEvent::Register, None, json!({})).await;
        assert!(!path.exists());
        assert!(log.path().is_none());
    }

    #[tokio::test]
    async fn unwritable_path_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened for appending.
        let log = ActivityLog::new(&ActivityConfig {
            enabled: true,
            path: dir.path().to_path_buf(),
        });
        log.record(ActivityEvent::UserDeleted, None, json!({})).await;
    }
}
