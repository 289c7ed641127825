//! Chunked video upload.
//!
//! An upload is started with a file name and a declared chunk count, which
//! yields an [`UploadId`]. Chunks arrive in any order as raw bodies and are
//! stored as `upload_dir/<id>/chunk_<index>`. Completing the upload
//! concatenates the chunks in index order into `video_dir/<id>.<ext>` and
//! removes the chunk directory.
//!
//! Uploads that receive no chunk for `upload_ttl_hours` are dropped by a
//! background sweep, and chunk directories left over from a previous run
//! are cleared at startup.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use mq_core::config::MediaConfig;
use mq_core::{Error, Result, TitleId, UploadId, UserId};
use tokio::io::AsyncWriteExt;

const DEFAULT_EXTENSION: &str = "mp4";

/// Metadata of an in-flight upload.
#[derive(Debug, Clone)]
pub struct UploadSession {
    pub id: UploadId,
    pub user_id: UserId,
    pub file_name: String,
    pub extension: String,
    pub total_chunks: u32,
    pub title_id: Option<TitleId>,
    pub received: BTreeSet<u32>,
    pub created_at: String,
    /// Start of the upload or arrival of its latest chunk.
    pub last_activity: DateTime<Utc>,
}

impl UploadSession {
    pub fn missing(&self) -> Vec<u32> {
        (0..self.total_chunks)
            .filter(|i| !self.received.contains(i))
            .collect()
    }
}

/// Result of a completed upload.
#[derive(Debug, Clone)]
pub struct CompletedUpload {
    pub id: UploadId,
    pub path: PathBuf,
    pub size: u64,
    pub title_id: Option<TitleId>,
}

/// In-memory registry of uploads plus their on-disk chunk directories.
#[derive(Debug)]
pub struct UploadStore {
    sessions: DashMap<UploadId, UploadSession>,
    upload_dir: PathBuf,
    video_dir: PathBuf,
    max_chunk_bytes: usize,
    max_chunks: u32,
    ttl: Duration,
}

/// Reduce a client-supplied file name to its final component and return a
/// safe lowercase extension.
pub fn sanitize_extension(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or("");
    match base.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.is_empty()
                && ext.len() <= 8
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext.to_ascii_lowercase()
        }
        _ => DEFAULT_EXTENSION.to_string(),
    }
}

impl UploadStore {
    pub fn new(media: &MediaConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            upload_dir: media.upload_dir.clone(),
            video_dir: media.video_dir.clone(),
            max_chunk_bytes: media.max_chunk_bytes,
            max_chunks: media.max_chunks,
            ttl: Duration::from_secs(media.upload_ttl_hours.saturating_mul(3600)),
        }
    }

    fn chunk_dir(&self, id: UploadId) -> PathBuf {
        self.upload_dir.join(id.to_string())
    }

    fn chunk_path(&self, id: UploadId, index: u32) -> PathBuf {
        self.chunk_dir(id).join(format!("chunk_{index}"))
    }

    /// Register a new upload.
    pub fn start(
        &self,
        user_id: UserId,
        file_name: &str,
        total_chunks: u32,
        title_id: Option<TitleId>,
    ) -> Result<UploadSession> {
        if file_name.trim().is_empty() {
            return Err(Error::Validation("file_name is required".into()));
        }
        if total_chunks == 0 || total_chunks > self.max_chunks {
            return Err(Error::Validation(format!(
                "total_chunks must be between 1 and {}",
                self.max_chunks
            )));
        }

        let session = UploadSession {
            id: UploadId::new(),
            user_id,
            file_name: file_name.to_string(),
            extension: sanitize_extension(file_name),
            total_chunks,
            title_id,
            received: BTreeSet::new(),
            created_at: mq_db::queries::now_ts(),
            last_activity: Utc::now(),
        };
        self.sessions.insert(session.id, session.clone());
        tracing::debug!(upload = %session.id, total_chunks, "Upload started");
        Ok(session)
    }

    /// Snapshot of an upload owned by `user_id`.
    pub fn get(&self, id: UploadId, user_id: UserId) -> Result<UploadSession> {
        self.sessions
            .get(&id)
            .filter(|s| s.user_id == user_id)
            .map(|s| s.clone())
            .ok_or_else(|| Error::not_found("upload", id))
    }

    /// Store one chunk. Re-sending an index overwrites the earlier chunk.
    pub async fn write_chunk(
        &self,
        id: UploadId,
        user_id: UserId,
        index: u32,
        bytes: &[u8],
    ) -> Result<UploadSession> {
        let session = self.get(id, user_id)?;
        if index >= session.total_chunks {
            return Err(Error::Validation(format!(
                "chunk index {index} is out of range 0..{}",
                session.total_chunks
            )));
        }
        if bytes.is_empty() {
            return Err(Error::Validation("chunk body is empty".into()));
        }
        if bytes.len() > self.max_chunk_bytes {
            return Err(Error::Validation(format!(
                "chunk of {} bytes exceeds the {} byte limit",
                bytes.len(),
                self.max_chunk_bytes
            )));
        }

        let dir = self.chunk_dir(id);
        tokio::fs::create_dir_all(&dir).await?;
        let final_path = self.chunk_path(id, index);
        let part_path = dir.join(format!("chunk_{index}.part"));
        tokio::fs::write(&part_path, bytes).await?;
        tokio::fs::rename(&part_path, &final_path).await?;

        let mut entry = self
            .sessions
            .get_mut(&id)
            .ok_or_else(|| Error::not_found("upload", id))?;
        entry.received.insert(index);
        entry.last_activity = Utc::now();
        Ok(entry.clone())
    }

    /// Assemble all chunks into the final video file.
    ///
    /// Fails with a validation error listing the missing indices when any
    /// chunk has not been received; the upload then stays open.
    pub async fn complete(&self, id: UploadId, user_id: UserId) -> Result<CompletedUpload> {
        // Take the session out so two concurrent completions cannot both run.
        let (_, session) = self
            .sessions
            .remove_if(&id, |_, s| s.user_id == user_id)
            .ok_or_else(|| Error::not_found("upload", id))?;

        let mut missing = Vec::new();
        for index in 0..session.total_chunks {
            if !matches!(tokio::fs::try_exists(self.chunk_path(id, index)).await, Ok(true)) {
                missing.push(index);
            }
        }
        if !missing.is_empty() {
            let listed = missing
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            self.sessions.insert(id, session);
            return Err(Error::Validation(format!("missing chunks: {listed}")));
        }

        match self.assemble(&session).await {
            Ok((path, size)) => {
                let dir = self.chunk_dir(id);
                if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
                    tracing::warn!("Failed to remove chunk directory {}: {e}", dir.display());
                }
                tracing::info!(upload = %id, size, path = %path.display(), "Upload assembled");
                Ok(CompletedUpload {
                    id,
                    path,
                    size,
                    title_id: session.title_id,
                })
            }
            Err(e) => {
                self.sessions.insert(id, session);
                Err(e)
            }
        }
    }

    async fn assemble(&self, session: &UploadSession) -> Result<(PathBuf, u64)> {
        tokio::fs::create_dir_all(&self.video_dir).await?;
        let dest = self
            .video_dir
            .join(format!("{}.{}", session.id, session.extension));

        let mut out = tokio::fs::File::create(&dest).await?;
        let mut size = 0u64;
        for index in 0..session.total_chunks {
            let mut chunk = tokio::fs::File::open(self.chunk_path(session.id, index)).await?;
            size += tokio::io::copy(&mut chunk, &mut out).await?;
        }
        out.flush().await?;
        Ok((dest, size))
    }

    pub fn in_flight(&self) -> usize {
        self.sessions.len()
    }

    /// Drop uploads idle for longer than the TTL and delete their chunks.
    ///
    /// Returns the number of uploads removed.
    pub async fn cleanup_expired_uploads(&self) -> usize {
        let ttl = chrono::Duration::from_std(self.ttl)
            .unwrap_or_else(|_| chrono::Duration::days(36_500));
        let now = Utc::now();

        let mut expired = Vec::new();
        self.sessions.retain(|id, session| {
            if now - session.last_activity > ttl {
                tracing::info!(upload = %id, file = %session.file_name, "Expired upload removed");
                expired.push(*id);
                false
            } else {
                true
            }
        });

        for id in &expired {
            let dir = self.chunk_dir(*id);
            if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Failed to remove chunk directory {}: {e}", dir.display());
                }
            }
        }
        expired.len()
    }

    /// Remove chunk directories that belong to no in-flight upload, such as
    /// those left behind by a restart.
    pub async fn clear_leftover_chunks(&self) -> Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.upload_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let live = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<UploadId>().ok())
                .is_some_and(|id| self.sessions.contains_key(&id));
            if live || !entry.file_type().await?.is_dir() {
                continue;
            }
            match tokio::fs::remove_dir_all(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::warn!("Failed to remove {}: {e}", entry.path().display());
                }
            }
        }
        if removed > 0 {
            tracing::info!(removed, "Cleared leftover upload chunks");
        }
        Ok(removed)
    }

    /// Delete video files no title refers to any more. Paths outside the
    /// video directory are left alone.
    pub async fn remove_videos(&self, paths: &[String]) {
        for path in paths.iter().map(Path::new) {
            if !path.starts_with(&self.video_dir) {
                tracing::warn!("Not removing {} outside the video directory", path.display());
                continue;
            }
            match tokio::fs::remove_file(path).await {
                Ok(()) => tracing::debug!(path = %path.display(), "Video file removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Failed to remove video {}: {e}", path.display()),
            }
        }
    }
}

/// Spawn a task that expires idle uploads every `interval`.
pub fn start_cleanup_task(
    store: Arc<UploadStore>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            store.cleanup_expired_uploads().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn store(dir: &Path) -> UploadStore {
        UploadStore::new(&MediaConfig {
            video_dir: dir.join("videos"),
            upload_dir: dir.join("uploads"),
            max_chunk_bytes: 8,
            max_chunks: 4,
            upload_ttl_hours: 1,
        })
    }

    #[test]
    fn extension_sanitizing() {
        assert_eq!(sanitize_extension("Movie.MKV"), "mkv");
        assert_eq!(sanitize_extension("../../etc/passwd"), "mp4");
        assert_eq!(sanitize_extension("clip.tar.gz"), "gz");
        assert_eq!(sanitize_extension("weird.e x"), "mp4");
        assert_eq!(sanitize_extension(".hidden"), "mp4");
        assert_eq!(sanitize_extension("C:\\videos\\a.webm"), "webm");
    }

    #[tokio::test]
    async fn out_of_order_chunks_assemble_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let user = UserId::new();
        let s = store.start(user, "film.webm", 3, None).unwrap();

        store.write_chunk(s.id, user, 2, b"ccc").await.unwrap();
        store.write_chunk(s.id, user, 0, b"aaa").await.unwrap();
        let status = store.write_chunk(s.id, user, 1, b"bb").await.unwrap();
        assert!(status.missing().is_empty());

        let done = store.complete(s.id, user).await.unwrap();
        assert_eq!(done.size, 8);
        assert!(done.path.ends_with(format!("{}.webm", s.id)));
        assert_eq!(std::fs::read(&done.path).unwrap(), b"aaabbccc");
        assert!(!dir.path().join("uploads").join(s.id.to_string()).exists());
        assert_eq!(store.in_flight(), 0);
    }

    #[tokio::test]
    async fn missing_chunks_are_listed() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let user = UserId::new();
        let s = store.start(user, "a.mp4", 4, None).unwrap();
        store.write_chunk(s.id, user, 1, b"x").await.unwrap();

        let err = store.complete(s.id, user).await.unwrap_err();
        match err {
            Error::Validation(msg) => assert!(msg.contains("0, 2, 3"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
        // Still open for the remaining chunks.
        assert_eq!(store.get(s.id, user).unwrap().missing(), vec![0, 2, 3]);
    }

    #[tokio::test]
    async fn chunk_limits() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let user = UserId::new();
        let s = store.start(user, "a.mp4", 2, None).unwrap();

        assert!(store.write_chunk(s.id, user, 2, b"x").await.is_err());
        assert!(store.write_chunk(s.id, user, 0, b"").await.is_err());
        assert!(store.write_chunk(s.id, user, 0, b"123456789").await.is_err());
        assert!(store.start(user, "a.mp4", 0, None).is_err());
        assert!(store.start(user, "a.mp4", 5, None).is_err());
        assert!(store.start(user, "  ", 1, None).is_err());
    }

    #[tokio::test]
    async fn other_users_cannot_touch_upload() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let owner = UserId::new();
        let stranger = UserId::new();
        let s = store.start(owner, "a.mp4", 1, None).unwrap();

        assert!(matches!(
            store.write_chunk(s.id, stranger, 0, b"x").await,
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            store.complete(s.id, stranger).await,
            Err(Error::NotFound { .. })
        ));
        assert!(store.get(s.id, owner).is_ok());
    }

    #[tokio::test]
    async fn idle_uploads_expire_with_their_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let user = UserId::new();
        let idle = store.start(user, "a.mp4", 2, None).unwrap();
        let fresh = store.start(user, "b.mp4", 2, None).unwrap();
        store.write_chunk(idle.id, user, 0, b"x").await.unwrap();

        if let Some(mut s) = store.sessions.get_mut(&idle.id) {
            s.last_activity = Utc::now() - chrono::Duration::hours(2);
        }

        assert_eq!(store.cleanup_expired_uploads().await, 1);
        assert!(store.get(idle.id, user).is_err());
        assert!(store.get(fresh.id, user).is_ok());
        assert!(!dir.path().join("uploads").join(idle.id.to_string()).exists());
    }

    #[tokio::test]
    async fn leftover_chunk_dirs_are_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let user = UserId::new();
        let live = store.start(user, "a.mp4", 2, None).unwrap();
        store.write_chunk(live.id, user, 0, b"x").await.unwrap();

        let stale = dir.path().join("uploads").join(UploadId::new().to_string());
        std::fs::create_dir_all(&stale).unwrap();
        std::fs::write(stale.join("chunk_0"), b"old").unwrap();

        assert_eq!(store.clear_leftover_chunks().await.unwrap(), 1);
        assert!(!stale.exists());
        assert!(dir.path().join("uploads").join(live.id.to_string()).exists());
    }

    #[tokio::test]
    async fn remove_videos_stays_inside_video_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        std::fs::create_dir_all(dir.path().join("videos")).unwrap();
        let inside = dir.path().join("videos/old.mp4");
        let outside = dir.path().join("keep.mp4");
        std::fs::write(&inside, b"v").unwrap();
        std::fs::write(&outside, b"v").unwrap();

        store
            .remove_videos(&[
                inside.to_string_lossy().into_owned(),
                outside.to_string_lossy().into_owned(),
                dir.path().join("videos/gone.mp4").to_string_lossy().into_owned(),
            ])
            .await;
        assert!(!inside.exists());
        assert!(outside.exists());
    }
}
