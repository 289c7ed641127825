//! Range parsing, content-type guessing and chunked file serving.

use std::path::Path;

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use mq_core::Error;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

/// Read size of the response body stream.
pub const STREAM_CHUNK_BYTES: usize = 64 * 1024;

/// A `Range` header resolved against a concrete file size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOutcome {
    /// No usable range: serve the whole file with 200.
    Full,
    /// Inclusive byte span to serve with 206.
    Partial { start: u64, end: u64 },
    /// Syntactically valid but outside the file: 416.
    Unsatisfiable,
}

/// Parse a single `bytes=` range spec.
///
/// Returns `(Some(start), end)` for `bytes=START-[END]` and
/// `(None, Some(n))` for the suffix form `bytes=-N`. Multi-range requests,
/// malformed values and specs whose end precedes their start yield `None`.
pub fn parse_range_header(value: &str) -> Option<(Option<u64>, Option<u64>)> {
    let spec = value.trim().strip_prefix("bytes=")?;
    if spec.contains(',') {
        return None;
    }
    let (start, end) = spec.split_once('-')?;
    let (start, end) = (start.trim(), end.trim());

    match (start.is_empty(), end.is_empty()) {
        (true, true) => None,
        (true, false) => Some((None, Some(end.parse().ok()?))),
        (false, true) => Some((Some(start.parse().ok()?), None)),
        (false, false) => {
            let (start, end): (u64, u64) = (start.parse().ok()?, end.parse().ok()?);
            (end >= start).then_some((Some(start), Some(end)))
        }
    }
}

/// Resolve a raw `Range` header value for a file of `size` bytes.
pub fn resolve_range(header_value: Option<&str>, size: u64) -> RangeOutcome {
    let Some(parsed) = header_value.and_then(parse_range_header) else {
        return RangeOutcome::Full;
    };
    if size == 0 {
        return RangeOutcome::Unsatisfiable;
    }
    let last = size - 1;

    match parsed {
        (Some(start), end) => {
            let end = end.unwrap_or(last).min(last);
            if start > end {
                RangeOutcome::Unsatisfiable
            } else {
                RangeOutcome::Partial { start, end }
            }
        }
        (None, Some(0)) => RangeOutcome::Unsatisfiable,
        (None, Some(suffix)) => RangeOutcome::Partial {
            start: size.saturating_sub(suffix),
            end: last,
        },
        (None, None) => RangeOutcome::Full,
    }
}

/// MIME type for a video file, by extension.
pub fn guess_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "ts" => "video/mp2t",
        "ogv" => "video/ogg",
        _ => "application/octet-stream",
    }
}

/// Stream a file from disk, honoring a single byte range.
pub async fn serve_file(path: &Path, range_header: Option<&str>) -> Result<Response, Error> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|_| Error::not_found("video file", path.display()))?;
    if !metadata.is_file() {
        return Err(Error::not_found("video file", path.display()));
    }

    let size = metadata.len();
    let content_type = guess_content_type(path);

    match resolve_range(range_header, size) {
        RangeOutcome::Unsatisfiable => Ok((
            StatusCode::RANGE_NOT_SATISFIABLE,
            [(header::CONTENT_RANGE, format!("bytes */{size}"))],
            Body::empty(),
        )
            .into_response()),

        RangeOutcome::Partial { start, end } => {
            let length = end - start + 1;
            let mut file = tokio::fs::File::open(path).await?;
            file.seek(std::io::SeekFrom::Start(start)).await?;
            let stream = ReaderStream::with_capacity(file.take(length), STREAM_CHUNK_BYTES);

            Ok((
                StatusCode::PARTIAL_CONTENT,
                [
                    (header::CONTENT_TYPE, content_type.to_string()),
                    (header::CONTENT_RANGE, format!("bytes {start}-{end}/{size}")),
                    (header::CONTENT_LENGTH, length.to_string()),
                    (header::ACCEPT_RANGES, "bytes".to_string()),
                ],
                Body::from_stream(stream),
            )
                .into_response())
        }

        RangeOutcome::Full => {
            let file = tokio::fs::File::open(path).await?;
            let stream = ReaderStream::with_capacity(file, STREAM_CHUNK_BYTES);

            Ok((
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, content_type.to_string()),
                    (header::CONTENT_LENGTH, size.to_string()),
                    (header::ACCEPT_RANGES, "bytes".to_string()),
                ],
                Body::from_stream(stream),
            )
                .into_response())
        }
    }
}
