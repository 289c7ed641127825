//! Video streaming endpoint.

use std::path::PathBuf;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap};
use axum::response::Response;
use mq_core::{Error, TitleId};

use crate::context::AppContext;
use crate::error::AppError;
use crate::routes::parse_id;
use crate::routes::streaming_helpers::serve_file;

/// GET /api/stream/{title_id}
#[utoipa::path(
    get,
    path = "/api/stream/{title_id}",
    params(("title_id" = String, Path, description = "Title ID")),
    responses(
        (status = 200, description = "Whole video"),
        (status = 206, description = "Requested byte range"),
        (status = 404, description = "Title or video not found"),
        (status = 416, description = "Range not satisfiable")
    )
)]
pub async fn stream_title(
    State(ctx): State<AppContext>,
    Path(title_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let title_id: TitleId = parse_id(&title_id, "title")?;

    let video_path = {
        let conn = mq_db::pool::get_conn(&ctx.db)?;
        let title = mq_db::queries::titles::get_title(&conn, title_id)?
            .ok_or_else(|| Error::not_found("title", title_id))?;
        title
            .video_path
            .ok_or_else(|| Error::not_found("video", title_id))?
    };

    let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    tracing::debug!(title = %title_id, range = ?range, "Streaming video");

    Ok(serve_file(&PathBuf::from(video_path), range).await?)
}
