//! Chunked upload route handlers (admin only).

use axum::body::Bytes;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::Json;
use mq_core::{Error, TitleId, UploadId};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::activity::ActivityEvent;
use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::auth::CurrentUser;
use crate::routes::parse_id;
use crate::upload::UploadSession;

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct StartUploadRequest {
    pub file_name: String,
    pub total_chunks: u32,
    /// Title to attach the finished video to.
    #[serde(default)]
    pub title_id: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct UploadStatusResponse {
    pub id: String,
    pub file_name: String,
    pub total_chunks: u32,
    pub received: Vec<u32>,
    pub missing: Vec<u32>,
    pub title_id: Option<String>,
    pub created_at: String,
}

impl UploadStatusResponse {
    fn from_session(s: &UploadSession) -> Self {
        Self {
            id: s.id.to_string(),
            file_name: s.file_name.clone(),
            total_chunks: s.total_chunks,
            received: s.received.iter().copied().collect(),
            missing: s.missing(),
            title_id: s.title_id.map(|t| t.to_string()),
            created_at: s.created_at.clone(),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CompleteUploadResponse {
    pub id: String,
    pub size: u64,
    pub title_id: Option<String>,
    /// Whether the video is now attached to `title_id`.
    pub attached: bool,
}

/// POST /api/uploads
#[utoipa::path(
    post,
    path = "/api/uploads",
    request_body = StartUploadRequest,
    responses(
        (status = 201, description = "Upload started", body = UploadStatusResponse),
        (status = 400, description = "Invalid chunk count or file name"),
        (status = 404, description = "Title not found")
    )
)]
pub async fn start_upload(
    State(ctx): State<AppContext>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<StartUploadRequest>,
) -> Result<(StatusCode, Json<UploadStatusResponse>), AppError> {
    let title_id = match req.title_id.as_deref() {
        Some(raw) => {
            let id: TitleId = parse_id(raw, "title")?;
            let conn = mq_db::pool::get_conn(&ctx.db)?;
            let title = mq_db::queries::titles::get_title(&conn, id)?
                .ok_or_else(|| Error::not_found("title", id))?;
            if !title.kind.is_playable() {
                return Err(Error::Validation(format!(
                    "a video cannot be attached to a {}",
                    title.kind
                ))
                .into());
            }
            Some(id)
        }
        None => None,
    };

    let session = ctx
        .uploads
        .start(user.id, req.file_name.trim(), req.total_chunks, title_id)?;
    Ok((
        StatusCode::CREATED,
        Json(UploadStatusResponse::from_session(&session)),
    ))
}

/// PUT /api/uploads/{id}/chunks/{index}
///
/// The request body is the raw chunk. Re-sending an index replaces it.
#[utoipa::path(
    put,
    path = "/api/uploads/{id}/chunks/{index}",
    params(
        ("id" = String, Path, description = "Upload ID"),
        ("index" = u32, Path, description = "Zero-based chunk index")
    ),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Chunk stored", body = UploadStatusResponse),
        (status = 400, description = "Index out of range, empty or oversized chunk"),
        (status = 404, description = "Upload not found")
    )
)]
pub async fn upload_chunk(
    State(ctx): State<AppContext>,
    Extension(user): Extension<CurrentUser>,
    Path((id, index)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<UploadStatusResponse>, AppError> {
    let id: UploadId = parse_id(&id, "upload")?;
    let index: u32 = index
        .parse()
        .map_err(|_| Error::Validation(format!("Invalid chunk index '{index}'")))?;

    let session = ctx.uploads.write_chunk(id, user.id, index, &body).await?;
    Ok(Json(UploadStatusResponse::from_session(&session)))
}

/// GET /api/uploads/{id}
#[utoipa::path(
    get,
    path = "/api/uploads/{id}",
    params(("id" = String, Path, description = "Upload ID")),
    responses(
        (status = 200, description = "Received and missing chunks", body = UploadStatusResponse),
        (status = 404, description = "Upload not found")
    )
)]
pub async fn upload_status(
    State(ctx): State<AppContext>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<UploadStatusResponse>, AppError> {
    let id: UploadId = parse_id(&id, "upload")?;
    let session = ctx.uploads.get(id, user.id)?;
    Ok(Json(UploadStatusResponse::from_session(&session)))
}

/// POST /api/uploads/{id}/complete
#[utoipa::path(
    post,
    path = "/api/uploads/{id}/complete",
    params(("id" = String, Path, description = "Upload ID")),
    responses(
        (status = 200, description = "Video assembled", body = CompleteUploadResponse),
        (status = 400, description = "Chunks missing"),
        (status = 404, description = "Upload not found")
    )
)]
pub async fn complete_upload(
    State(ctx): State<AppContext>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<CompleteUploadResponse>, AppError> {
    let id: UploadId = parse_id(&id, "upload")?;
    let done = ctx.uploads.complete(id, user.id).await?;
    let path = done.path.to_string_lossy().into_owned();

    let mut attached = false;
    if let Some(title_id) = done.title_id {
        let replaced = {
            let conn = mq_db::pool::get_conn(&ctx.db)?;
            let previous = mq_db::queries::titles::get_title(&conn, title_id)?
                .and_then(|t| t.video_path)
                .filter(|p| *p != path);
            attached = mq_db::queries::titles::set_video_path(&conn, title_id, &path)?;
            previous
        };
        if attached {
            ctx.uploads.remove_videos(replaced.as_slice()).await;
        } else {
            // Title deleted while the upload was in flight.
            tracing::warn!(upload = %id, title = %title_id, "Upload target title no longer exists");
            ctx.uploads.remove_videos(std::slice::from_ref(&path)).await;
        }
    }

    ctx.activity
        .record(
            ActivityEvent::UploadCompleted,
            Some(user.id),
            json!({
                "upload_id": id,
                "size": done.size,
                "title_id": done.title_id,
            }),
        )
        .await;

    Ok(Json(CompleteUploadResponse {
        id: id.to_string(),
        size: done.size,
        title_id: done.title_id.map(|t| t.to_string()),
        attached,
    }))
}
