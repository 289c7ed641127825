//! Watch progress and per-day view recording.

use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use mq_core::{Error, TitleId};
use mq_db::queries::watch_time::FINISHED_RATIO;
use serde::{Deserialize, Serialize};

use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::auth::CurrentUser;
use crate::routes::library::LimitParams;
use crate::routes::titles::TitleResponse;
use crate::routes::{active_profile, parse_id};
use crate::validation;

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ProgressResponse {
    pub title_id: String,
    pub position_secs: f64,
    pub duration_secs: Option<f64>,
    /// Position past 95% of the known duration.
    pub finished: bool,
    pub updated_at: String,
}

impl ProgressResponse {
    pub fn from_model(w: &mq_db::models::WatchTime) -> Self {
        let finished = w
            .duration_secs
            .is_some_and(|d| d > 0.0 && w.position_secs >= d * FINISHED_RATIO);
        Self {
            title_id: w.title_id.to_string(),
            position_secs: w.position_secs,
            duration_secs: w.duration_secs,
            finished,
            updated_at: w.updated_at.clone(),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ContinueWatchingItem {
    pub title: TitleResponse,
    pub progress: ProgressResponse,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SaveProgressRequest {
    pub position_secs: f64,
    #[serde(default)]
    pub duration_secs: Option<f64>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ViewResponse {
    pub title_id: String,
    pub date: String,
    /// Views of the title on `date` after this one.
    pub count: i64,
}

/// GET /api/progress/continue
#[utoipa::path(
    get,
    path = "/api/progress/continue",
    params(LimitParams),
    responses(
        (status = 200, description = "Unfinished titles, most recent first", body = Vec<ContinueWatchingItem>),
        (status = 400, description = "No profile selected")
    )
)]
pub async fn continue_watching(
    State(ctx): State<AppContext>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<ContinueWatchingItem>>, AppError> {
    let conn = mq_db::pool::get_conn(&ctx.db)?;
    let profile = active_profile(&conn, user.id)?;
    let limit = validation::page_limit(params.limit, 20);

    let rows =
        mq_db::queries::watch_time::list_continue_watching(&conn, user.id, profile.id, limit)?;
    let mut items = Vec::with_capacity(rows.len());
    for row in &rows {
        if let Some(title) = mq_db::queries::titles::get_title(&conn, row.title_id)? {
            items.push(ContinueWatchingItem {
                title: TitleResponse::from_model(&title),
                progress: ProgressResponse::from_model(row),
            });
        }
    }
    Ok(Json(items))
}

/// GET /api/progress/{title_id}
#[utoipa::path(
    get,
    path = "/api/progress/{title_id}",
    params(("title_id" = String, Path, description = "Title ID")),
    responses(
        (status = 200, description = "Saved position", body = ProgressResponse),
        (status = 404, description = "No progress saved")
    )
)]
pub async fn get_progress(
    State(ctx): State<AppContext>,
    Extension(user): Extension<CurrentUser>,
    Path(title_id): Path<String>,
) -> Result<Json<ProgressResponse>, AppError> {
    let title_id: TitleId = parse_id(&title_id, "title")?;
    let conn = mq_db::pool::get_conn(&ctx.db)?;
    let profile = active_profile(&conn, user.id)?;
    let progress = mq_db::queries::watch_time::get_progress(&conn, user.id, profile.id, title_id)?
        .ok_or_else(|| Error::not_found("progress", title_id))?;
    Ok(Json(ProgressResponse::from_model(&progress)))
}

/// PUT /api/progress/{title_id}
#[utoipa::path(
    put,
    path = "/api/progress/{title_id}",
    params(("title_id" = String, Path, description = "Title ID")),
    request_body = SaveProgressRequest,
    responses(
        (status = 200, description = "Position saved", body = ProgressResponse),
        (status = 400, description = "Invalid position"),
        (status = 404, description = "Title not found")
    )
)]
pub async fn save_progress(
    State(ctx): State<AppContext>,
    Extension(user): Extension<CurrentUser>,
    Path(title_id): Path<String>,
    Json(req): Json<SaveProgressRequest>,
) -> Result<Json<ProgressResponse>, AppError> {
    let title_id: TitleId = parse_id(&title_id, "title")?;
    if !req.position_secs.is_finite() || req.position_secs < 0.0 {
        return Err(Error::Validation("position_secs must be a non-negative number".into()).into());
    }
    if req.duration_secs.is_some_and(|d| !d.is_finite() || d <= 0.0) {
        return Err(Error::Validation("duration_secs must be positive".into()).into());
    }

    let conn = mq_db::pool::get_conn(&ctx.db)?;
    let profile = active_profile(&conn, user.id)?;
    let saved = mq_db::queries::watch_time::save_progress(
        &conn,
        user.id,
        profile.id,
        title_id,
        req.position_secs,
        req.duration_secs,
    )?;
    Ok(Json(ProgressResponse::from_model(&saved)))
}

/// DELETE /api/progress/{title_id}
#[utoipa::path(
    delete,
    path = "/api/progress/{title_id}",
    params(("title_id" = String, Path, description = "Title ID")),
    responses(
        (status = 204, description = "Progress cleared"),
        (status = 404, description = "No progress saved")
    )
)]
pub async fn clear_progress(
    State(ctx): State<AppContext>,
    Extension(user): Extension<CurrentUser>,
    Path(title_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let title_id: TitleId = parse_id(&title_id, "title")?;
    let conn = mq_db::pool::get_conn(&ctx.db)?;
    let profile = active_profile(&conn, user.id)?;
    if !mq_db::queries::watch_time::clear_progress(&conn, user.id, profile.id, title_id)? {
        return Err(Error::not_found("progress", title_id).into());
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/titles/{id}/view
///
/// Counts one view for today (UTC).
#[utoipa::path(
    post,
    path = "/api/titles/{id}/view",
    params(("id" = String, Path, description = "Title ID")),
    responses(
        (status = 200, description = "View recorded", body = ViewResponse),
        (status = 404, description = "Title not found")
    )
)]
pub async fn record_view(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<ViewResponse>, AppError> {
    let id: TitleId = parse_id(&id, "title")?;
    let today = Utc::now().date_naive();
    let conn = mq_db::pool::get_conn(&ctx.db)?;
    let count = mq_db::queries::views::record_view(&conn, id, today)?;
    Ok(Json(ViewResponse {
        title_id: id.to_string(),
        date: today.format("%Y-%m-%d").to_string(),
        count,
    }))
}
