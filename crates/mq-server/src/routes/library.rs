//! Favorites and watchlist of the profile in use, plus the per-title state
//! shown on a title page.

use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use mq_core::{Error, TitleId};
use serde::{Deserialize, Serialize};

use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::auth::CurrentUser;
use crate::routes::progress::ProgressResponse;
use crate::routes::titles::TitleResponse;
use crate::routes::{active_profile, parse_id};
use crate::validation;

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct LimitParams {
    pub limit: Option<i64>,
}

/// Result of adding a title to a list.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ListChange {
    pub title_id: String,
    /// False when the title was already on the list.
    pub added: bool,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TitleStateResponse {
    pub title_id: String,
    pub favorite: bool,
    pub watchlisted: bool,
    pub progress: Option<ProgressResponse>,
}

// ---------------------------------------------------------------------------
// Favorites
// ---------------------------------------------------------------------------

/// GET /api/favorites
#[utoipa::path(
    get,
    path = "/api/favorites",
    params(LimitParams),
    responses(
        (status = 200, description = "Favorites, newest first", body = Vec<TitleResponse>),
        (status = 400, description = "No profile selected")
    )
)]
pub async fn list_favorites(
    State(ctx): State<AppContext>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<TitleResponse>>, AppError> {
    let conn = mq_db::pool::get_conn(&ctx.db)?;
    let profile = active_profile(&conn, user.id)?;
    let limit = validation::page_limit(params.limit, 100);
    let titles = mq_db::queries::favorites::list_favorites(&conn, profile.id, limit)?;
    Ok(Json(TitleResponse::from_models(&titles)))
}

/// POST /api/favorites/{title_id}
#[utoipa::path(
    post,
    path = "/api/favorites/{title_id}",
    params(("title_id" = String, Path, description = "Title ID")),
    responses(
        (status = 200, description = "Favorite stored", body = ListChange),
        (status = 404, description = "Title not found")
    )
)]
pub async fn add_favorite(
    State(ctx): State<AppContext>,
    Extension(user): Extension<CurrentUser>,
    Path(title_id): Path<String>,
) -> Result<Json<ListChange>, AppError> {
    let title_id: TitleId = parse_id(&title_id, "title")?;
    let conn = mq_db::pool::get_conn(&ctx.db)?;
    let profile = active_profile(&conn, user.id)?;
    let added = mq_db::queries::favorites::add_favorite(&conn, profile.id, title_id)?;
    Ok(Json(ListChange {
        title_id: title_id.to_string(),
        added,
    }))
}

/// DELETE /api/favorites/{title_id}
#[utoipa::path(
    delete,
    path = "/api/favorites/{title_id}",
    params(("title_id" = String, Path, description = "Title ID")),
    responses(
        (status = 204, description = "Favorite removed"),
        (status = 404, description = "Not a favorite")
    )
)]
pub async fn remove_favorite(
    State(ctx): State<AppContext>,
    Extension(user): Extension<CurrentUser>,
    Path(title_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let title_id: TitleId = parse_id(&title_id, "title")?;
    let conn = mq_db::pool::get_conn(&ctx.db)?;
    let profile = active_profile(&conn, user.id)?;
    if !mq_db::queries::favorites::remove_favorite(&conn, profile.id, title_id)? {
        return Err(Error::not_found("favorite", title_id).into());
    }
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Watchlist
// ---------------------------------------------------------------------------

/// GET /api/watchlist
#[utoipa::path(
    get,
    path = "/api/watchlist",
    params(LimitParams),
    responses(
        (status = 200, description = "Watchlist, newest first", body = Vec<TitleResponse>),
        (status = 400, description = "No profile selected")
    )
)]
pub async fn list_watchlist(
    State(ctx): State<AppContext>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<TitleResponse>>, AppError> {
    let conn = mq_db::pool::get_conn(&ctx.db)?;
    let profile = active_profile(&conn, user.id)?;
    let limit = validation::page_limit(params.limit, 100);
    let titles = mq_db::queries::watchlist::list(&conn, profile.id, limit)?;
    Ok(Json(TitleResponse::from_models(&titles)))
}

/// POST /api/watchlist/{title_id}
///
/// Idempotent: adding a title twice leaves one entry.
#[utoipa::path(
    post,
    path = "/api/watchlist/{title_id}",
    params(("title_id" = String, Path, description = "Title ID")),
    responses(
        (status = 200, description = "Watchlist entry stored", body = ListChange),
        (status = 404, description = "Title not found")
    )
)]
pub async fn add_to_watchlist(
    State(ctx): State<AppContext>,
    Extension(user): Extension<CurrentUser>,
    Path(title_id): Path<String>,
) -> Result<Json<ListChange>, AppError> {
    let title_id: TitleId = parse_id(&title_id, "title")?;
    let conn = mq_db::pool::get_conn(&ctx.db)?;
    let profile = active_profile(&conn, user.id)?;
    let added = mq_db::queries::watchlist::add(&conn, profile.id, title_id)?;
    Ok(Json(ListChange {
        title_id: title_id.to_string(),
        added,
    }))
}

/// DELETE /api/watchlist/{title_id}
#[utoipa::path(
    delete,
    path = "/api/watchlist/{title_id}",
    params(("title_id" = String, Path, description = "Title ID")),
    responses(
        (status = 204, description = "Removed from watchlist"),
        (status = 404, description = "Not on the watchlist")
    )
)]
pub async fn remove_from_watchlist(
    State(ctx): State<AppContext>,
    Extension(user): Extension<CurrentUser>,
    Path(title_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let title_id: TitleId = parse_id(&title_id, "title")?;
    let conn = mq_db::pool::get_conn(&ctx.db)?;
    let profile = active_profile(&conn, user.id)?;
    if !mq_db::queries::watchlist::remove(&conn, profile.id, title_id)? {
        return Err(Error::not_found("watchlist entry", title_id).into());
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/titles/{id}/state
#[utoipa::path(
    get,
    path = "/api/titles/{id}/state",
    params(("id" = String, Path, description = "Title ID")),
    responses(
        (status = 200, description = "Favorite, watchlist and progress state", body = TitleStateResponse),
        (status = 404, description = "Title not found")
    )
)]
pub async fn title_state(
    State(ctx): State<AppContext>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<TitleStateResponse>, AppError> {
    let id: TitleId = parse_id(&id, "title")?;
    let conn = mq_db::pool::get_conn(&ctx.db)?;
    if mq_db::queries::titles::get_title(&conn, id)?.is_none() {
        return Err(Error::not_found("title", id).into());
    }
    let profile = active_profile(&conn, user.id)?;

    let favorite = mq_db::queries::favorites::is_favorite(&conn, profile.id, id)?;
    let watchlisted = mq_db::queries::watchlist::contains(&conn, profile.id, id)?;
    let progress = mq_db::queries::watch_time::get_progress(&conn, user.id, profile.id, id)?;

    Ok(Json(TitleStateResponse {
        title_id: id.to_string(),
        favorite,
        watchlisted,
        progress: progress.as_ref().map(ProgressResponse::from_model),
    }))
}
