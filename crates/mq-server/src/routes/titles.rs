//! Catalog title route handlers.
//!
//! Browsing is open to every logged-in account; creating, editing, deleting
//! titles and managing cast credits requires the admin role.

use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use mq_core::{ActorId, Error, TitleId, TitleKind};
use mq_db::queries::titles::{TitleFields, TitleFilter};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::activity::ActivityEvent;
use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::auth::CurrentUser;
use crate::routes::parse_id;
use crate::validation;

const DEFAULT_PAGE: i64 = 50;

// ---------------------------------------------------------------------------
// Schemas
// ---------------------------------------------------------------------------

/// A catalog entry. The on-disk video path is never exposed; `has_video`
/// tells whether `/api/stream/{id}` will serve anything.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TitleResponse {
    pub id: String,
    pub kind: TitleKind,
    pub name: String,
    pub sort_name: Option<String>,
    pub overview: Option<String>,
    pub year: Option<i32>,
    pub genre: Option<String>,
    pub runtime_minutes: Option<i32>,
    pub rating: Option<f64>,
    pub thumbnail_url: Option<String>,
    pub has_video: bool,
    pub parent_id: Option<String>,
    pub season_number: Option<i32>,
    pub episode_number: Option<i32>,
    pub created_at: String,
    pub updated_at: String,
}

impl TitleResponse {
    pub fn from_model(t: &mq_db::models::Title) -> Self {
        Self {
            id: t.id.to_string(),
            kind: t.kind,
            name: t.name.clone(),
            sort_name: t.sort_name.clone(),
            overview: t.overview.clone(),
            year: t.year,
            genre: t.genre.clone(),
            runtime_minutes: t.runtime_minutes,
            rating: t.rating,
            thumbnail_url: t.thumbnail_url.clone(),
            has_video: t.video_path.is_some(),
            parent_id: t.parent_id.map(|p| p.to_string()),
            season_number: t.season_number,
            episode_number: t.episode_number,
            created_at: t.created_at.clone(),
            updated_at: t.updated_at.clone(),
        }
    }

    pub fn from_models(titles: &[mq_db::models::Title]) -> Vec<Self> {
        titles.iter().map(Self::from_model).collect()
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CastResponse {
    pub actor_id: String,
    pub name: String,
    pub photo_url: Option<String>,
    pub character: Option<String>,
    pub billing_order: i32,
}

impl CastResponse {
    fn from_model(c: &mq_db::models::CastMember) -> Self {
        Self {
            actor_id: c.actor.id.to_string(),
            name: c.actor.name.clone(),
            photo_url: c.actor.photo_url.clone(),
            character: c.character.clone(),
            billing_order: c.billing_order,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TitleDetailResponse {
    #[serde(flatten)]
    pub title: TitleResponse,
    pub cast: Vec<CastResponse>,
    /// Only present for series.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episodes: Option<Vec<TitleResponse>>,
    pub total_views: i64,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct TitleListParams {
    pub kind: Option<String>,
    pub genre: Option<String>,
    pub search: Option<String>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct TitleRequest {
    pub kind: TitleKind,
    pub name: String,
    #[serde(default)]
    pub sort_name: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub runtime_minutes: Option<i32>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub season_number: Option<i32>,
    #[serde(default)]
    pub episode_number: Option<i32>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CastRequest {
    #[serde(default)]
    pub character: Option<String>,
    #[serde(default)]
    pub billing_order: i32,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Validate a request and borrow it as insert/update fields.
fn title_fields(req: &TitleRequest) -> Result<TitleFields<'_>, Error> {
    let name = req.name.trim();
    validation::title_name(name)?;
    validation::year(req.year)?;
    validation::rating(req.rating)?;
    if req.runtime_minutes.is_some_and(|m| m < 0) {
        return Err(Error::Validation("runtime_minutes cannot be negative".into()));
    }

    let parent_id = req
        .parent_id
        .as_deref()
        .map(|p| parse_id::<TitleId>(p, "parent title"))
        .transpose()?;

    Ok(TitleFields {
        kind: req.kind,
        name,
        sort_name: non_blank(req.sort_name.as_deref()),
        overview: non_blank(req.overview.as_deref()),
        year: req.year,
        genre: non_blank(req.genre.as_deref()),
        runtime_minutes: req.runtime_minutes,
        rating: req.rating,
        thumbnail_url: non_blank(req.thumbnail_url.as_deref()),
        parent_id,
        season_number: req.season_number,
        episode_number: req.episode_number,
    })
}

// ---------------------------------------------------------------------------
// Browsing
// ---------------------------------------------------------------------------

/// GET /api/titles
///
/// With `search`, returns relevance-ordered matches on name and overview,
/// still narrowed by `kind` and `genre` and paged by `offset`.
#[utoipa::path(
    get,
    path = "/api/titles",
    params(TitleListParams),
    responses((status = 200, description = "Titles", body = Vec<TitleResponse>))
)]
pub async fn list_titles(
    State(ctx): State<AppContext>,
    Query(params): Query<TitleListParams>,
) -> Result<Json<Vec<TitleResponse>>, AppError> {
    let limit = validation::page_limit(params.limit, DEFAULT_PAGE);
    let kind = non_blank(params.kind.as_deref())
        .map(str::parse::<TitleKind>)
        .transpose()?;
    let filter = TitleFilter {
        kind,
        genre: non_blank(params.genre.as_deref()).map(str::to_string),
        offset: params.offset.unwrap_or(0).max(0),
        limit,
    };

    let conn = mq_db::pool::get_conn(&ctx.db)?;
    let titles = match non_blank(params.search.as_deref()) {
        Some(search) => mq_db::queries::titles::search_titles(&conn, search, &filter)?,
        None => mq_db::queries::titles::list_titles(&conn, &filter)?,
    };
    Ok(Json(TitleResponse::from_models(&titles)))
}

/// GET /api/titles/{id}
#[utoipa::path(
    get,
    path = "/api/titles/{id}",
    params(("id" = String, Path, description = "Title ID")),
    responses(
        (status = 200, description = "Title with cast", body = TitleDetailResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_title(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<TitleDetailResponse>, AppError> {
    let id: TitleId = parse_id(&id, "title")?;
    let conn = mq_db::pool::get_conn(&ctx.db)?;
    let title = mq_db::queries::titles::get_title(&conn, id)?
        .ok_or_else(|| Error::not_found("title", id))?;

    let cast = mq_db::queries::actors::list_cast(&conn, id)?;
    let episodes = if title.kind == TitleKind::Series {
        let eps = mq_db::queries::titles::list_episodes(&conn, id)?;
        Some(TitleResponse::from_models(&eps))
    } else {
        None
    };
    let total_views = mq_db::queries::views::total_views(&conn, id)?;

    Ok(Json(TitleDetailResponse {
        title: TitleResponse::from_model(&title),
        cast: cast.iter().map(CastResponse::from_model).collect(),
        episodes,
        total_views,
    }))
}

/// GET /api/titles/{id}/episodes
#[utoipa::path(
    get,
    path = "/api/titles/{id}/episodes",
    params(("id" = String, Path, description = "Series ID")),
    responses(
        (status = 200, description = "Episodes by season and number", body = Vec<TitleResponse>),
        (status = 400, description = "Title is not a series"),
        (status = 404, description = "Not found")
    )
)]
pub async fn list_episodes(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<Vec<TitleResponse>>, AppError> {
    let id: TitleId = parse_id(&id, "title")?;
    let conn = mq_db::pool::get_conn(&ctx.db)?;
    let series = mq_db::queries::titles::get_title(&conn, id)?
        .ok_or_else(|| Error::not_found("title", id))?;
    if series.kind != TitleKind::Series {
        return Err(Error::Validation(format!("'{}' is not a series", series.name)).into());
    }
    let episodes = mq_db::queries::titles::list_episodes(&conn, id)?;
    Ok(Json(TitleResponse::from_models(&episodes)))
}

/// GET /api/genres
#[utoipa::path(
    get,
    path = "/api/genres",
    responses((status = 200, description = "Distinct genres", body = Vec<String>))
)]
pub async fn list_genres(State(ctx): State<AppContext>) -> Result<Json<Vec<String>>, AppError> {
    let conn = mq_db::pool::get_conn(&ctx.db)?;
    Ok(Json(mq_db::queries::titles::list_genres(&conn)?))
}

// ---------------------------------------------------------------------------
// Admin: editing
// ---------------------------------------------------------------------------

/// POST /api/titles
#[utoipa::path(
    post,
    path = "/api/titles",
    request_body = TitleRequest,
    responses(
        (status = 201, description = "Title created", body = TitleResponse),
        (status = 400, description = "Invalid title"),
        (status = 403, description = "Admin only")
    )
)]
pub async fn create_title(
    State(ctx): State<AppContext>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<TitleRequest>,
) -> Result<(StatusCode, Json<TitleResponse>), AppError> {
    let fields = title_fields(&req)?;
    let conn = mq_db::pool::get_conn(&ctx.db)?;
    let title = mq_db::queries::titles::create_title(&conn, &fields)?;

    tracing::info!(title = %title.id, kind = %title.kind, name = %title.name, "Title created");
    ctx.activity
        .record(
            ActivityEvent::TitleCreated,
            Some(user.id),
            json!({ "title_id": title.id, "kind": title.kind, "name": title.name }),
        )
        .await;

    Ok((StatusCode::CREATED, Json(TitleResponse::from_model(&title))))
}

/// PUT /api/titles/{id}
#[utoipa::path(
    put,
    path = "/api/titles/{id}",
    params(("id" = String, Path, description = "Title ID")),
    request_body = TitleRequest,
    responses(
        (status = 200, description = "Title updated", body = TitleResponse),
        (status = 400, description = "Invalid title or kind change"),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_title(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(req): Json<TitleRequest>,
) -> Result<Json<TitleResponse>, AppError> {
    let id: TitleId = parse_id(&id, "title")?;
    let fields = title_fields(&req)?;
    let conn = mq_db::pool::get_conn(&ctx.db)?;

    if !mq_db::queries::titles::update_title(&conn, id, &fields)? {
        return Err(Error::not_found("title", id).into());
    }
    let title = mq_db::queries::titles::get_title(&conn, id)?
        .ok_or_else(|| Error::not_found("title", id))?;
    Ok(Json(TitleResponse::from_model(&title)))
}

/// DELETE /api/titles/{id}
///
/// Deleting a series deletes its episodes. Attached video files are removed
/// from disk.
#[utoipa::path(
    delete,
    path = "/api/titles/{id}",
    params(("id" = String, Path, description = "Title ID")),
    responses(
        (status = 204, description = "Title deleted"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_title(
    State(ctx): State<AppContext>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id: TitleId = parse_id(&id, "title")?;
    let (title, videos) = {
        let conn = mq_db::pool::get_conn(&ctx.db)?;
        let title = mq_db::queries::titles::get_title(&conn, id)?
            .ok_or_else(|| Error::not_found("title", id))?;
        let videos = mq_db::queries::titles::video_paths(&conn, id)?;
        mq_db::queries::titles::delete_title(&conn, id)?;
        (title, videos)
    };
    ctx.uploads.remove_videos(&videos).await;
    tracing::info!(title = %id, name = %title.name, videos = videos.len(), "Title deleted");
    ctx.activity
        .record(
            ActivityEvent::TitleDeleted,
            Some(user.id),
            json!({ "title_id": id, "name": title.name }),
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/titles/{id}/cast/{actor_id}
#[utoipa::path(
    put,
    path = "/api/titles/{id}/cast/{actor_id}",
    params(
        ("id" = String, Path, description = "Title ID"),
        ("actor_id" = String, Path, description = "Actor ID")
    ),
    request_body = CastRequest,
    responses(
        (status = 200, description = "Cast after the change", body = Vec<CastResponse>),
        (status = 404, description = "Title or actor not found")
    )
)]
pub async fn set_cast(
    State(ctx): State<AppContext>,
    Path((id, actor_id)): Path<(String, String)>,
    Json(req): Json<CastRequest>,
) -> Result<Json<Vec<CastResponse>>, AppError> {
    let id: TitleId = parse_id(&id, "title")?;
    let actor_id: ActorId = parse_id(&actor_id, "actor")?;
    if req.billing_order < 0 {
        return Err(Error::Validation("billing_order cannot be negative".into()).into());
    }

    let conn = mq_db::pool::get_conn(&ctx.db)?;
    mq_db::queries::actors::link_actor(
        &conn,
        id,
        actor_id,
        non_blank(req.character.as_deref()),
        req.billing_order,
    )?;
    let cast = mq_db::queries::actors::list_cast(&conn, id)?;
    Ok(Json(cast.iter().map(CastResponse::from_model).collect()))
}

/// DELETE /api/titles/{id}/cast/{actor_id}
#[utoipa::path(
    delete,
    path = "/api/titles/{id}/cast/{actor_id}",
    params(
        ("id" = String, Path, description = "Title ID"),
        ("actor_id" = String, Path, description = "Actor ID")
    ),
    responses(
        (status = 204, description = "Credit removed"),
        (status = 404, description = "No such credit")
    )
)]
pub async fn remove_cast(
    State(ctx): State<AppContext>,
    Path((id, actor_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let id: TitleId = parse_id(&id, "title")?;
    let actor_id: ActorId = parse_id(&actor_id, "actor")?;
    let conn = mq_db::pool::get_conn(&ctx.db)?;
    if !mq_db::queries::actors::unlink_actor(&conn, id, actor_id)? {
        return Err(Error::not_found("cast credit", format!("{id}/{actor_id}")).into());
    }
    Ok(StatusCode::NO_CONTENT)
}
