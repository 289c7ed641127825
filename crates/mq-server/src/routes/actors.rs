//! Actor route handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use mq_core::{ActorId, Error};
use serde::{Deserialize, Serialize};

use crate::context::AppContext;
use crate::error::AppError;
use crate::routes::parse_id;
use crate::routes::titles::TitleResponse;
use crate::validation;

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ActorResponse {
    pub id: String,
    pub name: String,
    pub bio: Option<String>,
    pub photo_url: Option<String>,
    pub created_at: String,
}

impl ActorResponse {
    fn from_model(a: &mq_db::models::Actor) -> Self {
        Self {
            id: a.id.to_string(),
            name: a.name.clone(),
            bio: a.bio.clone(),
            photo_url: a.photo_url.clone(),
            created_at: a.created_at.clone(),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ActorDetailResponse {
    #[serde(flatten)]
    pub actor: ActorResponse,
    pub filmography: Vec<TitleResponse>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ActorListResponse {
    pub actors: Vec<ActorResponse>,
    pub total: i64,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ActorListParams {
    /// Case-insensitive name prefix.
    pub name: Option<String>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateActorRequest {
    pub name: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

/// GET /api/actors
#[utoipa::path(
    get,
    path = "/api/actors",
    params(ActorListParams),
    responses((status = 200, description = "Actors by name", body = ActorListResponse))
)]
pub async fn list_actors(
    State(ctx): State<AppContext>,
    Query(params): Query<ActorListParams>,
) -> Result<Json<ActorListResponse>, AppError> {
    let limit = validation::page_limit(params.limit, 50);
    let prefix = params
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());

    let conn = mq_db::pool::get_conn(&ctx.db)?;
    let actors = mq_db::queries::actors::list_actors(
        &conn,
        prefix,
        params.offset.unwrap_or(0).max(0),
        limit,
    )?;
    let total = mq_db::queries::actors::count_actors(&conn)?;

    Ok(Json(ActorListResponse {
        actors: actors.iter().map(ActorResponse::from_model).collect(),
        total,
    }))
}

/// GET /api/actors/{id}
#[utoipa::path(
    get,
    path = "/api/actors/{id}",
    params(("id" = String, Path, description = "Actor ID")),
    responses(
        (status = 200, description = "Actor with filmography", body = ActorDetailResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_actor(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<ActorDetailResponse>, AppError> {
    let id: ActorId = parse_id(&id, "actor")?;
    let conn = mq_db::pool::get_conn(&ctx.db)?;
    let actor = mq_db::queries::actors::get_actor(&conn, id)?
        .ok_or_else(|| Error::not_found("actor", id))?;
    let films = mq_db::queries::actors::list_filmography(&conn, id)?;

    Ok(Json(ActorDetailResponse {
        actor: ActorResponse::from_model(&actor),
        filmography: TitleResponse::from_models(&films),
    }))
}

/// POST /api/actors
#[utoipa::path(
    post,
    path = "/api/actors",
    request_body = CreateActorRequest,
    responses(
        (status = 201, description = "Actor created", body = ActorResponse),
        (status = 400, description = "Invalid name"),
        (status = 403, description = "Admin only")
    )
)]
pub async fn create_actor(
    State(ctx): State<AppContext>,
    Json(req): Json<CreateActorRequest>,
) -> Result<(StatusCode, Json<ActorResponse>), AppError> {
    let name = req.name.trim();
    validation::actor_name(name)?;
    let bio = req.bio.as_deref().map(str::trim).filter(|b| !b.is_empty());
    let photo = req
        .photo_url
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());

    let conn = mq_db::pool::get_conn(&ctx.db)?;
    let actor = mq_db::queries::actors::create_actor(&conn, name, bio, photo)?;
    Ok((StatusCode::CREATED, Json(ActorResponse::from_model(&actor))))
}

/// DELETE /api/actors/{id}
#[utoipa::path(
    delete,
    path = "/api/actors/{id}",
    params(("id" = String, Path, description = "Actor ID")),
    responses(
        (status = 204, description = "Actor and credits deleted"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_actor(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id: ActorId = parse_id(&id, "actor")?;
    let conn = mq_db::pool::get_conn(&ctx.db)?;
    if !mq_db::queries::actors::delete_actor(&conn, id)? {
        return Err(Error::not_found("actor", id).into());
    }
    Ok(StatusCode::NO_CONTENT)
}
