//! Viewing profile route handlers.
//!
//! Profiles belong to the calling account; ids of other accounts' profiles
//! resolve to 404.

use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::Json;
use mq_core::{Error, ProfileId};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::activity::ActivityEvent;
use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::auth::CurrentUser;
use crate::routes::parse_id;
use crate::validation;

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ProfileResponse {
    pub id: String,
    pub name: String,
    pub avatar: Option<String>,
    pub is_kids: bool,
    pub in_use: bool,
    pub created_at: String,
}

impl ProfileResponse {
    pub fn from_model(p: &mq_db::models::Profile) -> Self {
        Self {
            id: p.id.to_string(),
            name: p.name.clone(),
            avatar: p.avatar.clone(),
            is_kids: p.is_kids,
            in_use: p.in_use,
            created_at: p.created_at.clone(),
        }
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ProfileRequest {
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub is_kids: bool,
}

fn clean_avatar(avatar: Option<&str>) -> Option<&str> {
    avatar.map(str::trim).filter(|a| !a.is_empty())
}

/// GET /api/profiles
#[utoipa::path(
    get,
    path = "/api/profiles",
    responses((status = 200, description = "Profiles of the account", body = Vec<ProfileResponse>))
)]
pub async fn list_profiles(
    State(ctx): State<AppContext>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<ProfileResponse>>, AppError> {
    let conn = mq_db::pool::get_conn(&ctx.db)?;
    let profiles = mq_db::queries::profiles::list_profiles(&conn, user.id)?;
    Ok(Json(profiles.iter().map(ProfileResponse::from_model).collect()))
}

/// POST /api/profiles
#[utoipa::path(
    post,
    path = "/api/profiles",
    request_body = ProfileRequest,
    responses(
        (status = 201, description = "Profile created", body = ProfileResponse),
        (status = 400, description = "Invalid name or profile limit reached"),
        (status = 409, description = "Name already used on this account")
    )
)]
pub async fn create_profile(
    State(ctx): State<AppContext>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<ProfileRequest>,
) -> Result<(StatusCode, Json<ProfileResponse>), AppError> {
    let name = req.name.trim();
    validation::profile_name(name)?;

    let conn = mq_db::pool::get_conn(&ctx.db)?;
    let profile = mq_db::queries::profiles::create_profile(
        &conn,
        user.id,
        name,
        clean_avatar(req.avatar.as_deref()),
        req.is_kids,
        ctx.config.profiles.max_per_user,
    )?;
    tracing::debug!(user = %user.username, profile = %profile.id, "Profile created");

    Ok((StatusCode::CREATED, Json(ProfileResponse::from_model(&profile))))
}

/// GET /api/profiles/active
#[utoipa::path(
    get,
    path = "/api/profiles/active",
    responses(
        (status = 200, description = "Profile in use", body = ProfileResponse),
        (status = 404, description = "No profile selected")
    )
)]
pub async fn active_profile(
    State(ctx): State<AppContext>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ProfileResponse>, AppError> {
    let conn = mq_db::pool::get_conn(&ctx.db)?;
    let profile = mq_db::queries::profiles::active_profile(&conn, user.id)?
        .ok_or_else(|| Error::not_found("profile", "active"))?;
    Ok(Json(ProfileResponse::from_model(&profile)))
}

/// GET /api/profiles/{id}
#[utoipa::path(
    get,
    path = "/api/profiles/{id}",
    params(("id" = String, Path, description = "Profile ID")),
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_profile(
    State(ctx): State<AppContext>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<ProfileResponse>, AppError> {
    let id: ProfileId = parse_id(&id, "profile")?;
    let conn = mq_db::pool::get_conn(&ctx.db)?;
    let profile = mq_db::queries::profiles::get_profile(&conn, user.id, id)?
        .ok_or_else(|| Error::not_found("profile", id))?;
    Ok(Json(ProfileResponse::from_model(&profile)))
}

/// PUT /api/profiles/{id}
#[utoipa::path(
    put,
    path = "/api/profiles/{id}",
    params(("id" = String, Path, description = "Profile ID")),
    request_body = ProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = ProfileResponse),
        (status = 404, description = "Not found"),
        (status = 409, description = "Name already used on this account")
    )
)]
pub async fn update_profile(
    State(ctx): State<AppContext>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<ProfileRequest>,
) -> Result<Json<ProfileResponse>, AppError> {
    let id: ProfileId = parse_id(&id, "profile")?;
    let name = req.name.trim();
    validation::profile_name(name)?;

    let conn = mq_db::pool::get_conn(&ctx.db)?;
    let updated = mq_db::queries::profiles::update_profile(
        &conn,
        user.id,
        id,
        name,
        clean_avatar(req.avatar.as_deref()),
        req.is_kids,
    )?;
    if !updated {
        return Err(Error::not_found("profile", id).into());
    }

    let profile = mq_db::queries::profiles::get_profile(&conn, user.id, id)?
        .ok_or_else(|| Error::not_found("profile", id))?;
    Ok(Json(ProfileResponse::from_model(&profile)))
}

/// DELETE /api/profiles/{id}
///
/// The last remaining profile of an account cannot be deleted.
#[utoipa::path(
    delete,
    path = "/api/profiles/{id}",
    params(("id" = String, Path, description = "Profile ID")),
    responses(
        (status = 204, description = "Profile deleted"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Last profile of the account")
    )
)]
pub async fn delete_profile(
    State(ctx): State<AppContext>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id: ProfileId = parse_id(&id, "profile")?;
    let conn = mq_db::pool::get_conn(&ctx.db)?;

    if mq_db::queries::profiles::get_profile(&conn, user.id, id)?.is_none() {
        return Err(Error::not_found("profile", id).into());
    }
    if mq_db::queries::profiles::count_profiles(&conn, user.id)? <= 1 {
        return Err(Error::Conflict("An account must keep at least one profile".into()).into());
    }

    mq_db::queries::profiles::delete_profile(&conn, user.id, id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/profiles/{id}/select
///
/// Marks the profile as in use; every other profile of the account is
/// cleared in the same transaction.
#[utoipa::path(
    post,
    path = "/api/profiles/{id}/select",
    params(("id" = String, Path, description = "Profile ID")),
    responses(
        (status = 200, description = "Profile selected", body = ProfileResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn select_profile(
    State(ctx): State<AppContext>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<ProfileResponse>, AppError> {
    let id: ProfileId = parse_id(&id, "profile")?;
    let conn = mq_db::pool::get_conn(&ctx.db)?;
    let profile = mq_db::queries::profiles::select_profile(&conn, user.id, id)?;

    ctx.activity
        .record(
            ActivityEvent::ProfileSelected,
            Some(user.id),
            json!({ "profile_id": profile.id, "name": profile.name }),
        )
        .await;

    Ok(Json(ProfileResponse::from_model(&profile)))
}
