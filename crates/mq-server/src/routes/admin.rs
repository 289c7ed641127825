//! Admin-only handlers: dashboard statistics and account management.

use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use mq_core::{Error, Role, UserId};
use mq_db::queries::stats::DashboardStats;
use serde::Deserialize;
use serde_json::json;

use crate::activity::ActivityEvent;
use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::auth::CurrentUser;
use crate::routes::auth::UserResponse;
use crate::routes::parse_id;

const DEFAULT_STATS_DAYS: u32 = 30;
const MAX_STATS_DAYS: u32 = 365;

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct StatsParams {
    /// Length of the daily views window, 1 to 365 (default 30).
    pub days: Option<u32>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

/// GET /api/admin/stats
#[utoipa::path(
    get,
    path = "/api/admin/stats",
    params(StatsParams),
    responses(
        (status = 200, description = "Dashboard statistics"),
        (status = 403, description = "Admin only")
    )
)]
pub async fn dashboard_stats(
    State(ctx): State<AppContext>,
    Query(params): Query<StatsParams>,
) -> Result<Json<DashboardStats>, AppError> {
    let days = params
        .days
        .unwrap_or(DEFAULT_STATS_DAYS)
        .clamp(1, MAX_STATS_DAYS);
    let conn = mq_db::pool::get_conn(&ctx.db)?;
    let stats = mq_db::queries::stats::dashboard(&conn, days, Utc::now().date_naive())?;
    Ok(Json(stats))
}

/// GET /api/admin/users
#[utoipa::path(
    get,
    path = "/api/admin/users",
    responses(
        (status = 200, description = "All accounts", body = Vec<UserResponse>),
        (status = 403, description = "Admin only")
    )
)]
pub async fn list_users(
    State(ctx): State<AppContext>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let conn = mq_db::pool::get_conn(&ctx.db)?;
    let users = mq_db::queries::users::list_users(&conn)?;
    Ok(Json(users.iter().map(UserResponse::from_model).collect()))
}

/// PUT /api/admin/users/{id}/role
///
/// An admin cannot demote themselves, so at least one admin always remains.
#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/role",
    params(("id" = String, Path, description = "User ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = UserResponse),
        (status = 400, description = "Cannot change own role"),
        (status = 404, description = "User not found")
    )
)]
pub async fn update_role(
    State(ctx): State<AppContext>,
    Extension(admin): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let id: UserId = parse_id(&id, "user")?;
    if id == admin.id {
        return Err(Error::Validation("You cannot change your own role".into()).into());
    }

    let conn = mq_db::pool::get_conn(&ctx.db)?;
    if !mq_db::queries::users::update_user_role(&conn, id, req.role)? {
        return Err(Error::not_found("user", id).into());
    }
    let user = mq_db::queries::users::get_user_by_id(&conn, id)?
        .ok_or_else(|| Error::not_found("user", id))?;

    tracing::info!(admin = %admin.username, user = %user.username, role = %req.role, "Role changed");
    ctx.activity
        .record(
            ActivityEvent::RoleChanged,
            Some(admin.id),
            json!({ "target_user_id": id, "role": req.role }),
        )
        .await;

    Ok(Json(UserResponse::from_model(&user)))
}

/// DELETE /api/admin/users/{id}
#[utoipa::path(
    delete,
    path = "/api/admin/users/{id}",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 204, description = "Account and all its data deleted"),
        (status = 400, description = "Cannot delete yourself"),
        (status = 404, description = "User not found")
    )
)]
pub async fn delete_user(
    State(ctx): State<AppContext>,
    Extension(admin): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id: UserId = parse_id(&id, "user")?;
    if id == admin.id {
        return Err(Error::Validation("You cannot delete your own account".into()).into());
    }

    let conn = mq_db::pool::get_conn(&ctx.db)?;
    let user = mq_db::queries::users::get_user_by_id(&conn, id)?
        .ok_or_else(|| Error::not_found("user", id))?;
    mq_db::queries::users::delete_user(&conn, id)?;

    tracing::info!(admin = %admin.username, user = %user.username, "User deleted");
    ctx.activity
        .record(
            ActivityEvent::UserDeleted,
            Some(admin.id),
            json!({ "target_user_id": id, "username": user.username }),
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}
