//! Authentication route handlers: register, login, logout, me, password.

use axum::extract::{Extension, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{Duration, Utc};
use mq_core::{Error, Role};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::activity::ActivityEvent;
use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::auth::{CurrentUser, SESSION_COOKIE};
use crate::routes::profiles::ProfileResponse;
use crate::validation;

// ---------------------------------------------------------------------------
// Request / response schemas
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Login accepts either a username or an email address in `login`.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    #[serde(alias = "username", alias = "email")]
    pub login: String,
    pub password: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub role: Role,
    pub created_at: String,
}

impl UserResponse {
    pub fn from_model(u: &mq_db::models::User) -> Self {
        Self {
            id: u.id.to_string(),
            username: u.username.clone(),
            email: u.email.clone(),
            role: u.role,
            created_at: u.created_at.clone(),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RegisterResponse {
    pub user: UserResponse,
    pub profile: ProfileResponse,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct MeResponse {
    pub user: UserResponse,
    pub active_profile: Option<ProfileResponse>,
}

// ---------------------------------------------------------------------------
// Password helpers
// ---------------------------------------------------------------------------

/// Hash a password with bcrypt at the given cost.
pub fn hash_password(password: &str, cost: u32) -> Result<String, Error> {
    bcrypt::hash(password, cost).map_err(|e| Error::Internal(format!("bcrypt error: {e}")))
}

/// bcrypt is deliberately slow; keep it off the async worker threads.
async fn hash_blocking(password: String, cost: u32) -> Result<String, Error> {
    tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .map_err(|e| Error::Internal(format!("hashing task failed: {e}")))?
}

async fn verify_blocking(password: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || bcrypt::verify(&password, &hash).unwrap_or(false))
        .await
        .unwrap_or(false)
}

/// 32 random bytes, hex encoded.
fn new_session_token() -> String {
    let bytes: [u8; 32] = rand::random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn session_cookie(token: &str, max_age_secs: i64) -> Result<HeaderValue, Error> {
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={token}; HttpOnly; Path=/; SameSite=Lax; Max-Age={max_age_secs}"
    ))
    .map_err(|e| Error::Internal(format!("invalid cookie header: {e}")))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/auth/register
///
/// The first account ever registered becomes an admin. Every account starts
/// with one profile named after the user, already in use.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = RegisterResponse),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Registration disabled"),
        (status = 409, description = "Username or email taken")
    )
)]
pub async fn register(
    State(ctx): State<AppContext>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    if !ctx.config.auth.allow_registration {
        return Err(Error::Forbidden("Registration is disabled".into()).into());
    }

    let username = payload.username.trim();
    validation::username(username)?;
    validation::password(&payload.password)?;
    let email = payload
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());
    if let Some(email) = email {
        validation::email(email)?;
    }

    let hash = hash_blocking(payload.password.clone(), ctx.config.auth.bcrypt_cost).await?;

    let (user, profile) = {
        let conn = mq_db::pool::get_conn(&ctx.db)?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::database(e.to_string()))?;
        let user = mq_db::queries::users::register_user(&tx, username, email, &hash)?;
        let profile = mq_db::queries::profiles::create_profile(
            &tx,
            user.id,
            &user.username,
            None,
            false,
            ctx.config.profiles.max_per_user.max(1),
        )?;
        tx.commit().map_err(|e| Error::database(e.to_string()))?;
        (user, profile)
    };

    tracing::info!(user = %user.username, role = %user.role, "Account registered");
    ctx.activity
        .record(
            ActivityEvent::Register,
            Some(user.id),
            json!({ "username": user.username, "role": user.role }),
        )
        .await;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: UserResponse::from_model(&user),
            profile: ProfileResponse::from_model(&profile),
        }),
    ))
}

/// POST /api/auth/login
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(ctx): State<AppContext>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    // No pooled connection may be held across the bcrypt await.
    let user = {
        let conn = mq_db::pool::get_conn(&ctx.db)?;
        mq_db::queries::users::get_user_by_login(&conn, payload.login.trim())?
    }
    .ok_or_else(|| Error::Unauthorized("Invalid credentials".into()))?;

    if !verify_blocking(payload.password, user.password_hash.clone()).await {
        tracing::debug!(user = %user.username, "Password mismatch");
        return Err(Error::Unauthorized("Invalid credentials".into()).into());
    }

    let token = new_session_token();
    let hours = ctx.config.auth.session_timeout_hours as i64;
    let expires_at = mq_db::queries::format_ts(Utc::now() + Duration::hours(hours));
    {
        let conn = mq_db::pool::get_conn(&ctx.db)?;
        mq_db::queries::sessions::create_session(&conn, user.id, &token, &expires_at)?;
    }

    ctx.activity
        .record(
            ActivityEvent::Login,
            Some(user.id),
            json!({ "username": user.username }),
        )
        .await;

    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, session_cookie(&token, hours * 3600)?);

    Ok((
        StatusCode::OK,
        headers,
        Json(LoginResponse {
            token,
            expires_at,
            user: UserResponse::from_model(&user),
        }),
    ))
}

/// POST /api/auth/logout
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 204, description = "Session ended"))
)]
pub async fn logout(
    State(ctx): State<AppContext>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = mq_db::pool::get_conn(&ctx.db)?;
    mq_db::queries::sessions::delete_session(&conn, &user.token)?;

    ctx.activity
        .record(ActivityEvent::Logout, Some(user.id), json!({}))
        .await;

    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, session_cookie("", 0)?);
    Ok((StatusCode::NO_CONTENT, headers))
}

/// GET /api/auth/me
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current account", body = MeResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn me(
    State(ctx): State<AppContext>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<MeResponse>, AppError> {
    let conn = mq_db::pool::get_conn(&ctx.db)?;
    let account = mq_db::queries::users::get_user_by_id(&conn, user.id)?
        .ok_or_else(|| Error::Unauthorized("Account no longer exists".into()))?;
    let active = mq_db::queries::profiles::active_profile(&conn, user.id)?;

    Ok(Json(MeResponse {
        user: UserResponse::from_model(&account),
        active_profile: active.as_ref().map(ProfileResponse::from_model),
    }))
}

/// PUT /api/auth/password
///
/// Every other session of the account is revoked; the calling session stays.
#[utoipa::path(
    put,
    path = "/api/auth/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Invalid new password"),
        (status = 401, description = "Current password incorrect")
    )
)]
pub async fn change_password(
    State(ctx): State<AppContext>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    validation::password(&payload.new_password)?;

    let account = {
        let conn = mq_db::pool::get_conn(&ctx.db)?;
        mq_db::queries::users::get_user_by_id(&conn, user.id)?
    }
    .ok_or_else(|| Error::Unauthorized("Account no longer exists".into()))?;

    if !verify_blocking(payload.current_password, account.password_hash).await {
        return Err(Error::Unauthorized("Current password is incorrect".into()).into());
    }

    let new_hash = hash_blocking(payload.new_password, ctx.config.auth.bcrypt_cost).await?;
    let conn = mq_db::pool::get_conn(&ctx.db)?;
    mq_db::queries::users::update_password(&conn, user.id, &new_hash)?;
    let revoked =
        mq_db::queries::sessions::delete_user_sessions(&conn, user.id, Some(&user.token))?;
    tracing::info!(user = %user.username, revoked, "Password changed");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_hex_and_unique() {
        let a = new_session_token();
        let b = new_session_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn hash_and_verify() {
        let hash = hash_password("correct horse", 4).unwrap();
        assert!(bcrypt::verify("correct horse", &hash).unwrap());
        assert!(!bcrypt::verify("battery staple", &hash).unwrap());
    }

    #[test]
    fn cookie_attributes() {
        let v = session_cookie("abc", 60).unwrap();
        let s = v.to_str().unwrap();
        assert!(s.starts_with("marquee_session=abc;"));
        assert!(s.contains("HttpOnly"));
        assert!(s.contains("Max-Age=60"));
    }
}
