//! Session authentication and role checks.
//!
//! [`auth_middleware`] resolves a session token from `Authorization: Bearer`
//! or the session cookie and injects a [`CurrentUser`] into the request
//! extensions. [`require_admin`] sits behind it on admin-only routes.

use axum::extract::State;
use axum::http::{header, HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use mq_core::{Error, Role, UserId};
use mq_db::pool::DbPool;

use crate::context::AppContext;
use crate::error::AppError;

/// Cookie name for browser sessions.
pub const SESSION_COOKIE: &str = "marquee_session";

/// The authenticated caller, available to handlers as
/// `Extension<CurrentUser>`.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: UserId,
    pub username: String,
    pub role: Role,
    /// Session token the request authenticated with.
    pub token: String,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Extract a bearer token or session cookie from request headers.
///
/// The `Authorization` header wins over the cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        let token = token.trim();
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|part| {
        part.trim()
            .strip_prefix(SESSION_COOKIE)
            .and_then(|rest| rest.strip_prefix('='))
            .filter(|v| !v.is_empty())
            .map(String::from)
    })
}

/// Resolve a token to its user. Expired sessions are deleted on sight.
pub fn resolve_session(db: &DbPool, token: &str) -> Result<CurrentUser, Error> {
    let conn = mq_db::pool::get_conn(db)?;
    let session = mq_db::queries::sessions::get_session(&conn, token)?
        .ok_or_else(|| Error::Unauthorized("Invalid session".into()))?;

    let expired = DateTime::parse_from_rfc3339(&session.expires_at)
        .map(|exp| exp.with_timezone(&Utc) <= Utc::now())
        .unwrap_or(true);
    if expired {
        mq_db::queries::sessions::delete_session(&conn, token)?;
        return Err(Error::Unauthorized("Session expired".into()));
    }

    let user = mq_db::queries::users::get_user_by_id(&conn, session.user_id)?
        .ok_or_else(|| Error::Unauthorized("Invalid session".into()))?;

    Ok(CurrentUser {
        id: user.id,
        username: user.username,
        role: user.role,
        token: token.to_string(),
    })
}

/// Authentication middleware. Applied to protected routes only.
pub async fn auth_middleware(
    State(ctx): State<AppContext>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_token(request.headers()).ok_or_else(|| {
        AppError::from(Error::Unauthorized("Authentication required".into())).into_response()
    })?;

    match resolve_session(&ctx.db, &token) {
        Ok(user) => {
            tracing::Span::current().record("user", user.username.as_str());
            request.extensions_mut().insert(user);
            Ok(next.run(request).await)
        }
        Err(e) => Err(AppError::from(e).into_response()),
    }
}

/// Reject callers that are not admins with 403.
///
/// Must run after [`auth_middleware`].
pub async fn require_admin(
    request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    match request.extensions().get::<CurrentUser>() {
        Some(user) if user.is_admin() => Ok(next.run(request).await),
        Some(user) => {
            tracing::debug!(user = %user.username, "Admin route refused");
            Err(AppError::from(Error::Forbidden("Admin access required".into())).into_response())
        }
        None => Err(
            AppError::from(Error::Unauthorized("Authentication required".into())).into_response(),
        ),
    }
}
