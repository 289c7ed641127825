//! Error-to-HTTP response conversion.
//!
//! Handlers return `Result<T, AppError>`; `?` on any `mq_core::Error`
//! converts automatically. The response body carries the request id of the
//! request being served, taken from [`crate::middleware::request_id`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::middleware::request_id::current_request_id;

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError {
    inner: mq_core::Error,
    request_id: Option<String>,
}

impl AppError {
    pub fn new(inner: mq_core::Error) -> Self {
        Self {
            inner,
            request_id: current_request_id(),
        }
    }
}

impl From<mq_core::Error> for AppError {
    fn from(e: mq_core::Error) -> Self {
        Self::new(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error = %self.inner,
                "Server error in API handler"
            );
        }

        let body = json!({
            "error": self.inner.to_string(),
            "code": self.inner.code(),
            "request_id": self.request_id,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_produces_404() {
        let err = AppError::new(mq_core::Error::not_found("title", "abc"));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn conflict_produces_409() {
        let err = AppError::new(mq_core::Error::Conflict("dup".into()));
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn outside_a_request_there_is_no_id() {
        let err = AppError::new(mq_core::Error::Internal("oops".into()));
        assert!(err.request_id.is_none());
    }
}
