//! Governor-based rate limiting for the unauthenticated auth routes.

use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

use serde_json::json;

use crate::context::AppContext;
use crate::middleware::request_id::current_request_id;

/// A shared rate limiter instance.
pub type SharedLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

const FALLBACK_PER_MINUTE: NonZeroU32 = match NonZeroU32::new(30) {
    Some(n) => n,
    None => unreachable!(),
};

/// Create a rate limiter with the given requests-per-minute quota. A zero
/// quota falls back to 30/min.
pub fn create_limiter(requests_per_minute: u32) -> SharedLimiter {
    let per_minute = NonZeroU32::new(requests_per_minute).unwrap_or(FALLBACK_PER_MINUTE);
    Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)))
}

/// Rate limiting middleware. Returns 429 Too Many Requests when exceeded.
pub async fn rate_limit_middleware(
    State(ctx): State<AppContext>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    if ctx.limiter.check().is_err() {
        tracing::warn!(path = %request.uri().path(), "Auth rate limit exceeded");
        let body = json!({
            "error": "Rate limit exceeded",
            "code": "rate_limited",
            "request_id": current_request_id(),
        });
        return Err((StatusCode::TOO_MANY_REQUESTS, axum::Json(body)).into_response());
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_then_reject() {
        let limiter = create_limiter(2);
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }

    #[test]
    fn zero_quota_uses_fallback() {
        let limiter = create_limiter(0);
        for _ in 0..30 {
            assert!(limiter.check().is_ok());
        }
        assert!(limiter.check().is_err());
    }
}
