//! HTTP middleware: request ID, session authentication, admin checks and
//! rate limiting.

pub mod auth;
pub mod rate_limit;
pub mod request_id;
