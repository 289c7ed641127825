//! Application context shared by all request handlers.

use std::sync::Arc;

use mq_core::config::Config;
use mq_db::pool::DbPool;

use crate::activity::ActivityLog;
use crate::middleware::rate_limit::{create_limiter, SharedLimiter};
use crate::upload::UploadStore;

/// Application context shared by all request handlers (via Axum state).
///
/// This is cheaply cloneable because it only holds `Arc`s and the pool.
#[derive(Clone)]
pub struct AppContext {
    /// Database connection pool.
    pub db: DbPool,
    /// Immutable application configuration snapshot.
    pub config: Arc<Config>,
    /// JSON-lines activity log.
    pub activity: Arc<ActivityLog>,
    /// In-flight chunked uploads.
    pub uploads: Arc<UploadStore>,
    /// Limiter shared by the login/register routes.
    pub limiter: SharedLimiter,
}

impl AppContext {
    /// Build a context from a pool and configuration.
    pub fn new(db: DbPool, config: Config) -> Self {
        let activity = Arc::new(ActivityLog::new(&config.activity));
        let uploads = Arc::new(UploadStore::new(&config.media));
        let limiter = create_limiter(config.auth.api_rate_per_minute);
        Self {
            db,
            config: Arc::new(config),
            activity,
            uploads,
            limiter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_activity_has_no_path() {
        let mut config = Config::default();
        config.activity.enabled = false;
        let db = mq_db::pool::init_memory_pool().unwrap();
        let ctx = AppContext::new(db, config);
        assert!(ctx.activity.path().is_none());
        assert_eq!(ctx.uploads.in_flight(), 0);
    }
}
