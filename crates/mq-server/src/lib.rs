//! mq-server: HTTP API server for marquee.
//!
//! This crate ties the mq-* crates together into a running service:
//!
//! - Axum-based JSON API with session authentication, role checks and
//!   rate limiting on credential endpoints
//! - Chunked video upload and HTTP range streaming
//! - JSON-lines activity log
//! - Graceful shutdown via signal handling

pub mod activity;
pub mod context;
pub mod error;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod upload;
pub mod validation;

use std::net::SocketAddr;
use std::time::Duration;

use mq_core::config::Config;

use crate::context::AppContext;

const UPLOAD_SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Start the marquee server.
///
/// Opens (or creates) the database, purges expired sessions and leftover
/// upload chunks, builds the [`AppContext`] and serves HTTP until a shutdown
/// signal arrives.
pub async fn start(config: Config) -> mq_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    let db_path = &config.server.db_path;
    let existed = db_path.exists();
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
            tracing::info!("Created database directory {}", parent.display());
        }
    }
    let db_str = db_path.to_string_lossy();
    let db = mq_db::pool::init_pool(&db_str)?;
    if existed {
        tracing::info!("Database opened (existing) at {db_str}");
    } else {
        tracing::info!("Database created (new) at {db_str}");
    }

    {
        let conn = mq_db::pool::get_conn(&db)?;
        let purged =
            mq_db::queries::sessions::delete_expired_sessions(&conn, &mq_db::queries::now_ts())?;
        if purged > 0 {
            tracing::info!("Purged {purged} expired sessions");
        }
    }

    for dir in [&config.media.video_dir, &config.media.upload_dir] {
        std::fs::create_dir_all(dir)?;
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| mq_core::Error::Internal(format!("Invalid server address: {e}")))?;

    let static_dir = config.server.static_dir.clone();
    let ctx = AppContext::new(db, config);
    ctx.uploads.clear_leftover_chunks().await?;
    let cleanup = upload::start_cleanup_task(ctx.uploads.clone(), UPLOAD_SWEEP_INTERVAL);
    let app = router::build_router(ctx, static_dir);

    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| mq_core::Error::Internal(format!("Failed to bind to {addr}: {e}")))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cleanup.abort();
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Shutdown signal received");
}
