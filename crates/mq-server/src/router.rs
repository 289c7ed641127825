//! Axum router construction.
//!
//! Builds the full application router with all route groups, middleware
//! layers, and static file serving.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::context::AppContext;
use crate::middleware::auth::{auth_middleware, require_admin};
use crate::middleware::rate_limit::rate_limit_middleware;
use crate::middleware::request_id::request_id_middleware;
use crate::routes;

/// Headroom above the configured chunk size so oversized chunks reach the
/// handler and get a JSON validation error instead of a bare 413.
const CHUNK_BODY_SLACK: usize = 64 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health::health_check,
        routes::auth::register,
        routes::auth::login,
        routes::auth::logout,
        routes::auth::me,
        routes::auth::change_password,
        routes::profiles::list_profiles,
        routes::profiles::create_profile,
        routes::profiles::active_profile,
        routes::profiles::get_profile,
        routes::profiles::update_profile,
        routes::profiles::delete_profile,
        routes::profiles::select_profile,
        routes::titles::list_titles,
        routes::titles::get_title,
        routes::titles::list_episodes,
        routes::titles::list_genres,
        routes::titles::create_title,
        routes::titles::update_title,
        routes::titles::delete_title,
        routes::titles::set_cast,
        routes::titles::remove_cast,
        routes::actors::list_actors,
        routes::actors::get_actor,
        routes::actors::create_actor,
        routes::actors::delete_actor,
        routes::library::list_favorites,
        routes::library::add_favorite,
        routes::library::remove_favorite,
        routes::library::list_watchlist,
        routes::library::add_to_watchlist,
        routes::library::remove_from_watchlist,
        routes::library::title_state,
        routes::playlists::list_playlists,
        routes::playlists::create_playlist,
        routes::playlists::get_playlist,
        routes::playlists::rename_playlist,
        routes::playlists::delete_playlist,
        routes::playlists::add_entry,
        routes::playlists::remove_entry,
        routes::playlists::move_entry,
        routes::progress::continue_watching,
        routes::progress::get_progress,
        routes::progress::save_progress,
        routes::progress::clear_progress,
        routes::progress::record_view,
        routes::uploads::start_upload,
        routes::uploads::upload_chunk,
        routes::uploads::upload_status,
        routes::uploads::complete_upload,
        routes::stream::stream_title,
        routes::admin::dashboard_stats,
        routes::admin::list_users,
        routes::admin::update_role,
        routes::admin::delete_user,
    ),
    components(schemas(
        mq_core::Role,
        mq_core::TitleKind,
        routes::health::HealthResponse,
        routes::auth::RegisterRequest,
        routes::auth::LoginRequest,
        routes::auth::ChangePasswordRequest,
        routes::auth::UserResponse,
        routes::auth::RegisterResponse,
        routes::auth::LoginResponse,
        routes::auth::MeResponse,
        routes::profiles::ProfileResponse,
        routes::profiles::ProfileRequest,
        routes::titles::TitleResponse,
        routes::titles::TitleDetailResponse,
        routes::titles::CastResponse,
        routes::titles::TitleRequest,
        routes::titles::CastRequest,
        routes::actors::ActorResponse,
        routes::actors::ActorDetailResponse,
        routes::actors::ActorListResponse,
        routes::actors::CreateActorRequest,
        routes::library::ListChange,
        routes::library::TitleStateResponse,
        routes::playlists::PlaylistResponse,
        routes::playlists::PlaylistEntryResponse,
        routes::playlists::PlaylistDetailResponse,
        routes::playlists::CreatePlaylistRequest,
        routes::playlists::RenamePlaylistRequest,
        routes::playlists::AddEntryRequest,
        routes::playlists::MoveEntryRequest,
        routes::playlists::MoveEntryResponse,
        routes::progress::ProgressResponse,
        routes::progress::ContinueWatchingItem,
        routes::progress::SaveProgressRequest,
        routes::progress::ViewResponse,
        routes::uploads::StartUploadRequest,
        routes::uploads::UploadStatusResponse,
        routes::uploads::CompleteUploadResponse,
        routes::admin::UpdateRoleRequest,
    ))
)]
struct ApiDoc;

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext, static_dir: Option<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Credential endpoints -- open, but rate limited.
    let public_routes = Router::new()
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login))
        .route_layer(middleware::from_fn_with_state(
            ctx.clone(),
            rate_limit_middleware,
        ));

    let chunk_limit = ctx.config.media.max_chunk_bytes.saturating_add(CHUNK_BODY_SLACK);

    // Admin-only routes.
    let admin_routes = Router::new()
        .route("/titles", post(routes::titles::create_title))
        .route(
            "/titles/{id}",
            put(routes::titles::update_title).delete(routes::titles::delete_title),
        )
        .route(
            "/titles/{id}/cast/{actor_id}",
            put(routes::titles::set_cast).delete(routes::titles::remove_cast),
        )
        .route("/actors", post(routes::actors::create_actor))
        .route(
            "/actors/{id}",
            axum::routing::delete(routes::actors::delete_actor),
        )
        // Uploads
        .route("/uploads", post(routes::uploads::start_upload))
        .route(
            "/uploads/{id}/chunks/{index}",
            put(routes::uploads::upload_chunk).layer(DefaultBodyLimit::max(chunk_limit)),
        )
        .route("/uploads/{id}", get(routes::uploads::upload_status))
        .route(
            "/uploads/{id}/complete",
            post(routes::uploads::complete_upload),
        )
        // Dashboard and accounts
        .route("/admin/stats", get(routes::admin::dashboard_stats))
        .route("/admin/users", get(routes::admin::list_users))
        .route(
            "/admin/users/{id}",
            axum::routing::delete(routes::admin::delete_user),
        )
        .route("/admin/users/{id}/role", put(routes::admin::update_role))
        .route_layer(middleware::from_fn(require_admin));

    // Routes for any logged-in account.
    let user_routes = Router::new()
        // Account
        .route("/auth/logout", post(routes::auth::logout))
        .route("/auth/me", get(routes::auth::me))
        .route("/auth/password", put(routes::auth::change_password))
        // Profiles
        .route(
            "/profiles",
            get(routes::profiles::list_profiles).post(routes::profiles::create_profile),
        )
        .route("/profiles/active", get(routes::profiles::active_profile))
        .route(
            "/profiles/{id}",
            get(routes::profiles::get_profile)
                .put(routes::profiles::update_profile)
                .delete(routes::profiles::delete_profile),
        )
        .route(
            "/profiles/{id}/select",
            post(routes::profiles::select_profile),
        )
        // Catalog
        .route("/titles", get(routes::titles::list_titles))
        .route("/titles/{id}", get(routes::titles::get_title))
        .route("/titles/{id}/episodes", get(routes::titles::list_episodes))
        .route("/titles/{id}/state", get(routes::library::title_state))
        .route("/titles/{id}/view", post(routes::progress::record_view))
        .route("/genres", get(routes::titles::list_genres))
        .route("/actors", get(routes::actors::list_actors))
        .route("/actors/{id}", get(routes::actors::get_actor))
        // Favorites and watchlist
        .route("/favorites", get(routes::library::list_favorites))
        .route(
            "/favorites/{title_id}",
            post(routes::library::add_favorite).delete(routes::library::remove_favorite),
        )
        .route("/watchlist", get(routes::library::list_watchlist))
        .route(
            "/watchlist/{title_id}",
            post(routes::library::add_to_watchlist)
                .delete(routes::library::remove_from_watchlist),
        )
        // Playlists
        .route(
            "/playlists",
            get(routes::playlists::list_playlists).post(routes::playlists::create_playlist),
        )
        .route(
            "/playlists/{id}",
            get(routes::playlists::get_playlist)
                .put(routes::playlists::rename_playlist)
                .delete(routes::playlists::delete_playlist),
        )
        .route(
            "/playlists/{id}/entries",
            post(routes::playlists::add_entry),
        )
        .route(
            "/playlists/{id}/entries/{title_id}",
            put(routes::playlists::move_entry).delete(routes::playlists::remove_entry),
        )
        // Progress
        .route(
            "/progress/continue",
            get(routes::progress::continue_watching),
        )
        .route(
            "/progress/{title_id}",
            get(routes::progress::get_progress)
                .put(routes::progress::save_progress)
                .delete(routes::progress::clear_progress),
        )
        // Streaming
        .route("/stream/{title_id}", get(routes::stream::stream_title));

    // Admin routes merge in before the auth layer so `require_admin` always
    // sees a `CurrentUser`.
    let protected_routes = user_routes
        .merge(admin_routes)
        .route_layer(middleware::from_fn_with_state(ctx.clone(), auth_middleware));

    let api = public_routes.merge(protected_routes);

    let mut app = Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", api)
        .merge(SwaggerUi::new("/api-docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx);

    // Static file serving for a UI build.
    if let Some(dir) = static_dir {
        if dir.exists() {
            tracing::info!("Serving static files from {:?}", dir);
            let index_path = dir.join("index.html");
            app = app.fallback_service(
                tower_http::services::ServeDir::new(&dir)
                    .append_index_html_on_directories(true)
                    .not_found_service(tower_http::services::ServeFile::new(index_path)),
            );
        }
    }

    app
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_core_paths() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        for expected in [
            "/api/auth/login",
            "/api/titles/{id}",
            "/api/stream/{title_id}",
            "/api/admin/stats",
        ] {
            assert!(
                paths.iter().any(|p| p.as_str() == expected),
                "missing {expected}"
            );
        }
    }
}
