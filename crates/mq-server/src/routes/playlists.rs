//! Playlist route handlers.
//!
//! Playlists are owned by an account and optionally tagged with one of its
//! profiles. A playlist id belonging to another account resolves to 404.

use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::Json;
use mq_core::{Error, PlaylistId, ProfileId, TitleId};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::auth::CurrentUser;
use crate::routes::parse_id;
use crate::routes::titles::TitleResponse;
use crate::validation;

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PlaylistResponse {
    pub id: String,
    pub name: String,
    pub profile_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl PlaylistResponse {
    fn from_model(p: &mq_db::models::Playlist) -> Self {
        Self {
            id: p.id.to_string(),
            name: p.name.clone(),
            profile_id: p.profile_id.map(|id| id.to_string()),
            created_at: p.created_at.clone(),
            updated_at: p.updated_at.clone(),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PlaylistEntryResponse {
    pub position: i64,
    pub added_at: String,
    pub title: TitleResponse,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PlaylistDetailResponse {
    #[serde(flatten)]
    pub playlist: PlaylistResponse,
    pub entries: Vec<PlaylistEntryResponse>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreatePlaylistRequest {
    pub name: String,
    /// Profile of the calling account to tag the playlist with.
    #[serde(default)]
    pub profile_id: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct RenamePlaylistRequest {
    pub name: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct AddEntryRequest {
    pub title_id: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct MoveEntryRequest {
    /// Zero-based target position; clamped to the playlist bounds.
    pub position: i64,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct MoveEntryResponse {
    pub title_id: String,
    pub position: i64,
}

fn owned_playlist(
    conn: &Connection,
    user: &CurrentUser,
    id: PlaylistId,
) -> Result<mq_db::models::Playlist, Error> {
    mq_db::queries::playlists::get_playlist(conn, user.id, id)?
        .ok_or_else(|| Error::not_found("playlist", id))
}

fn detail(
    conn: &Connection,
    playlist: &mq_db::models::Playlist,
) -> Result<PlaylistDetailResponse, Error> {
    let entries = mq_db::queries::playlists::list_entries(conn, playlist.id)?;
    let titles = mq_db::queries::playlists::list_entry_titles(conn, playlist.id)?;

    // Both lists come back in position order.
    let entries = entries
        .iter()
        .zip(titles.iter())
        .map(|(entry, title)| PlaylistEntryResponse {
            position: entry.position,
            added_at: entry.added_at.clone(),
            title: TitleResponse::from_model(title),
        })
        .collect();

    Ok(PlaylistDetailResponse {
        playlist: PlaylistResponse::from_model(playlist),
        entries,
    })
}

/// GET /api/playlists
#[utoipa::path(
    get,
    path = "/api/playlists",
    responses((status = 200, description = "Playlists, most recently changed first", body = Vec<PlaylistResponse>))
)]
pub async fn list_playlists(
    State(ctx): State<AppContext>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<PlaylistResponse>>, AppError> {
    let conn = mq_db::pool::get_conn(&ctx.db)?;
    let playlists = mq_db::queries::playlists::list_playlists(&conn, user.id)?;
    Ok(Json(playlists.iter().map(PlaylistResponse::from_model).collect()))
}

/// POST /api/playlists
#[utoipa::path(
    post,
    path = "/api/playlists",
    request_body = CreatePlaylistRequest,
    responses(
        (status = 201, description = "Playlist created", body = PlaylistResponse),
        (status = 400, description = "Invalid name"),
        (status = 404, description = "Profile not found")
    )
)]
pub async fn create_playlist(
    State(ctx): State<AppContext>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreatePlaylistRequest>,
) -> Result<(StatusCode, Json<PlaylistResponse>), AppError> {
    let name = req.name.trim();
    validation::playlist_name(name)?;

    let conn = mq_db::pool::get_conn(&ctx.db)?;
    let profile_id = match req.profile_id.as_deref() {
        Some(raw) => {
            let id: ProfileId = parse_id(raw, "profile")?;
            if mq_db::queries::profiles::get_profile(&conn, user.id, id)?.is_none() {
                return Err(Error::not_found("profile", id).into());
            }
            Some(id)
        }
        None => None,
    };

    let playlist = mq_db::queries::playlists::create_playlist(&conn, user.id, profile_id, name)?;
    Ok((StatusCode::CREATED, Json(PlaylistResponse::from_model(&playlist))))
}

/// GET /api/playlists/{id}
#[utoipa::path(
    get,
    path = "/api/playlists/{id}",
    params(("id" = String, Path, description = "Playlist ID")),
    responses(
        (status = 200, description = "Playlist with entries", body = PlaylistDetailResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_playlist(
    State(ctx): State<AppContext>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<PlaylistDetailResponse>, AppError> {
    let id: PlaylistId = parse_id(&id, "playlist")?;
    let conn = mq_db::pool::get_conn(&ctx.db)?;
    let playlist = owned_playlist(&conn, &user, id)?;
    Ok(Json(detail(&conn, &playlist)?))
}

/// PUT /api/playlists/{id}
#[utoipa::path(
    put,
    path = "/api/playlists/{id}",
    params(("id" = String, Path, description = "Playlist ID")),
    request_body = RenamePlaylistRequest,
    responses(
        (status = 200, description = "Playlist renamed", body = PlaylistResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn rename_playlist(
    State(ctx): State<AppContext>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<RenamePlaylistRequest>,
) -> Result<Json<PlaylistResponse>, AppError> {
    let id: PlaylistId = parse_id(&id, "playlist")?;
    let name = req.name.trim();
    validation::playlist_name(name)?;

    let conn = mq_db::pool::get_conn(&ctx.db)?;
    if !mq_db::queries::playlists::rename_playlist(&conn, user.id, id, name)? {
        return Err(Error::not_found("playlist", id).into());
    }
    let playlist = owned_playlist(&conn, &user, id)?;
    Ok(Json(PlaylistResponse::from_model(&playlist)))
}

/// DELETE /api/playlists/{id}
#[utoipa::path(
    delete,
    path = "/api/playlists/{id}",
    params(("id" = String, Path, description = "Playlist ID")),
    responses(
        (status = 204, description = "Playlist deleted"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_playlist(
    State(ctx): State<AppContext>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id: PlaylistId = parse_id(&id, "playlist")?;
    let conn = mq_db::pool::get_conn(&ctx.db)?;
    if !mq_db::queries::playlists::delete_playlist(&conn, user.id, id)? {
        return Err(Error::not_found("playlist", id).into());
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/playlists/{id}/entries
#[utoipa::path(
    post,
    path = "/api/playlists/{id}/entries",
    params(("id" = String, Path, description = "Playlist ID")),
    request_body = AddEntryRequest,
    responses(
        (status = 201, description = "Title appended", body = PlaylistDetailResponse),
        (status = 404, description = "Playlist or title not found"),
        (status = 409, description = "Title already in the playlist")
    )
)]
pub async fn add_entry(
    State(ctx): State<AppContext>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<AddEntryRequest>,
) -> Result<(StatusCode, Json<PlaylistDetailResponse>), AppError> {
    let id: PlaylistId = parse_id(&id, "playlist")?;
    let title_id: TitleId = parse_id(&req.title_id, "title")?;

    let conn = mq_db::pool::get_conn(&ctx.db)?;
    owned_playlist(&conn, &user, id)?;
    mq_db::queries::playlists::add_entry(&conn, id, title_id)?;

    // Re-read so updated_at reflects the append.
    let playlist = owned_playlist(&conn, &user, id)?;
    Ok((StatusCode::CREATED, Json(detail(&conn, &playlist)?)))
}

/// DELETE /api/playlists/{id}/entries/{title_id}
#[utoipa::path(
    delete,
    path = "/api/playlists/{id}/entries/{title_id}",
    params(
        ("id" = String, Path, description = "Playlist ID"),
        ("title_id" = String, Path, description = "Title ID")
    ),
    responses(
        (status = 204, description = "Entry removed; remaining entries renumbered"),
        (status = 404, description = "Playlist or entry not found")
    )
)]
pub async fn remove_entry(
    State(ctx): State<AppContext>,
    Extension(user): Extension<CurrentUser>,
    Path((id, title_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let id: PlaylistId = parse_id(&id, "playlist")?;
    let title_id: TitleId = parse_id(&title_id, "title")?;

    let conn = mq_db::pool::get_conn(&ctx.db)?;
    owned_playlist(&conn, &user, id)?;
    if !mq_db::queries::playlists::remove_entry(&conn, id, title_id)? {
        return Err(Error::not_found("playlist entry", title_id).into());
    }
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/playlists/{id}/entries/{title_id}
#[utoipa::path(
    put,
    path = "/api/playlists/{id}/entries/{title_id}",
    params(
        ("id" = String, Path, description = "Playlist ID"),
        ("title_id" = String, Path, description = "Title ID")
    ),
    request_body = MoveEntryRequest,
    responses(
        (status = 200, description = "Entry moved", body = MoveEntryResponse),
        (status = 404, description = "Playlist or entry not found")
    )
)]
pub async fn move_entry(
    State(ctx): State<AppContext>,
    Extension(user): Extension<CurrentUser>,
    Path((id, title_id)): Path<(String, String)>,
    Json(req): Json<MoveEntryRequest>,
) -> Result<Json<MoveEntryResponse>, AppError> {
    let id: PlaylistId = parse_id(&id, "playlist")?;
    let title_id: TitleId = parse_id(&title_id, "title")?;

    let conn = mq_db::pool::get_conn(&ctx.db)?;
    owned_playlist(&conn, &user, id)?;
    let position = mq_db::queries::playlists::move_entry(&conn, id, title_id, req.position)?;
    Ok(Json(MoveEntryResponse {
        title_id: title_id.to_string(),
        position,
    }))
}
