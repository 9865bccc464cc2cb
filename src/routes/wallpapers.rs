//! Wallpaper routes: browse, publish, edit, and like/favorite toggles.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use super::auth::AuthUser;
use super::read_form;
use crate::baas::{Document, DocumentList};
use crate::error::ApiError;
use crate::services::interaction::{self, FavoriteState, LikeState};
use crate::services::upload::UploadError;
use crate::services::wallpaper::{self, ListParams, Wallpaper, WallpaperMetadata, WallpaperStats, WallpaperUpdate};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct TrendingQuery {
    pub limit: Option<u64>,
}

/// `GET /api/wallpapers`: newest first, with optional search and category.
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<DocumentList<Wallpaper>>, ApiError> {
    Ok(Json(wallpaper::list(&state, &params).await?))
}

/// `GET /api/wallpapers/trending`: most liked.
pub async fn trending(
    State(state): State<AppState>,
    Query(query): Query<TrendingQuery>,
) -> Result<Json<Vec<Document<Wallpaper>>>, ApiError> {
    Ok(Json(wallpaper::trending(&state, query.limit).await?))
}

/// `POST /api/wallpapers`: multipart `file` plus `title`, `description`,
/// `category`, and `tags`.
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut form = read_form(multipart).await?;
    let file = form.file.take().ok_or(UploadError::Empty)?;
    let meta = WallpaperMetadata {
        title: form.take("title"),
        description: form.take("description"),
        category: form.take("category"),
        tags: std::mem::take(&mut form.tags),
    };

    let doc = wallpaper::publish(&state, &auth.user.id, file, &meta).await?;
    Ok((StatusCode::CREATED, Json(doc)).into_response())
}

/// `GET /api/wallpapers/:id`
pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Document<Wallpaper>>, ApiError> {
    Ok(Json(wallpaper::get(&state, &id).await?))
}

/// `PATCH /api/wallpapers/:id`: owner only.
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<WallpaperUpdate>,
) -> Result<Json<Document<Wallpaper>>, ApiError> {
    Ok(Json(wallpaper::update(&state, &auth.user.id, &id, &body).await?))
}

/// `DELETE /api/wallpapers/:id`: owner only.
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    wallpaper::delete(&state, &auth.user.id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/wallpapers/:id/stats`
pub async fn stats(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<WallpaperStats>, ApiError> {
    Ok(Json(wallpaper::stats(&state, &id).await?))
}

/// `POST /api/wallpapers/:id/like`: toggle.
pub async fn like(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<LikeState>, ApiError> {
    Ok(Json(interaction::toggle_like(&state, &auth.user.id, &id).await?))
}

/// `POST /api/wallpapers/:id/favorite`: toggle.
pub async fn favorite(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<FavoriteState>, ApiError> {
    Ok(Json(interaction::toggle_favorite(&state, &auth.user.id, &id).await?))
}

#[cfg(test)]
#[path = "wallpapers_test.rs"]
mod tests;
