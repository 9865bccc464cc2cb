//! Public user routes: stats, profile, uploads, follows.

use axum::extract::{Path, Query, State};
use axum::response::Json;

use super::PageQuery;
use super::auth::AuthUser;
use crate::baas::{DocumentList, Page};
use crate::error::ApiError;
use crate::services::user::{self, DEFAULT_FOLLOW_LIMIT, Follow, FollowState, PublicProfile, UserStats};
use crate::services::wallpaper::{self, DEFAULT_LIST_LIMIT, Wallpaper};
use crate::state::AppState;

/// `GET /api/users/:id/stats`
pub async fn stats(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<UserStats>, ApiError> {
    Ok(Json(user::stats(&state, &id).await?))
}

/// `GET /api/users/:id/profile`: stats plus recent uploads.
pub async fn profile(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<PublicProfile>, ApiError> {
    Ok(Json(user::public_profile(&state, &id).await?))
}

/// `GET /api/users/:id/wallpapers`
pub async fn wallpapers(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<DocumentList<Wallpaper>>, ApiError> {
    let page = Page::new(query.page, query.limit, DEFAULT_LIST_LIMIT);
    Ok(Json(wallpaper::by_owner(&state, &id, page).await?))
}

/// `POST /api/users/:id/follow`: toggle following `id`.
pub async fn follow(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<FollowState>, ApiError> {
    Ok(Json(user::toggle_follow(&state, &auth.user.id, &id).await?))
}

/// `GET /api/users/:id/followers`
pub async fn followers(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<DocumentList<Follow>>, ApiError> {
    let page = Page::new(query.page, query.limit, DEFAULT_FOLLOW_LIMIT);
    Ok(Json(user::followers(&state, &id, page).await?))
}

/// `GET /api/users/:id/following`
pub async fn following(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<DocumentList<Follow>>, ApiError> {
    let page = Page::new(query.page, query.limit, DEFAULT_FOLLOW_LIMIT);
    Ok(Json(user::following(&state, &id, page).await?))
}

#[cfg(test)]
#[path = "users_test.rs"]
mod tests;
