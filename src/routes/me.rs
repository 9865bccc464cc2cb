//! Routes scoped to the signed-in user.

use axum::extract::{Multipart, Query, State};
use axum::response::Json;
use serde::Serialize;

use super::auth::AuthUser;
use super::{PageQuery, read_form};
use crate::baas::{Document, DocumentList, Page};
use crate::error::ApiError;
use crate::services::download::{self, DownloadRecord};
use crate::services::interaction::{self, DEFAULT_LIST_LIMIT, Interaction};
use crate::services::upload::UploadError;
use crate::services::user::{self, PreferencesUpdate, Profile};
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvatarResponse {
    pub profile_image: String,
}

/// `GET /api/me/downloads`: last downloads, newest first.
pub async fn downloads(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<Document<DownloadRecord>>>, ApiError> {
    Ok(Json(download::history(&state, &auth.user.id).await?))
}

/// `GET /api/me/profile`
pub async fn profile(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Profile>, ApiError> {
    Ok(Json(user::profile(&state, &auth.secret).await?))
}

/// `PATCH /api/me/preferences`
pub async fn update_preferences(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<PreferencesUpdate>,
) -> Result<Json<Profile>, ApiError> {
    Ok(Json(user::update_preferences(&state, &auth.secret, &body).await?))
}

/// `POST /api/me/avatar`: multipart `file`.
pub async fn upload_avatar(
    State(state): State<AppState>,
    auth: AuthUser,
    multipart: Multipart,
) -> Result<Json<AvatarResponse>, ApiError> {
    let form = read_form(multipart).await?;
    let file = form.file.ok_or(UploadError::Empty)?;
    let profile_image = user::upload_profile_image(&state, &auth.user.id, &auth.secret, file).await?;
    Ok(Json(AvatarResponse { profile_image }))
}

/// `GET /api/me/likes`
pub async fn likes(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<DocumentList<Interaction>>, ApiError> {
    let page = Page::new(query.page, query.limit, DEFAULT_LIST_LIMIT);
    Ok(Json(interaction::user_likes(&state, &auth.user.id, page).await?))
}

/// `GET /api/me/favorites`
pub async fn favorites(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<DocumentList<Interaction>>, ApiError> {
    let page = Page::new(query.page, query.limit, DEFAULT_LIST_LIMIT);
    Ok(Json(interaction::user_favorites(&state, &auth.user.id, page).await?))
}
