//! Storage gallery and download routes.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use super::auth::{AuthUser, OptionalAuthUser};
use super::{PageQuery, read_form};
use crate::baas::Page;
use crate::error::ApiError;
use crate::services::download::{self as download_svc, BatchSummary, DownloadRequest};
use crate::services::upload::UploadError;
use crate::services::wallpaper::{self, DEFAULT_LIST_LIMIT, GalleryItem};
use crate::state::AppState;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// `GET /api/files`: newest stored files with preview URLs.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<GalleryItem>>, ApiError> {
    let page = Page::new(query.page, query.limit, DEFAULT_LIST_LIMIT);
    Ok(Json(wallpaper::list_files(&state, page).await?))
}

/// `POST /api/files`: store a raw image without a wallpaper document.
pub async fn upload(
    State(state): State<AppState>,
    auth: AuthUser,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = read_form(multipart).await?;
    let file = form.file.ok_or(UploadError::Empty)?;
    let item = wallpaper::upload_file(&state, &auth.user.id, file).await?;
    tracing::info!(user_id = %auth.user.id, file_id = %item.id, "gallery upload");
    Ok((StatusCode::CREATED, Json(item)).into_response())
}

/// `DELETE /api/files/:id`: uploader only, and only while no wallpaper uses it.
pub async fn delete(State(state): State<AppState>, auth: AuthUser, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    wallpaper::delete_file(&state, &auth.user.id, &id).await?;
    tracing::info!(user_id = %auth.user.id, file_id = %id, "gallery file deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct DownloadQuery {
    pub title: Option<String>,
}

/// `Content-Disposition` value with a quoted fallback and an RFC 5987
/// UTF-8 name.
#[must_use]
pub fn attachment_header(file_name: &str) -> String {
    format!(
        "attachment; filename=\"{file_name}\"; filename*=UTF-8''{}",
        urlencoding::encode(file_name)
    )
}

/// `GET /api/files/:id/download?title=`: file bytes as an attachment.
pub async fn download(
    State(state): State<AppState>,
    auth: OptionalAuthUser,
    Path(id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let file = download_svc::download(&state, auth.user_id(), &id, query.title.as_deref()).await?;
    let content_type = if file.content_type.is_empty() {
        FALLBACK_CONTENT_TYPE.to_owned()
    } else {
        file.content_type
    };
    let headers = [(CONTENT_TYPE, content_type), (CONTENT_DISPOSITION, attachment_header(&file.file_name))];
    Ok((headers, file.bytes).into_response())
}

#[derive(Deserialize)]
pub struct BatchBody {
    pub files: Vec<DownloadRequest>,
}

/// `POST /api/downloads/batch`: fetch and record several files.
pub async fn download_batch(
    State(state): State<AppState>,
    auth: OptionalAuthUser,
    Json(body): Json<BatchBody>,
) -> Result<Json<BatchSummary>, ApiError> {
    Ok(Json(download_svc::download_multiple(&state, auth.user_id(), &body.files).await?))
}

#[cfg(test)]
#[path = "files_test.rs"]
mod tests;
