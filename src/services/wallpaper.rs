//! Wallpaper service: document gallery, publishing, and the storage gallery.
//!
//! DESIGN
//! ======
//! A wallpaper is a document in the wallpapers collection pointing at a file
//! in the bucket. Publishing validates the file and the metadata locally,
//! uploads the file, then writes the document with a preview URL. The
//! storage gallery (`/api/files`) lists raw bucket files with no document
//! behind them.
//!
//! Like and favorite counters live on the document and are only moved by
//! the interaction service.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::baas::{
    BaasError, Collection, Document, DocumentList, FileUpload, Page, PreviewOptions, Query, StoredFile,
    owner_permissions, unique_id,
};
use crate::error::ErrorCode;
use crate::services::now_rfc3339;
use crate::services::upload::{UploadError, validate_upload};
use crate::state::AppState;

pub const DEFAULT_LIST_LIMIT: u64 = 12;
pub const DEFAULT_TRENDING_LIMIT: u64 = 10;

pub const TITLE_MAX_CHARS: usize = 128;
pub const DESCRIPTION_MAX_CHARS: usize = 2048;
pub const CATEGORY_MAX_CHARS: usize = 64;
pub const MAX_TAGS: usize = 16;
pub const TAG_MAX_CHARS: usize = 32;

/// Preview size stored as `imageUrl` on published wallpapers.
pub const PUBLISH_PREVIEW_SIZE: u32 = 2000;
/// Dimensions reported for storage gallery entries.
pub const GALLERY_DEFAULT_WIDTH: u32 = 1920;
pub const GALLERY_DEFAULT_HEIGHT: u32 = 1080;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum WallpaperError {
    #[error("{0}")]
    Invalid(String),
    #[error("wallpaper not found: {0}")]
    NotFound(String),
    #[error("only the owner can modify this wallpaper")]
    Forbidden,
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("file is used by wallpaper {0}")]
    FileInUse(String),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Backend(#[from] BaasError),
}

impl ErrorCode for WallpaperError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Invalid(_) => "E_INVALID_WALLPAPER",
            Self::NotFound(_) => "E_WALLPAPER_NOT_FOUND",
            Self::Forbidden => "E_FORBIDDEN",
            Self::FileNotFound(_) => "E_FILE_NOT_FOUND",
            Self::FileInUse(_) => "E_FILE_IN_USE",
            Self::Upload(e) => e.error_code(),
            Self::Backend(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Backend(e) => e.retryable(),
            _ => false,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Invalid(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) | Self::FileNotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::FileInUse(_) => StatusCode::CONFLICT,
            Self::Upload(e) => e.status(),
            Self::Backend(e) => e.status(),
        }
    }
}

/// Body of a wallpaper document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Wallpaper {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub file_id: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub owner: String,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub favorites: u64,
    #[serde(default)]
    pub created_at: String,
}

/// User-supplied wallpaper metadata.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct WallpaperMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct WallpaperUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub search: Option<String>,
    pub category: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct WallpaperStats {
    pub likes: u64,
    pub favorites: u64,
}

/// One entry of the storage gallery.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GalleryItem {
    pub id: String,
    pub name: String,
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub created_at: String,
}

// =============================================================================
// VALIDATION
// =============================================================================

fn check_len(field: &str, value: &str, max: usize) -> Result<(), WallpaperError> {
    if value.chars().count() > max {
        return Err(WallpaperError::Invalid(format!("{field} must be at most {max} characters")));
    }
    Ok(())
}

fn validate_title(title: &str) -> Result<String, WallpaperError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(WallpaperError::Invalid("title is required".into()));
    }
    check_len("title", title, TITLE_MAX_CHARS)?;
    Ok(title.to_owned())
}

/// Trim tags, drop empties and duplicates (first occurrence wins).
fn validate_tags(tags: &[String]) -> Result<Vec<String>, WallpaperError> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        check_len("tag", tag, TAG_MAX_CHARS)?;
        if !out.iter().any(|t| t == tag) {
            out.push(tag.to_owned());
        }
    }
    if out.len() > MAX_TAGS {
        return Err(WallpaperError::Invalid(format!("at most {MAX_TAGS} tags are allowed")));
    }
    Ok(out)
}

/// Normalize and check metadata before any backend call.
///
/// # Errors
///
/// Returns [`WallpaperError::Invalid`] naming the first offending field.
pub fn validate_metadata(meta: &WallpaperMetadata) -> Result<WallpaperMetadata, WallpaperError> {
    let description = meta.description.trim();
    check_len("description", description, DESCRIPTION_MAX_CHARS)?;
    let category = meta.category.trim();
    check_len("category", category, CATEGORY_MAX_CHARS)?;
    Ok(WallpaperMetadata {
        title: validate_title(&meta.title)?,
        description: description.to_owned(),
        category: category.to_owned(),
        tags: validate_tags(&meta.tags)?,
    })
}

/// Build the document patch for an update, validating present fields.
///
/// # Errors
///
/// Returns [`WallpaperError::Invalid`] for a bad field or an empty update.
pub fn update_patch(update: &WallpaperUpdate) -> Result<Map<String, Value>, WallpaperError> {
    let mut patch = Map::new();
    if let Some(title) = &update.title {
        patch.insert("title".into(), Value::String(validate_title(title)?));
    }
    if let Some(description) = &update.description {
        let description = description.trim();
        check_len("description", description, DESCRIPTION_MAX_CHARS)?;
        patch.insert("description".into(), Value::String(description.to_owned()));
    }
    if let Some(category) = &update.category {
        let category = category.trim();
        check_len("category", category, CATEGORY_MAX_CHARS)?;
        patch.insert("category".into(), Value::String(category.to_owned()));
    }
    if let Some(tags) = &update.tags {
        let tags = validate_tags(tags)?;
        patch.insert("tags".into(), Value::Array(tags.into_iter().map(Value::String).collect()));
    }
    if patch.is_empty() {
        return Err(WallpaperError::Invalid("nothing to update".into()));
    }
    Ok(patch)
}

// =============================================================================
// DOCUMENT GALLERY
// =============================================================================

fn wallpapers(state: &AppState) -> Collection<'_, Wallpaper> {
    Collection::new(state.backend.as_ref(), &state.config.backend.collections.wallpapers)
}

/// Create a wallpaper document for an already stored file.
pub async fn create(
    state: &AppState,
    owner: &str,
    file_id: &str,
    image_url: &str,
    meta: &WallpaperMetadata,
) -> Result<Document<Wallpaper>, WallpaperError> {
    let meta = validate_metadata(meta)?;
    let body = Wallpaper {
        title: meta.title,
        description: meta.description,
        image_url: image_url.to_owned(),
        file_id: file_id.to_owned(),
        category: meta.category,
        tags: meta.tags,
        owner: owner.to_owned(),
        likes: 0,
        favorites: 0,
        created_at: now_rfc3339(),
    };
    Ok(wallpapers(state).create(&body).await?)
}

/// Validate, upload the file, and create the wallpaper document.
///
/// If the document cannot be written the uploaded file is removed again.
pub async fn publish(
    state: &AppState,
    owner: &str,
    file: FileUpload,
    meta: &WallpaperMetadata,
) -> Result<Document<Wallpaper>, WallpaperError> {
    validate_upload(&file.content_type, file.bytes.len())?;
    let meta = validate_metadata(meta)?;

    let stored = state
        .backend
        .create_file(&unique_id(), file, &owner_permissions(owner))
        .await?;
    let image_url = state.backend.preview_url(
        &stored.id,
        PreviewOptions::fit(PUBLISH_PREVIEW_SIZE, PUBLISH_PREVIEW_SIZE),
    );

    match create(state, owner, &stored.id, &image_url, &meta).await {
        Ok(doc) => {
            tracing::info!(wallpaper_id = %doc.id, file_id = %stored.id, %owner, "wallpaper published");
            Ok(doc)
        }
        Err(e) => {
            if let Err(cleanup) = state.backend.delete_file(&stored.id).await {
                tracing::warn!(file_id = %stored.id, error = %cleanup, "orphaned upload cleanup failed");
            }
            Err(e)
        }
    }
}

/// Newest first, optionally filtered by title search and category.
pub async fn list(state: &AppState, params: &ListParams) -> Result<DocumentList<Wallpaper>, WallpaperError> {
    let page = Page::new(params.page, params.limit, DEFAULT_LIST_LIMIT);
    let mut queries = vec![Query::order_desc("createdAt")];
    if let Some(search) = params.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        queries.push(Query::search("title", search));
    }
    if let Some(category) = params.category.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        queries.push(Query::equal("category", category));
    }
    queries.extend(page.queries());
    Ok(wallpapers(state).list(&queries).await?)
}

/// Most liked first.
pub async fn trending(state: &AppState, limit: Option<u64>) -> Result<Vec<Document<Wallpaper>>, WallpaperError> {
    let page = Page::new(None, limit, DEFAULT_TRENDING_LIMIT);
    let queries = [Query::order_desc("likes"), Query::limit(page.limit)];
    Ok(wallpapers(state).list(&queries).await?.documents)
}

pub async fn get(state: &AppState, wallpaper_id: &str) -> Result<Document<Wallpaper>, WallpaperError> {
    wallpapers(state)
        .find(wallpaper_id)
        .await?
        .ok_or_else(|| WallpaperError::NotFound(wallpaper_id.to_owned()))
}

pub async fn by_owner(state: &AppState, owner: &str, page: Page) -> Result<DocumentList<Wallpaper>, WallpaperError> {
    let mut queries = vec![Query::equal("owner", owner), Query::order_desc("createdAt")];
    queries.extend(page.queries());
    Ok(wallpapers(state).list(&queries).await?)
}

async fn owned(state: &AppState, user_id: &str, wallpaper_id: &str) -> Result<Document<Wallpaper>, WallpaperError> {
    let doc = get(state, wallpaper_id).await?;
    if doc.data.owner != user_id {
        return Err(WallpaperError::Forbidden);
    }
    Ok(doc)
}

/// Update metadata. Only the owner may update.
pub async fn update(
    state: &AppState,
    user_id: &str,
    wallpaper_id: &str,
    update: &WallpaperUpdate,
) -> Result<Document<Wallpaper>, WallpaperError> {
    let patch = update_patch(update)?;
    owned(state, user_id, wallpaper_id).await?;
    Ok(wallpapers(state).update(wallpaper_id, patch).await?)
}

/// Delete the document, then the stored file (best-effort).
pub async fn delete(state: &AppState, user_id: &str, wallpaper_id: &str) -> Result<(), WallpaperError> {
    let doc = owned(state, user_id, wallpaper_id).await?;
    wallpapers(state).delete(wallpaper_id).await?;

    if !doc.data.file_id.is_empty() {
        match state.backend.delete_file(&doc.data.file_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                tracing::warn!(%wallpaper_id, file_id = %doc.data.file_id, error = %e, "stored file cleanup failed");
            }
        }
    }
    tracing::info!(%wallpaper_id, %user_id, "wallpaper deleted");
    Ok(())
}

/// Like and favorite counts from the interaction collections.
pub async fn stats(state: &AppState, wallpaper_id: &str) -> Result<WallpaperStats, WallpaperError> {
    let collections = &state.config.backend.collections;
    let likes = Collection::<Value>::new(state.backend.as_ref(), &collections.likes);
    let favorites = Collection::<Value>::new(state.backend.as_ref(), &collections.favorites);
    let (likes, favorites) = futures::join!(
        likes.count(vec![Query::equal("wallpaperId", wallpaper_id)]),
        favorites.count(vec![Query::equal("wallpaperId", wallpaper_id)]),
    );
    Ok(WallpaperStats { likes: likes?, favorites: favorites? })
}

// =============================================================================
// STORAGE GALLERY
// =============================================================================

#[must_use]
pub fn preview_url(state: &AppState, file_id: &str, width: u32, height: u32) -> String {
    state
        .backend
        .preview_url(file_id, PreviewOptions::fit(width, height))
}

fn gallery_item(state: &AppState, file: StoredFile) -> GalleryItem {
    GalleryItem {
        url: preview_url(state, &file.id, PUBLISH_PREVIEW_SIZE, PUBLISH_PREVIEW_SIZE),
        id: file.id,
        name: file.name,
        width: GALLERY_DEFAULT_WIDTH,
        height: GALLERY_DEFAULT_HEIGHT,
        created_at: file.created_at,
    }
}

/// Store a raw image file without a wallpaper document. The uploader is
/// recorded in the file permissions.
pub async fn upload_file(state: &AppState, user_id: &str, file: FileUpload) -> Result<GalleryItem, WallpaperError> {
    validate_upload(&file.content_type, file.bytes.len())?;
    let stored = state
        .backend
        .create_file(&unique_id(), file, &owner_permissions(user_id))
        .await?;
    tracing::info!(file_id = %stored.id, %user_id, "file uploaded");
    Ok(gallery_item(state, stored))
}

/// Bucket files, newest first.
pub async fn list_files(state: &AppState, page: Page) -> Result<Vec<GalleryItem>, WallpaperError> {
    let mut queries = vec![Query::order_desc("$createdAt")];
    queries.extend(page.queries());
    let files = state.backend.list_files(&queries).await?;
    Ok(files
        .files
        .into_iter()
        .map(|f| gallery_item(state, f))
        .collect())
}

/// Delete a stored file uploaded by `user_id`.
///
/// Files behind a wallpaper document are only removed through [`delete`].
pub async fn delete_file(state: &AppState, user_id: &str, file_id: &str) -> Result<(), WallpaperError> {
    let not_found = |e: BaasError| {
        if e.is_not_found() { WallpaperError::FileNotFound(file_id.to_owned()) } else { e.into() }
    };

    let file = state.backend.get_file(file_id).await.map_err(not_found)?;
    if !file.owned_by(user_id) {
        return Err(WallpaperError::Forbidden);
    }
    let referencing = wallpapers(state)
        .list(&[Query::equal("fileId", file_id), Query::limit(1)])
        .await?;
    if let Some(doc) = referencing.documents.first() {
        return Err(WallpaperError::FileInUse(doc.id.clone()));
    }

    state.backend.delete_file(file_id).await.map_err(not_found)
}

#[cfg(test)]
#[path = "wallpaper_test.rs"]
mod tests;
