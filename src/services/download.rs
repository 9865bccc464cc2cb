//! Download service: file delivery, download records, batch summaries.
//!
//! Downloads are addressed by stored file id, never by arbitrary URL, so
//! the server only ever fetches from its own bucket. Every successful
//! download is recorded in the downloads collection; recording is
//! best-effort and a failure there never fails the download itself.

use axum::http::StatusCode;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use crate::baas::{BaasError, Collection, Document, Query};
use crate::error::ErrorCode;
use crate::services::now_rfc3339;
use crate::state::AppState;

pub const ANONYMOUS_USER: &str = "anonymous";
pub const DEFAULT_FILE_STEM: &str = "wallpaper";
pub const DEFAULT_EXTENSION: &str = "jpg";
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];
pub const HISTORY_LIMIT: u64 = 50;
pub const MAX_BATCH: usize = 50;
/// Batch items fetched at once; each item's bytes are dropped as soon as it
/// finishes.
pub const BATCH_CONCURRENCY: usize = 4;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Backend(#[from] BaasError),
}

impl ErrorCode for DownloadError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_FILE_NOT_FOUND",
            Self::Invalid(_) => "E_INVALID_DOWNLOAD",
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
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Invalid(_) => StatusCode::BAD_REQUEST,
            Self::Backend(e) => e.status(),
        }
    }
}

/// Body of a download record document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRecord {
    pub user_id: String,
    pub file_id: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub download_date: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    pub file_id: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BatchSummary {
    pub success: bool,
    pub successful: usize,
    pub failed: usize,
    pub summary: String,
}

impl BatchSummary {
    #[must_use]
    pub fn new(successful: usize, failed: usize) -> Self {
        let summary = if failed > 0 {
            format!("Successfully downloaded {successful} files, {failed} failed")
        } else {
            format!("Successfully downloaded {successful} files")
        };
        Self { success: failed == 0, successful, failed, summary }
    }
}

// =============================================================================
// NAMING
// =============================================================================

/// Extension of `name` if it is an allowed image type, else `jpg`.
#[must_use]
pub fn file_extension(name: &str) -> &'static str {
    let Some((_, ext)) = name.rsplit_once('.') else {
        return DEFAULT_EXTENSION;
    };
    let ext = ext.to_ascii_lowercase();
    ALLOWED_EXTENSIONS
        .iter()
        .find(|allowed| **allowed == ext)
        .copied()
        .unwrap_or(DEFAULT_EXTENSION)
}

/// `{title}.{ext}`, with `wallpaper` for a missing title. Characters that
/// would break a `Content-Disposition` header or a path are replaced.
#[must_use]
pub fn download_file_name(title: Option<&str>, stored_name: &str) -> String {
    let stem: String = title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_FILE_STEM)
        .chars()
        .map(|c| if c.is_control() || matches!(c, '"' | '\\' | '/') { '_' } else { c })
        .collect();
    format!("{stem}.{}", file_extension(stored_name))
}

// =============================================================================
// OPERATIONS
// =============================================================================

fn records(state: &AppState) -> Collection<'_, DownloadRecord> {
    Collection::new(state.backend.as_ref(), &state.config.backend.collections.downloads)
}

async fn record(state: &AppState, user_id: &str, file_id: &str, file_name: &str) {
    let body = DownloadRecord {
        user_id: user_id.to_owned(),
        file_id: file_id.to_owned(),
        image_url: state.backend.view_url(file_id),
        file_name: file_name.to_owned(),
        download_date: now_rfc3339(),
    };
    if let Err(e) = records(state).create(&body).await {
        tracing::warn!(%user_id, %file_id, error = %e, "download record failed");
    }
}

/// Fetch a stored file for download and record it.
pub async fn download(
    state: &AppState,
    user_id: Option<&str>,
    file_id: &str,
    title: Option<&str>,
) -> Result<DownloadedFile, DownloadError> {
    let not_found = |e: BaasError| if e.is_not_found() { DownloadError::NotFound(file_id.to_owned()) } else { e.into() };

    let meta = state
        .backend
        .get_file(file_id)
        .await
        .map_err(not_found)?;
    let bytes = state
        .backend
        .download_file(file_id)
        .await
        .map_err(not_found)?;

    let file_name = download_file_name(title, &meta.name);
    record(state, user_id.unwrap_or(ANONYMOUS_USER), file_id, &file_name).await;

    Ok(DownloadedFile { file_name, content_type: meta.mime_type, bytes })
}

/// Download every requested file, at most [`BATCH_CONCURRENCY`] at a time,
/// and summarize. One failure never aborts the others.
pub async fn download_multiple(
    state: &AppState,
    user_id: Option<&str>,
    requests: &[DownloadRequest],
) -> Result<BatchSummary, DownloadError> {
    if requests.len() > MAX_BATCH {
        return Err(DownloadError::Invalid(format!("at most {MAX_BATCH} files per batch")));
    }
    let items: Vec<_> = requests
        .iter()
        .map(|r| async move {
            match download(state, user_id, &r.file_id, r.title.as_deref()).await {
                Ok(_) => false,
                Err(e) => {
                    tracing::warn!(file_id = %r.file_id, error = %e, "batch download item failed");
                    true
                }
            }
        })
        .collect();
    let failed = futures::stream::iter(items)
        .buffer_unordered(BATCH_CONCURRENCY)
        .fold(0, |n, failed| futures::future::ready(n + usize::from(failed)))
        .await;

    let summary = BatchSummary::new(requests.len() - failed, failed);
    tracing::info!(successful = summary.successful, failed = summary.failed, "batch download finished");
    Ok(summary)
}

/// The user's most recent downloads, newest first.
pub async fn history(state: &AppState, user_id: &str) -> Result<Vec<Document<DownloadRecord>>, DownloadError> {
    let queries = [
        Query::equal("userId", user_id),
        Query::order_desc("downloadDate"),
        Query::limit(HISTORY_LIMIT),
    ];
    Ok(records(state).list(&queries).await?.documents)
}

#[cfg(test)]
#[path = "download_test.rs"]
mod tests;
