//! Typed response contracts for the backend-as-a-service REST API.
//!
//! Every response body is decoded into one of these types at the client
//! boundary; a shape mismatch surfaces as [`BaasError::Parse`] instead of
//! leaking an untyped JSON value into the service layer.

use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by backend client operations.
#[derive(Debug, thiserror::Error)]
pub enum BaasError {
    /// The HTTP request could not be sent or the body could not be read.
    #[error("backend request failed: {0}")]
    Request(String),

    /// The backend returned a non-success status.
    #[error("backend error ({status} {kind}): {message}")]
    Api { status: u16, kind: String, message: String },

    /// A response body did not match the expected contract.
    #[error("backend response parse failed: {0}")]
    Parse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl BaasError {
    /// Build an API error from a status code and the raw response body.
    ///
    /// The backend reports errors as `{"message", "code", "type"}`; bodies
    /// that do not follow that shape are kept verbatim as the message.
    #[must_use]
    pub fn from_response(status: u16, body: &str) -> Self {
        #[derive(Deserialize)]
        struct ErrorBody {
            #[serde(default)]
            message: String,
            #[serde(default, rename = "type")]
            kind: String,
        }

        match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => Self::Api { status, kind: parsed.kind, message: parsed.message },
            Err(_) => Self::Api { status, kind: String::new(), message: body.to_owned() },
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api { status: 401, .. })
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Api { status: 409, .. })
    }
}

impl ErrorCode for BaasError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Request(_) => "E_BACKEND_REQUEST",
            Self::Api { status: 400, .. } => "E_BAD_REQUEST",
            Self::Api { status: 401, .. } => "E_UNAUTHORIZED",
            Self::Api { status: 403, .. } => "E_FORBIDDEN",
            Self::Api { status: 404, .. } => "E_NOT_FOUND",
            Self::Api { status: 409, .. } => "E_CONFLICT",
            Self::Api { status: 429, .. } => "E_RATE_LIMITED",
            Self::Api { .. } => "E_BACKEND_RESPONSE",
            Self::Parse(_) => "E_BACKEND_PARSE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Api { status: 429 | 500..=599, .. })
    }

    fn status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::Api { status: status @ (400 | 401 | 403 | 404 | 409 | 429), .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::HttpClientBuild(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

// =============================================================================
// ACCOUNTS
// =============================================================================

/// A user account as returned by `/account`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, rename = "emailVerification")]
    pub email_verification: bool,
    #[serde(default, rename = "$createdAt")]
    pub created_at: String,
    #[serde(default)]
    pub prefs: Preferences,
}

/// A login session. `secret` is only populated when the session is created
/// through a server (API key) call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub expire: String,
    #[serde(default, rename = "providerAccessToken")]
    pub provider_access_token: String,
    #[serde(default)]
    pub current: bool,
}

/// Social profile handles stored in preferences.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SocialLinks {
    #[serde(default)]
    pub twitter: String,
    #[serde(default)]
    pub instagram: String,
    #[serde(default)]
    pub github: String,
}

/// Per-account preference blob. Unknown keys survive a read-modify-write.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social: Option<SocialLinks>,
    #[serde(default, rename = "profileImage", skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// =============================================================================
// DOCUMENTS
// =============================================================================

/// A database document: system attributes plus the flattened body `T`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document<T> {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(default, rename = "$collectionId")]
    pub collection_id: String,
    #[serde(default, rename = "$databaseId")]
    pub database_id: String,
    #[serde(default, rename = "$createdAt")]
    pub created_at: String,
    #[serde(default, rename = "$updatedAt")]
    pub updated_at: String,
    #[serde(flatten)]
    pub data: T,
}

/// Untyped document as carried across the [`Databases`](super::Databases) trait.
pub type RawDocument = Document<serde_json::Map<String, serde_json::Value>>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentList<T> {
    pub total: u64,
    pub documents: Vec<Document<T>>,
}

impl<T> Default for DocumentList<T> {
    fn default() -> Self {
        Self { total: 0, documents: Vec::new() }
    }
}

// =============================================================================
// STORAGE
// =============================================================================

/// Metadata for a file in a storage bucket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredFile {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(default, rename = "bucketId")]
    pub bucket_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "mimeType")]
    pub mime_type: String,
    #[serde(default, rename = "sizeOriginal")]
    pub size_original: u64,
    #[serde(default, rename = "$createdAt")]
    pub created_at: String,
    #[serde(default, rename = "$permissions")]
    pub permissions: Vec<String>,
}

impl StoredFile {
    /// True when `user_id` holds the delete permission on this file.
    #[must_use]
    pub fn owned_by(&self, user_id: &str) -> bool {
        let wanted = delete_permission(user_id);
        self.permissions.iter().any(|p| *p == wanted)
    }
}

fn delete_permission(user_id: &str) -> String {
    format!("delete(\"user:{user_id}\")")
}

/// Permissions recorded on a file stored for `user_id`: public read, and
/// update/delete for the uploader only.
#[must_use]
pub fn owner_permissions(user_id: &str) -> Vec<String> {
    vec![
        "read(\"any\")".to_owned(),
        format!("update(\"user:{user_id}\")"),
        delete_permission(user_id),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileList {
    pub total: u64,
    pub files: Vec<StoredFile>,
}

/// An in-memory file payload headed for storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Crop anchor for image previews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gravity {
    #[default]
    Center,
    Top,
    Bottom,
    Left,
    Right,
}

impl Gravity {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Center => "center",
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

/// Parameters embedded in a preview URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewOptions {
    pub width: u32,
    pub height: u32,
    pub gravity: Gravity,
    pub quality: u8,
    /// Ask for an exact-size crop instead of a fit.
    pub crop: bool,
}

impl PreviewOptions {
    #[must_use]
    pub fn fit(width: u32, height: u32) -> Self {
        Self { width, height, gravity: Gravity::Center, quality: 100, crop: false }
    }

    #[must_use]
    pub fn cropped(width: u32, height: u32) -> Self {
        Self { crop: true, ..Self::fit(width, height) }
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
