//! Upload validation.
//!
//! Runs before any bytes are sent to storage, so an oversized or non-image
//! file never costs a backend round trip.

use axum::http::StatusCode;

use crate::error::ErrorCode;

/// 50 MiB.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("file is empty")]
    Empty,
    #[error("file is too large ({size} bytes, max {max})")]
    TooLarge { size: usize, max: usize },
    #[error("unsupported file type {content_type:?}, expected an image")]
    NotAnImage { content_type: String },
}

impl ErrorCode for UploadError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Empty => "E_UPLOAD_EMPTY",
            Self::TooLarge { .. } => "E_UPLOAD_TOO_LARGE",
            Self::NotAnImage { .. } => "E_UPLOAD_NOT_IMAGE",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotAnImage { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Empty => StatusCode::BAD_REQUEST,
        }
    }
}

/// Check size and MIME type of an incoming file.
///
/// # Errors
///
/// Returns [`UploadError`] when the file is empty, above
/// [`MAX_UPLOAD_BYTES`], or not declared as `image/*`.
pub fn validate_upload(content_type: &str, size: usize) -> Result<(), UploadError> {
    if size == 0 {
        return Err(UploadError::Empty);
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge { size, max: MAX_UPLOAD_BYTES });
    }
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if !essence.starts_with("image/") || essence.len() == "image/".len() {
        return Err(UploadError::NotAnImage { content_type: content_type.to_owned() });
    }
    Ok(())
}

#[cfg(test)]
#[path = "upload_test.rs"]
mod tests;
