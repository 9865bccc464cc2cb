//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! JSON API routes live under `/api`, the OAuth entry points under
//! `/auth/google`, and everything else falls through to the static frontend
//! in `WEB_DIR`. The route guard wraps the whole router so page requests
//! are protected even though the pages themselves are static files.

pub mod auth;
pub mod files;
pub mod guard;
pub mod me;
pub mod users;
pub mod wallpapers;

use std::collections::HashMap;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Multipart};
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, post};
use serde::Deserialize;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::baas::FileUpload;
use crate::error::ApiError;
use crate::services::upload::MAX_UPLOAD_BYTES;
use crate::state::AppState;

/// Largest accepted request body: one maximum upload plus multipart framing.
pub const MAX_BODY_BYTES: usize = MAX_UPLOAD_BYTES + 1024 * 1024;

/// Full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let web = ServeDir::new(&state.config.web_dir).append_index_html_on_directories(true);

    Router::new()
        .route("/auth/google", get(auth::google_redirect))
        .route("/auth/google/callback", get(auth::google_callback))
        .route("/logout", get(auth::page_logout))
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/wallpapers", get(wallpapers::list).post(wallpapers::create))
        .route("/api/wallpapers/trending", get(wallpapers::trending))
        .route(
            "/api/wallpapers/{id}",
            get(wallpapers::get_one)
                .patch(wallpapers::update)
                .delete(wallpapers::delete),
        )
        .route("/api/wallpapers/{id}/stats", get(wallpapers::stats))
        .route("/api/wallpapers/{id}/like", post(wallpapers::like))
        .route("/api/wallpapers/{id}/favorite", post(wallpapers::favorite))
        .route("/api/files", get(files::list).post(files::upload))
        .route("/api/files/{id}", axum::routing::delete(files::delete))
        .route("/api/files/{id}/download", get(files::download))
        .route("/api/downloads/batch", post(files::download_batch))
        .route("/api/me/downloads", get(me::downloads))
        .route("/api/me/profile", get(me::profile))
        .route("/api/me/preferences", axum::routing::patch(me::update_preferences))
        .route("/api/me/avatar", post(me::upload_avatar))
        .route("/api/me/likes", get(me::likes))
        .route("/api/me/favorites", get(me::favorites))
        .route("/api/users/{id}/stats", get(users::stats))
        .route("/api/users/{id}/profile", get(users::profile))
        .route("/api/users/{id}/wallpapers", get(users::wallpapers))
        .route("/api/users/{id}/follow", post(users::follow))
        .route("/api/users/{id}/followers", get(users::followers))
        .route("/api/users/{id}/following", get(users::following))
        .route("/healthz", get(healthz))
        .fallback_service(web)
        .layer(middleware::from_fn_with_state(state.clone(), guard::guard))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

// =============================================================================
// SHARED EXTRACTION
// =============================================================================

/// `?page=&limit=` for list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// A parsed multipart form: the `file` part plus text fields.
#[derive(Debug, Default)]
pub(crate) struct UploadForm {
    pub file: Option<FileUpload>,
    pub fields: HashMap<String, String>,
    /// `tags` may be repeated or comma-separated.
    pub tags: Vec<String>,
}

impl UploadForm {
    pub fn take(&mut self, name: &str) -> String {
        self.fields.remove(name).unwrap_or_default()
    }
}

fn multipart_error(e: &axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::new(e.status(), "E_BAD_MULTIPART", e.body_text())
}

pub(crate) async fn read_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(|e| multipart_error(&e))? {
        let name = field.name().unwrap_or_default().to_owned();
        if name == "file" {
            let file_name = field.file_name().unwrap_or("upload").to_owned();
            let content_type = field.content_type().unwrap_or_default().to_owned();
            let bytes = field.bytes().await.map_err(|e| multipart_error(&e))?;
            form.file = Some(FileUpload { name: file_name, content_type, bytes: bytes.to_vec() });
            continue;
        }

        let value = field.text().await.map_err(|e| multipart_error(&e))?;
        if name == "tags" {
            form.tags.extend(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_owned),
            );
        } else {
            form.fields.insert(name, value);
        }
    }
    Ok(form)
}


#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
