//! Domain services used by HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business rules and all backend traffic so route
//! handlers can stay focused on protocol translation and auth plumbing.
//! Every service takes `&AppState` (or the backend directly) and returns a
//! typed error enum implementing [`ErrorCode`](crate::error::ErrorCode).

pub mod auth;
pub mod download;
pub mod interaction;
pub mod upload;
pub mod user;
pub mod wallpaper;

/// Current time as an RFC 3339 timestamp, the format document bodies store.
pub(crate) fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}
