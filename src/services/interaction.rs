//! Likes and favorites.
//!
//! DESIGN
//! ======
//! A like (or favorite) is a `{userId, wallpaperId}` document; at most one
//! exists per pair. The wallpaper document also carries a denormalized
//! counter (`likes` / `favorites`) that moves by exactly one per effective
//! change and never drops below zero.
//!
//! TRADE-OFFS
//! ==========
//! The backend has no transactions, so the counter is read-modify-write.
//! Toggles for the same (user, wallpaper) pair are serialized with a keyed
//! lock; concurrent toggles by different users on one wallpaper can still
//! race on the counter. The collection count stays authoritative and is
//! what `wallpaper::stats` reports. A counter update failure is logged and
//! does not fail the toggle, since the interaction record already changed.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::baas::{BaasError, Collection, Document, DocumentList, Page, Query};
use crate::error::ErrorCode;
use crate::services::now_rfc3339;
use crate::services::wallpaper::{self, Wallpaper, WallpaperError};
use crate::state::AppState;

pub const DEFAULT_LIST_LIMIT: u64 = 12;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum InteractionError {
    #[error("wallpaper not found: {0}")]
    WallpaperNotFound(String),
    #[error(transparent)]
    Backend(#[from] BaasError),
}

impl ErrorCode for InteractionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::WallpaperNotFound(_) => "E_WALLPAPER_NOT_FOUND",
            Self::Backend(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Backend(e) => e.retryable(),
            Self::WallpaperNotFound(_) => false,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::WallpaperNotFound(_) => StatusCode::NOT_FOUND,
            Self::Backend(e) => e.status(),
        }
    }
}

impl From<WallpaperError> for InteractionError {
    fn from(err: WallpaperError) -> Self {
        match err {
            WallpaperError::Backend(e) => Self::Backend(e),
            other => Self::WallpaperNotFound(other.to_string()),
        }
    }
}

/// Body of a like or favorite document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    pub user_id: String,
    pub wallpaper_id: String,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LikeState {
    pub liked: bool,
    pub likes: u64,
}

impl LikeState {
    /// Local optimistic toggle: flip `liked`, move `likes` by one.
    #[must_use]
    pub fn toggled(self) -> Self {
        let liked = !self.liked;
        Self { liked, likes: step(self.likes, liked) }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FavoriteState {
    pub favorited: bool,
    pub favorites: u64,
}

impl FavoriteState {
    #[must_use]
    pub fn toggled(self) -> Self {
        let favorited = !self.favorited;
        Self { favorited, favorites: step(self.favorites, favorited) }
    }
}

/// One step up or down, floored at zero.
#[must_use]
pub fn step(count: u64, up: bool) -> u64 {
    if up { count.saturating_add(1) } else { count.saturating_sub(1) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Like,
    Favorite,
}

impl Kind {
    fn collection(self, state: &AppState) -> &str {
        let collections = &state.config.backend.collections;
        match self {
            Self::Like => &collections.likes,
            Self::Favorite => &collections.favorites,
        }
    }

    fn counter(self) -> &'static str {
        match self {
            Self::Like => "likes",
            Self::Favorite => "favorites",
        }
    }

    fn count_of(self, wallpaper: &Wallpaper) -> u64 {
        match self {
            Self::Like => wallpaper.likes,
            Self::Favorite => wallpaper.favorites,
        }
    }
}

// =============================================================================
// CORE
// =============================================================================

fn records(state: &AppState, kind: Kind) -> Collection<'_, Interaction> {
    Collection::new(state.backend.as_ref(), kind.collection(state))
}

async fn find(
    state: &AppState,
    kind: Kind,
    user_id: &str,
    wallpaper_id: &str,
) -> Result<Option<Document<Interaction>>, BaasError> {
    records(state, kind)
        .first(vec![Query::equal("userId", user_id), Query::equal("wallpaperId", wallpaper_id)])
        .await
}

/// Move the wallpaper's counter one step and return the new value.
/// Failures are logged; the returned value is then the local estimate.
async fn adjust_counter(state: &AppState, kind: Kind, wallpaper_id: &str, current: u64, up: bool) -> u64 {
    let fresh = match wallpaper::get(state, wallpaper_id).await {
        Ok(doc) => kind.count_of(&doc.data),
        Err(e) => {
            tracing::warn!(%wallpaper_id, counter = kind.counter(), error = %e, "counter read failed");
            current
        }
    };
    let next = step(fresh, up);

    let mut patch = Map::new();
    patch.insert(kind.counter().to_owned(), Value::from(next));
    if let Err(e) = state
        .backend
        .update_document(&state.config.backend.collections.wallpapers, wallpaper_id, patch)
        .await
    {
        tracing::warn!(%wallpaper_id, counter = kind.counter(), error = %e, "counter update failed");
    }
    next
}

/// Ensure the record exists (`on = true`) or not (`on = false`).
/// Returns `(active, count)` after the change.
async fn set(
    state: &AppState,
    kind: Kind,
    user_id: &str,
    wallpaper_id: &str,
    on: Option<bool>,
) -> Result<(bool, u64), InteractionError> {
    let _guard = state
        .locks
        .lock(&format!("{}:{user_id}:{wallpaper_id}", kind.counter()))
        .await;

    let current = kind.count_of(&wallpaper::get(state, wallpaper_id).await?.data);
    let existing = find(state, kind, user_id, wallpaper_id).await?;
    let target = on.unwrap_or(existing.is_none());

    match (existing, target) {
        (Some(_), true) | (None, false) => Ok((target, current)),
        (None, true) => {
            let body = Interaction {
                user_id: user_id.to_owned(),
                wallpaper_id: wallpaper_id.to_owned(),
                created_at: now_rfc3339(),
            };
            records(state, kind).create(&body).await?;
            let count = adjust_counter(state, kind, wallpaper_id, current, true).await;
            tracing::debug!(%user_id, %wallpaper_id, kind = kind.counter(), count, "interaction added");
            Ok((true, count))
        }
        (Some(doc), false) => {
            match records(state, kind).delete(&doc.id).await {
                Ok(()) => {}
                // Already gone: nothing to decrement.
                Err(e) if e.is_not_found() => return Ok((false, current)),
                Err(e) => return Err(e.into()),
            }
            let count = adjust_counter(state, kind, wallpaper_id, current, false).await;
            tracing::debug!(%user_id, %wallpaper_id, kind = kind.counter(), count, "interaction removed");
            Ok((false, count))
        }
    }
}

async fn list_for_user(
    state: &AppState,
    kind: Kind,
    user_id: &str,
    page: Page,
) -> Result<DocumentList<Interaction>, InteractionError> {
    let mut queries = vec![Query::equal("userId", user_id), Query::order_desc("$createdAt")];
    queries.extend(page.queries());
    Ok(records(state, kind).list(&queries).await?)
}

// =============================================================================
// LIKES
// =============================================================================

pub async fn like(state: &AppState, user_id: &str, wallpaper_id: &str) -> Result<LikeState, InteractionError> {
    let (liked, likes) = set(state, Kind::Like, user_id, wallpaper_id, Some(true)).await?;
    Ok(LikeState { liked, likes })
}

pub async fn unlike(state: &AppState, user_id: &str, wallpaper_id: &str) -> Result<LikeState, InteractionError> {
    let (liked, likes) = set(state, Kind::Like, user_id, wallpaper_id, Some(false)).await?;
    Ok(LikeState { liked, likes })
}

pub async fn toggle_like(state: &AppState, user_id: &str, wallpaper_id: &str) -> Result<LikeState, InteractionError> {
    let (liked, likes) = set(state, Kind::Like, user_id, wallpaper_id, None).await?;
    Ok(LikeState { liked, likes })
}

pub async fn is_liked(state: &AppState, user_id: &str, wallpaper_id: &str) -> Result<bool, InteractionError> {
    Ok(find(state, Kind::Like, user_id, wallpaper_id)
        .await?
        .is_some())
}

pub async fn user_likes(
    state: &AppState,
    user_id: &str,
    page: Page,
) -> Result<DocumentList<Interaction>, InteractionError> {
    list_for_user(state, Kind::Like, user_id, page).await
}

// =============================================================================
// FAVORITES
// =============================================================================

pub async fn favorite(state: &AppState, user_id: &str, wallpaper_id: &str) -> Result<FavoriteState, InteractionError> {
    let (favorited, favorites) = set(state, Kind::Favorite, user_id, wallpaper_id, Some(true)).await?;
    Ok(FavoriteState { favorited, favorites })
}

pub async fn unfavorite(
    state: &AppState,
    user_id: &str,
    wallpaper_id: &str,
) -> Result<FavoriteState, InteractionError> {
    let (favorited, favorites) = set(state, Kind::Favorite, user_id, wallpaper_id, Some(false)).await?;
    Ok(FavoriteState { favorited, favorites })
}

pub async fn toggle_favorite(
    state: &AppState,
    user_id: &str,
    wallpaper_id: &str,
) -> Result<FavoriteState, InteractionError> {
    let (favorited, favorites) = set(state, Kind::Favorite, user_id, wallpaper_id, None).await?;
    Ok(FavoriteState { favorited, favorites })
}

pub async fn is_favorited(state: &AppState, user_id: &str, wallpaper_id: &str) -> Result<bool, InteractionError> {
    Ok(find(state, Kind::Favorite, user_id, wallpaper_id)
        .await?
        .is_some())
}

pub async fn user_favorites(
    state: &AppState,
    user_id: &str,
    page: Page,
) -> Result<DocumentList<Interaction>, InteractionError> {
    list_for_user(state, Kind::Favorite, user_id, page).await
}

#[cfg(test)]
#[path = "interaction_test.rs"]
mod tests;
