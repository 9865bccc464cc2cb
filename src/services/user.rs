//! User service: profile preferences, avatar, follows, and stats.
//!
//! Profile data lives in the account's preference blob and is read and
//! written with the user's own session. Follows are documents in the
//! follows collection keyed by `followerId` / `followingId`.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::baas::types::SocialLinks;
use crate::baas::{
    BaasError, Collection, Document, DocumentList, FileUpload, Page, Preferences, PreviewOptions, Query, owner_permissions,
    unique_id,
};
use crate::error::ErrorCode;
use crate::services::now_rfc3339;
use crate::services::upload::{UploadError, validate_upload};
use crate::services::wallpaper::{self, Wallpaper, WallpaperError};
use crate::state::AppState;

pub const DEFAULT_NAME: &str = "Anonymous User";
pub const DEFAULT_PROFILE_IMAGE: &str = "/avatar.png";
pub const AVATAR_SIZE: u32 = 400;
pub const DEFAULT_FOLLOW_LIMIT: u64 = 20;
pub const RECENT_UPLOADS: u64 = 12;

pub const BIO_MAX_CHARS: usize = 512;
pub const LOCATION_MAX_CHARS: usize = 128;
pub const WEBSITE_MAX_CHARS: usize = 256;
pub const SOCIAL_MAX_CHARS: usize = 128;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("{0}")]
    Invalid(String),
    #[error("you cannot follow yourself")]
    SelfFollow,
    #[error("not signed in")]
    Unauthenticated,
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Backend(BaasError),
}

impl From<BaasError> for UserError {
    fn from(err: BaasError) -> Self {
        if err.is_unauthorized() { Self::Unauthenticated } else { Self::Backend(err) }
    }
}

impl From<WallpaperError> for UserError {
    fn from(err: WallpaperError) -> Self {
        match err {
            WallpaperError::Backend(e) => e.into(),
            WallpaperError::Upload(e) => Self::Upload(e),
            other => Self::Invalid(other.to_string()),
        }
    }
}

impl ErrorCode for UserError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Invalid(_) => "E_INVALID_PROFILE",
            Self::SelfFollow => "E_SELF_FOLLOW",
            Self::Unauthenticated => "E_UNAUTHORIZED",
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
            Self::Invalid(_) | Self::SelfFollow => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Upload(e) => e.status(),
            Self::Backend(e) => e.status(),
        }
    }
}

/// Profile as shown to the user, with defaults filled in.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    pub bio: String,
    pub location: String,
    pub website: String,
    pub social: SocialLinks,
    pub profile_image: String,
}

impl From<Preferences> for Profile {
    fn from(prefs: Preferences) -> Self {
        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
        Self {
            name: non_empty(prefs.name).unwrap_or_else(|| DEFAULT_NAME.to_owned()),
            bio: prefs.bio.unwrap_or_default(),
            location: prefs.location.unwrap_or_default(),
            website: prefs.website.unwrap_or_default(),
            social: prefs.social.unwrap_or_default(),
            profile_image: non_empty(prefs.profile_image).unwrap_or_else(|| DEFAULT_PROFILE_IMAGE.to_owned()),
        }
    }
}

/// Editable profile fields; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct PreferencesUpdate {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub social: Option<SocialLinks>,
}

/// Body of a follow document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Follow {
    pub follower_id: String,
    pub following_id: String,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct UserStats {
    pub followers: u64,
    pub following: u64,
    pub uploads: u64,
    pub likes: u64,
    pub favorites: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub stats: UserStats,
    pub recent_uploads: Vec<Document<Wallpaper>>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct FollowState {
    pub following: bool,
    pub followers: u64,
}

// =============================================================================
// PREFERENCES
// =============================================================================

fn bounded(field: &str, value: &str, max: usize) -> Result<String, UserError> {
    let value = value.trim();
    if value.chars().count() > max {
        return Err(UserError::Invalid(format!("{field} must be at most {max} characters")));
    }
    Ok(value.to_owned())
}

/// Validate an update and merge it into existing preferences.
///
/// Unknown preference keys and fields absent from the update survive.
///
/// # Errors
///
/// Returns [`UserError::Invalid`] naming the first offending field.
pub fn merge_preferences(mut prefs: Preferences, update: &PreferencesUpdate) -> Result<Preferences, UserError> {
    if let Some(name) = &update.name {
        let name = bounded("name", name, crate::services::auth::NAME_MAX_CHARS)?;
        if name.is_empty() {
            return Err(UserError::Invalid("name must not be empty".into()));
        }
        prefs.name = Some(name);
    }
    if let Some(bio) = &update.bio {
        prefs.bio = Some(bounded("bio", bio, BIO_MAX_CHARS)?);
    }
    if let Some(location) = &update.location {
        prefs.location = Some(bounded("location", location, LOCATION_MAX_CHARS)?);
    }
    if let Some(website) = &update.website {
        let website = bounded("website", website, WEBSITE_MAX_CHARS)?;
        if !website.is_empty() && !(website.starts_with("http://") || website.starts_with("https://")) {
            return Err(UserError::Invalid("website must start with http:// or https://".into()));
        }
        prefs.website = Some(website);
    }
    if let Some(social) = &update.social {
        prefs.social = Some(SocialLinks {
            twitter: bounded("twitter", &social.twitter, SOCIAL_MAX_CHARS)?,
            instagram: bounded("instagram", &social.instagram, SOCIAL_MAX_CHARS)?,
            github: bounded("github", &social.github, SOCIAL_MAX_CHARS)?,
        });
    }
    Ok(prefs)
}

pub async fn profile(state: &AppState, secret: &str) -> Result<Profile, UserError> {
    Ok(state.backend.get_prefs(secret).await?.into())
}

pub async fn update_preferences(
    state: &AppState,
    secret: &str,
    update: &PreferencesUpdate,
) -> Result<Profile, UserError> {
    // Reject bad input before any backend call.
    merge_preferences(Preferences::default(), update)?;
    let current = state.backend.get_prefs(secret).await?;
    let merged = merge_preferences(current, update)?;
    Ok(state
        .backend
        .update_prefs(secret, &merged)
        .await?
        .into())
}

/// Store a new avatar and point `profileImage` at a square crop of it.
///
/// If the preferences cannot be written the uploaded file is removed again.
pub async fn upload_profile_image(
    state: &AppState,
    user_id: &str,
    secret: &str,
    file: FileUpload,
) -> Result<String, UserError> {
    validate_upload(&file.content_type, file.bytes.len())?;

    let stored = state
        .backend
        .create_file(&unique_id(), file, &owner_permissions(user_id))
        .await?;
    let url = state
        .backend
        .preview_url(&stored.id, PreviewOptions::cropped(AVATAR_SIZE, AVATAR_SIZE));

    if let Err(e) = point_avatar_at(state, secret, &url).await {
        if let Err(cleanup) = state.backend.delete_file(&stored.id).await {
            tracing::warn!(file_id = %stored.id, error = %cleanup, "orphaned avatar cleanup failed");
        }
        return Err(e.into());
    }
    tracing::info!(%user_id, file_id = %stored.id, "profile image updated");
    Ok(url)
}

async fn point_avatar_at(state: &AppState, secret: &str, url: &str) -> Result<(), BaasError> {
    let mut prefs = state.backend.get_prefs(secret).await?;
    prefs.profile_image = Some(url.to_owned());
    state.backend.update_prefs(secret, &prefs).await?;
    Ok(())
}

// =============================================================================
// FOLLOWS
// =============================================================================

fn follows(state: &AppState) -> Collection<'_, Follow> {
    Collection::new(state.backend.as_ref(), &state.config.backend.collections.follows)
}

fn pair(follower_id: &str, following_id: &str) -> Vec<Query> {
    vec![Query::equal("followerId", follower_id), Query::equal("followingId", following_id)]
}

async fn follower_count(state: &AppState, user_id: &str) -> Result<u64, UserError> {
    Ok(follows(state)
        .count(vec![Query::equal("followingId", user_id)])
        .await?)
}

async fn set_follow(
    state: &AppState,
    follower_id: &str,
    following_id: &str,
    on: Option<bool>,
) -> Result<FollowState, UserError> {
    if follower_id == following_id {
        return Err(UserError::SelfFollow);
    }
    let _guard = state
        .locks
        .lock(&format!("follow:{follower_id}:{following_id}"))
        .await;

    let existing = follows(state).first(pair(follower_id, following_id)).await?;
    let target = on.unwrap_or(existing.is_none());
    match (existing, target) {
        (None, true) => {
            let body = Follow {
                follower_id: follower_id.to_owned(),
                following_id: following_id.to_owned(),
                created_at: now_rfc3339(),
            };
            follows(state).create(&body).await?;
            tracing::debug!(%follower_id, %following_id, "followed");
        }
        (Some(doc), false) => {
            match follows(state).delete(&doc.id).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
            tracing::debug!(%follower_id, %following_id, "unfollowed");
        }
        _ => {}
    }
    Ok(FollowState { following: target, followers: follower_count(state, following_id).await? })
}

pub async fn follow(state: &AppState, follower_id: &str, following_id: &str) -> Result<FollowState, UserError> {
    set_follow(state, follower_id, following_id, Some(true)).await
}

pub async fn unfollow(state: &AppState, follower_id: &str, following_id: &str) -> Result<FollowState, UserError> {
    set_follow(state, follower_id, following_id, Some(false)).await
}

pub async fn toggle_follow(state: &AppState, follower_id: &str, following_id: &str) -> Result<FollowState, UserError> {
    set_follow(state, follower_id, following_id, None).await
}

pub async fn is_following(state: &AppState, follower_id: &str, following_id: &str) -> Result<bool, UserError> {
    Ok(follows(state)
        .first(pair(follower_id, following_id))
        .await?
        .is_some())
}

/// Users following `user_id`, newest first.
pub async fn followers(state: &AppState, user_id: &str, page: Page) -> Result<DocumentList<Follow>, UserError> {
    let mut queries = vec![Query::equal("followingId", user_id), Query::order_desc("$createdAt")];
    queries.extend(page.queries());
    Ok(follows(state).list(&queries).await?)
}

/// Users `user_id` follows, newest first.
pub async fn following(state: &AppState, user_id: &str, page: Page) -> Result<DocumentList<Follow>, UserError> {
    let mut queries = vec![Query::equal("followerId", user_id), Query::order_desc("$createdAt")];
    queries.extend(page.queries());
    Ok(follows(state).list(&queries).await?)
}

// =============================================================================
// STATS
// =============================================================================

pub async fn stats(state: &AppState, user_id: &str) -> Result<UserStats, UserError> {
    let collections = &state.config.backend.collections;
    let follows = follows(state);
    let wallpapers = Collection::<Value>::new(state.backend.as_ref(), &collections.wallpapers);
    let likes = Collection::<Value>::new(state.backend.as_ref(), &collections.likes);
    let favorites = Collection::<Value>::new(state.backend.as_ref(), &collections.favorites);

    let (followers, following, uploads, likes, favorites) = futures::try_join!(
        follows.count(vec![Query::equal("followingId", user_id)]),
        follows.count(vec![Query::equal("followerId", user_id)]),
        wallpapers.count(vec![Query::equal("owner", user_id)]),
        likes.count(vec![Query::equal("userId", user_id)]),
        favorites.count(vec![Query::equal("userId", user_id)]),
    )?;
    Ok(UserStats { followers, following, uploads, likes, favorites })
}

/// Stats plus the most recent uploads.
pub async fn public_profile(state: &AppState, user_id: &str) -> Result<PublicProfile, UserError> {
    let recent = Page { page: 1, limit: RECENT_UPLOADS };
    let (stats, uploads) = futures::join!(stats(state, user_id), wallpaper::by_owner(state, user_id, recent));
    Ok(PublicProfile { stats: stats?, recent_uploads: uploads?.documents })
}

#[cfg(test)]
#[path = "user_test.rs"]
mod tests;
