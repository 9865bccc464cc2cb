//! Auth service: signup, email/password login, Google OAuth, session lookup.
//!
//! DESIGN
//! ======
//! The backend owns accounts and sessions. A session secret returned by a
//! login is the only credential this server hands to the browser, and every
//! use of it is checked by asking the backend who owns it. Nothing about
//! the secret's shape is trusted locally.

use std::time::Duration;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::baas::{Account, BaasError, CURRENT_SESSION, Session, unique_id};
use crate::config::BackendTimeouts;
use crate::error::ErrorCode;
use crate::state::AppState;

pub const GOOGLE_PROVIDER: &str = "google";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

pub const PASSWORD_MIN_CHARS: usize = 8;
pub const PASSWORD_MAX_CHARS: usize = 256;
pub const NAME_MAX_CHARS: usize = 128;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid email")]
    InvalidEmail,
    #[error("password must be between {PASSWORD_MIN_CHARS} and {PASSWORD_MAX_CHARS} characters")]
    InvalidPassword,
    #[error("name must be between 1 and {NAME_MAX_CHARS} characters")]
    InvalidName,
    #[error("an account with this email already exists")]
    EmailTaken,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("not signed in")]
    Unauthenticated,
    #[error("oauth login could not be completed")]
    OAuthFailed,
    #[error("google api error: {0}")]
    GoogleApi(String),
    #[error(transparent)]
    Backend(#[from] BaasError),
}

impl ErrorCode for AuthError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidEmail => "E_INVALID_EMAIL",
            Self::InvalidPassword => "E_INVALID_PASSWORD",
            Self::InvalidName => "E_INVALID_NAME",
            Self::EmailTaken => "E_EMAIL_TAKEN",
            Self::InvalidCredentials => "E_INVALID_CREDENTIALS",
            Self::Unauthenticated => "E_UNAUTHORIZED",
            Self::OAuthFailed => "E_OAUTH_FAILED",
            Self::GoogleApi(_) => "E_GOOGLE_API",
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
            Self::InvalidEmail | Self::InvalidPassword | Self::InvalidName => StatusCode::BAD_REQUEST,
            Self::EmailTaken => StatusCode::CONFLICT,
            Self::InvalidCredentials | Self::Unauthenticated | Self::OAuthFailed => StatusCode::UNAUTHORIZED,
            Self::GoogleApi(_) => StatusCode::BAD_GATEWAY,
            Self::Backend(e) => e.status(),
        }
    }
}

/// The signed-in user as seen by handlers and returned by `/api/auth/me`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub email_verification: bool,
    pub created_at: String,
    pub profile_image: Option<String>,
}

impl From<Account> for CurrentUser {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            name: account.name,
            email: account.email,
            email_verification: account.email_verification,
            created_at: account.created_at,
            profile_image: account.prefs.profile_image,
        }
    }
}

/// Validated signup input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signup {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct GoogleProfile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

// =============================================================================
// VALIDATION
// =============================================================================

#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    let (local, domain) = normalized.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(normalized)
}

/// Check signup fields without touching the backend.
///
/// # Errors
///
/// Returns the first field that fails validation.
pub fn validate_signup(email: &str, password: &str, name: &str) -> Result<Signup, AuthError> {
    let email = normalize_email(email).ok_or(AuthError::InvalidEmail)?;
    let password_chars = password.chars().count();
    if !(PASSWORD_MIN_CHARS..=PASSWORD_MAX_CHARS).contains(&password_chars) {
        return Err(AuthError::InvalidPassword);
    }
    let name = name.trim();
    if name.is_empty() || name.chars().count() > NAME_MAX_CHARS {
        return Err(AuthError::InvalidName);
    }
    Ok(Signup { email, password: password.to_owned(), name: name.to_owned() })
}

// =============================================================================
// ACCOUNTS AND SESSIONS
// =============================================================================

/// Create a new account. The caller logs in separately to obtain a session.
pub async fn signup(state: &AppState, email: &str, password: &str, name: &str) -> Result<Account, AuthError> {
    let input = validate_signup(email, password, name)?;
    let account = state
        .backend
        .create_account(&unique_id(), &input.email, &input.password, &input.name)
        .await
        .map_err(|e| if e.is_conflict() { AuthError::EmailTaken } else { AuthError::Backend(e) })?;
    tracing::info!(user_id = %account.id, "account created");
    Ok(account)
}

/// Create an email/password session.
pub async fn login(state: &AppState, email: &str, password: &str) -> Result<Session, AuthError> {
    let email = normalize_email(email).ok_or(AuthError::InvalidCredentials)?;
    if password.is_empty() {
        return Err(AuthError::InvalidCredentials);
    }
    state
        .backend
        .create_email_session(&email, password)
        .await
        .map_err(|e| match e {
            BaasError::Api { status: 400 | 401, .. } => AuthError::InvalidCredentials,
            other => AuthError::Backend(other),
        })
}

/// Resolve a session secret to its user. `Ok(None)` means the backend does
/// not recognize the secret.
pub async fn resolve_session(state: &AppState, secret: &str) -> Result<Option<CurrentUser>, AuthError> {
    if secret.is_empty() {
        return Ok(None);
    }
    match state.backend.get_account(secret).await {
        Ok(account) => Ok(Some(account.into())),
        Err(e) if e.is_unauthorized() || e.is_not_found() => Ok(None),
        Err(e) => Err(AuthError::Backend(e)),
    }
}

pub async fn current_user(state: &AppState, secret: &str) -> Result<CurrentUser, AuthError> {
    resolve_session(state, secret)
        .await?
        .ok_or(AuthError::Unauthenticated)
}

/// Delete the session. A session the backend no longer knows is already
/// logged out.
pub async fn logout(state: &AppState, secret: &str) -> Result<(), AuthError> {
    match state
        .backend
        .delete_session(secret, CURRENT_SESSION)
        .await
    {
        Ok(()) => Ok(()),
        Err(e) if e.is_unauthorized() || e.is_not_found() => Ok(()),
        Err(e) => Err(AuthError::Backend(e)),
    }
}

// =============================================================================
// GOOGLE OAUTH
// =============================================================================

#[must_use]
pub fn google_callback_url(state: &AppState) -> String {
    format!("{}/auth/google/callback", state.config.public_url)
}

#[must_use]
pub fn login_page_url(state: &AppState) -> String {
    format!("{}/auth/login", state.config.public_url)
}

/// Backend URL that starts the Google consent flow.
#[must_use]
pub fn google_redirect_url(state: &AppState) -> String {
    state
        .backend
        .oauth2_url(GOOGLE_PROVIDER, &google_callback_url(state), &login_page_url(state))
}

/// Exchange the OAuth token from the success redirect for a session, then
/// import the Google profile picture into preferences.
pub async fn complete_google_login(state: &AppState, user_id: &str, secret: &str) -> Result<Session, AuthError> {
    if user_id.is_empty() || secret.is_empty() {
        return Err(AuthError::OAuthFailed);
    }
    let session = state
        .backend
        .create_token_session(user_id, secret)
        .await
        .map_err(|e| match e {
            BaasError::Api { status: 400 | 401 | 404, .. } => AuthError::OAuthFailed,
            other => AuthError::Backend(other),
        })?;

    if let Err(e) = import_google_picture(state, &session).await {
        tracing::warn!(user_id = %session.user_id, error = %e, "google profile picture import failed");
    }
    Ok(session)
}

async fn import_google_picture(state: &AppState, session: &Session) -> Result<Option<String>, AuthError> {
    if session.provider_access_token.is_empty() {
        return Ok(None);
    }
    let profile = fetch_google_profile(&state.config.backend.timeouts, &session.provider_access_token).await?;
    let Some(picture) = profile.picture.filter(|p| !p.is_empty()) else {
        return Ok(None);
    };

    let mut prefs = state.backend.get_prefs(&session.secret).await?;
    prefs.profile_image = Some(picture.clone());
    state
        .backend
        .update_prefs(&session.secret, &prefs)
        .await?;
    Ok(Some(picture))
}

/// HTTP client for Google API calls, bounded by the backend timeouts.
fn google_client(timeouts: &BackendTimeouts) -> Result<reqwest::Client, AuthError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeouts.request_secs))
        .connect_timeout(Duration::from_secs(timeouts.connect_secs))
        .build()
        .map_err(|e| AuthError::GoogleApi(e.to_string()))
}

/// Fetch the Google profile behind an OAuth access token.
pub async fn fetch_google_profile(timeouts: &BackendTimeouts, access_token: &str) -> Result<GoogleProfile, AuthError> {
    fetch_profile(&google_client(timeouts)?, GOOGLE_USERINFO_URL, access_token).await
}

async fn fetch_profile(client: &reqwest::Client, url: &str, access_token: &str) -> Result<GoogleProfile, AuthError> {
    let resp = client
        .get(url)
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| AuthError::GoogleApi(e.to_string()))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(AuthError::GoogleApi(format!("{status}: {body}")));
    }

    resp.json::<GoogleProfile>()
        .await
        .map_err(|e| AuthError::GoogleApi(e.to_string()))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
