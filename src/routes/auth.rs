//! Auth routes: email/password, Google OAuth, logout, session extractors.

use axum::extract::{FromRef, FromRequestParts, Query, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

use crate::baas::Session;
use crate::error::ApiError;
use crate::services::auth::{self as auth_svc, AuthError, CurrentUser};
use crate::state::AppState;

pub const COOKIE_NAME: &str = "token";
const OAUTH_SUCCESS_PATH: &str = "/profile";
const OAUTH_FAILURE_PATH: &str = "/auth/login";

/// Name of the cookie the backend sets for its own sessions.
#[must_use]
pub fn native_cookie_name(project_id: &str) -> String {
    format!("a_session_{project_id}")
}

// =============================================================================
// COOKIES
// =============================================================================

fn session_cookie(state: &AppState, session: &Session) -> Cookie<'static> {
    let cookie = Cookie::build((COOKIE_NAME, session.secret.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.cookie_secure);
    match OffsetDateTime::parse(&session.expire, &Rfc3339) {
        Ok(expires) => cookie.expires(expires).build(),
        Err(_) => cookie.build(),
    }
}

fn clear_cookie(state: &AppState) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.cookie_secure)
        .max_age(Duration::ZERO)
        .build()
}

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Authenticated user plus the session secret used for per-user backend
/// calls. Use as a handler parameter to require authentication.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: CurrentUser,
    pub secret: String,
}

/// Outcome of the guard's session lookup, stored in request extensions.
#[derive(Debug, Clone)]
pub struct ResolvedSession(pub Option<AuthUser>);

/// Try each candidate cookie in order; the first session the backend
/// recognizes wins. A transport failure is reported only when no candidate
/// succeeded.
pub async fn resolve_from_headers(state: &AppState, headers: &HeaderMap) -> Result<Option<AuthUser>, AuthError> {
    let jar = CookieJar::from_headers(headers);
    let native = native_cookie_name(&state.config.backend.project_id);
    let mut failure = None;

    for name in [COOKIE_NAME, native.as_str()] {
        let Some(secret) = jar.get(name).map(Cookie::value).filter(|v| !v.is_empty()) else {
            continue;
        };
        match auth_svc::resolve_session(state, secret).await {
            Ok(Some(user)) => return Ok(Some(AuthUser { user, secret: secret.to_owned() })),
            Ok(None) => {}
            Err(e) => failure = Some(e),
        }
    }

    failure.map_or(Ok(None), Err)
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ResolvedSession(session)) = parts.extensions.get::<ResolvedSession>() {
            return session.clone().ok_or_else(ApiError::unauthorized);
        }
        let app_state = AppState::from_ref(state);
        resolve_from_headers(&app_state, &parts.headers)
            .await?
            .ok_or_else(ApiError::unauthorized)
    }
}

/// Like [`AuthUser`] but never rejects; anonymous callers get `None`.
#[derive(Debug, Clone)]
pub struct OptionalAuthUser(pub Option<AuthUser>);

impl<S> FromRequestParts<S> for OptionalAuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ResolvedSession(session)) = parts.extensions.get::<ResolvedSession>() {
            return Ok(Self(session.clone()));
        }
        let app_state = AppState::from_ref(state);
        match resolve_from_headers(&app_state, &parts.headers).await {
            Ok(session) => Ok(Self(session)),
            Err(e) => {
                tracing::warn!(error = %e, "optional session lookup failed");
                Ok(Self(None))
            }
        }
    }
}

impl OptionalAuthUser {
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.0.as_ref().map(|a| a.user.id.as_str())
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Deserialize)]
pub struct SignupBody {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

/// `POST /api/auth/signup`: create an account and sign it in.
pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<SignupBody>,
) -> Result<Response, ApiError> {
    let account = auth_svc::signup(&state, &body.email, &body.password, &body.name).await?;
    let session = auth_svc::login(&state, &body.email, &body.password).await?;
    let jar = jar.add(session_cookie(&state, &session));
    Ok((StatusCode::CREATED, jar, Json(CurrentUser::from(account))).into_response())
}

/// `POST /api/auth/login`: create a session and set the cookie.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LoginBody>,
) -> Result<Response, ApiError> {
    let session = auth_svc::login(&state, &body.email, &body.password).await?;
    let user = auth_svc::current_user(&state, &session.secret).await?;
    tracing::info!(user_id = %user.id, "login");
    let jar = jar.add(session_cookie(&state, &session));
    Ok((jar, Json(user)).into_response())
}

/// `GET /api/auth/me`: return current user.
pub async fn me(auth: AuthUser) -> Json<CurrentUser> {
    Json(auth.user)
}

/// `POST /api/auth/logout`: delete session, clear cookie.
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    if let Err(e) = auth_svc::logout(&state, &auth.secret).await {
        tracing::warn!(user_id = %auth.user.id, error = %e, "session delete failed");
    }
    let jar = CookieJar::new().add(clear_cookie(&state));
    (jar, StatusCode::NO_CONTENT)
}

/// `GET /logout`: page logout; the guard only lets signed-in users here.
pub async fn page_logout(State(state): State<AppState>, auth: OptionalAuthUser) -> Response {
    if let Some(auth) = auth.0 {
        if let Err(e) = auth_svc::logout(&state, &auth.secret).await {
            tracing::warn!(user_id = %auth.user.id, error = %e, "session delete failed");
        }
    }
    let jar = CookieJar::new().add(clear_cookie(&state));
    (jar, Redirect::temporary("/")).into_response()
}

/// `GET /auth/google`: redirect to the backend's Google consent flow.
pub async fn google_redirect(State(state): State<AppState>) -> Redirect {
    Redirect::temporary(&auth_svc::google_redirect_url(&state))
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    #[serde(default, rename = "userId")]
    user_id: String,
    #[serde(default)]
    secret: String,
}

/// `GET /auth/google/callback`: exchange the OAuth token, set cookie,
/// redirect to the profile page.
pub async fn google_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<CallbackQuery>,
) -> Response {
    match auth_svc::complete_google_login(&state, &params.user_id, &params.secret).await {
        Ok(session) => {
            tracing::info!(user_id = %session.user_id, "google login");
            let jar = jar.add(session_cookie(&state, &session));
            (jar, Redirect::temporary(OAUTH_SUCCESS_PATH)).into_response()
        }
        Err(e) => {
            tracing::warn!(user_id = %params.user_id, error = %e, "google login failed");
            Redirect::temporary(OAUTH_FAILURE_PATH).into_response()
        }
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
