//! Route protection middleware.
//!
//! DESIGN
//! ======
//! Page routes are split into two groups. Protected pages require a
//! signed-in user and redirect to the login page otherwise, carrying the
//! original path as `callbackUrl`. Auth-only pages (login, signup) make no
//! sense once signed in and redirect home.
//!
//! A cookie is only a candidate. Each candidate is checked with a session
//! introspection call and the first one the backend recognizes wins. The
//! outcome is stored in request extensions so the [`AuthUser`] extractor
//! does not introspect a second time.
//!
//! TRADE-OFFS
//! ==========
//! Introspection runs only for guarded pages and `/api/` requests. Static
//! assets never pay for a backend round trip.
//!
//! [`AuthUser`]: super::auth::AuthUser

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

use super::auth::{ResolvedSession, resolve_from_headers};
use crate::state::AppState;

pub const LOGIN_PATH: &str = "/auth/login";
pub const HOME_PATH: &str = "/";

pub const PROTECTED_PREFIXES: [&str; 7] = [
    "/upload",
    "/profile",
    "/favorites",
    "/settings",
    "/wallpapers/edit",
    "/wallpapers/delete",
    "/logout",
];

pub const AUTH_ONLY_PREFIXES: [&str; 2] = ["/auth/login", "/auth/signup"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Redirect(String),
}

/// Whether `path` is `prefix` or lies below it. `/profiles` is not under
/// `/profile`.
#[must_use]
pub fn is_under(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[must_use]
pub fn is_protected(path: &str) -> bool {
    PROTECTED_PREFIXES.iter().any(|p| is_under(path, p))
}

#[must_use]
pub fn is_auth_only(path: &str) -> bool {
    AUTH_ONLY_PREFIXES.iter().any(|p| is_under(path, p))
}

#[must_use]
pub fn login_redirect(path: &str) -> String {
    format!("{LOGIN_PATH}?callbackUrl={}", urlencoding::encode(path))
}

/// Pure routing decision for a page request.
#[must_use]
pub fn decide(path: &str, authenticated: bool) -> Decision {
    if !authenticated && is_protected(path) {
        return Decision::Redirect(login_redirect(path));
    }
    if authenticated && is_auth_only(path) {
        return Decision::Redirect(HOME_PATH.to_owned());
    }
    Decision::Allow
}

fn needs_session(path: &str) -> bool {
    is_under(path, "/api") || is_protected(path) || is_auth_only(path)
}

/// Axum middleware enforcing [`decide`].
pub async fn guard(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let path = req.uri().path().to_owned();
    if !needs_session(&path) {
        return next.run(req).await;
    }

    let authenticated = match resolve_from_headers(&state, req.headers()).await {
        Ok(session) => {
            let authenticated = session.is_some();
            req.extensions_mut().insert(ResolvedSession(session));
            authenticated
        }
        Err(e) => {
            // Leave extensions empty so API extractors retry and report the
            // backend failure; pages fail closed.
            tracing::warn!(%path, error = %e, "session introspection failed");
            false
        }
    };

    match decide(&path, authenticated) {
        Decision::Allow => next.run(req).await,
        Decision::Redirect(to) => {
            tracing::debug!(%path, %to, "guard redirect");
            Redirect::temporary(&to).into_response()
        }
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
