use axum::http::{StatusCode, header};
use serde_json::json;

use super::*;
use crate::routes::test_support::{body_json, get, location, post_json, send, token_cookie};
use crate::state::test_helpers::{self, PROJECT_ID};

fn set_cookie(resp: &axum::http::Response<axum::body::Body>) -> String {
    resp.headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned()
}

// =============================================================================
// cookies
// =============================================================================

#[test]
fn native_cookie_name_includes_project() {
    assert_eq!(native_cookie_name("abc"), "a_session_abc");
}

fn session(expire: &str) -> Session {
    Session {
        id: "s1".into(),
        user_id: "u1".into(),
        provider: "email".into(),
        secret: "sek".into(),
        expire: expire.into(),
        provider_access_token: String::new(),
        current: true,
    }
}

#[test]
fn session_cookie_is_http_only_lax_with_expiry() {
    let (state, _backend) = test_helpers::test_app_state();
    let session = session("2030-01-01T00:00:00.000+00:00");
    let cookie = session_cookie(&state, &session);
    assert_eq!(cookie.name(), COOKIE_NAME);
    assert_eq!(cookie.value(), "sek");
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    assert_eq!(cookie.path(), Some("/"));
    assert_eq!(cookie.expires_datetime().map(|t| t.year()), Some(2030));
}

#[test]
fn unparseable_expiry_gives_session_cookie() {
    let (state, _backend) = test_helpers::test_app_state();
    assert!(session_cookie(&state, &session("soon")).expires().is_none());
}

#[test]
fn clear_cookie_expires_immediately() {
    let (state, _backend) = test_helpers::test_app_state();
    let cookie = clear_cookie(&state);
    assert_eq!(cookie.value(), "");
    assert_eq!(cookie.max_age(), Some(Duration::ZERO));
}

// =============================================================================
// session resolution
// =============================================================================

#[tokio::test]
async fn forged_cookie_does_not_authenticate() {
    let (state, _backend) = test_helpers::test_app_state();
    let mut headers = HeaderMap::new();
    headers.insert(header::COOKIE, "token=forged-value".parse().unwrap());
    assert!(resolve_from_headers(&state, &headers).await.unwrap().is_none());
}

#[tokio::test]
async fn native_cookie_is_accepted_after_bad_token() {
    let (state, backend) = test_helpers::test_app_state();
    let secret = backend.seed_user("u1", "Ada", "ada@example.com");
    let mut headers = HeaderMap::new();
    let cookie = format!("token=stale; a_session_{PROJECT_ID}={secret}");
    headers.insert(header::COOKIE, cookie.parse().unwrap());

    let auth = resolve_from_headers(&state, &headers).await.unwrap().unwrap();
    assert_eq!(auth.user.id, "u1");
    assert_eq!(auth.secret, secret);
}

#[tokio::test]
async fn no_cookie_makes_no_backend_call() {
    let (state, backend) = test_helpers::test_app_state();
    assert!(resolve_from_headers(&state, &HeaderMap::new()).await.unwrap().is_none());
    assert_eq!(backend.call_count(), 0);
}

// =============================================================================
// handlers
// =============================================================================

#[tokio::test]
async fn signup_sets_cookie_and_returns_created() {
    let (state, backend) = test_helpers::test_app_state();
    let body = json!({"email": "New@Example.com", "password": "longenough", "name": "Newt"});
    let resp = send(&state, post_json("/api/auth/signup", None, &body)).await;

    assert_eq!(resp.status(), StatusCode::CREATED);
    let cookie = set_cookie(&resp);
    assert!(cookie.starts_with("token=secret-"), "{cookie}");
    assert!(cookie.contains("HttpOnly"));
    let secret = cookie
        .trim_start_matches("token=")
        .split(';')
        .next()
        .unwrap();
    assert!(backend.has_session(secret));

    let json = body_json(resp).await;
    assert_eq!(json["email"], "new@example.com");
    assert_eq!(json["name"], "Newt");
}

#[tokio::test]
async fn signup_rejects_short_password() {
    let (state, backend) = test_helpers::test_app_state();
    let body = json!({"email": "a@b.c", "password": "short", "name": "A"});
    let resp = send(&state, post_json("/api/auth/signup", None, &body)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["code"], "E_INVALID_PASSWORD");
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn login_then_me() {
    let (state, backend) = test_helpers::test_app_state();
    backend.seed_user("u1", "Ada", "ada@example.com");

    let body = json!({"email": "ada@example.com", "password": "password123"});
    let resp = send(&state, post_json("/api/auth/login", None, &body)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = set_cookie(&resp);
    let pair = cookie.split(';').next().unwrap().to_owned();

    let resp = send(&state, get("/api/auth/me", Some(&pair))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["id"], "u1");
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
    let (state, backend) = test_helpers::test_app_state();
    backend.seed_user("u1", "Ada", "ada@example.com");
    let body = json!({"email": "ada@example.com", "password": "wrong-password"});
    let resp = send(&state, post_json("/api/auth/login", None, &body)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookie(&resp).is_empty());
}

#[tokio::test]
async fn me_without_session_is_unauthorized_json() {
    let (state, _backend) = test_helpers::test_app_state();
    let resp = send(&state, get("/api/auth/me", Some("token=nope"))).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["code"], "E_UNAUTHORIZED");
}

#[tokio::test]
async fn api_logout_deletes_session_and_clears_cookie() {
    let (state, backend) = test_helpers::test_app_state();
    let secret = backend.seed_user("u1", "Ada", "ada@example.com");
    let resp = send(&state, post_json("/api/auth/logout", Some(&token_cookie(&secret)), &json!({}))).await;

    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(set_cookie(&resp).contains("Max-Age=0"));
    assert!(!backend.has_session(&secret));
}

#[tokio::test]
async fn page_logout_redirects_home() {
    let (state, backend) = test_helpers::test_app_state();
    let secret = backend.seed_user("u1", "Ada", "ada@example.com");
    let resp = send(&state, get("/logout", Some(&token_cookie(&secret)))).await;

    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&resp), "/");
    assert!(!backend.has_session(&secret));
}

#[tokio::test]
async fn google_redirect_points_at_backend_flow() {
    let (state, _backend) = test_helpers::test_app_state();
    let resp = send(&state, get("/auth/google", None)).await;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert!(location(&resp).starts_with("memory://oauth2/google"));
    assert!(location(&resp).contains("/auth/google/callback"));
}

#[tokio::test]
async fn google_callback_sets_cookie_and_goes_to_profile() {
    let (state, backend) = test_helpers::test_app_state();
    backend.seed_user("u1", "Ada", "ada@example.com");
    let token = backend.issue_oauth_token("u1", "");

    let uri = format!("/auth/google/callback?userId=u1&secret={token}");
    let resp = send(&state, get(&uri, None)).await;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&resp), "/profile");
    assert!(set_cookie(&resp).starts_with("token=secret-"));
}

#[tokio::test]
async fn google_callback_failure_goes_to_login() {
    let (state, _backend) = test_helpers::test_app_state();
    let resp = send(&state, get("/auth/google/callback?userId=u1&secret=bogus", None)).await;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&resp), "/auth/login");
    assert!(set_cookie(&resp).is_empty());
}
