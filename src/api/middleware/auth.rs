//! Session authentication middleware (the access resolver).
//!
//! Resolves a raw credential into a [`Principal`]: the session cookie is
//! tried first (web), then the `Authorization: Bearer` header (mobile).
//! Verification failures of any kind collapse into one generic rejection —
//! the caller can never distinguish an expired token from a malformed one.
//!
//! Plain authentication never hits the store; the roles in the token are
//! trusted for the token's lifetime. Endpoints that need fresh role data
//! (`/auth/me`, clinic switch) re-derive them and re-issue a token.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};

use crate::api::AppState;
use crate::config::{BEARER_TOKEN_PREFIX, SESSION_COOKIE};
use crate::domain::Principal;
use crate::errors::{AppError, AppResult};

/// Session authentication middleware.
///
/// Injects the resolved [`Principal`] into request extensions; failure is
/// terminal for the request.
pub async fn auth_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(&jar, &request).ok_or(AppError::Unauthorized)?;

    let claims = state
        .codec
        .verify(&token)
        .map_err(|_| AppError::Unauthorized)?;

    let principal = Principal::from(claims);
    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}

/// Pull the raw token from the cookie, falling back to the bearer header.
fn extract_token(jar: &CookieJar, request: &Request) -> Option<String> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }

    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix(BEARER_TOKEN_PREFIX))
        .map(|t| t.to_string())
}

/// Build the httpOnly session cookie carrying `token`.
pub fn session_cookie(token: &str, max_age_seconds: i64) -> AppResult<Cookie<'static>> {
    Cookie::parse(format!(
        "{}={}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, max_age_seconds
    ))
    .map_err(|e| AppError::internal(format!("Cookie build failed: {}", e)))
}

/// A cookie that clears the session on the client.
pub fn clear_session_cookie() -> AppResult<Cookie<'static>> {
    session_cookie("", 0)
}
