//! Authentication handlers.

use axum::{
    extract::{Extension, Query, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::api::extractors::ValidatedJson;
use crate::api::middleware::{auth_middleware, clear_session_cookie, session_cookie};
use crate::api::AppState;
use crate::domain::Principal;
use crate::errors::AppResult;
use crate::services::{AcceptInviteOutcome, AuthSession, SignupOutcome};
use crate::types::MessageResponse;

/// Signup request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SignupRequest {
    /// Account email address
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "doctor@example.com")]
    pub email: String,
    /// Account password (minimum 8 characters)
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(example = "SecurePass123!", min_length = 8)]
    pub password: String,
    /// Display name; also names the new clinic
    #[validate(length(min = 1, message = "Full name is required"))]
    #[schema(example = "Jane Doe")]
    pub full_name: String,
}

/// Login request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "doctor@example.com")]
    pub email: String,
    #[schema(example = "SecurePass123!")]
    pub password: String,
}

/// Resend-verification request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ResendVerificationRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// Accept-invite request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AcceptInviteRequest {
    /// The one-time token from the invitation link
    #[validate(length(min = 1, message = "Invitation token is required"))]
    pub token: String,
    /// Required when the invitee has no account yet
    pub password: Option<String>,
    /// Required when the invitee has no account yet
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailParams {
    pub token: String,
}

/// Create authentication routes. `/auth/me` alone requires a session.
pub fn auth_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/me", get(me))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/verify-email", get(verify_email))
        .route("/resend-verification", post(resend_verification))
        .route("/accept-invite", post(accept_invite))
        .merge(protected)
}

/// Register a new account with its own clinic and trial subscription
#[utoipa::path(
    post,
    path = "/auth/signup",
    tag = "Authentication",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account, clinic and trial created", body = SignupOutcome),
        (status = 400, description = "Validation error"),
        (status = 409, description = "User already exists")
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(payload): ValidatedJson<SignupRequest>,
) -> AppResult<(StatusCode, CookieJar, Json<SignupOutcome>)> {
    let outcome = state
        .auth_service
        .signup(payload.email, payload.password, payload.full_name)
        .await?;

    let jar = jar.add(session_cookie(
        &outcome.session.token,
        state.codec.cookie_max_age_seconds(),
    )?);

    Ok((StatusCode::CREATED, jar, Json(outcome)))
}

/// Login and receive a session scoped to the default clinic
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthSession),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "No clinic association")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> AppResult<(CookieJar, Json<AuthSession>)> {
    let session = state
        .auth_service
        .login(payload.email, payload.password)
        .await?;

    let jar = jar.add(session_cookie(
        &session.session.token,
        state.codec.cookie_max_age_seconds(),
    )?);

    Ok((jar, Json(session)))
}

/// Current user with fresh roles and a refreshed token
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Authentication",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current session with re-derived roles", body = AuthSession),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No clinic association")
    )
)]
pub async fn me(
    Extension(principal): Extension<Principal>,
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<AuthSession>)> {
    let session = state.auth_service.me(&principal).await?;

    // Roles were re-derived from the store; hand the refreshed token back.
    let jar = jar.add(session_cookie(
        &session.session.token,
        state.codec.cookie_max_age_seconds(),
    )?);

    Ok((jar, Json(session)))
}

/// Clear the session cookie
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Authentication",
    responses((status = 200, description = "Logged out", body = MessageResponse))
)]
pub async fn logout(jar: CookieJar) -> AppResult<(CookieJar, Json<MessageResponse>)> {
    let jar = jar.add(clear_session_cookie()?);
    Ok((jar, Json(MessageResponse::new("Logged out successfully"))))
}

/// Consume an email-verification token
#[utoipa::path(
    get,
    path = "/auth/verify-email",
    tag = "Authentication",
    params(("token" = String, Query, description = "Verification token from the email")),
    responses(
        (status = 200, description = "Email verified", body = MessageResponse),
        (status = 400, description = "Invalid or expired token")
    )
)]
pub async fn verify_email(
    State(state): State<AppState>,
    Query(params): Query<VerifyEmailParams>,
) -> AppResult<Json<MessageResponse>> {
    state.auth_service.verify_email(&params.token).await?;
    Ok(Json(MessageResponse::new("Email verified successfully")))
}

/// Rotate and resend the verification email
#[utoipa::path(
    post,
    path = "/auth/resend-verification",
    tag = "Authentication",
    request_body = ResendVerificationRequest,
    responses(
        (status = 200, description = "Verification email resent", body = MessageResponse),
        (status = 400, description = "Email already verified"),
        (status = 404, description = "User not found")
    )
)]
pub async fn resend_verification(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ResendVerificationRequest>,
) -> AppResult<Json<MessageResponse>> {
    state.auth_service.resend_verification(&payload.email).await?;
    Ok(Json(MessageResponse::new(
        "Verification email resent successfully",
    )))
}

/// Accept an invitation (consumes the token exactly once)
#[utoipa::path(
    post,
    path = "/auth/accept-invite",
    tag = "Authentication",
    request_body = AcceptInviteRequest,
    responses(
        (status = 200, description = "Invitation accepted", body = AcceptInviteOutcome),
        (status = 400, description = "Invalid, expired or already used invitation")
    )
)]
pub async fn accept_invite(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(payload): ValidatedJson<AcceptInviteRequest>,
) -> AppResult<(CookieJar, Json<AcceptInviteOutcome>)> {
    let outcome = state
        .auth_service
        .accept_invite(&payload.token, payload.password, payload.full_name)
        .await?;

    let jar = jar.add(session_cookie(
        &outcome.session.token,
        state.codec.cookie_max_age_seconds(),
    )?);

    Ok((jar, Json(outcome)))
}
