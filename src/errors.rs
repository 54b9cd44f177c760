//! Centralized error handling.
//!
//! Provides a unified error type for the entire application,
//! with automatic HTTP response conversion.
//!
//! Authorization and subscription denials carry a machine-readable code and
//! enough structured detail for the client to render an upgrade prompt or a
//! missing-role hint. Internal errors are logged and replaced by generic
//! messages before they reach the client.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::domain::{RoleName, SubscriptionStatus};

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication & Authorization
    #[error("Authentication required")]
    Unauthorized,

    #[error("Insufficient permissions")]
    Forbidden {
        required: Vec<RoleName>,
        held: Vec<RoleName>,
    },

    #[error("Super Admin access required")]
    SuperAdminRequired { held: Vec<RoleName> },

    #[error("No clinic context found")]
    NoClinicContext,

    #[error("You do not have access to this clinic")]
    ClinicAccessDenied,

    #[error("Your account is not associated with any clinic. Please contact your system administrator.")]
    NoClinicAssociation,

    #[error("Invalid credentials")]
    InvalidCredentials,

    // Subscription gating
    #[error("No active subscription found")]
    SubscriptionRequired,

    #[error("Your subscription is not active. Please update your billing information.")]
    SubscriptionInactive { status: SubscriptionStatus },

    #[error("Your trial has expired. Please upgrade to continue.")]
    TrialExpired,

    #[error("This feature requires a higher plan")]
    FeatureNotInPlan { feature: String, plan: String },

    #[error("Your {plan} plan allows up to {limit} {noun}. Please upgrade to add more.")]
    SeatLimitExceeded {
        plan: String,
        noun: &'static str,
        current: u64,
        limit: u64,
    },

    // Invites (one generic message: no token-guessing oracle)
    #[error("Invalid or already used invitation")]
    InvalidInvite,

    // Resource errors
    #[error("Resource not found")]
    NotFound,

    #[error("{0} already exists")]
    Conflict(String),

    // Validation
    #[error("{0}")]
    Validation(String),

    #[error("Invalid input: {0}")]
    BadRequest(String),

    // External service errors
    #[error("Database error")]
    Database(#[from] sea_orm::DbErr),

    #[error("Authentication error")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Cache error")]
    Cache(#[from] redis::RedisError),

    // Internal
    #[error("Internal server error")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl AppError {
    /// Get error code for client
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::Forbidden { .. } => "FORBIDDEN",
            AppError::SuperAdminRequired { .. } => "SUPER_ADMIN_REQUIRED",
            AppError::NoClinicContext => "NO_CLINIC_CONTEXT",
            AppError::ClinicAccessDenied => "CLINIC_ACCESS_DENIED",
            AppError::NoClinicAssociation => "NO_CLINIC_ASSOCIATION",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::SubscriptionRequired => "SUBSCRIPTION_REQUIRED",
            AppError::SubscriptionInactive { .. } => "SUBSCRIPTION_INACTIVE",
            AppError::TrialExpired => "TRIAL_EXPIRED",
            AppError::FeatureNotInPlan { .. } => "FEATURE_NOT_IN_PLAN",
            AppError::SeatLimitExceeded { .. } => "SEAT_LIMIT_EXCEEDED",
            AppError::InvalidInvite => "INVALID_INVITE",
            AppError::NotFound => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Jwt(_) => "AUTH_ERROR",
            AppError::Cache(_) => "CACHE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized | AppError::InvalidCredentials | AppError::Jwt(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden { .. }
            | AppError::SuperAdminRequired { .. }
            | AppError::ClinicAccessDenied
            | AppError::NoClinicAssociation
            | AppError::SubscriptionRequired
            | AppError::SubscriptionInactive { .. }
            | AppError::TrialExpired
            | AppError::FeatureNotInPlan { .. }
            | AppError::SeatLimitExceeded { .. } => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NoClinicContext
            | AppError::InvalidInvite
            | AppError::Validation(_)
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) | AppError::Cache(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Structured denial details for the client (role lists, seat counts,
    /// upgrade hints). None for errors that carry nothing beyond the message.
    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::Forbidden { required, held } => Some(json!({
                "required": required,
                "current": held,
            })),
            AppError::SuperAdminRequired { held } => Some(json!({
                "current": held,
            })),
            AppError::SubscriptionRequired => Some(json!({ "requires_upgrade": true })),
            AppError::SubscriptionInactive { status } => Some(json!({
                "status": status,
                "requires_upgrade": true,
            })),
            AppError::TrialExpired => Some(json!({
                "trial_expired": true,
                "requires_upgrade": true,
            })),
            AppError::FeatureNotInPlan { feature, plan } => Some(json!({
                "feature": feature,
                "current_plan": plan,
                "requires_upgrade": true,
            })),
            AppError::SeatLimitExceeded { current, limit, .. } => Some(json!({
                "current_count": current,
                "limit": limit,
                "requires_upgrade": true,
            })),
            _ => None,
        }
    }

    /// Get user-facing message (hides internal details)
    fn user_message(&self) -> String {
        match self {
            // Show full message for client errors
            AppError::Validation(msg) => msg.clone(),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Conflict(msg) => format!("{} already exists", msg),

            // Hide details for internal/security errors
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "A database error occurred".to_string()
            }
            AppError::Jwt(e) => {
                tracing::error!("JWT error: {:?}", e);
                "Invalid or expired token".to_string()
            }
            AppError::Cache(e) => {
                tracing::error!("Cache error: {:?}", e);
                "A cache error occurred".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "An internal error occurred".to_string()
            }

            // Use default message for others
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code().to_string(),
                message: self.user_message(),
                details: self.details(),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias
pub type AppResult<T> = Result<T, AppError>;

/// Extension trait for Option -> AppError conversion
pub trait OptionExt<T> {
    fn ok_or_not_found(self) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self) -> AppResult<T> {
        self.ok_or(AppError::NotFound)
    }
}

/// Convenience constructors
impl AppError {
    pub fn conflict(entity: impl Into<String>) -> Self {
        AppError::Conflict(entity.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }
}
