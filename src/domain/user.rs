//! User domain entity and related types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User domain entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub email_verified: bool,
    /// SHA-256 hash of the pending email-verification token
    #[serde(skip_serializing)]
    pub verification_token_hash: Option<String>,
    pub verification_expires: Option<DateTime<Utc>>,
    /// Generated password for staff accounts created by an admin; cleared
    /// once the user sets their own
    #[serde(skip_serializing)]
    pub temp_password: Option<String>,
    pub profile_image: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether the pending verification token is still usable.
    pub fn verification_pending(&self, now: DateTime<Utc>) -> bool {
        !self.email_verified
            && self.verification_token_hash.is_some()
            && self.verification_expires.map(|e| now <= e).unwrap_or(false)
    }
}

/// Fields for creating a user row.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub email_verified: bool,
    pub verification_token_hash: Option<String>,
    pub verification_expires: Option<DateTime<Utc>>,
    pub temp_password: Option<String>,
}

impl NewUser {
    /// A self-registered user: unverified, with a pending verification token.
    pub fn signup(
        email: String,
        password_hash: String,
        full_name: String,
        verification_token_hash: String,
        verification_expires: DateTime<Utc>,
    ) -> Self {
        Self {
            email,
            password_hash,
            full_name,
            email_verified: false,
            verification_token_hash: Some(verification_token_hash),
            verification_expires: Some(verification_expires),
            temp_password: None,
        }
    }

    /// A staff account created by an admin with a generated password.
    pub fn staff(email: String, password_hash: String, full_name: String, temp_password: String) -> Self {
        Self {
            email,
            password_hash,
            full_name,
            email_verified: false,
            verification_token_hash: None,
            verification_expires: None,
            temp_password: Some(temp_password),
        }
    }

    /// A user created through invite acceptance; no verification round-trip.
    pub fn invited(email: String, password_hash: String, full_name: String) -> Self {
        Self {
            email,
            password_hash,
            full_name,
            email_verified: true,
            verification_token_hash: None,
            verification_expires: None,
            temp_password: None,
        }
    }
}

/// User response (safe to return to client)
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UserResponse {
    /// Unique user identifier
    pub id: Uuid,
    /// User email address
    pub email: String,
    /// User display name
    pub full_name: String,
    /// Whether the email address has been verified
    pub email_verified: bool,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            email_verified: user.email_verified,
        }
    }
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse::from(&user)
    }
}
