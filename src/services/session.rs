//! Session codec.
//!
//! Signs and verifies the compact session token embedding
//! (user, active clinic, roles). The codec is a pure function over the
//! configured secret: it never touches a store, and it has no opinion about
//! whether the roles it carries are still current — that staleness tradeoff
//! is documented on the access resolver.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::{Config, SECONDS_PER_DAY};
use crate::domain::{Principal, RoleName};
use crate::errors::AppResult;

/// JWT claims payload.
///
/// Roles deserialize through the closed `RoleName` enum, so a token carrying
/// an unknown role string fails verification outright.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub clinic_id: Uuid,
    pub roles: Vec<RoleName>,
    pub exp: i64,
    pub iat: i64,
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Principal {
            user_id: claims.sub,
            clinic_id: Some(claims.clinic_id),
            roles: claims.roles.into_iter().collect(),
        }
    }
}

/// Token response returned after successful authentication
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionToken {
    /// Signed session token
    pub token: String,
    /// Seconds until expiry
    pub expires_in: i64,
}

/// Stateless signer/verifier for session tokens.
#[derive(Clone)]
pub struct SessionCodec {
    config: Config,
}

impl SessionCodec {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Sign a session for `user_id` acting in `clinic_id` with `roles`.
    pub fn issue(
        &self,
        user_id: Uuid,
        clinic_id: Uuid,
        roles: &BTreeSet<RoleName>,
    ) -> AppResult<SessionToken> {
        let now = Utc::now();
        let ttl = Duration::days(self.config.session_ttl_days);

        let claims = Claims {
            sub: user_id,
            clinic_id,
            roles: roles.iter().copied().collect(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret_bytes()),
        )?;

        Ok(SessionToken {
            token,
            expires_in: self.config.session_ttl_days * SECONDS_PER_DAY,
        })
    }

    /// Verify a token and return its claims.
    ///
    /// Bad signature, lapsed expiry and undecodable payloads all come back
    /// as errors; callers collapse them into one generic rejection so the
    /// cause is never leaked.
    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret_bytes()),
            &Validation::default(),
        )?;

        Ok(token_data.claims)
    }

    /// Cookie max-age in seconds, matching token expiry.
    pub fn cookie_max_age_seconds(&self) -> i64 {
        self.config.session_ttl_days * SECONDS_PER_DAY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> SessionCodec {
        SessionCodec::new(Config::with_secret("test-secret-key-at-least-32-chars!!"))
    }

    fn roles(list: &[RoleName]) -> BTreeSet<RoleName> {
        list.iter().copied().collect()
    }

    #[test]
    fn round_trips_user_clinic_and_roles() {
        let codec = codec();
        let user_id = Uuid::new_v4();
        let clinic_id = Uuid::new_v4();

        let session = codec
            .issue(user_id, clinic_id, &roles(&[RoleName::Doctor, RoleName::Admin]))
            .unwrap();
        let claims = codec.verify(&session.token).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.clinic_id, clinic_id);
        assert_eq!(claims.roles, vec![RoleName::Doctor, RoleName::Admin]);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn rejects_tampered_tokens() {
        let codec = codec();
        let session = codec
            .issue(Uuid::new_v4(), Uuid::new_v4(), &roles(&[RoleName::Doctor]))
            .unwrap();

        let mut tampered = session.token.clone();
        tampered.pop();
        tampered.push('x');

        assert!(codec.verify(&tampered).is_err());
    }

    #[test]
    fn rejects_tokens_signed_with_another_secret() {
        let other = SessionCodec::new(Config::with_secret("another-secret-key-32-chars-long!!"));
        let session = other
            .issue(Uuid::new_v4(), Uuid::new_v4(), &roles(&[RoleName::Admin]))
            .unwrap();

        assert!(codec().verify(&session.token).is_err());
    }

    #[test]
    fn rejects_expired_tokens() {
        let codec = codec();

        // Sign a claim that expired an hour ago with the same secret.
        let config = Config::with_secret("test-secret-key-at-least-32-chars!!");
        let now = Utc::now();
        let claims = Claims {
            sub: Uuid::new_v4(),
            clinic_id: Uuid::new_v4(),
            roles: vec![RoleName::Doctor],
            exp: (now - Duration::hours(1)).timestamp(),
            iat: (now - Duration::days(8)).timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret_bytes()),
        )
        .unwrap();

        assert!(codec.verify(&token).is_err());
    }

    #[test]
    fn rejects_unknown_role_strings_in_the_payload() {
        let config = Config::with_secret("test-secret-key-at-least-32-chars!!");

        #[derive(Serialize)]
        struct RawClaims {
            sub: Uuid,
            clinic_id: Uuid,
            roles: Vec<String>,
            exp: i64,
            iat: i64,
        }

        let now = Utc::now();
        let raw = RawClaims {
            sub: Uuid::new_v4(),
            clinic_id: Uuid::new_v4(),
            roles: vec!["OWNER".to_string()],
            exp: (now + Duration::days(1)).timestamp(),
            iat: now.timestamp(),
        };
        let token = encode(
            &Header::default(),
            &raw,
            &EncodingKey::from_secret(config.jwt_secret_bytes()),
        )
        .unwrap();

        assert!(codec().verify(&token).is_err());
    }

    #[test]
    fn claims_convert_into_a_principal() {
        let codec = codec();
        let user_id = Uuid::new_v4();
        let clinic_id = Uuid::new_v4();

        let session = codec
            .issue(user_id, clinic_id, &roles(&[RoleName::SuperAdmin]))
            .unwrap();
        let principal: Principal = codec.verify(&session.token).unwrap().into();

        assert_eq!(principal.user_id, user_id);
        assert_eq!(principal.clinic_id, Some(clinic_id));
        assert!(principal.is_super_admin());
    }
}
