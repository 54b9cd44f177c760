//! Authentication service.
//!
//! Owns every flow that issues or refreshes a session: signup, login,
//! `/auth/me`, email verification and invite acceptance. All of them derive
//! roles through the Clinic-Role Projector — the projection logic exists
//! exactly once.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::{DEFAULT_PLAN, TRIAL_DAYS, VERIFICATION_TTL_HOURS};
use crate::domain::{
    generate_token, hash_token, ClinicMembership, ClinicResponse, NewUser, Password, Principal,
    RoleName, SubscriptionStatus, User, UserResponse, DUMMY_HASH,
};
use crate::errors::{AppError, AppResult};
use crate::infra::UnitOfWork;
use crate::jobs::{EmailJob, Mailer};

use super::projector::ClinicRoleProjector;
use super::session::{SessionCodec, SessionToken};

/// A fully authenticated session: the user, every clinic they belong to,
/// the selected clinic and a (re)issued token.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthSession {
    pub user: UserResponse,
    pub clinics: Vec<ClinicMembership>,
    pub selected_clinic: ClinicMembership,
    #[serde(flatten)]
    pub session: SessionToken,
}

/// Result of a successful signup.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SignupOutcome {
    pub user: UserResponse,
    pub clinic: ClinicResponse,
    pub roles: BTreeSet<RoleName>,
    #[serde(flatten)]
    pub session: SessionToken,
}

/// Result of accepting an invitation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AcceptInviteOutcome {
    pub user: UserResponse,
    pub clinic: ClinicResponse,
    pub role: RoleName,
    #[serde(flatten)]
    pub session: SessionToken,
}

/// Authentication service trait for dependency injection.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Register a new account: user + clinic + DOCTOR/ADMIN roles + trial
    /// subscription, atomically.
    async fn signup(
        &self,
        email: String,
        password: String,
        full_name: String,
    ) -> AppResult<SignupOutcome>;

    /// Verify credentials and issue a session for the default clinic.
    async fn login(&self, email: String, password: String) -> AppResult<AuthSession>;

    /// Re-derive roles from the store and re-issue a refreshed token.
    async fn me(&self, principal: &Principal) -> AppResult<AuthSession>;

    /// Consume an email-verification token.
    async fn verify_email(&self, token: &str) -> AppResult<()>;

    /// Rotate the verification token and resend the email.
    async fn resend_verification(&self, email: &str) -> AppResult<()>;

    /// Consume an invitation token exactly once and join its clinic.
    async fn accept_invite(
        &self,
        token: &str,
        password: Option<String>,
        full_name: Option<String>,
    ) -> AppResult<AcceptInviteOutcome>;
}

/// Concrete implementation of AuthService using the Unit of Work.
pub struct Authenticator<U: UnitOfWork> {
    uow: Arc<U>,
    codec: SessionCodec,
    projector: Arc<dyn ClinicRoleProjector>,
    mailer: Mailer,
    frontend_url: String,
}

impl<U: UnitOfWork> Authenticator<U> {
    pub fn new(
        uow: Arc<U>,
        codec: SessionCodec,
        projector: Arc<dyn ClinicRoleProjector>,
        mailer: Mailer,
        frontend_url: String,
    ) -> Self {
        Self {
            uow,
            codec,
            projector,
            mailer,
            frontend_url,
        }
    }

    fn build_session(
        &self,
        user: &User,
        map: &crate::domain::ClinicRoleMap,
        selected: ClinicMembership,
    ) -> AppResult<AuthSession> {
        let roles = map.session_roles(&selected);
        let session = self.codec.issue(user.id, selected.clinic_id, &roles)?;

        Ok(AuthSession {
            user: UserResponse::from(user),
            clinics: map.memberships(),
            selected_clinic: selected,
            session,
        })
    }
}

#[async_trait]
impl<U: UnitOfWork> AuthService for Authenticator<U> {
    async fn signup(
        &self,
        email: String,
        password: String,
        full_name: String,
    ) -> AppResult<SignupOutcome> {
        if self.uow.users().find_by_email(&email).await?.is_some() {
            return Err(AppError::conflict("User"));
        }

        let password_hash = Password::new(&password)?.into_string();
        let (verification_token, verification_hash) = generate_token();
        let verification_expires = Utc::now() + Duration::hours(VERIFICATION_TTL_HOURS);

        let clinic_name = format!("{}'s Clinic", full_name);
        let new_user = NewUser::signup(
            email.clone(),
            password_hash,
            full_name.clone(),
            verification_hash,
            verification_expires,
        );

        // User, clinic, both roles and the trial subscription are one unit:
        // a failed insert anywhere rolls the whole signup back.
        let (user, clinic) = self
            .uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    let user = ctx.users().create(new_user).await?;
                    let clinic = ctx.clinics().create(clinic_name).await?;

                    ctx.clinic_roles()
                        .upsert(user.id, clinic.id, RoleName::Doctor)
                        .await?;
                    ctx.clinic_roles()
                        .upsert(user.id, clinic.id, RoleName::Admin)
                        .await?;

                    let plan = ctx
                        .plans()
                        .find_by_name(DEFAULT_PLAN)
                        .await?
                        .ok_or_else(|| {
                            AppError::internal(format!("Seed plan {} is missing", DEFAULT_PLAN))
                        })?;

                    let trial_ends_at = Utc::now() + Duration::days(TRIAL_DAYS);
                    ctx.subscriptions()
                        .create(
                            clinic.id,
                            plan.id,
                            SubscriptionStatus::Trialing,
                            Some(trial_ends_at),
                            trial_ends_at,
                        )
                        .await?;

                    Ok((user, clinic))
                })
            })
            .await?;

        self.mailer
            .send(EmailJob::verification(
                &user.email,
                &user.full_name,
                &verification_token,
                &self.frontend_url,
            ))
            .await;
        self.mailer
            .send(EmailJob::welcome(&user.email, &user.full_name, &clinic.name))
            .await;

        let roles: BTreeSet<RoleName> = [RoleName::Doctor, RoleName::Admin].into();
        let session = self.codec.issue(user.id, clinic.id, &roles)?;

        tracing::info!(user_id = %user.id, clinic_id = %clinic.id, "New signup");

        Ok(SignupOutcome {
            user: UserResponse::from(&user),
            clinic: ClinicResponse::from(&clinic),
            roles,
            session,
        })
    }

    async fn login(&self, email: String, password: String) -> AppResult<AuthSession> {
        let user_result = self.uow.users().find_by_email(&email).await?;

        // Verify against a dummy hash when the user is missing so response
        // timing cannot enumerate emails.
        let (password_hash, user_exists) = match &user_result {
            Some(user) => (user.password_hash.as_str(), true),
            None => (DUMMY_HASH, false),
        };

        let stored_password = Password::from_hash(password_hash.to_string());
        let password_valid = stored_password.verify(&password);

        if !user_exists || !password_valid {
            return Err(AppError::InvalidCredentials);
        }

        let user = user_result.expect("user_exists was checked above");

        self.uow.users().touch_last_login(user.id).await?;

        let map = self.projector.project(user.id).await?;
        let selected = map
            .default_clinic(self.projector.system_clinic_id())
            .clone();

        tracing::debug!(user_id = %user.id, clinic_id = %selected.clinic_id, "Login");

        self.build_session(&user, &map, selected)
    }

    async fn me(&self, principal: &Principal) -> AppResult<AuthSession> {
        let user = self
            .uow
            .users()
            .find_by_id(principal.user_id)
            .await?
            .ok_or(AppError::NotFound)?;

        // Roles may have changed since the token was issued; re-derive and
        // re-issue so the caller leaves with fresh ones.
        let map = self.projector.project(user.id).await?;
        let selected = principal
            .clinic_id
            .and_then(|id| map.get(id).cloned())
            .unwrap_or_else(|| {
                map.default_clinic(self.projector.system_clinic_id())
                    .clone()
            });

        self.build_session(&user, &map, selected)
    }

    async fn verify_email(&self, token: &str) -> AppResult<()> {
        let token_hash = hash_token(token);
        let user = self
            .uow
            .users()
            .find_by_verification_hash(&token_hash)
            .await?
            .ok_or_else(|| AppError::validation("Invalid or expired verification token"))?;

        if !user.verification_pending(Utc::now()) {
            return Err(AppError::validation("Verification token has expired"));
        }

        self.uow.users().mark_verified(user.id).await?;
        tracing::info!(user_id = %user.id, "Email verified");
        Ok(())
    }

    async fn resend_verification(&self, email: &str) -> AppResult<()> {
        let user = self
            .uow
            .users()
            .find_by_email(email)
            .await?
            .ok_or(AppError::NotFound)?;

        if user.email_verified {
            return Err(AppError::validation("Email is already verified"));
        }

        let (token, token_hash) = generate_token();
        let expires = Utc::now() + Duration::hours(VERIFICATION_TTL_HOURS);
        self.uow
            .users()
            .set_verification(user.id, token_hash, expires)
            .await?;

        self.mailer
            .send(EmailJob::verification(
                &user.email,
                &user.full_name,
                &token,
                &self.frontend_url,
            ))
            .await;

        Ok(())
    }

    async fn accept_invite(
        &self,
        token: &str,
        password: Option<String>,
        full_name: Option<String>,
    ) -> AppResult<AcceptInviteOutcome> {
        let token_hash = hash_token(token);

        let password_hash = match &password {
            Some(p) => Some(Password::new(p)?.into_string()),
            None => None,
        };

        // Lookup, role grant, optional user creation and the accepted_at
        // write all commit together; the invite is consumed exactly once.
        let (user, invite) = self
            .uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    let invite = ctx
                        .invites()
                        .find_unaccepted_by_hash(&token_hash)
                        .await?
                        .ok_or(AppError::InvalidInvite)?;

                    // Expired invites get the same generic denial as spent
                    // or unknown ones.
                    if !invite.is_usable(Utc::now()) {
                        return Err(AppError::InvalidInvite);
                    }

                    let user = match ctx.users().find_by_email(&invite.email).await? {
                        Some(user) => {
                            let existing = ctx
                                .clinic_roles()
                                .roles_in_clinic(user.id, invite.clinic_id)
                                .await?;
                            if existing.contains(&invite.role) {
                                return Err(AppError::validation(
                                    "You already have this role in this clinic",
                                ));
                            }
                            user
                        }
                        None => {
                            let (password_hash, full_name) = match (password_hash, full_name) {
                                (Some(hash), Some(name)) => (hash, name),
                                _ => {
                                    return Err(AppError::validation(
                                        "Password and full name are required for new users",
                                    ))
                                }
                            };
                            ctx.users()
                                .create(NewUser::invited(
                                    invite.email.clone(),
                                    password_hash,
                                    full_name,
                                ))
                                .await?
                        }
                    };

                    ctx.clinic_roles()
                        .upsert(user.id, invite.clinic_id, invite.role)
                        .await?;
                    ctx.invites().mark_accepted(invite.id).await?;

                    Ok((user, invite))
                })
            })
            .await?;

        let clinic = self
            .uow
            .clinics()
            .find_by_id(invite.clinic_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let roles: BTreeSet<RoleName> = [invite.role].into();
        let session = self.codec.issue(user.id, clinic.id, &roles)?;

        tracing::info!(user_id = %user.id, clinic_id = %clinic.id, role = %invite.role,
            "Invite accepted");

        Ok(AcceptInviteOutcome {
            user: UserResponse::from(&user),
            clinic: ClinicResponse::from(&clinic),
            role: invite.role,
            session,
        })
    }
}
