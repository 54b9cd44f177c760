//! Staff management: invitations and clinic membership.
//!
//! The seat-limit check and the role insert run inside one serializable
//! transaction here — two concurrent staff additions cannot both pass the
//! count and together exceed the plan limit. The unique index on the
//! association triple is the backstop.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::{INVITE_TTL_DAYS, TEMP_PASSWORD_BYTES};
use crate::domain::{
    generate_token, seat_check, NewUser, Password, RoleName, SeatUsage, UserResponse,
};
use crate::errors::{AppError, AppResult};
use crate::infra::{NewInvite, UnitOfWork, UserProfileUpdate};
use crate::jobs::{EmailJob, Mailer};

use super::subscription_service::seat_error;

/// A created invitation, including the one-time link for the invitee.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreatedInvite {
    pub id: Uuid,
    pub email: String,
    pub clinic_name: String,
    pub role: RoleName,
    pub expires_at: DateTime<Utc>,
    pub invite_link: String,
}

/// An invitation as listed for admins (no token material).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InviteSummary {
    pub id: Uuid,
    pub email: String,
    pub role: RoleName,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// One staff member with their collapsed role set.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StaffMember {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub roles: BTreeSet<RoleName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
}

/// Result of adding a staff member directly.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AddedStaff {
    pub user: UserResponse,
    pub role: RoleName,
    /// Present only when the account was created here
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temporary_password: Option<String>,
}

/// Partial staff update applied by an admin.
#[derive(Debug, Clone, Default)]
pub struct StaffUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub profile_image: Option<Option<String>>,
    /// Replaces the member's seat-occupying role
    pub role: Option<RoleName>,
    /// Toggles the additional ADMIN role
    pub also_make_admin: Option<bool>,
}

/// Staff service trait for dependency injection.
#[async_trait]
pub trait StaffService: Send + Sync {
    /// Create an invitation and email the one-time link.
    async fn create_invite(
        &self,
        created_by: Uuid,
        clinic_id: Uuid,
        email: String,
        role: RoleName,
    ) -> AppResult<CreatedInvite>;

    /// List a clinic's invitations, newest first.
    async fn list_invites(&self, clinic_id: Uuid) -> AppResult<Vec<InviteSummary>>;

    /// Add a staff member directly, creating the account if needed.
    /// Seat check and insert are one atomic unit.
    async fn add_staff(
        &self,
        clinic_id: Uuid,
        email: String,
        full_name: String,
        role: RoleName,
        also_make_admin: bool,
    ) -> AppResult<AddedStaff>;

    /// List clinic members with aggregated roles.
    async fn list_staff(&self, clinic_id: Uuid) -> AppResult<Vec<StaffMember>>;

    /// Update a member's profile and roles.
    async fn update_staff(
        &self,
        clinic_id: Uuid,
        user_id: Uuid,
        update: StaffUpdate,
    ) -> AppResult<()>;

    /// Remove a member from the clinic entirely.
    async fn remove_staff(&self, clinic_id: Uuid, user_id: Uuid) -> AppResult<()>;

    /// Reset a member's password to a fresh temporary one.
    async fn reset_password(&self, clinic_id: Uuid, user_id: Uuid) -> AppResult<String>;
}

/// Concrete implementation of StaffService using the Unit of Work.
pub struct StaffManager<U: UnitOfWork> {
    uow: Arc<U>,
    mailer: Mailer,
    frontend_url: String,
}

impl<U: UnitOfWork> StaffManager<U> {
    pub fn new(uow: Arc<U>, mailer: Mailer, frontend_url: String) -> Self {
        Self {
            uow,
            mailer,
            frontend_url,
        }
    }

    async fn require_membership(&self, user_id: Uuid, clinic_id: Uuid) -> AppResult<()> {
        if self.uow.clinic_roles().is_member(user_id, clinic_id).await? {
            Ok(())
        } else {
            Err(AppError::ClinicAccessDenied)
        }
    }
}

/// Only DOCTOR, RECEPTIONIST and ADMIN can be granted through staff
/// management; SUPER_ADMIN is bootstrapped out of band.
fn require_grantable(role: RoleName) -> AppResult<()> {
    if role == RoleName::SuperAdmin {
        return Err(AppError::validation("This role cannot be assigned"));
    }
    Ok(())
}

fn generate_temp_password() -> String {
    let mut bytes = [0u8; TEMP_PASSWORD_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[async_trait]
impl<U: UnitOfWork> StaffService for StaffManager<U> {
    async fn create_invite(
        &self,
        created_by: Uuid,
        clinic_id: Uuid,
        email: String,
        role: RoleName,
    ) -> AppResult<CreatedInvite> {
        require_grantable(role)?;
        self.require_membership(created_by, clinic_id).await?;

        let clinic = self
            .uow
            .clinics()
            .find_by_id(clinic_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let (token, token_hash) = generate_token();
        let expires_at = Utc::now() + Duration::days(INVITE_TTL_DAYS);

        let invite = self
            .uow
            .invites()
            .create(NewInvite {
                email: email.clone(),
                clinic_id,
                role,
                token_hash,
                expires_at,
                created_by,
            })
            .await?;

        let invite_link = format!("{}/accept-invite?token={}", self.frontend_url, token);

        self.mailer
            .send(EmailJob::invite(
                &email,
                &clinic.name,
                role.as_str(),
                &token,
                &self.frontend_url,
            ))
            .await;

        tracing::info!(clinic_id = %clinic_id, invite_id = %invite.id, role = %role,
            "Invitation created");

        Ok(CreatedInvite {
            id: invite.id,
            email: invite.email,
            clinic_name: clinic.name,
            role,
            expires_at,
            invite_link,
        })
    }

    async fn list_invites(&self, clinic_id: Uuid) -> AppResult<Vec<InviteSummary>> {
        let invites = self.uow.invites().list_by_clinic(clinic_id).await?;

        Ok(invites
            .into_iter()
            .map(|invite| InviteSummary {
                id: invite.id,
                email: invite.email,
                role: invite.role,
                expires_at: invite.expires_at,
                accepted_at: invite.accepted_at,
                created_at: invite.created_at,
            })
            .collect())
    }

    async fn add_staff(
        &self,
        clinic_id: Uuid,
        email: String,
        full_name: String,
        role: RoleName,
        also_make_admin: bool,
    ) -> AppResult<AddedStaff> {
        require_grantable(role)?;

        let temp_password = generate_temp_password();
        let temp_hash = Password::new(&temp_password)?.into_string();

        let (user, created_here) = self
            .uow
            .transaction_serializable(move |ctx| {
                Box::pin(async move {
                    // Seat check inside the same transaction as the insert.
                    let subscription = ctx
                        .subscriptions()
                        .find_by_clinic(clinic_id)
                        .await?
                        .ok_or(AppError::SubscriptionRequired)?;

                    let plan = ctx
                        .plans()
                        .find_by_id(subscription.plan_id)
                        .await?
                        .ok_or_else(|| AppError::internal("Subscription references missing plan"))?;

                    let usage = SeatUsage {
                        doctors: ctx.clinic_roles().count_doctors(clinic_id).await?,
                        total_staff: ctx.clinic_roles().count_staff(clinic_id).await?,
                    };

                    if let Some(violation) = seat_check(&plan, usage, role) {
                        return Err(seat_error(&plan.name, violation));
                    }

                    let (user, created_here) = match ctx.users().find_by_email(&email).await? {
                        Some(user) => (user, false),
                        None => {
                            let user = ctx
                                .users()
                                .create(NewUser::staff(
                                    email.clone(),
                                    temp_hash,
                                    full_name,
                                    temp_password.clone(),
                                ))
                                .await?;
                            (user, true)
                        }
                    };

                    let existing = ctx
                        .clinic_roles()
                        .roles_in_clinic(user.id, clinic_id)
                        .await?;
                    if existing.contains(&role) {
                        return Err(AppError::validation(
                            "Staff member already exists in this clinic with this role",
                        ));
                    }

                    ctx.clinic_roles().upsert(user.id, clinic_id, role).await?;

                    if also_make_admin && role != RoleName::Admin {
                        ctx.clinic_roles()
                            .upsert(user.id, clinic_id, RoleName::Admin)
                            .await?;
                    }

                    Ok((user, created_here))
                })
            })
            .await?;

        tracing::info!(clinic_id = %clinic_id, user_id = %user.id, role = %role,
            "Staff member added");

        Ok(AddedStaff {
            temporary_password: created_here.then(|| {
                user.temp_password
                    .clone()
                    .unwrap_or_default()
            }),
            user: UserResponse::from(&user),
            role,
        })
    }

    async fn list_staff(&self, clinic_id: Uuid) -> AppResult<Vec<StaffMember>> {
        let associations = self.uow.clinic_roles().list_by_clinic(clinic_id).await?;

        let mut members: BTreeMap<Uuid, StaffMember> = BTreeMap::new();
        for assoc in associations {
            let role: RoleName = assoc
                .role
                .parse()
                .map_err(|e| AppError::internal(format!("corrupt role column: {}", e)))?;

            members
                .entry(assoc.user_id)
                .or_insert_with(|| StaffMember {
                    id: assoc.user_id,
                    email: assoc.email.clone(),
                    full_name: assoc.full_name.clone(),
                    roles: BTreeSet::new(),
                    temp_password: assoc.temp_password.clone(),
                    profile_image: assoc.profile_image.clone(),
                })
                .roles
                .insert(role);
        }

        Ok(members.into_values().collect())
    }

    async fn update_staff(
        &self,
        clinic_id: Uuid,
        user_id: Uuid,
        update: StaffUpdate,
    ) -> AppResult<()> {
        self.require_membership(user_id, clinic_id).await?;

        if update.full_name.is_some() || update.email.is_some() || update.profile_image.is_some() {
            self.uow
                .users()
                .update_profile(
                    user_id,
                    UserProfileUpdate {
                        full_name: update.full_name,
                        email: update.email,
                        profile_image: update.profile_image,
                    },
                )
                .await?;
        }

        if update.role.is_none() && update.also_make_admin.is_none() {
            return Ok(());
        }

        if let Some(role) = update.role {
            require_grantable(role)?;
        }

        // Role replacement is atomic: the old primary role never disappears
        // without the new one landing.
        self.uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    if let Some(new_role) = update.role {
                        if new_role == RoleName::Admin {
                            ctx.clinic_roles()
                                .upsert(user_id, clinic_id, RoleName::Admin)
                                .await?;
                        } else {
                            ctx.clinic_roles()
                                .delete_primary_roles(user_id, clinic_id)
                                .await?;
                            ctx.clinic_roles()
                                .upsert(user_id, clinic_id, new_role)
                                .await?;
                        }
                    }

                    if let Some(make_admin) = update.also_make_admin {
                        if make_admin {
                            ctx.clinic_roles()
                                .upsert(user_id, clinic_id, RoleName::Admin)
                                .await?;
                        } else {
                            ctx.clinic_roles()
                                .delete_role(user_id, clinic_id, RoleName::Admin)
                                .await?;
                        }
                    }

                    Ok(())
                })
            })
            .await
    }

    async fn remove_staff(&self, clinic_id: Uuid, user_id: Uuid) -> AppResult<()> {
        self.uow
            .clinic_roles()
            .delete_membership(user_id, clinic_id)
            .await?;

        tracing::info!(clinic_id = %clinic_id, user_id = %user_id, "Staff member removed");
        Ok(())
    }

    async fn reset_password(&self, clinic_id: Uuid, user_id: Uuid) -> AppResult<String> {
        self.require_membership(user_id, clinic_id).await?;

        let temp_password = generate_temp_password();
        let hash = Password::new(&temp_password)?.into_string();

        self.uow
            .users()
            .set_password(user_id, hash, Some(temp_password.clone()))
            .await?;

        tracing::info!(clinic_id = %clinic_id, user_id = %user_id, "Password reset");
        Ok(temp_password)
    }
}
