//! Super-admin operations: cross-tenant listings and destructive actions.
//!
//! All handlers in front of this service require the SUPER_ADMIN
//! capability; the service itself only aggregates.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{ClinicUpdate, RoleName, SubscriptionStatus};
use crate::errors::AppResult;
use crate::infra::UnitOfWork;

/// One staff entry in a clinic listing.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdminStaffEntry {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub roles: BTreeSet<RoleName>,
}

/// A clinic with its aggregated staff, as shown to super admins.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdminClinic {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub staff: Vec<AdminStaffEntry>,
}

/// A user's membership summary in the cross-tenant user listing.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdminUserClinic {
    pub clinic_id: Uuid,
    pub clinic_name: String,
    pub roles: BTreeSet<RoleName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_status: Option<SubscriptionStatus>,
}

/// A user as shown to super admins.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdminUser {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
    pub clinics: Vec<AdminUserClinic>,
}

/// Super-admin service trait for dependency injection.
#[async_trait]
pub trait AdminService: Send + Sync {
    /// All clinics with their staff (SUPER_ADMIN rows excluded).
    async fn list_clinics(&self) -> AppResult<Vec<AdminClinic>>;

    /// Update any clinic's contact fields.
    async fn update_clinic(&self, clinic_id: Uuid, update: ClinicUpdate) -> AppResult<()>;

    /// Delete a clinic and, via cascade, its associations, invites,
    /// subscription and patients.
    async fn delete_clinic(&self, clinic_id: Uuid) -> AppResult<()>;

    /// All users with clinic/role/plan summaries.
    async fn list_users(&self) -> AppResult<Vec<AdminUser>>;

    /// Hard-delete a user. The only path that removes a user row.
    async fn delete_user(&self, user_id: Uuid) -> AppResult<()>;
}

/// Concrete implementation of AdminService using the Unit of Work.
pub struct AdminManager<U: UnitOfWork> {
    uow: Arc<U>,
}

impl<U: UnitOfWork> AdminManager<U> {
    pub fn new(uow: Arc<U>) -> Self {
        Self { uow }
    }
}

#[async_trait]
impl<U: UnitOfWork> AdminService for AdminManager<U> {
    async fn list_clinics(&self) -> AppResult<Vec<AdminClinic>> {
        let clinics = self.uow.clinics().list().await?;
        let associations = self.uow.clinic_roles().list_all().await?;

        // Group associations per clinic, then per user, collapsing roles.
        let mut staff_by_clinic: BTreeMap<Uuid, BTreeMap<Uuid, AdminStaffEntry>> = BTreeMap::new();
        for assoc in associations {
            let Ok(role) = assoc.role.parse::<RoleName>() else {
                continue;
            };
            // The System clinic's super-admin rows are not tenant staff.
            if role == RoleName::SuperAdmin {
                continue;
            }
            staff_by_clinic
                .entry(assoc.clinic_id)
                .or_default()
                .entry(assoc.user_id)
                .or_insert_with(|| AdminStaffEntry {
                    id: assoc.user_id,
                    full_name: assoc.full_name.clone(),
                    email: assoc.email.clone(),
                    roles: BTreeSet::new(),
                })
                .roles
                .insert(role);
        }

        Ok(clinics
            .into_iter()
            .map(|clinic| AdminClinic {
                staff: staff_by_clinic
                    .remove(&clinic.id)
                    .map(|m| m.into_values().collect())
                    .unwrap_or_default(),
                id: clinic.id,
                name: clinic.name,
                address: clinic.address,
                phone: clinic.phone,
                email: clinic.email,
            })
            .collect())
    }

    async fn update_clinic(&self, clinic_id: Uuid, update: ClinicUpdate) -> AppResult<()> {
        self.uow.clinics().update(clinic_id, update).await?;
        Ok(())
    }

    async fn delete_clinic(&self, clinic_id: Uuid) -> AppResult<()> {
        self.uow.clinics().delete(clinic_id).await?;
        tracing::warn!(clinic_id = %clinic_id, "Clinic deleted by super admin");
        Ok(())
    }

    async fn list_users(&self) -> AppResult<Vec<AdminUser>> {
        let users = self.uow.users().list().await?;
        let associations = self.uow.clinic_roles().list_all().await?;
        let subscriptions = self.uow.subscriptions().list().await?;
        let plans = self.uow.plans().list().await?;

        let plan_names: BTreeMap<Uuid, String> =
            plans.into_iter().map(|p| (p.id, p.name)).collect();
        let subs_by_clinic: BTreeMap<Uuid, (Option<String>, SubscriptionStatus)> = subscriptions
            .into_iter()
            .map(|s| (s.clinic_id, (plan_names.get(&s.plan_id).cloned(), s.status)))
            .collect();

        // Group per user, then per clinic, mirroring the role projection.
        let mut clinics_by_user: BTreeMap<Uuid, BTreeMap<Uuid, AdminUserClinic>> = BTreeMap::new();
        for assoc in associations {
            let Ok(role) = assoc.role.parse::<RoleName>() else {
                continue;
            };
            if role == RoleName::SuperAdmin {
                continue;
            }
            let subscription = subs_by_clinic.get(&assoc.clinic_id);
            clinics_by_user
                .entry(assoc.user_id)
                .or_default()
                .entry(assoc.clinic_id)
                .or_insert_with(|| AdminUserClinic {
                    clinic_id: assoc.clinic_id,
                    clinic_name: assoc.clinic_name.clone(),
                    roles: BTreeSet::new(),
                    plan_name: subscription.and_then(|(name, _)| name.clone()),
                    subscription_status: subscription.map(|(_, status)| *status),
                })
                .roles
                .insert(role);
        }

        Ok(users
            .into_iter()
            .map(|user| AdminUser {
                clinics: clinics_by_user
                    .remove(&user.id)
                    .map(|m| m.into_values().collect())
                    .unwrap_or_default(),
                id: user.id,
                email: user.email,
                full_name: user.full_name,
                email_verified: user.email_verified,
                created_at: user.created_at,
                last_login: user.last_login,
            })
            .collect())
    }

    async fn delete_user(&self, user_id: Uuid) -> AppResult<()> {
        // Associations go with the row via the FK cascade.
        self.uow.users().hard_delete(user_id).await?;
        tracing::warn!(user_id = %user_id, "User deleted by super admin");
        Ok(())
    }
}
