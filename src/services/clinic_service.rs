//! Clinic service: tenant details and clinic switching.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{Clinic, ClinicResponse, ClinicUpdate, RoleName};
use crate::errors::{AppError, AppResult};
use crate::infra::UnitOfWork;

use super::session::{SessionCodec, SessionToken};

/// Result of switching the active clinic: fresh roles and a fresh token.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SwitchOutcome {
    pub clinic: ClinicResponse,
    pub roles: BTreeSet<RoleName>,
    #[serde(flatten)]
    pub session: SessionToken,
}

/// Clinic service trait for dependency injection.
#[async_trait]
pub trait ClinicService: Send + Sync {
    /// Fetch a clinic the caller belongs to.
    async fn get_clinic(&self, user_id: Uuid, clinic_id: Uuid) -> AppResult<Clinic>;

    /// Update clinic contact fields.
    async fn update_clinic(&self, clinic_id: Uuid, update: ClinicUpdate) -> AppResult<Clinic>;

    /// Re-derive the caller's roles in the target clinic and issue a token
    /// scoped to it. SUPER_ADMIN follows the user across clinics.
    async fn switch_clinic(&self, user_id: Uuid, clinic_id: Uuid) -> AppResult<SwitchOutcome>;
}

/// Concrete implementation of ClinicService using the Unit of Work.
pub struct ClinicManager<U: UnitOfWork> {
    uow: Arc<U>,
    codec: SessionCodec,
}

impl<U: UnitOfWork> ClinicManager<U> {
    pub fn new(uow: Arc<U>, codec: SessionCodec) -> Self {
        Self { uow, codec }
    }
}

#[async_trait]
impl<U: UnitOfWork> ClinicService for ClinicManager<U> {
    async fn get_clinic(&self, user_id: Uuid, clinic_id: Uuid) -> AppResult<Clinic> {
        if !self.uow.clinic_roles().is_member(user_id, clinic_id).await? {
            return Err(AppError::ClinicAccessDenied);
        }

        self.uow
            .clinics()
            .find_by_id(clinic_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn update_clinic(&self, clinic_id: Uuid, update: ClinicUpdate) -> AppResult<Clinic> {
        if update.is_empty() {
            return Err(AppError::validation("No fields to update"));
        }

        self.uow.clinics().update(clinic_id, update).await
    }

    async fn switch_clinic(&self, user_id: Uuid, clinic_id: Uuid) -> AppResult<SwitchOutcome> {
        let mut roles: BTreeSet<RoleName> = self
            .uow
            .clinic_roles()
            .roles_in_clinic(user_id, clinic_id)
            .await?
            .into_iter()
            .collect();

        if roles.is_empty() {
            return Err(AppError::ClinicAccessDenied);
        }

        // The capability is user-global; carry it into the new context even
        // though the association lives on the System clinic.
        if self
            .uow
            .clinic_roles()
            .has_role_anywhere(user_id, RoleName::SuperAdmin)
            .await?
        {
            roles.insert(RoleName::SuperAdmin);
        }

        let clinic = self
            .uow
            .clinics()
            .find_by_id(clinic_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let session = self.codec.issue(user_id, clinic_id, &roles)?;

        tracing::debug!(user_id = %user_id, clinic_id = %clinic_id, "Clinic switched");

        Ok(SwitchOutcome {
            clinic: ClinicResponse::from(&clinic),
            roles,
            session,
        })
    }
}
