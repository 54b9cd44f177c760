//! Service container - centralized service construction and access.
//!
//! Builds the whole service graph from a database connection and the
//! explicit configuration object; nothing reaches for ambient state.

use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::infra::Persistence;
use crate::jobs::Mailer;

use super::admin_service::{AdminManager, AdminService};
use super::auth_service::{AuthService, Authenticator};
use super::clinic_service::{ClinicManager, ClinicService};
use super::patient_service::{PatientManager, PatientService};
use super::projector::{ClinicRoleProjector, Projector};
use super::session::SessionCodec;
use super::staff_service::{StaffManager, StaffService};
use super::subscription_service::{SubscriptionGate, SubscriptionManager};

/// Concrete service container holding every application service.
pub struct Services {
    auth: Arc<dyn AuthService>,
    projector: Arc<dyn ClinicRoleProjector>,
    subscriptions: Arc<dyn SubscriptionGate>,
    staff: Arc<dyn StaffService>,
    clinics: Arc<dyn ClinicService>,
    admin: Arc<dyn AdminService>,
    patients: Arc<dyn PatientService>,
    codec: SessionCodec,
}

impl Services {
    /// Build the full service graph from a database connection.
    ///
    /// `system_clinic_id` is resolved at bootstrap (find-or-create by name)
    /// and injected here so the projector never queries for it.
    pub fn from_connection(
        db: sea_orm::DatabaseConnection,
        config: Config,
        system_clinic_id: Uuid,
        mailer: Mailer,
    ) -> Self {
        let uow = Arc::new(Persistence::new(db));
        let codec = SessionCodec::new(config.clone());

        let projector: Arc<dyn ClinicRoleProjector> =
            Arc::new(Projector::new(uow.clone(), system_clinic_id));

        let auth = Arc::new(Authenticator::new(
            uow.clone(),
            codec.clone(),
            projector.clone(),
            mailer.clone(),
            config.frontend_url.clone(),
        ));
        let subscriptions = Arc::new(SubscriptionManager::new(uow.clone()));
        let staff = Arc::new(StaffManager::new(
            uow.clone(),
            mailer,
            config.frontend_url.clone(),
        ));
        let clinics = Arc::new(ClinicManager::new(uow.clone(), codec.clone()));
        let admin = Arc::new(AdminManager::new(uow.clone()));
        let patients = Arc::new(PatientManager::new(uow));

        Self {
            auth,
            projector,
            subscriptions,
            staff,
            clinics,
            admin,
            patients,
            codec,
        }
    }

    pub fn auth(&self) -> Arc<dyn AuthService> {
        self.auth.clone()
    }

    pub fn projector(&self) -> Arc<dyn ClinicRoleProjector> {
        self.projector.clone()
    }

    pub fn subscriptions(&self) -> Arc<dyn SubscriptionGate> {
        self.subscriptions.clone()
    }

    pub fn staff(&self) -> Arc<dyn StaffService> {
        self.staff.clone()
    }

    pub fn clinics(&self) -> Arc<dyn ClinicService> {
        self.clinics.clone()
    }

    pub fn admin(&self) -> Arc<dyn AdminService> {
        self.admin.clone()
    }

    pub fn patients(&self) -> Arc<dyn PatientService> {
        self.patients.clone()
    }

    pub fn codec(&self) -> SessionCodec {
        self.codec.clone()
    }
}
