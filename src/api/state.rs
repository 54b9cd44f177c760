//! Application state - Dependency injection container for handlers.

use std::sync::Arc;

use crate::infra::{Cache, Database};
use crate::services::{
    AdminService, AuthService, ClinicService, PatientService, Services, SessionCodec,
    StaffService, SubscriptionGate,
};

/// Application state shared across handlers.
///
/// Infrastructure handles are optional so handler tests can run against
/// mocked services without a live Redis or Postgres; `from_services` always
/// populates them.
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<dyn AuthService>,
    pub clinic_service: Arc<dyn ClinicService>,
    pub staff_service: Arc<dyn StaffService>,
    pub subscription_gate: Arc<dyn SubscriptionGate>,
    pub admin_service: Arc<dyn AdminService>,
    pub patient_service: Arc<dyn PatientService>,
    pub codec: SessionCodec,
    pub cache: Option<Arc<Cache>>,
    pub database: Option<Arc<Database>>,
}

/// The service handles of [`AppState`], grouped so manual construction
/// stays readable.
pub struct StateServices {
    pub auth: Arc<dyn AuthService>,
    pub clinics: Arc<dyn ClinicService>,
    pub staff: Arc<dyn StaffService>,
    pub subscriptions: Arc<dyn SubscriptionGate>,
    pub admin: Arc<dyn AdminService>,
    pub patients: Arc<dyn PatientService>,
}

impl AppState {
    /// Create application state from the service container.
    pub fn from_services(services: &Services, cache: Arc<Cache>, database: Arc<Database>) -> Self {
        Self {
            auth_service: services.auth(),
            clinic_service: services.clinics(),
            staff_service: services.staff(),
            subscription_gate: services.subscriptions(),
            admin_service: services.admin(),
            patient_service: services.patients(),
            codec: services.codec(),
            cache: Some(cache),
            database: Some(database),
        }
    }

    /// Create application state with manually injected services and no
    /// infrastructure handles (handler tests).
    pub fn for_testing(services: StateServices, codec: SessionCodec) -> Self {
        Self {
            auth_service: services.auth,
            clinic_service: services.clinics,
            staff_service: services.staff,
            subscription_gate: services.subscriptions,
            admin_service: services.admin,
            patient_service: services.patients,
            codec,
            cache: None,
            database: None,
        }
    }
}
