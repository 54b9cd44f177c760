//! HTTP route handlers.

pub mod auth_handler;
pub mod billing_handler;
pub mod clinic_handler;
pub mod patient_handler;
pub mod superadmin_handler;

pub use auth_handler::auth_routes;
pub use billing_handler::{billing_routes, plan_routes};
pub use clinic_handler::clinic_routes;
pub use patient_handler::patient_routes;
pub use superadmin_handler::superadmin_routes;

use uuid::Uuid;

use crate::domain::Principal;
use crate::errors::{AppError, AppResult};

/// Require that the path clinic matches the principal's active clinic.
///
/// A super admin may operate on any clinic; everyone else must have switched
/// into the clinic they are mutating.
pub(crate) fn require_clinic_scope(principal: &Principal, clinic_id: Uuid) -> AppResult<()> {
    if principal.is_super_admin() {
        return Ok(());
    }
    if principal.require_clinic()? == clinic_id {
        Ok(())
    } else {
        Err(AppError::ClinicAccessDenied)
    }
}
