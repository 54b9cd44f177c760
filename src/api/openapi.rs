//! OpenAPI documentation configuration.
//!
//! Provides Swagger UI for API exploration and testing.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::handlers::{
    auth_handler, billing_handler, clinic_handler, patient_handler, superadmin_handler,
};
use crate::domain::{
    ClinicMembership, ClinicResponse, PatientSummary, RoleName, SeatUsage, SubscriptionStatus,
    UserResponse,
};
use crate::services::{
    AcceptInviteOutcome, AddedStaff, AdminClinic, AdminStaffEntry, AdminUser, AdminUserClinic,
    AuthSession, BillingCycle, CreatedInvite, InviteSummary, PlanSummary, SessionToken,
    SignupOutcome, StaffMember, SubscriptionOverview, SwitchOutcome,
};
use crate::types::MessageResponse;

/// OpenAPI documentation for the clinic management API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Clinic Management API",
        version = "0.1.0",
        description = "Multi-tenant clinic management with role-based access control and subscription gating",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    paths(
        // Authentication
        auth_handler::signup,
        auth_handler::login,
        auth_handler::me,
        auth_handler::logout,
        auth_handler::verify_email,
        auth_handler::resend_verification,
        auth_handler::accept_invite,
        // Clinics & staff
        clinic_handler::switch_clinic,
        clinic_handler::get_clinic,
        clinic_handler::update_clinic,
        clinic_handler::create_invite,
        clinic_handler::list_invites,
        clinic_handler::add_staff,
        clinic_handler::list_staff,
        clinic_handler::update_staff,
        clinic_handler::remove_staff,
        clinic_handler::reset_password,
        // Billing
        billing_handler::get_subscription,
        billing_handler::list_plans,
        billing_handler::upgrade,
        billing_handler::downgrade,
        billing_handler::cancel,
        // Super admin
        superadmin_handler::list_clinics,
        superadmin_handler::update_clinic,
        superadmin_handler::delete_clinic,
        superadmin_handler::list_users,
        superadmin_handler::delete_user,
        // Patients
        patient_handler::list_patients,
        patient_handler::create_patient,
        patient_handler::patient_history,
        patient_handler::update_patient,
        patient_handler::delete_patient,
    ),
    components(
        schemas(
            // Domain types
            RoleName,
            SubscriptionStatus,
            SeatUsage,
            UserResponse,
            ClinicResponse,
            ClinicMembership,
            PatientSummary,
            // Session & auth types
            SessionToken,
            AuthSession,
            SignupOutcome,
            AcceptInviteOutcome,
            SwitchOutcome,
            auth_handler::SignupRequest,
            auth_handler::LoginRequest,
            auth_handler::ResendVerificationRequest,
            auth_handler::AcceptInviteRequest,
            // Staff types
            CreatedInvite,
            InviteSummary,
            StaffMember,
            AddedStaff,
            clinic_handler::CreateInviteRequest,
            clinic_handler::AddStaffRequest,
            clinic_handler::UpdateStaffRequest,
            clinic_handler::UpdateClinicRequest,
            clinic_handler::SwitchClinicRequest,
            // Billing types
            BillingCycle,
            PlanSummary,
            SubscriptionOverview,
            billing_handler::UpgradeRequest,
            billing_handler::DowngradeRequest,
            // Super admin types
            AdminClinic,
            AdminStaffEntry,
            AdminUser,
            AdminUserClinic,
            // Patient types
            patient_handler::CreatePatientRequest,
            patient_handler::UpdatePatientRequest,
            // Shared
            MessageResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Signup, login and session management"),
        (name = "Clinics", description = "Tenant management and clinic switching"),
        (name = "Staff", description = "Invitations and staff management"),
        (name = "Billing", description = "Subscription and plan management"),
        (name = "Super Admin", description = "Cross-tenant administration"),
        (name = "Patients", description = "Clinic-scoped patient records")
    )
)]
pub struct ApiDoc;

/// Security scheme modifier for JWT Bearer authentication
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Session token obtained from /auth/login"))
                        .build(),
                ),
            );
        }
    }
}
