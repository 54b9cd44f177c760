//! Application services - use cases behind dependency-injection traits.

mod admin_service;
mod auth_service;
mod clinic_service;
mod container;
mod patient_service;
mod projector;
mod session;
mod staff_service;
mod subscription_service;

pub use admin_service::{
    AdminClinic, AdminManager, AdminService, AdminStaffEntry, AdminUser, AdminUserClinic,
};
pub use auth_service::{
    AcceptInviteOutcome, AuthService, AuthSession, Authenticator, SignupOutcome,
};
pub use clinic_service::{ClinicManager, ClinicService, SwitchOutcome};
pub use container::Services;
pub use patient_service::{PatientManager, PatientService};
pub use projector::{ClinicRoleProjector, Projector};
pub use session::{Claims, SessionCodec, SessionToken};
pub use staff_service::{
    AddedStaff, CreatedInvite, InviteSummary, StaffManager, StaffMember, StaffService, StaffUpdate,
};
pub use subscription_service::{
    BillingCycle, PlanSummary, SubscriptionGate, SubscriptionManager, SubscriptionOverview,
};
