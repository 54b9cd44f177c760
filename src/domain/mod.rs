//! Core business entities and logic.
//!
//! Everything in this module is persistence- and transport-agnostic; the
//! pure pieces of the authorization core (role enum, principal checks,
//! clinic-role projection, subscription state machine) live here.

mod clinic;
mod invite;
mod password;
mod patient;
mod principal;
mod projection;
mod role;
mod subscription;
mod user;

pub use clinic::{Clinic, ClinicResponse, ClinicUpdate};
pub use invite::{generate_token, hash_token, Invite};
pub use password::{Password, DUMMY_HASH};
pub use patient::{NewPatient, Patient, PatientSummary, PatientUpdate};
pub use principal::{
    authorize, check, require_any_role, require_super_admin, Principal, Requirement,
};
pub use projection::{AssociationRow, ClinicMembership, ClinicRoleMap};
pub use role::{RoleName, UnknownRole};
pub use subscription::{
    downgrade_violation, seat_check, Plan, SeatKind, SeatUsage, SeatViolation, Subscription,
    SubscriptionStatus,
};
pub use user::{NewUser, User, UserResponse};
