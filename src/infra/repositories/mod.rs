//! Repository traits and SeaORM-backed stores.

pub mod entities;

mod clinic_repository;
mod clinic_role_repository;
mod invite_repository;
mod patient_repository;
mod subscription_repository;
mod user_repository;

pub use clinic_repository::{ClinicRepository, ClinicStore};
pub use clinic_role_repository::{
    ClinicRoleRepository, ClinicRoleStore, GlobalAssociation, StaffAssociation,
};
pub use invite_repository::{InviteRepository, InviteStore, NewInvite};
pub use patient_repository::{PatientRepository, PatientStore};
pub use subscription_repository::{
    PlanRepository, PlanStore, SubscriptionChange, SubscriptionRepository, SubscriptionStore,
};
pub use user_repository::{UserProfileUpdate, UserRepository, UserStore};

#[cfg(test)]
pub use clinic_repository::MockClinicRepository;
#[cfg(test)]
pub use clinic_role_repository::MockClinicRoleRepository;
#[cfg(test)]
pub use invite_repository::MockInviteRepository;
#[cfg(test)]
pub use patient_repository::MockPatientRepository;
#[cfg(test)]
pub use subscription_repository::{MockPlanRepository, MockSubscriptionRepository};
#[cfg(test)]
pub use user_repository::MockUserRepository;

// Shared query functions used by the transaction-scoped repositories.
pub(crate) use clinic_repository::create as create_clinic;
pub(crate) use clinic_role_repository::{
    count_doctors as tx_count_doctors, count_staff as tx_count_staff,
    delete_primary_roles as tx_delete_primary_roles, delete_role as tx_delete_role,
    find_by_user as tx_find_associations, roles_in_clinic as tx_roles_in_clinic,
    upsert as tx_upsert_role,
};
pub(crate) use invite_repository::{find_unaccepted_by_hash, mark_accepted};
pub(crate) use subscription_repository::{
    create as create_subscription, find_by_clinic as tx_find_subscription,
    find_plan_by_id as tx_find_plan_by_id, find_plan_by_name as tx_find_plan_by_name,
    update as tx_update_subscription,
};
pub(crate) use user_repository::{
    create as create_user, find_by_email as tx_find_user_by_email, find_by_id as tx_find_user_by_id,
};
