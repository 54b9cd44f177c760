//! Authenticated principal and the authorization engine.
//!
//! A `Principal` is materialized per-request from the session token: the
//! user, the active clinic context, and the role set the token was issued
//! with. Authorization trusts the token's roles for the token's lifetime;
//! role-refreshing endpoints re-derive them from the store.

use std::collections::BTreeSet;

use uuid::Uuid;

use crate::errors::{AppError, AppResult};

use super::role::RoleName;

/// The authenticated identity + clinic context + role set for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    /// Active clinic context. Absent only in malformed or legacy tokens;
    /// requirements that need it treat absence as a deny.
    pub clinic_id: Option<Uuid>,
    pub roles: BTreeSet<RoleName>,
}

impl Principal {
    pub fn new(user_id: Uuid, clinic_id: Uuid, roles: impl IntoIterator<Item = RoleName>) -> Self {
        Self {
            user_id,
            clinic_id: Some(clinic_id),
            roles: roles.into_iter().collect(),
        }
    }

    pub fn has_role(&self, role: RoleName) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_super_admin(&self) -> bool {
        self.has_role(RoleName::SuperAdmin)
    }

    /// The active clinic, or a deny when the token carried none.
    pub fn require_clinic(&self) -> AppResult<Uuid> {
        self.clinic_id.ok_or(AppError::NoClinicContext)
    }

    fn held(&self) -> Vec<RoleName> {
        self.roles.iter().copied().collect()
    }
}

/// A single authorization requirement declared by a route handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// Allow iff the principal holds at least one of these roles
    /// (or SUPER_ADMIN, which blanket-allows role checks).
    AnyOf(BTreeSet<RoleName>),
    /// Allow iff the principal holds SUPER_ADMIN.
    SuperAdminOnly,
    /// Allow iff the token carries an active clinic context.
    ClinicContextPresent,
}

impl Requirement {
    /// Convenience constructor for role-set requirements.
    pub fn any_of(roles: impl IntoIterator<Item = RoleName>) -> Self {
        Requirement::AnyOf(roles.into_iter().collect())
    }
}

/// Evaluate one requirement against a principal.
///
/// Denials carry the required and held role sets; roles are already visible
/// to the authenticated user, so the transparency costs nothing.
pub fn check(principal: &Principal, requirement: &Requirement) -> AppResult<()> {
    match requirement {
        Requirement::AnyOf(required) => {
            if principal.is_super_admin() || required.iter().any(|r| principal.has_role(*r)) {
                Ok(())
            } else {
                Err(AppError::Forbidden {
                    required: required.iter().copied().collect(),
                    held: principal.held(),
                })
            }
        }
        Requirement::SuperAdminOnly => {
            if principal.is_super_admin() {
                Ok(())
            } else {
                Err(AppError::SuperAdminRequired {
                    held: principal.held(),
                })
            }
        }
        Requirement::ClinicContextPresent => principal.require_clinic().map(|_| ()),
    }
}

/// Evaluate an ordered list of requirements; all must pass (logical AND).
pub fn authorize(principal: &Principal, requirements: &[Requirement]) -> AppResult<()> {
    for requirement in requirements {
        check(principal, requirement)?;
    }
    Ok(())
}

/// Require membership in at least one of the given roles.
pub fn require_any_role(principal: &Principal, roles: &[RoleName]) -> AppResult<()> {
    check(principal, &Requirement::any_of(roles.iter().copied()))
}

/// Require the SUPER_ADMIN capability.
pub fn require_super_admin(principal: &Principal) -> AppResult<()> {
    check(principal, &Requirement::SuperAdminOnly)
}
