//! Clinic-role projection.
//!
//! Aggregates a user's clinic/role association rows into a per-clinic role
//! map. This is the single place that logic lives; login, `/auth/me` and
//! clinic switching all go through it.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Serialize;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

use super::role::RoleName;

/// One association row as read from the store (joined with the clinic name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationRow {
    pub clinic_id: Uuid,
    pub clinic_name: String,
    pub role: RoleName,
}

/// A user's membership in one clinic, with the collapsed role set.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, utoipa::ToSchema)]
pub struct ClinicMembership {
    pub clinic_id: Uuid,
    pub clinic_name: String,
    pub roles: BTreeSet<RoleName>,
}

/// The projected view of all of a user's clinic memberships.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClinicRoleMap {
    clinics: BTreeMap<Uuid, ClinicMembership>,
    is_super_admin: bool,
}

impl ClinicRoleMap {
    /// Group association rows by clinic, collapsing duplicate roles into a
    /// set. The super-admin flag is user-global: any SUPER_ADMIN row anywhere
    /// sets it, independent of which clinic is active.
    ///
    /// An empty projection is a hard business error: sessions must never be
    /// issued without a clinic association.
    pub fn project(rows: Vec<AssociationRow>) -> AppResult<Self> {
        if rows.is_empty() {
            return Err(AppError::NoClinicAssociation);
        }

        let mut clinics: BTreeMap<Uuid, ClinicMembership> = BTreeMap::new();
        let mut is_super_admin = false;

        for row in rows {
            if row.role == RoleName::SuperAdmin {
                is_super_admin = true;
            }
            clinics
                .entry(row.clinic_id)
                .or_insert_with(|| ClinicMembership {
                    clinic_id: row.clinic_id,
                    clinic_name: row.clinic_name.clone(),
                    roles: BTreeSet::new(),
                })
                .roles
                .insert(row.role);
        }

        Ok(Self {
            clinics,
            is_super_admin,
        })
    }

    pub fn is_super_admin(&self) -> bool {
        self.is_super_admin
    }

    /// Memberships in stable (clinic-id) order.
    pub fn memberships(&self) -> Vec<ClinicMembership> {
        self.clinics.values().cloned().collect()
    }

    pub fn get(&self, clinic_id: Uuid) -> Option<&ClinicMembership> {
        self.clinics.get(&clinic_id)
    }

    /// Pick the default clinic for a fresh login: any clinic that is not the
    /// reserved System clinic, else the first in stable order.
    pub fn default_clinic(&self, system_clinic_id: Uuid) -> &ClinicMembership {
        self.clinics
            .values()
            .find(|m| m.clinic_id != system_clinic_id)
            .unwrap_or_else(|| {
                self.clinics
                    .values()
                    .next()
                    .expect("projection is never empty")
            })
    }

    /// The role set to embed in a session token for the given clinic:
    /// the clinic's own roles, with SUPER_ADMIN appended when the user holds
    /// it anywhere. The capability follows the user, not the clinic row.
    pub fn session_roles(&self, membership: &ClinicMembership) -> BTreeSet<RoleName> {
        let mut roles = membership.roles.clone();
        if self.is_super_admin {
            roles.insert(RoleName::SuperAdmin);
        }
        roles
    }
}
