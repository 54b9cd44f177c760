//! Clinic domain entity.
//!
//! A clinic is the tenant boundary: staff, patients and the subscription all
//! hang off one clinic. One reserved clinic ("System") holds super-admin
//! associations and is never a real tenant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Clinic domain entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clinic {
    pub id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update of clinic contact fields.
#[derive(Debug, Clone, Default)]
pub struct ClinicUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl ClinicUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.address.is_none()
            && self.phone.is_none()
            && self.email.is_none()
    }
}

/// Clinic response (safe to return to client)
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ClinicResponse {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl From<&Clinic> for ClinicResponse {
    fn from(clinic: &Clinic) -> Self {
        Self {
            id: clinic.id,
            name: clinic.name.clone(),
            address: clinic.address.clone(),
            phone: clinic.phone.clone(),
            email: clinic.email.clone(),
        }
    }
}

impl From<Clinic> for ClinicResponse {
    fn from(clinic: Clinic) -> Self {
        ClinicResponse::from(&clinic)
    }
}
