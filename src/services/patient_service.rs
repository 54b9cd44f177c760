//! Patient service. Thin clinic-scoped CRUD behind the subscription gate;
//! the gate calls happen in the handlers, this service only touches the
//! store.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{NewPatient, Patient, PatientSummary, PatientUpdate};
use crate::errors::{AppError, AppResult};
use crate::infra::UnitOfWork;

/// Patient service trait for dependency injection.
#[async_trait]
pub trait PatientService: Send + Sync {
    async fn list(&self, clinic_id: Uuid) -> AppResult<Vec<PatientSummary>>;

    async fn create(&self, new_patient: NewPatient) -> AppResult<Patient>;

    /// The full record including clinical notes (feature-gated upstream).
    async fn history(&self, id: Uuid, clinic_id: Uuid) -> AppResult<Patient>;

    async fn update(&self, id: Uuid, clinic_id: Uuid, update: PatientUpdate)
        -> AppResult<Patient>;

    async fn delete(&self, id: Uuid, clinic_id: Uuid) -> AppResult<()>;
}

/// Concrete implementation of PatientService using the Unit of Work.
pub struct PatientManager<U: UnitOfWork> {
    uow: Arc<U>,
}

impl<U: UnitOfWork> PatientManager<U> {
    pub fn new(uow: Arc<U>) -> Self {
        Self { uow }
    }
}

#[async_trait]
impl<U: UnitOfWork> PatientService for PatientManager<U> {
    async fn list(&self, clinic_id: Uuid) -> AppResult<Vec<PatientSummary>> {
        let patients = self.uow.patients().list_by_clinic(clinic_id).await?;
        Ok(patients.iter().map(PatientSummary::from).collect())
    }

    async fn create(&self, new_patient: NewPatient) -> AppResult<Patient> {
        self.uow.patients().create(new_patient).await
    }

    async fn history(&self, id: Uuid, clinic_id: Uuid) -> AppResult<Patient> {
        self.uow
            .patients()
            .find_in_clinic(id, clinic_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn update(
        &self,
        id: Uuid,
        clinic_id: Uuid,
        update: PatientUpdate,
    ) -> AppResult<Patient> {
        self.uow.patients().update(id, clinic_id, update).await
    }

    async fn delete(&self, id: Uuid, clinic_id: Uuid) -> AppResult<()> {
        self.uow.patients().delete(id, clinic_id).await
    }
}
