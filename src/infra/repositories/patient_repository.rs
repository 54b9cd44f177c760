//! Patient repository. Thin clinic-scoped CRUD.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use super::entities::patient::{self, ActiveModel, Entity as PatientEntity};
use crate::domain::{NewPatient, Patient, PatientUpdate};
use crate::errors::{AppError, AppResult};

#[cfg(test)]
use mockall::automock;

/// Patient repository trait for dependency injection.
///
/// Every method is clinic-scoped; a patient id from another clinic behaves
/// exactly like a missing row.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PatientRepository: Send + Sync {
    async fn list_by_clinic(&self, clinic_id: Uuid) -> AppResult<Vec<Patient>>;

    async fn find_in_clinic(&self, id: Uuid, clinic_id: Uuid) -> AppResult<Option<Patient>>;

    async fn create(&self, new_patient: NewPatient) -> AppResult<Patient>;

    async fn update(&self, id: Uuid, clinic_id: Uuid, update: PatientUpdate)
        -> AppResult<Patient>;

    async fn delete(&self, id: Uuid, clinic_id: Uuid) -> AppResult<()>;
}

/// Concrete implementation backed by the shared connection pool.
pub struct PatientStore {
    db: DatabaseConnection,
}

impl PatientStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PatientRepository for PatientStore {
    async fn list_by_clinic(&self, clinic_id: Uuid) -> AppResult<Vec<Patient>> {
        let models = PatientEntity::find()
            .filter(patient::Column::ClinicId.eq(clinic_id))
            .order_by_asc(patient::Column::FullName)
            .all(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(models.into_iter().map(Patient::from).collect())
    }

    async fn find_in_clinic(&self, id: Uuid, clinic_id: Uuid) -> AppResult<Option<Patient>> {
        let model = PatientEntity::find_by_id(id)
            .filter(patient::Column::ClinicId.eq(clinic_id))
            .one(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(model.map(Patient::from))
    }

    async fn create(&self, new_patient: NewPatient) -> AppResult<Patient> {
        let now = Utc::now();
        let active_model = ActiveModel {
            id: Set(Uuid::new_v4()),
            clinic_id: Set(new_patient.clinic_id),
            full_name: Set(new_patient.full_name),
            phone: Set(new_patient.phone),
            email: Set(new_patient.email),
            date_of_birth: Set(new_patient.date_of_birth),
            notes: Set(new_patient.notes),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let model = active_model.insert(&self.db).await.map_err(AppError::from)?;
        Ok(Patient::from(model))
    }

    async fn update(
        &self,
        id: Uuid,
        clinic_id: Uuid,
        update: PatientUpdate,
    ) -> AppResult<Patient> {
        let model = PatientEntity::find_by_id(id)
            .filter(patient::Column::ClinicId.eq(clinic_id))
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: ActiveModel = model.into();
        if let Some(full_name) = update.full_name {
            active.full_name = Set(full_name);
        }
        if let Some(phone) = update.phone {
            active.phone = Set(Some(phone));
        }
        if let Some(email) = update.email {
            active.email = Set(Some(email));
        }
        if let Some(date_of_birth) = update.date_of_birth {
            active.date_of_birth = Set(Some(date_of_birth));
        }
        if let Some(notes) = update.notes {
            active.notes = Set(Some(notes));
        }
        active.updated_at = Set(Utc::now());

        let model = active.update(&self.db).await.map_err(AppError::from)?;
        Ok(Patient::from(model))
    }

    async fn delete(&self, id: Uuid, clinic_id: Uuid) -> AppResult<()> {
        let result = PatientEntity::delete_many()
            .filter(patient::Column::Id.eq(id))
            .filter(patient::Column::ClinicId.eq(clinic_id))
            .exec(&self.db)
            .await
            .map_err(AppError::from)?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }

        Ok(())
    }
}
