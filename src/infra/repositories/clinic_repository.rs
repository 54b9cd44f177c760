//! Clinic repository.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use super::entities::clinic::{self, ActiveModel, Entity as ClinicEntity};
use crate::domain::{Clinic, ClinicUpdate};
use crate::errors::{AppError, AppResult};

#[cfg(test)]
use mockall::automock;

/// Clinic repository trait for dependency injection.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClinicRepository: Send + Sync {
    /// Find clinic by ID
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Clinic>>;

    /// Find clinic by exact name
    async fn find_by_name(&self, name: &str) -> AppResult<Option<Clinic>>;

    /// Create a clinic
    async fn create(&self, name: String) -> AppResult<Clinic>;

    /// List all clinics
    async fn list(&self) -> AppResult<Vec<Clinic>>;

    /// Update clinic contact fields
    async fn update(&self, id: Uuid, update: ClinicUpdate) -> AppResult<Clinic>;

    /// Delete a clinic (super-admin only path)
    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

/// Concrete implementation backed by the shared connection pool.
pub struct ClinicStore {
    db: DatabaseConnection,
}

impl ClinicStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ClinicRepository for ClinicStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Clinic>> {
        let result = ClinicEntity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(result.map(Clinic::from))
    }

    async fn find_by_name(&self, name: &str) -> AppResult<Option<Clinic>> {
        let result = ClinicEntity::find()
            .filter(clinic::Column::Name.eq(name))
            .one(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(result.map(Clinic::from))
    }

    async fn create(&self, name: String) -> AppResult<Clinic> {
        create(&self.db, name).await
    }

    async fn list(&self) -> AppResult<Vec<Clinic>> {
        let models = ClinicEntity::find()
            .order_by_asc(clinic::Column::Name)
            .all(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(models.into_iter().map(Clinic::from).collect())
    }

    async fn update(&self, id: Uuid, update: ClinicUpdate) -> AppResult<Clinic> {
        let model = ClinicEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: ActiveModel = model.into();
        if let Some(name) = update.name {
            active.name = Set(name);
        }
        if let Some(address) = update.address {
            active.address = Set(Some(address));
        }
        if let Some(phone) = update.phone {
            active.phone = Set(Some(phone));
        }
        if let Some(email) = update.email {
            active.email = Set(Some(email));
        }
        active.updated_at = Set(Utc::now());

        let model = active.update(&self.db).await.map_err(AppError::from)?;
        Ok(Clinic::from(model))
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = ClinicEntity::delete_by_id(id)
            .exec(&self.db)
            .await
            .map_err(AppError::from)?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }

        Ok(())
    }
}

// Queries shared with the transaction-scoped repository.

pub(crate) async fn create<C: ConnectionTrait>(conn: &C, name: String) -> AppResult<Clinic> {
    let now = Utc::now();
    let active_model = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        address: Set(None),
        phone: Set(None),
        email: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let model = active_model.insert(conn).await.map_err(AppError::from)?;
    Ok(Clinic::from(model))
}
