//! Subscription and plan repositories.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use super::entities::plan::{self, Entity as PlanEntity};
use super::entities::subscription::{self, ActiveModel, Entity as SubscriptionEntity};
use crate::domain::{Plan, Subscription, SubscriptionStatus};
use crate::errors::{AppError, AppResult};

#[cfg(test)]
use mockall::automock;

/// Partial update of a subscription row.
///
/// `trial_ends_at` is doubly optional: the outer level is "change or not",
/// the inner one allows clearing the trial on upgrade.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionChange {
    pub plan_id: Option<Uuid>,
    pub status: Option<SubscriptionStatus>,
    pub trial_ends_at: Option<Option<DateTime<Utc>>>,
    pub current_period_end: Option<DateTime<Utc>>,
}

/// Subscription repository trait for dependency injection.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// The clinic's subscription, if any (0 or 1 per clinic)
    async fn find_by_clinic(&self, clinic_id: Uuid) -> AppResult<Option<Subscription>>;

    /// Persist a status transition (e.g. the trial-expiry write-through)
    async fn set_status(&self, id: Uuid, status: SubscriptionStatus) -> AppResult<()>;

    /// Apply a partial update and return the fresh row
    async fn update(&self, id: Uuid, change: SubscriptionChange) -> AppResult<Subscription>;

    /// All subscriptions (super-admin aggregation)
    async fn list(&self) -> AppResult<Vec<Subscription>>;
}

/// Plan repository trait for dependency injection.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PlanRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Plan>>;

    async fn find_by_name(&self, name: &str) -> AppResult<Option<Plan>>;

    /// Plans ordered by monthly price ascending
    async fn list(&self) -> AppResult<Vec<Plan>>;
}

/// Concrete subscription store backed by the shared connection pool.
pub struct SubscriptionStore {
    db: DatabaseConnection,
}

impl SubscriptionStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SubscriptionRepository for SubscriptionStore {
    async fn find_by_clinic(&self, clinic_id: Uuid) -> AppResult<Option<Subscription>> {
        find_by_clinic(&self.db, clinic_id).await
    }

    async fn set_status(&self, id: Uuid, status: SubscriptionStatus) -> AppResult<()> {
        let model = SubscriptionEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: ActiveModel = model.into();
        active.status = Set(status.as_str().to_string());
        active.updated_at = Set(Utc::now());

        active.update(&self.db).await.map_err(AppError::from)?;
        Ok(())
    }

    async fn update(&self, id: Uuid, change: SubscriptionChange) -> AppResult<Subscription> {
        update(&self.db, id, change).await
    }

    async fn list(&self) -> AppResult<Vec<Subscription>> {
        let models = SubscriptionEntity::find()
            .all(&self.db)
            .await
            .map_err(AppError::from)?;

        models
            .into_iter()
            .map(|m| Subscription::try_from(m).map_err(AppError::from))
            .collect()
    }
}

/// Concrete plan store backed by the shared connection pool.
pub struct PlanStore {
    db: DatabaseConnection,
}

impl PlanStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PlanRepository for PlanStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Plan>> {
        let result = PlanEntity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(result.map(Plan::from))
    }

    async fn find_by_name(&self, name: &str) -> AppResult<Option<Plan>> {
        find_plan_by_name(&self.db, name).await
    }

    async fn list(&self) -> AppResult<Vec<Plan>> {
        let models = PlanEntity::find()
            .order_by_asc(plan::Column::PriceMonthly)
            .all(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(models.into_iter().map(Plan::from).collect())
    }
}

// Queries shared with the transaction-scoped repository.

pub(crate) async fn find_by_clinic<C: ConnectionTrait>(
    conn: &C,
    clinic_id: Uuid,
) -> AppResult<Option<Subscription>> {
    let model = SubscriptionEntity::find()
        .filter(subscription::Column::ClinicId.eq(clinic_id))
        .one(conn)
        .await
        .map_err(AppError::from)?;

    model
        .map(|m| Subscription::try_from(m).map_err(AppError::from))
        .transpose()
}

pub(crate) async fn create<C: ConnectionTrait>(
    conn: &C,
    clinic_id: Uuid,
    plan_id: Uuid,
    status: SubscriptionStatus,
    trial_ends_at: Option<DateTime<Utc>>,
    period_end: DateTime<Utc>,
) -> AppResult<Subscription> {
    let now = Utc::now();
    let active_model = ActiveModel {
        id: Set(Uuid::new_v4()),
        clinic_id: Set(clinic_id),
        plan_id: Set(plan_id),
        status: Set(status.as_str().to_string()),
        trial_ends_at: Set(trial_ends_at),
        current_period_start: Set(now),
        current_period_end: Set(period_end),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let model = active_model.insert(conn).await.map_err(AppError::from)?;
    Subscription::try_from(model).map_err(AppError::from)
}

pub(crate) async fn update<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    change: SubscriptionChange,
) -> AppResult<Subscription> {
    let model = SubscriptionEntity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ActiveModel = model.into();
    if let Some(plan_id) = change.plan_id {
        active.plan_id = Set(plan_id);
    }
    if let Some(status) = change.status {
        active.status = Set(status.as_str().to_string());
    }
    if let Some(trial_ends_at) = change.trial_ends_at {
        active.trial_ends_at = Set(trial_ends_at);
    }
    if let Some(period_end) = change.current_period_end {
        active.current_period_end = Set(period_end);
    }
    active.updated_at = Set(Utc::now());

    let model = active.update(conn).await.map_err(AppError::from)?;
    Subscription::try_from(model).map_err(AppError::from)
}

pub(crate) async fn find_plan_by_name<C: ConnectionTrait>(
    conn: &C,
    name: &str,
) -> AppResult<Option<Plan>> {
    let result = PlanEntity::find()
        .filter(plan::Column::Name.eq(name))
        .one(conn)
        .await
        .map_err(AppError::from)?;

    Ok(result.map(Plan::from))
}

pub(crate) async fn find_plan_by_id<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> AppResult<Option<Plan>> {
    let result = PlanEntity::find_by_id(id)
        .one(conn)
        .await
        .map_err(AppError::from)?;

    Ok(result.map(Plan::from))
}
