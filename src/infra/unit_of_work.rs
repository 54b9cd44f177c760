//! Unit of Work pattern implementation.
//!
//! Centralizes repository access and transaction lifecycle. Multi-row
//! invariants (signup, invite acceptance, seat-checked staff creation,
//! fail-closed downgrades) run their reads and writes through one
//! [`TransactionContext`], so a mid-sequence failure leaves no orphaned rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    AccessMode, DatabaseConnection, DatabaseTransaction, IsolationLevel, TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

use super::repositories::{
    self, ClinicRepository, ClinicRoleRepository, ClinicRoleStore, ClinicStore, InviteRepository,
    InviteStore, PatientRepository, PatientStore, PlanRepository, PlanStore,
    SubscriptionChange, SubscriptionRepository, SubscriptionStore, UserRepository, UserStore,
};
use crate::domain::{
    AssociationRow, Clinic, Invite, NewUser, Plan, RoleName, Subscription, SubscriptionStatus,
    User,
};
use crate::errors::{AppError, AppResult};

/// Unit of Work trait for dependency injection.
///
/// Note: the transaction methods are generic and therefore not mockable
/// directly; tests mock the individual repositories and exercise the pure
/// decision functions instead.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    fn users(&self) -> Arc<dyn UserRepository>;

    fn clinics(&self) -> Arc<dyn ClinicRepository>;

    fn clinic_roles(&self) -> Arc<dyn ClinicRoleRepository>;

    fn invites(&self) -> Arc<dyn InviteRepository>;

    fn subscriptions(&self) -> Arc<dyn SubscriptionRepository>;

    fn plans(&self) -> Arc<dyn PlanRepository>;

    fn patients(&self) -> Arc<dyn PatientRepository>;

    /// Execute a closure within a transaction.
    ///
    /// The transaction is committed on success and rolled back on error.
    /// ReadCommitted isolation by default.
    async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(
                TransactionContext<'a>,
            ) -> std::pin::Pin<
                Box<dyn std::future::Future<Output = AppResult<T>> + Send + 'a>,
            > + Send,
        T: Send;

    /// Execute a closure within a serializable transaction. Used where a
    /// concurrent writer could invalidate a check-then-act sequence.
    async fn transaction_serializable<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(
                TransactionContext<'a>,
            ) -> std::pin::Pin<
                Box<dyn std::future::Future<Output = AppResult<T>> + Send + 'a>,
            > + Send,
        T: Send;
}

/// Repository access within one open transaction.
pub struct TransactionContext<'a> {
    txn: &'a DatabaseTransaction,
}

impl<'a> TransactionContext<'a> {
    fn new(txn: &'a DatabaseTransaction) -> Self {
        Self { txn }
    }

    pub fn users(&self) -> TxUserRepository<'_> {
        TxUserRepository { txn: self.txn }
    }

    pub fn clinics(&self) -> TxClinicRepository<'_> {
        TxClinicRepository { txn: self.txn }
    }

    pub fn clinic_roles(&self) -> TxClinicRoleRepository<'_> {
        TxClinicRoleRepository { txn: self.txn }
    }

    pub fn invites(&self) -> TxInviteRepository<'_> {
        TxInviteRepository { txn: self.txn }
    }

    pub fn subscriptions(&self) -> TxSubscriptionRepository<'_> {
        TxSubscriptionRepository { txn: self.txn }
    }

    pub fn plans(&self) -> TxPlanRepository<'_> {
        TxPlanRepository { txn: self.txn }
    }
}

/// Concrete implementation of UnitOfWork
pub struct Persistence {
    db: DatabaseConnection,
    users: Arc<UserStore>,
    clinics: Arc<ClinicStore>,
    clinic_roles: Arc<ClinicRoleStore>,
    invites: Arc<InviteStore>,
    subscriptions: Arc<SubscriptionStore>,
    plans: Arc<PlanStore>,
    patients: Arc<PatientStore>,
}

impl Persistence {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            users: Arc::new(UserStore::new(db.clone())),
            clinics: Arc::new(ClinicStore::new(db.clone())),
            clinic_roles: Arc::new(ClinicRoleStore::new(db.clone())),
            invites: Arc::new(InviteStore::new(db.clone())),
            subscriptions: Arc::new(SubscriptionStore::new(db.clone())),
            plans: Arc::new(PlanStore::new(db.clone())),
            patients: Arc::new(PatientStore::new(db.clone())),
            db,
        }
    }

    async fn execute_transaction<F, T>(&self, isolation: IsolationLevel, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(
                TransactionContext<'a>,
            ) -> std::pin::Pin<
                Box<dyn std::future::Future<Output = AppResult<T>> + Send + 'a>,
            > + Send,
        T: Send,
    {
        let txn = self
            .db
            .begin_with_config(Some(isolation), Some(AccessMode::ReadWrite))
            .await
            .map_err(AppError::from)?;

        let ctx = TransactionContext::new(&txn);

        match f(ctx).await {
            Ok(result) => {
                txn.commit().await.map_err(AppError::from)?;
                Ok(result)
            }
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    tracing::error!("Transaction rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }
}

#[async_trait]
impl UnitOfWork for Persistence {
    fn users(&self) -> Arc<dyn UserRepository> {
        self.users.clone()
    }

    fn clinics(&self) -> Arc<dyn ClinicRepository> {
        self.clinics.clone()
    }

    fn clinic_roles(&self) -> Arc<dyn ClinicRoleRepository> {
        self.clinic_roles.clone()
    }

    fn invites(&self) -> Arc<dyn InviteRepository> {
        self.invites.clone()
    }

    fn subscriptions(&self) -> Arc<dyn SubscriptionRepository> {
        self.subscriptions.clone()
    }

    fn plans(&self) -> Arc<dyn PlanRepository> {
        self.plans.clone()
    }

    fn patients(&self) -> Arc<dyn PatientRepository> {
        self.patients.clone()
    }

    async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(
                TransactionContext<'a>,
            ) -> std::pin::Pin<
                Box<dyn std::future::Future<Output = AppResult<T>> + Send + 'a>,
            > + Send,
        T: Send,
    {
        self.execute_transaction(IsolationLevel::ReadCommitted, f)
            .await
    }

    async fn transaction_serializable<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(
                TransactionContext<'a>,
            ) -> std::pin::Pin<
                Box<dyn std::future::Future<Output = AppResult<T>> + Send + 'a>,
            > + Send,
        T: Send,
    {
        self.execute_transaction(IsolationLevel::Serializable, f)
            .await
    }
}

// =============================================================================
// Transaction-scoped repositories
// =============================================================================
//
// These expose only what the multi-row flows need; single-row operations go
// through the pooled stores.

/// Transaction-aware user repository.
pub struct TxUserRepository<'a> {
    txn: &'a DatabaseTransaction,
}

impl<'a> TxUserRepository<'a> {
    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        repositories::tx_find_user_by_id(self.txn, id).await
    }

    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        repositories::tx_find_user_by_email(self.txn, email).await
    }

    pub async fn create(&self, new_user: NewUser) -> AppResult<User> {
        repositories::create_user(self.txn, new_user).await
    }
}

/// Transaction-aware clinic repository.
pub struct TxClinicRepository<'a> {
    txn: &'a DatabaseTransaction,
}

impl<'a> TxClinicRepository<'a> {
    pub async fn create(&self, name: String) -> AppResult<Clinic> {
        repositories::create_clinic(self.txn, name).await
    }
}

/// Transaction-aware association repository.
pub struct TxClinicRoleRepository<'a> {
    txn: &'a DatabaseTransaction,
}

impl<'a> TxClinicRoleRepository<'a> {
    pub async fn find_by_user(&self, user_id: Uuid) -> AppResult<Vec<AssociationRow>> {
        repositories::tx_find_associations(self.txn, user_id).await
    }

    pub async fn roles_in_clinic(
        &self,
        user_id: Uuid,
        clinic_id: Uuid,
    ) -> AppResult<Vec<RoleName>> {
        repositories::tx_roles_in_clinic(self.txn, user_id, clinic_id).await
    }

    pub async fn count_doctors(&self, clinic_id: Uuid) -> AppResult<u64> {
        repositories::tx_count_doctors(self.txn, clinic_id).await
    }

    pub async fn count_staff(&self, clinic_id: Uuid) -> AppResult<u64> {
        repositories::tx_count_staff(self.txn, clinic_id).await
    }

    pub async fn upsert(&self, user_id: Uuid, clinic_id: Uuid, role: RoleName) -> AppResult<()> {
        repositories::tx_upsert_role(self.txn, user_id, clinic_id, role).await
    }

    pub async fn delete_role(
        &self,
        user_id: Uuid,
        clinic_id: Uuid,
        role: RoleName,
    ) -> AppResult<()> {
        repositories::tx_delete_role(self.txn, user_id, clinic_id, role).await
    }

    pub async fn delete_primary_roles(&self, user_id: Uuid, clinic_id: Uuid) -> AppResult<()> {
        repositories::tx_delete_primary_roles(self.txn, user_id, clinic_id).await
    }
}

/// Transaction-aware invite repository.
pub struct TxInviteRepository<'a> {
    txn: &'a DatabaseTransaction,
}

impl<'a> TxInviteRepository<'a> {
    pub async fn find_unaccepted_by_hash(&self, token_hash: &str) -> AppResult<Option<Invite>> {
        repositories::find_unaccepted_by_hash(self.txn, token_hash).await
    }

    pub async fn mark_accepted(&self, id: Uuid) -> AppResult<()> {
        repositories::mark_accepted(self.txn, id).await
    }
}

/// Transaction-aware subscription repository.
pub struct TxSubscriptionRepository<'a> {
    txn: &'a DatabaseTransaction,
}

impl<'a> TxSubscriptionRepository<'a> {
    pub async fn find_by_clinic(&self, clinic_id: Uuid) -> AppResult<Option<Subscription>> {
        repositories::tx_find_subscription(self.txn, clinic_id).await
    }

    pub async fn create(
        &self,
        clinic_id: Uuid,
        plan_id: Uuid,
        status: SubscriptionStatus,
        trial_ends_at: Option<DateTime<Utc>>,
        period_end: DateTime<Utc>,
    ) -> AppResult<Subscription> {
        repositories::create_subscription(self.txn, clinic_id, plan_id, status, trial_ends_at, period_end)
            .await
    }

    pub async fn update(&self, id: Uuid, change: SubscriptionChange) -> AppResult<Subscription> {
        repositories::tx_update_subscription(self.txn, id, change).await
    }
}

/// Transaction-aware plan repository.
pub struct TxPlanRepository<'a> {
    txn: &'a DatabaseTransaction,
}

impl<'a> TxPlanRepository<'a> {
    pub async fn find_by_name(&self, name: &str) -> AppResult<Option<Plan>> {
        repositories::tx_find_plan_by_name(self.txn, name).await
    }

    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Plan>> {
        repositories::tx_find_plan_by_id(self.txn, id).await
    }
}
