//! Subscription gate tests.
//!
//! Exercise the gate against in-memory repositories: trial expiry must be
//! written through exactly once, seat limits must deny with the exact
//! counts, and `null` limits never deny.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use clinic_api::domain::{Plan, RoleName, Subscription, SubscriptionStatus};
use clinic_api::errors::{AppError, AppResult};
use clinic_api::infra::{
    ClinicRepository, ClinicRoleRepository, InviteRepository, PatientRepository, PlanRepository,
    SubscriptionChange, SubscriptionRepository, TransactionContext, UnitOfWork, UserRepository,
};
use clinic_api::services::{SubscriptionGate, SubscriptionManager};

// =============================================================================
// In-memory repositories
// =============================================================================

struct InMemorySubscriptions {
    subs: Mutex<Vec<Subscription>>,
}

impl InMemorySubscriptions {
    fn new(subs: Vec<Subscription>) -> Self {
        Self {
            subs: Mutex::new(subs),
        }
    }

    fn status_of(&self, id: Uuid) -> Option<SubscriptionStatus> {
        self.subs
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.status)
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptions {
    async fn find_by_clinic(&self, clinic_id: Uuid) -> AppResult<Option<Subscription>> {
        Ok(self
            .subs
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.clinic_id == clinic_id)
            .cloned())
    }

    async fn set_status(&self, id: Uuid, status: SubscriptionStatus) -> AppResult<()> {
        let mut subs = self.subs.lock().unwrap();
        let sub = subs
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(AppError::NotFound)?;
        sub.status = status;
        Ok(())
    }

    async fn update(&self, id: Uuid, change: SubscriptionChange) -> AppResult<Subscription> {
        let mut subs = self.subs.lock().unwrap();
        let sub = subs
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(AppError::NotFound)?;
        if let Some(plan_id) = change.plan_id {
            sub.plan_id = plan_id;
        }
        if let Some(status) = change.status {
            sub.status = status;
        }
        if let Some(trial_ends_at) = change.trial_ends_at {
            sub.trial_ends_at = trial_ends_at;
        }
        if let Some(period_end) = change.current_period_end {
            sub.current_period_end = period_end;
        }
        Ok(sub.clone())
    }

    async fn list(&self) -> AppResult<Vec<Subscription>> {
        Ok(self.subs.lock().unwrap().clone())
    }
}

struct InMemoryPlans {
    plans: Vec<Plan>,
}

#[async_trait]
impl PlanRepository for InMemoryPlans {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Plan>> {
        Ok(self.plans.iter().find(|p| p.id == id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> AppResult<Option<Plan>> {
        Ok(self.plans.iter().find(|p| p.name == name).cloned())
    }

    async fn list(&self) -> AppResult<Vec<Plan>> {
        Ok(self.plans.clone())
    }
}

/// Association repository that only answers the seat-count queries.
struct FixedCounts {
    doctors: u64,
    staff: u64,
}

#[async_trait]
impl ClinicRoleRepository for FixedCounts {
    async fn count_doctors(&self, _clinic_id: Uuid) -> AppResult<u64> {
        Ok(self.doctors)
    }

    async fn count_staff(&self, _clinic_id: Uuid) -> AppResult<u64> {
        Ok(self.staff)
    }

    async fn find_by_user(
        &self,
        _user_id: Uuid,
    ) -> AppResult<Vec<clinic_api::domain::AssociationRow>> {
        unimplemented!("not used by the gate")
    }

    async fn roles_in_clinic(&self, _: Uuid, _: Uuid) -> AppResult<Vec<RoleName>> {
        unimplemented!("not used by the gate")
    }

    async fn is_member(&self, _: Uuid, _: Uuid) -> AppResult<bool> {
        unimplemented!("not used by the gate")
    }

    async fn has_role_anywhere(&self, _: Uuid, _: RoleName) -> AppResult<bool> {
        unimplemented!("not used by the gate")
    }

    async fn list_by_clinic(
        &self,
        _: Uuid,
    ) -> AppResult<Vec<clinic_api::infra::repositories::StaffAssociation>> {
        unimplemented!("not used by the gate")
    }

    async fn list_all(
        &self,
    ) -> AppResult<Vec<clinic_api::infra::repositories::GlobalAssociation>> {
        unimplemented!("not used by the gate")
    }

    async fn upsert(&self, _: Uuid, _: Uuid, _: RoleName) -> AppResult<()> {
        unimplemented!("not used by the gate")
    }

    async fn delete_role(&self, _: Uuid, _: Uuid, _: RoleName) -> AppResult<()> {
        unimplemented!("not used by the gate")
    }

    async fn delete_membership(&self, _: Uuid, _: Uuid) -> AppResult<()> {
        unimplemented!("not used by the gate")
    }

    async fn delete_all_for_user(&self, _: Uuid) -> AppResult<()> {
        unimplemented!("not used by the gate")
    }
}

/// Unit of Work exposing only what the gate's non-transactional checks use.
struct TestUnitOfWork {
    subscriptions: Arc<InMemorySubscriptions>,
    plans: Arc<InMemoryPlans>,
    clinic_roles: Arc<FixedCounts>,
}

#[async_trait]
impl UnitOfWork for TestUnitOfWork {
    fn users(&self) -> Arc<dyn UserRepository> {
        unimplemented!("not used by the gate")
    }

    fn clinics(&self) -> Arc<dyn ClinicRepository> {
        unimplemented!("not used by the gate")
    }

    fn clinic_roles(&self) -> Arc<dyn ClinicRoleRepository> {
        self.clinic_roles.clone()
    }

    fn invites(&self) -> Arc<dyn InviteRepository> {
        unimplemented!("not used by the gate")
    }

    fn subscriptions(&self) -> Arc<dyn SubscriptionRepository> {
        self.subscriptions.clone()
    }

    fn plans(&self) -> Arc<dyn PlanRepository> {
        self.plans.clone()
    }

    fn patients(&self) -> Arc<dyn PatientRepository> {
        unimplemented!("not used by the gate")
    }

    async fn transaction<F, T>(&self, _f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(
                TransactionContext<'a>,
            ) -> std::pin::Pin<
                Box<dyn std::future::Future<Output = AppResult<T>> + Send + 'a>,
            > + Send,
        T: Send,
    {
        Err(AppError::internal("Transactions not supported in test mock"))
    }

    async fn transaction_serializable<F, T>(&self, _f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(
                TransactionContext<'a>,
            ) -> std::pin::Pin<
                Box<dyn std::future::Future<Output = AppResult<T>> + Send + 'a>,
            > + Send,
        T: Send,
    {
        Err(AppError::internal("Transactions not supported in test mock"))
    }
}

// =============================================================================
// Fixtures
// =============================================================================

fn plan(name: &str, max_doctors: Option<i64>, max_staff: Option<i64>) -> Plan {
    Plan {
        id: Uuid::new_v4(),
        name: name.to_string(),
        price_monthly: 2900,
        price_yearly: 29000,
        max_doctors,
        max_staff,
        features: vec!["patient_history".to_string()],
        multi_clinic: false,
    }
}

fn subscription(clinic_id: Uuid, plan_id: Uuid, status: SubscriptionStatus) -> Subscription {
    let now = Utc::now();
    Subscription {
        id: Uuid::new_v4(),
        clinic_id,
        plan_id,
        status,
        trial_ends_at: None,
        current_period_start: now,
        current_period_end: now + Duration::days(14),
        created_at: now,
        updated_at: now,
    }
}

fn gate(
    subs: Vec<Subscription>,
    plans: Vec<Plan>,
    doctors: u64,
    staff: u64,
) -> (
    SubscriptionManager<TestUnitOfWork>,
    Arc<InMemorySubscriptions>,
) {
    let subscriptions = Arc::new(InMemorySubscriptions::new(subs));
    let uow = Arc::new(TestUnitOfWork {
        subscriptions: subscriptions.clone(),
        plans: Arc::new(InMemoryPlans { plans }),
        clinic_roles: Arc::new(FixedCounts { doctors, staff }),
    });
    (SubscriptionManager::new(uow), subscriptions)
}

// =============================================================================
// require_active
// =============================================================================

#[tokio::test]
async fn missing_subscription_denies_with_subscription_required() {
    let (gate, _) = gate(vec![], vec![], 0, 0);

    let err = gate.require_active(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, AppError::SubscriptionRequired));
}

#[tokio::test]
async fn canceled_and_past_due_deny_with_not_active() {
    for status in [SubscriptionStatus::Canceled, SubscriptionStatus::PastDue] {
        let clinic_id = Uuid::new_v4();
        let p = plan("STARTER", Some(1), Some(3));
        let (gate, _) = gate(
            vec![subscription(clinic_id, p.id, status)],
            vec![p],
            0,
            0,
        );

        let err = gate.require_active(clinic_id).await.unwrap_err();
        match err {
            AppError::SubscriptionInactive { status: s } => assert_eq!(s, status),
            other => panic!("expected SubscriptionInactive, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn active_and_unexpired_trial_allow() {
    let clinic_id = Uuid::new_v4();
    let p = plan("STARTER", Some(1), Some(3));

    let mut trialing = subscription(clinic_id, p.id, SubscriptionStatus::Trialing);
    trialing.trial_ends_at = Some(Utc::now() + Duration::days(7));

    let (gate, _) = gate(vec![trialing], vec![p.clone()], 0, 0);
    assert!(gate.require_active(clinic_id).await.is_ok());

    let clinic2 = Uuid::new_v4();
    let (gate, _) = gate_active(clinic2, &p);
    assert!(gate.require_active(clinic2).await.is_ok());
}

fn gate_active(
    clinic_id: Uuid,
    p: &Plan,
) -> (
    SubscriptionManager<TestUnitOfWork>,
    Arc<InMemorySubscriptions>,
) {
    gate(
        vec![subscription(clinic_id, p.id, SubscriptionStatus::Active)],
        vec![p.clone()],
        0,
        0,
    )
}

#[tokio::test]
async fn expired_trial_denies_once_and_persists_past_due() {
    let clinic_id = Uuid::new_v4();
    let p = plan("STARTER", Some(1), Some(3));

    let mut trialing = subscription(clinic_id, p.id, SubscriptionStatus::Trialing);
    trialing.trial_ends_at = Some(Utc::now() - Duration::seconds(1));
    let sub_id = trialing.id;

    let (gate, subscriptions) = gate(vec![trialing], vec![p], 0, 0);

    // First check past the trial end: TrialExpired, and the transition is
    // written through.
    let err = gate.require_active(clinic_id).await.unwrap_err();
    assert!(matches!(err, AppError::TrialExpired));
    assert_eq!(
        subscriptions.status_of(sub_id),
        Some(SubscriptionStatus::PastDue)
    );

    // Second check sees the persisted status: NotActive, not TrialExpired.
    let err = gate.require_active(clinic_id).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::SubscriptionInactive {
            status: SubscriptionStatus::PastDue
        }
    ));
}

// =============================================================================
// require_feature
// =============================================================================

#[tokio::test]
async fn feature_membership_is_exact_string_match() {
    let clinic_id = Uuid::new_v4();
    let p = plan("STARTER", Some(1), Some(3));
    let (gate, _) = gate_active(clinic_id, &p);

    assert!(gate
        .require_feature(clinic_id, "patient_history")
        .await
        .is_ok());

    let err = gate
        .require_feature(clinic_id, "multi_clinic")
        .await
        .unwrap_err();
    match err {
        AppError::FeatureNotInPlan { feature, plan } => {
            assert_eq!(feature, "multi_clinic");
            assert_eq!(plan, "STARTER");
        }
        other => panic!("expected FeatureNotInPlan, got {:?}", other),
    }
}

#[tokio::test]
async fn feature_check_without_subscription_denies() {
    let (gate, _) = gate(vec![], vec![], 0, 0);
    let err = gate
        .require_feature(Uuid::new_v4(), "patient_history")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::SubscriptionRequired));
}

// =============================================================================
// check_seat_limit
// =============================================================================

#[tokio::test]
async fn doctor_seat_at_limit_denies_with_counts() {
    let clinic_id = Uuid::new_v4();
    let p = plan("STARTER", Some(1), Some(3));
    let (gate, _) = gate(
        vec![subscription(clinic_id, p.id, SubscriptionStatus::Active)],
        vec![p],
        1,
        1,
    );

    let err = gate
        .check_seat_limit(clinic_id, RoleName::Doctor)
        .await
        .unwrap_err();
    match err {
        AppError::SeatLimitExceeded { current, limit, .. } => {
            assert_eq!(current, 1);
            assert_eq!(limit, 1);
        }
        other => panic!("expected SeatLimitExceeded, got {:?}", other),
    }
}

#[tokio::test]
async fn null_limits_never_deny() {
    let clinic_id = Uuid::new_v4();
    let p = plan("UNLIMITED", None, None);
    let (gate, _) = gate(
        vec![subscription(clinic_id, p.id, SubscriptionStatus::Active)],
        vec![p],
        5_000,
        9_000,
    );

    assert!(gate
        .check_seat_limit(clinic_id, RoleName::Doctor)
        .await
        .is_ok());
    assert!(gate
        .check_seat_limit(clinic_id, RoleName::Receptionist)
        .await
        .is_ok());
}

#[tokio::test]
async fn receptionists_count_against_the_shared_staff_pool() {
    let clinic_id = Uuid::new_v4();
    let p = plan("STARTER", Some(5), Some(3));
    let (gate, _) = gate(
        vec![subscription(clinic_id, p.id, SubscriptionStatus::Active)],
        vec![p],
        1,
        3,
    );

    let err = gate
        .check_seat_limit(clinic_id, RoleName::Receptionist)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::SeatLimitExceeded { .. }));
}

#[tokio::test]
async fn administrative_roles_occupy_no_seat() {
    let clinic_id = Uuid::new_v4();
    let p = plan("STARTER", Some(1), Some(1));
    let (gate, _) = gate(
        vec![subscription(clinic_id, p.id, SubscriptionStatus::Active)],
        vec![p],
        10,
        10,
    );

    assert!(gate
        .check_seat_limit(clinic_id, RoleName::Admin)
        .await
        .is_ok());
    assert!(gate
        .check_seat_limit(clinic_id, RoleName::SuperAdmin)
        .await
        .is_ok());
}

// =============================================================================
// usage & cancel
// =============================================================================

#[tokio::test]
async fn usage_reports_live_counts() {
    let clinic_id = Uuid::new_v4();
    let p = plan("GROWTH", Some(5), Some(15));
    let (gate, _) = gate(
        vec![subscription(clinic_id, p.id, SubscriptionStatus::Active)],
        vec![p],
        2,
        6,
    );

    let usage = gate.usage(clinic_id).await.unwrap();
    assert_eq!(usage.doctors, 2);
    assert_eq!(usage.total_staff, 6);
}

#[tokio::test]
async fn cancel_is_rejected_when_already_canceled() {
    let clinic_id = Uuid::new_v4();
    let p = plan("STARTER", Some(1), Some(3));
    let (gate, _) = gate(
        vec![subscription(clinic_id, p.id, SubscriptionStatus::Canceled)],
        vec![p],
        0,
        0,
    );

    let err = gate.cancel(clinic_id).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn cancel_persists_the_terminal_status() {
    let clinic_id = Uuid::new_v4();
    let p = plan("STARTER", Some(1), Some(3));
    let sub = subscription(clinic_id, p.id, SubscriptionStatus::Active);
    let sub_id = sub.id;
    let (gate, subscriptions) = gate(vec![sub], vec![p], 0, 0);

    let ends_at = gate.cancel(clinic_id).await.unwrap();
    assert!(ends_at > Utc::now());
    assert_eq!(
        subscriptions.status_of(sub_id),
        Some(SubscriptionStatus::Canceled)
    );
}
