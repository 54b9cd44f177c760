//! Subscription gate and billing operations.
//!
//! Three independently invokable checks guard gated routes: an active
//! subscription, a plan feature, and seat headroom. Trial expiry is a
//! write-through: the first check past `trial_ends_at` persists the
//! past_due transition so every other reader of the status sees it.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::CANCEL_GRACE_DAYS;
use crate::domain::{
    downgrade_violation, seat_check, Plan, RoleName, SeatKind, SeatUsage, SeatViolation,
    Subscription, SubscriptionStatus,
};
use crate::errors::{AppError, AppResult};
use crate::infra::{SubscriptionChange, UnitOfWork};

/// Billing interval selected on upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    Monthly,
    Yearly,
}

impl BillingCycle {
    fn period(&self) -> Duration {
        match self {
            BillingCycle::Monthly => Duration::days(30),
            BillingCycle::Yearly => Duration::days(365),
        }
    }
}

/// Plan fields exposed to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlanSummary {
    pub name: String,
    pub price_monthly: i64,
    pub price_yearly: i64,
    pub max_doctors: Option<i64>,
    pub max_staff: Option<i64>,
    pub features: Vec<String>,
    pub multi_clinic: bool,
}

impl From<Plan> for PlanSummary {
    fn from(plan: Plan) -> Self {
        Self {
            name: plan.name,
            price_monthly: plan.price_monthly,
            price_yearly: plan.price_yearly,
            max_doctors: plan.max_doctors,
            max_staff: plan.max_staff,
            features: plan.features,
            multi_clinic: plan.multi_clinic,
        }
    }
}

/// Subscription + plan + live seat usage, as shown on the billing page.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubscriptionOverview {
    pub status: SubscriptionStatus,
    pub plan: PlanSummary,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub trial_days_left: Option<i64>,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub usage: SeatUsage,
}

/// Subscription gate trait for dependency injection.
#[async_trait]
pub trait SubscriptionGate: Send + Sync {
    /// Deny unless the clinic's subscription currently grants access.
    ///
    /// Side effect: a lapsed trial is persisted as past_due before the
    /// denial, so the transition happens exactly once per expiry.
    async fn require_active(&self, clinic_id: Uuid) -> AppResult<Subscription>;

    /// Deny unless the clinic's plan carries the feature tag.
    async fn require_feature(&self, clinic_id: Uuid, feature: &str) -> AppResult<()>;

    /// Deny when adding one seat of `role` would exceed the plan's limits.
    async fn check_seat_limit(&self, clinic_id: Uuid, role: RoleName) -> AppResult<()>;

    /// Current seat occupancy.
    async fn usage(&self, clinic_id: Uuid) -> AppResult<SeatUsage>;

    /// Subscription + plan + usage for the billing page.
    async fn overview(&self, clinic_id: Uuid) -> AppResult<SubscriptionOverview>;

    /// Plan catalog, cheapest first.
    async fn list_plans(&self) -> AppResult<Vec<PlanSummary>>;

    /// Move to a higher-priced plan; activates the subscription and clears
    /// any trial.
    async fn upgrade(
        &self,
        clinic_id: Uuid,
        plan_name: &str,
        cycle: BillingCycle,
    ) -> AppResult<SubscriptionOverview>;

    /// Move to a lower-priced plan. Fails closed: current seat usage is
    /// checked against the target plan inside the transaction, before any
    /// write.
    async fn downgrade(&self, clinic_id: Uuid, plan_name: &str) -> AppResult<SubscriptionOverview>;

    /// Cancel the subscription; access runs until the grace period ends.
    async fn cancel(&self, clinic_id: Uuid) -> AppResult<DateTime<Utc>>;
}

/// Concrete implementation of the gate using the Unit of Work.
pub struct SubscriptionManager<U: UnitOfWork> {
    uow: Arc<U>,
}

impl<U: UnitOfWork> SubscriptionManager<U> {
    pub fn new(uow: Arc<U>) -> Self {
        Self { uow }
    }

    async fn plan_for(&self, subscription: &Subscription) -> AppResult<Plan> {
        self.uow
            .plans()
            .find_by_id(subscription.plan_id)
            .await?
            .ok_or_else(|| {
                AppError::internal(format!(
                    "Subscription {} references missing plan {}",
                    subscription.id, subscription.plan_id
                ))
            })
    }

    async fn overview_of(&self, subscription: Subscription) -> AppResult<SubscriptionOverview> {
        let plan = self.plan_for(&subscription).await?;
        let usage = self.usage(subscription.clinic_id).await?;

        Ok(SubscriptionOverview {
            status: subscription.status,
            trial_ends_at: subscription.trial_ends_at,
            trial_days_left: subscription.trial_days_left(Utc::now()),
            current_period_start: subscription.current_period_start,
            current_period_end: subscription.current_period_end,
            plan: PlanSummary::from(plan),
            usage,
        })
    }
}

pub(crate) fn seat_error(plan_name: &str, violation: SeatViolation) -> AppError {
    AppError::SeatLimitExceeded {
        plan: plan_name.to_string(),
        noun: match violation.kind {
            SeatKind::Doctor => "doctor(s)",
            SeatKind::Staff => "staff member(s)",
        },
        current: violation.current,
        limit: violation.limit,
    }
}

#[async_trait]
impl<U: UnitOfWork> SubscriptionGate for SubscriptionManager<U> {
    async fn require_active(&self, clinic_id: Uuid) -> AppResult<Subscription> {
        let subscription = self
            .uow
            .subscriptions()
            .find_by_clinic(clinic_id)
            .await?
            .ok_or(AppError::SubscriptionRequired)?;

        if subscription.status.is_inactive() {
            return Err(AppError::SubscriptionInactive {
                status: subscription.status,
            });
        }

        if subscription.trial_expired(Utc::now()) {
            // Persist the transition even though this was only a permission
            // check; other parts of the system read status directly.
            self.uow
                .subscriptions()
                .set_status(subscription.id, SubscriptionStatus::PastDue)
                .await?;

            tracing::info!(clinic_id = %clinic_id, subscription_id = %subscription.id,
                "Trial expired, subscription moved to past_due");

            return Err(AppError::TrialExpired);
        }

        Ok(subscription)
    }

    async fn require_feature(&self, clinic_id: Uuid, feature: &str) -> AppResult<()> {
        let subscription = self
            .uow
            .subscriptions()
            .find_by_clinic(clinic_id)
            .await?
            .ok_or(AppError::SubscriptionRequired)?;

        let plan = self.plan_for(&subscription).await?;

        if !plan.has_feature(feature) {
            return Err(AppError::FeatureNotInPlan {
                feature: feature.to_string(),
                plan: plan.name,
            });
        }

        Ok(())
    }

    async fn check_seat_limit(&self, clinic_id: Uuid, role: RoleName) -> AppResult<()> {
        let subscription = self
            .uow
            .subscriptions()
            .find_by_clinic(clinic_id)
            .await?
            .ok_or(AppError::SubscriptionRequired)?;

        let plan = self.plan_for(&subscription).await?;
        let usage = self.usage(clinic_id).await?;

        match seat_check(&plan, usage, role) {
            Some(violation) => Err(seat_error(&plan.name, violation)),
            None => Ok(()),
        }
    }

    async fn usage(&self, clinic_id: Uuid) -> AppResult<SeatUsage> {
        let roles = self.uow.clinic_roles();
        let (doctors, total_staff) = tokio::try_join!(
            roles.count_doctors(clinic_id),
            roles.count_staff(clinic_id)
        )?;

        Ok(SeatUsage {
            doctors,
            total_staff,
        })
    }

    async fn overview(&self, clinic_id: Uuid) -> AppResult<SubscriptionOverview> {
        let subscription = self
            .uow
            .subscriptions()
            .find_by_clinic(clinic_id)
            .await?
            .ok_or(AppError::NotFound)?;

        self.overview_of(subscription).await
    }

    async fn list_plans(&self) -> AppResult<Vec<PlanSummary>> {
        let plans = self.uow.plans().list().await?;
        Ok(plans.into_iter().map(PlanSummary::from).collect())
    }

    async fn upgrade(
        &self,
        clinic_id: Uuid,
        plan_name: &str,
        cycle: BillingCycle,
    ) -> AppResult<SubscriptionOverview> {
        let new_plan = self
            .uow
            .plans()
            .find_by_name(plan_name)
            .await?
            .ok_or(AppError::NotFound)?;

        let subscription = self
            .uow
            .subscriptions()
            .find_by_clinic(clinic_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if subscription.status == SubscriptionStatus::Canceled {
            return Err(AppError::BadRequest(
                "Cannot change the plan of a canceled subscription".to_string(),
            ));
        }

        let current_plan = self.plan_for(&subscription).await?;
        if new_plan.price_monthly <= current_plan.price_monthly {
            return Err(AppError::BadRequest(
                "Use the downgrade endpoint to switch to a lower plan".to_string(),
            ));
        }

        // Billing-provider semantics are out of scope; the payment always
        // succeeds here.
        tracing::info!(clinic_id = %clinic_id, plan = %new_plan.name, cycle = ?cycle,
            "Processing mock payment for upgrade");

        let updated = self
            .uow
            .subscriptions()
            .update(
                subscription.id,
                SubscriptionChange {
                    plan_id: Some(new_plan.id),
                    status: Some(SubscriptionStatus::Active),
                    trial_ends_at: Some(None),
                    current_period_end: Some(Utc::now() + cycle.period()),
                },
            )
            .await?;

        self.overview_of(updated).await
    }

    async fn downgrade(&self, clinic_id: Uuid, plan_name: &str) -> AppResult<SubscriptionOverview> {
        let plan_name = plan_name.to_string();

        // Check-then-act inside one serializable transaction: a concurrent
        // staff addition cannot slip between the count and the plan write.
        let updated = self
            .uow
            .transaction_serializable(move |ctx| {
                Box::pin(async move {
                    let subscription = ctx
                        .subscriptions()
                        .find_by_clinic(clinic_id)
                        .await?
                        .ok_or(AppError::NotFound)?;

                    if subscription.status == SubscriptionStatus::Canceled {
                        return Err(AppError::BadRequest(
                            "Cannot change the plan of a canceled subscription".to_string(),
                        ));
                    }

                    let target = ctx
                        .plans()
                        .find_by_name(&plan_name)
                        .await?
                        .ok_or(AppError::NotFound)?;

                    let current = ctx
                        .plans()
                        .find_by_id(subscription.plan_id)
                        .await?
                        .ok_or_else(|| AppError::internal("Subscription references missing plan"))?;

                    if target.price_monthly >= current.price_monthly {
                        return Err(AppError::BadRequest(
                            "Use the upgrade endpoint to switch to a higher plan".to_string(),
                        ));
                    }

                    let usage = SeatUsage {
                        doctors: ctx.clinic_roles().count_doctors(clinic_id).await?,
                        total_staff: ctx.clinic_roles().count_staff(clinic_id).await?,
                    };

                    if let Some(violation) = downgrade_violation(&target, usage) {
                        return Err(seat_error(&target.name, violation));
                    }

                    ctx.subscriptions()
                        .update(
                            subscription.id,
                            SubscriptionChange {
                                plan_id: Some(target.id),
                                ..Default::default()
                            },
                        )
                        .await
                })
            })
            .await?;

        self.overview_of(updated).await
    }

    async fn cancel(&self, clinic_id: Uuid) -> AppResult<DateTime<Utc>> {
        let subscription = self
            .uow
            .subscriptions()
            .find_by_clinic(clinic_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if subscription.status == SubscriptionStatus::Canceled {
            return Err(AppError::BadRequest(
                "Subscription is already canceled".to_string(),
            ));
        }

        let ends_at = Utc::now() + Duration::days(CANCEL_GRACE_DAYS);
        self.uow
            .subscriptions()
            .update(
                subscription.id,
                SubscriptionChange {
                    status: Some(SubscriptionStatus::Canceled),
                    current_period_end: Some(ends_at),
                    ..Default::default()
                },
            )
            .await?;

        tracing::info!(clinic_id = %clinic_id, ends_at = %ends_at, "Subscription canceled");

        Ok(ends_at)
    }
}
