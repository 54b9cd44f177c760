//! Subscription and plan domain types.
//!
//! The status state machine lives here as a pure type; the gate service
//! performs the store reads/writes around it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::role::RoleName;

/// Subscription lifecycle status.
///
/// Transitions: trialing → {active, past_due, canceled};
/// active → {past_due, canceled}; past_due → {active, canceled};
/// canceled is terminal. The row is never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trialing,
    Active,
    PastDue,
    Canceled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
        }
    }

    /// Whether the state machine permits moving to `next`.
    pub fn can_transition_to(&self, next: SubscriptionStatus) -> bool {
        use SubscriptionStatus::*;
        match (self, next) {
            (Trialing, Active) | (Trialing, PastDue) | (Trialing, Canceled) => true,
            (Active, PastDue) | (Active, Canceled) => true,
            (PastDue, Active) | (PastDue, Canceled) => true,
            (Canceled, _) => false,
            _ => false,
        }
    }

    /// Statuses that block gated routes outright.
    pub fn is_inactive(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Canceled | SubscriptionStatus::PastDue
        )
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trialing" => Ok(SubscriptionStatus::Trialing),
            "active" => Ok(SubscriptionStatus::Active),
            "past_due" => Ok(SubscriptionStatus::PastDue),
            "canceled" => Ok(SubscriptionStatus::Canceled),
            other => Err(format!("unknown subscription status: {}", other)),
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A subscription plan: price, seat limits and feature tags.
/// `None` limits mean unlimited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: Uuid,
    pub name: String,
    pub price_monthly: i64,
    pub price_yearly: i64,
    pub max_doctors: Option<i64>,
    pub max_staff: Option<i64>,
    /// Exact-match string tags, stored as a JSON list on the row
    pub features: Vec<String>,
    pub multi_clinic: bool,
}

impl Plan {
    pub fn has_feature(&self, tag: &str) -> bool {
        self.features.iter().any(|f| f == tag)
    }
}

/// A clinic's subscription. Exactly zero or one per clinic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub plan_id: Uuid,
    pub status: SubscriptionStatus,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Whether a trialing subscription's trial window has lapsed at `now`.
    pub fn trial_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Trialing
            && self.trial_ends_at.map(|t| now > t).unwrap_or(false)
    }

    /// Whole days of trial remaining, clamped at zero.
    pub fn trial_days_left(&self, now: DateTime<Utc>) -> Option<i64> {
        if self.status != SubscriptionStatus::Trialing {
            return None;
        }
        self.trial_ends_at
            .map(|t| ((t - now).num_seconds().max(0) + 86_399) / 86_400)
    }
}

/// Live seat usage for one clinic.
#[derive(Debug, Clone, Copy, Serialize, utoipa::ToSchema)]
pub struct SeatUsage {
    pub doctors: u64,
    /// All seat-occupying roles together (doctors + receptionists)
    pub total_staff: u64,
}

/// The seat pool a role draws from, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatKind {
    Doctor,
    Staff,
}

impl SeatKind {
    /// Which pool a new association of `role` counts against.
    /// Administrative roles occupy no seat.
    pub fn for_role(role: RoleName) -> Option<SeatKind> {
        match role {
            RoleName::Doctor => Some(SeatKind::Doctor),
            RoleName::Receptionist => Some(SeatKind::Staff),
            RoleName::Admin | RoleName::SuperAdmin => None,
        }
    }
}

/// A seat-limit violation: current occupancy vs. the plan's cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatViolation {
    pub kind: SeatKind,
    pub current: u64,
    pub limit: u64,
}

/// Decide whether adding one `role` seat would exceed `plan` limits given
/// `usage`. `None` limits never deny.
pub fn seat_check(plan: &Plan, usage: SeatUsage, role: RoleName) -> Option<SeatViolation> {
    match SeatKind::for_role(role)? {
        SeatKind::Doctor => plan.max_doctors.and_then(|limit| {
            (usage.doctors >= limit as u64).then_some(SeatViolation {
                kind: SeatKind::Doctor,
                current: usage.doctors,
                limit: limit as u64,
            })
        }),
        SeatKind::Staff => plan.max_staff.and_then(|limit| {
            (usage.total_staff >= limit as u64).then_some(SeatViolation {
                kind: SeatKind::Staff,
                current: usage.total_staff,
                limit: limit as u64,
            })
        }),
    }
}

/// Decide whether existing usage already exceeds `target` plan limits.
/// Used to fail a downgrade closed before any write.
pub fn downgrade_violation(target: &Plan, usage: SeatUsage) -> Option<SeatViolation> {
    if let Some(limit) = target.max_doctors {
        if usage.doctors > limit as u64 {
            return Some(SeatViolation {
                kind: SeatKind::Doctor,
                current: usage.doctors,
                limit: limit as u64,
            });
        }
    }
    if let Some(limit) = target.max_staff {
        if usage.total_staff > limit as u64 {
            return Some(SeatViolation {
                kind: SeatKind::Staff,
                current: usage.total_staff,
                limit: limit as u64,
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(max_doctors: Option<i64>, max_staff: Option<i64>) -> Plan {
        Plan {
            id: Uuid::new_v4(),
            name: "STARTER".to_string(),
            price_monthly: 2900,
            price_yearly: 29900,
            max_doctors,
            max_staff,
            features: vec!["patient_history".to_string()],
            multi_clinic: false,
        }
    }

    #[test]
    fn status_parses_and_rejects_unknown() {
        assert_eq!(
            "past_due".parse::<SubscriptionStatus>().unwrap(),
            SubscriptionStatus::PastDue
        );
        assert!("expired".parse::<SubscriptionStatus>().is_err());
    }

    #[test]
    fn canceled_is_terminal() {
        for next in [
            SubscriptionStatus::Trialing,
            SubscriptionStatus::Active,
            SubscriptionStatus::PastDue,
        ] {
            assert!(!SubscriptionStatus::Canceled.can_transition_to(next));
        }
    }

    #[test]
    fn trial_expiry_and_past_due_recovery_transitions() {
        assert!(SubscriptionStatus::Trialing.can_transition_to(SubscriptionStatus::PastDue));
        assert!(SubscriptionStatus::PastDue.can_transition_to(SubscriptionStatus::Active));
        assert!(!SubscriptionStatus::Active.can_transition_to(SubscriptionStatus::Trialing));
    }

    #[test]
    fn seat_check_denies_at_limit() {
        let violation = seat_check(
            &plan(Some(1), None),
            SeatUsage {
                doctors: 1,
                total_staff: 1,
            },
            RoleName::Doctor,
        )
        .unwrap();
        assert_eq!(violation.current, 1);
        assert_eq!(violation.limit, 1);
    }

    #[test]
    fn null_limit_is_unlimited() {
        assert!(seat_check(
            &plan(None, None),
            SeatUsage {
                doctors: 5_000,
                total_staff: 9_000,
            },
            RoleName::Doctor,
        )
        .is_none());
    }

    #[test]
    fn receptionists_count_against_the_staff_pool() {
        let violation = seat_check(
            &plan(None, Some(2)),
            SeatUsage {
                doctors: 1,
                total_staff: 2,
            },
            RoleName::Receptionist,
        )
        .unwrap();
        assert_eq!(violation.kind, SeatKind::Staff);
    }

    #[test]
    fn admin_roles_occupy_no_seat() {
        let usage = SeatUsage {
            doctors: 10,
            total_staff: 10,
        };
        assert!(seat_check(&plan(Some(1), Some(1)), usage, RoleName::Admin).is_none());
        assert!(seat_check(&plan(Some(1), Some(1)), usage, RoleName::SuperAdmin).is_none());
    }

    #[test]
    fn downgrade_fails_closed_when_over_target_limits() {
        let violation = downgrade_violation(
            &plan(Some(1), None),
            SeatUsage {
                doctors: 3,
                total_staff: 4,
            },
        )
        .unwrap();
        assert_eq!(violation.kind, SeatKind::Doctor);
        assert_eq!(violation.current, 3);
        assert_eq!(violation.limit, 1);
    }

    #[test]
    fn downgrade_allows_usage_at_exactly_the_limit() {
        assert!(downgrade_violation(
            &plan(Some(3), Some(5)),
            SeatUsage {
                doctors: 3,
                total_staff: 5,
            },
        )
        .is_none());
    }

    #[test]
    fn trial_expiry_is_a_pure_function_of_time() {
        let now = Utc::now();
        let sub = Subscription {
            id: Uuid::new_v4(),
            clinic_id: Uuid::new_v4(),
            plan_id: Uuid::new_v4(),
            status: SubscriptionStatus::Trialing,
            trial_ends_at: Some(now - chrono::Duration::seconds(1)),
            current_period_start: now - chrono::Duration::days(14),
            current_period_end: now,
            created_at: now,
            updated_at: now,
        };
        assert!(sub.trial_expired(now));
        assert!(!sub.trial_expired(now - chrono::Duration::seconds(2)));
    }
}
