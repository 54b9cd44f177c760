//! Billing handlers: subscription state, plan catalog and plan changes.

use axum::{
    extract::{Extension, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::api::extractors::ValidatedJson;
use crate::api::AppState;
use crate::domain::{require_any_role, Principal, RoleName};
use crate::errors::AppResult;
use crate::services::{BillingCycle, PlanSummary, SubscriptionOverview};
use crate::types::{DataResponse, MessageResponse};

/// Upgrade request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpgradeRequest {
    #[validate(length(min = 1, message = "Plan name is required"))]
    pub plan_name: String,
    pub billing_cycle: BillingCycle,
}

/// Downgrade request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct DowngradeRequest {
    #[validate(length(min = 1, message = "Plan name is required"))]
    pub plan_name: String,
}

/// Create billing routes. All but the plan catalog require a session.
pub fn billing_routes() -> Router<AppState> {
    Router::new()
        .route("/subscription", get(get_subscription))
        .route("/upgrade", post(upgrade))
        .route("/downgrade", post(downgrade))
        .route("/cancel", post(cancel))
}

/// Public plan catalog routes.
pub fn plan_routes() -> Router<AppState> {
    Router::new().route("/plans", get(list_plans))
}

/// Current subscription with plan limits and live seat usage
#[utoipa::path(
    get,
    path = "/billing/subscription",
    tag = "Billing",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Subscription overview", body = SubscriptionOverview),
        (status = 404, description = "No subscription for this clinic")
    )
)]
pub async fn get_subscription(
    Extension(principal): Extension<Principal>,
    State(state): State<AppState>,
) -> AppResult<Json<SubscriptionOverview>> {
    let clinic_id = principal.require_clinic()?;
    let overview = state.subscription_gate.overview(clinic_id).await?;
    Ok(Json(overview))
}

/// Plan catalog, cheapest first
#[utoipa::path(
    get,
    path = "/billing/plans",
    tag = "Billing",
    responses((status = 200, description = "Available plans", body = Vec<PlanSummary>))
)]
pub async fn list_plans(State(state): State<AppState>) -> AppResult<Json<Vec<PlanSummary>>> {
    let plans = state.subscription_gate.list_plans().await?;
    Ok(Json(plans))
}

/// Upgrade to a higher-priced plan (ADMIN)
#[utoipa::path(
    post,
    path = "/billing/upgrade",
    tag = "Billing",
    security(("bearer_auth" = [])),
    request_body = UpgradeRequest,
    responses(
        (status = 200, description = "Subscription upgraded", body = SubscriptionOverview),
        (status = 400, description = "Target plan is not an upgrade"),
        (status = 404, description = "Plan or subscription not found")
    )
)]
pub async fn upgrade(
    Extension(principal): Extension<Principal>,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<UpgradeRequest>,
) -> AppResult<Json<DataResponse<SubscriptionOverview>>> {
    require_any_role(&principal, &[RoleName::Admin])?;
    let clinic_id = principal.require_clinic()?;

    let overview = state
        .subscription_gate
        .upgrade(clinic_id, &payload.plan_name, payload.billing_cycle)
        .await?;

    Ok(Json(DataResponse::new(
        "Subscription upgraded successfully",
        overview,
    )))
}

/// Downgrade to a lower-priced plan; rejected when current seat usage
/// exceeds the target plan's limits (ADMIN)
#[utoipa::path(
    post,
    path = "/billing/downgrade",
    tag = "Billing",
    security(("bearer_auth" = [])),
    request_body = DowngradeRequest,
    responses(
        (status = 200, description = "Subscription downgraded", body = SubscriptionOverview),
        (status = 400, description = "Target plan is not a downgrade"),
        (status = 403, description = "Current seat usage exceeds the target plan's limits")
    )
)]
pub async fn downgrade(
    Extension(principal): Extension<Principal>,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<DowngradeRequest>,
) -> AppResult<Json<DataResponse<SubscriptionOverview>>> {
    require_any_role(&principal, &[RoleName::Admin])?;
    let clinic_id = principal.require_clinic()?;

    let overview = state
        .subscription_gate
        .downgrade(clinic_id, &payload.plan_name)
        .await?;

    Ok(Json(DataResponse::new(
        "Subscription downgraded successfully",
        overview,
    )))
}

/// Cancel the subscription; access continues until the period end (ADMIN)
#[utoipa::path(
    post,
    path = "/billing/cancel",
    tag = "Billing",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Subscription canceled", body = MessageResponse),
        (status = 400, description = "Already canceled"),
        (status = 404, description = "No subscription for this clinic")
    )
)]
pub async fn cancel(
    Extension(principal): Extension<Principal>,
    State(state): State<AppState>,
) -> AppResult<Json<MessageResponse>> {
    require_any_role(&principal, &[RoleName::Admin])?;
    let clinic_id = principal.require_clinic()?;

    let ends_at = state.subscription_gate.cancel(clinic_id).await?;

    Ok(Json(MessageResponse::new(format!(
        "Subscription canceled successfully. Access will continue until {}.",
        ends_at.format("%Y-%m-%d")
    ))))
}
