//! Clinic and staff management handlers.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::api::extractors::ValidatedJson;
use crate::api::middleware::session_cookie;
use crate::api::AppState;
use crate::domain::{
    require_any_role, ClinicResponse, ClinicUpdate, Principal, RoleName,
};
use crate::errors::AppResult;
use crate::services::{AddedStaff, CreatedInvite, InviteSummary, StaffMember, StaffUpdate, SwitchOutcome};
use crate::types::{DataResponse, MessageResponse};

use super::require_clinic_scope;

/// Invite creation request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateInviteRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    /// Role granted on acceptance
    pub role: RoleName,
}

/// Direct staff creation request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddStaffRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Full name is required"))]
    pub full_name: String,
    pub role: RoleName,
    /// Also grant the ADMIN role
    #[serde(default)]
    pub also_make_admin: bool,
}

/// Staff update request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateStaffRequest {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub full_name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    /// Doubly optional: omitted = unchanged, null = cleared
    #[serde(default, deserialize_with = "deserialize_present")]
    #[schema(value_type = Option<String>)]
    pub profile_image: Option<Option<String>>,
    pub role: Option<RoleName>,
    pub also_make_admin: Option<bool>,
}

/// Clinic update request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateClinicRequest {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
}

/// Clinic switch request
#[derive(Debug, Deserialize, ToSchema)]
pub struct SwitchClinicRequest {
    pub clinic_id: Uuid,
}

/// Distinguishes a field that was present (possibly null) from one that was
/// omitted entirely.
fn deserialize_present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    serde::Deserialize::deserialize(deserializer).map(Some)
}

/// Create clinic routes (all require an authenticated session).
pub fn clinic_routes() -> Router<AppState> {
    Router::new()
        .route("/switch", post(switch_clinic))
        .route("/:clinic_id", get(get_clinic).patch(update_clinic))
        .route("/:clinic_id/invite", post(create_invite))
        .route("/:clinic_id/invites", get(list_invites))
        .route("/:clinic_id/staff", get(list_staff).post(add_staff))
        .route(
            "/:clinic_id/staff/:user_id",
            axum::routing::patch(update_staff).delete(remove_staff),
        )
        .route(
            "/:clinic_id/staff/:user_id/reset-password",
            post(reset_password),
        )
}

/// Switch the active clinic and receive a re-scoped session
#[utoipa::path(
    post,
    path = "/clinics/switch",
    tag = "Clinics",
    security(("bearer_auth" = [])),
    request_body = SwitchClinicRequest,
    responses(
        (status = 200, description = "Clinic switched", body = SwitchOutcome),
        (status = 403, description = "No access to the target clinic")
    )
)]
pub async fn switch_clinic(
    Extension(principal): Extension<Principal>,
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<SwitchClinicRequest>,
) -> AppResult<(CookieJar, Json<SwitchOutcome>)> {
    let outcome = state
        .clinic_service
        .switch_clinic(principal.user_id, payload.clinic_id)
        .await?;

    let jar = jar.add(session_cookie(
        &outcome.session.token,
        state.codec.cookie_max_age_seconds(),
    )?);

    Ok((jar, Json(outcome)))
}

/// Clinic details (members only)
#[utoipa::path(
    get,
    path = "/clinics/{clinic_id}",
    tag = "Clinics",
    security(("bearer_auth" = [])),
    params(("clinic_id" = Uuid, Path, description = "Clinic ID")),
    responses(
        (status = 200, description = "Clinic details", body = ClinicResponse),
        (status = 403, description = "Not a member"),
        (status = 404, description = "Clinic not found")
    )
)]
pub async fn get_clinic(
    Extension(principal): Extension<Principal>,
    State(state): State<AppState>,
    Path(clinic_id): Path<Uuid>,
) -> AppResult<Json<ClinicResponse>> {
    let clinic = state
        .clinic_service
        .get_clinic(principal.user_id, clinic_id)
        .await?;

    Ok(Json(ClinicResponse::from(clinic)))
}

/// Update clinic contact fields (ADMIN)
#[utoipa::path(
    patch,
    path = "/clinics/{clinic_id}",
    tag = "Clinics",
    security(("bearer_auth" = [])),
    params(("clinic_id" = Uuid, Path, description = "Clinic ID")),
    request_body = UpdateClinicRequest,
    responses(
        (status = 200, description = "Clinic updated", body = MessageResponse),
        (status = 403, description = "ADMIN role required")
    )
)]
pub async fn update_clinic(
    Extension(principal): Extension<Principal>,
    State(state): State<AppState>,
    Path(clinic_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateClinicRequest>,
) -> AppResult<Json<MessageResponse>> {
    require_any_role(&principal, &[RoleName::Admin])?;
    require_clinic_scope(&principal, clinic_id)?;

    state
        .clinic_service
        .update_clinic(
            clinic_id,
            ClinicUpdate {
                name: payload.name,
                address: payload.address,
                phone: payload.phone,
                email: payload.email,
            },
        )
        .await?;

    Ok(Json(MessageResponse::new("Clinic updated successfully")))
}

/// Create an invitation (ADMIN)
#[utoipa::path(
    post,
    path = "/clinics/{clinic_id}/invite",
    tag = "Staff",
    security(("bearer_auth" = [])),
    params(("clinic_id" = Uuid, Path, description = "Clinic ID")),
    request_body = CreateInviteRequest,
    responses(
        (status = 201, description = "Invitation created", body = CreatedInvite),
        (status = 403, description = "ADMIN role required")
    )
)]
pub async fn create_invite(
    Extension(principal): Extension<Principal>,
    State(state): State<AppState>,
    Path(clinic_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<CreateInviteRequest>,
) -> AppResult<(StatusCode, Json<CreatedInvite>)> {
    require_any_role(&principal, &[RoleName::Admin])?;

    let invite = state
        .staff_service
        .create_invite(principal.user_id, clinic_id, payload.email, payload.role)
        .await?;

    Ok((StatusCode::CREATED, Json(invite)))
}

/// List a clinic's invitations (ADMIN)
#[utoipa::path(
    get,
    path = "/clinics/{clinic_id}/invites",
    tag = "Staff",
    security(("bearer_auth" = [])),
    params(("clinic_id" = Uuid, Path, description = "Clinic ID")),
    responses(
        (status = 200, description = "Invitations", body = Vec<InviteSummary>),
        (status = 403, description = "ADMIN role required")
    )
)]
pub async fn list_invites(
    Extension(principal): Extension<Principal>,
    State(state): State<AppState>,
    Path(clinic_id): Path<Uuid>,
) -> AppResult<Json<Vec<InviteSummary>>> {
    require_any_role(&principal, &[RoleName::Admin])?;
    require_clinic_scope(&principal, clinic_id)?;

    let invites = state.staff_service.list_invites(clinic_id).await?;
    Ok(Json(invites))
}

/// Add a staff member directly (ADMIN; seat-checked atomically)
#[utoipa::path(
    post,
    path = "/clinics/{clinic_id}/staff",
    tag = "Staff",
    security(("bearer_auth" = [])),
    params(("clinic_id" = Uuid, Path, description = "Clinic ID")),
    request_body = AddStaffRequest,
    responses(
        (status = 201, description = "Staff member added", body = AddedStaff),
        (status = 403, description = "ADMIN role required, inactive subscription or seat limit reached")
    )
)]
pub async fn add_staff(
    Extension(principal): Extension<Principal>,
    State(state): State<AppState>,
    Path(clinic_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<AddStaffRequest>,
) -> AppResult<(StatusCode, Json<AddedStaff>)> {
    require_any_role(&principal, &[RoleName::Admin])?;
    require_clinic_scope(&principal, clinic_id)?;

    // Gate on subscription state first; the seat count re-runs inside the
    // insert transaction.
    state.subscription_gate.require_active(clinic_id).await?;

    let added = state
        .staff_service
        .add_staff(
            clinic_id,
            payload.email,
            payload.full_name,
            payload.role,
            payload.also_make_admin,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(added)))
}

/// List clinic staff with aggregated roles (ADMIN)
#[utoipa::path(
    get,
    path = "/clinics/{clinic_id}/staff",
    tag = "Staff",
    security(("bearer_auth" = [])),
    params(("clinic_id" = Uuid, Path, description = "Clinic ID")),
    responses(
        (status = 200, description = "Staff members", body = Vec<StaffMember>),
        (status = 403, description = "ADMIN role required")
    )
)]
pub async fn list_staff(
    Extension(principal): Extension<Principal>,
    State(state): State<AppState>,
    Path(clinic_id): Path<Uuid>,
) -> AppResult<Json<Vec<StaffMember>>> {
    require_any_role(&principal, &[RoleName::Admin])?;
    require_clinic_scope(&principal, clinic_id)?;

    let staff = state.staff_service.list_staff(clinic_id).await?;
    Ok(Json(staff))
}

/// Update a staff member's profile and roles (ADMIN)
#[utoipa::path(
    patch,
    path = "/clinics/{clinic_id}/staff/{user_id}",
    tag = "Staff",
    security(("bearer_auth" = [])),
    params(
        ("clinic_id" = Uuid, Path, description = "Clinic ID"),
        ("user_id" = Uuid, Path, description = "Staff user ID")
    ),
    request_body = UpdateStaffRequest,
    responses(
        (status = 200, description = "Staff member updated", body = MessageResponse),
        (status = 403, description = "ADMIN role required"),
        (status = 404, description = "Staff member not found")
    )
)]
pub async fn update_staff(
    Extension(principal): Extension<Principal>,
    State(state): State<AppState>,
    Path((clinic_id, user_id)): Path<(Uuid, Uuid)>,
    ValidatedJson(payload): ValidatedJson<UpdateStaffRequest>,
) -> AppResult<Json<MessageResponse>> {
    require_any_role(&principal, &[RoleName::Admin])?;
    require_clinic_scope(&principal, clinic_id)?;

    state
        .staff_service
        .update_staff(
            clinic_id,
            user_id,
            StaffUpdate {
                full_name: payload.full_name,
                email: payload.email,
                profile_image: payload.profile_image,
                role: payload.role,
                also_make_admin: payload.also_make_admin,
            },
        )
        .await?;

    Ok(Json(MessageResponse::new("Staff member updated successfully")))
}

/// Remove a staff member from the clinic (ADMIN)
#[utoipa::path(
    delete,
    path = "/clinics/{clinic_id}/staff/{user_id}",
    tag = "Staff",
    security(("bearer_auth" = [])),
    params(
        ("clinic_id" = Uuid, Path, description = "Clinic ID"),
        ("user_id" = Uuid, Path, description = "Staff user ID")
    ),
    responses(
        (status = 200, description = "Staff member removed", body = MessageResponse),
        (status = 403, description = "ADMIN role required")
    )
)]
pub async fn remove_staff(
    Extension(principal): Extension<Principal>,
    State(state): State<AppState>,
    Path((clinic_id, user_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<MessageResponse>> {
    require_any_role(&principal, &[RoleName::Admin])?;
    require_clinic_scope(&principal, clinic_id)?;

    state.staff_service.remove_staff(clinic_id, user_id).await?;

    Ok(Json(MessageResponse::new("Staff member removed from clinic")))
}

/// Reset a staff member's password to a fresh temporary one (ADMIN)
#[utoipa::path(
    post,
    path = "/clinics/{clinic_id}/staff/{user_id}/reset-password",
    tag = "Staff",
    security(("bearer_auth" = [])),
    params(
        ("clinic_id" = Uuid, Path, description = "Clinic ID"),
        ("user_id" = Uuid, Path, description = "Staff user ID")
    ),
    responses(
        (status = 200, description = "Password reset with the new temporary password"),
        (status = 403, description = "ADMIN role required"),
        (status = 404, description = "Staff member not found in this clinic")
    )
)]
pub async fn reset_password(
    Extension(principal): Extension<Principal>,
    State(state): State<AppState>,
    Path((clinic_id, user_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<DataResponse<serde_json::Value>>> {
    require_any_role(&principal, &[RoleName::Admin])?;
    require_clinic_scope(&principal, clinic_id)?;

    let temporary_password = state
        .staff_service
        .reset_password(clinic_id, user_id)
        .await?;

    Ok(Json(DataResponse::new(
        "Password reset successfully",
        serde_json::json!({ "temporary_password": temporary_password }),
    )))
}
