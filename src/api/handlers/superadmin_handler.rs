//! Super-admin handlers. Every route requires the SUPER_ADMIN capability.

use axum::{
    extract::{Extension, Path, State},
    response::Json,
    routing::get,
    Router,
};
use uuid::Uuid;

use crate::api::extractors::ValidatedJson;
use crate::api::AppState;
use crate::domain::{require_super_admin, ClinicUpdate, Principal};
use crate::errors::AppResult;
use crate::services::{AdminClinic, AdminUser};
use crate::types::MessageResponse;

use super::clinic_handler::UpdateClinicRequest;

/// Create super-admin routes.
pub fn superadmin_routes() -> Router<AppState> {
    Router::new()
        .route("/clinics", get(list_clinics))
        .route(
            "/clinics/:clinic_id",
            axum::routing::patch(update_clinic).delete(delete_clinic),
        )
        .route("/users", get(list_users))
        .route("/users/:user_id", axum::routing::delete(delete_user))
}

/// All clinics with aggregated staff
#[utoipa::path(
    get,
    path = "/superadmin/clinics",
    tag = "Super Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All clinics", body = Vec<AdminClinic>),
        (status = 403, description = "SUPER_ADMIN required")
    )
)]
pub async fn list_clinics(
    Extension(principal): Extension<Principal>,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<AdminClinic>>> {
    require_super_admin(&principal)?;

    let clinics = state.admin_service.list_clinics().await?;
    Ok(Json(clinics))
}

/// Update any clinic
#[utoipa::path(
    patch,
    path = "/superadmin/clinics/{clinic_id}",
    tag = "Super Admin",
    security(("bearer_auth" = [])),
    params(("clinic_id" = Uuid, Path, description = "Clinic ID")),
    request_body = UpdateClinicRequest,
    responses(
        (status = 200, description = "Clinic updated", body = MessageResponse),
        (status = 403, description = "SUPER_ADMIN required")
    )
)]
pub async fn update_clinic(
    Extension(principal): Extension<Principal>,
    State(state): State<AppState>,
    Path(clinic_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateClinicRequest>,
) -> AppResult<Json<MessageResponse>> {
    require_super_admin(&principal)?;

    state
        .admin_service
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

/// Delete a clinic and all dependent rows
#[utoipa::path(
    delete,
    path = "/superadmin/clinics/{clinic_id}",
    tag = "Super Admin",
    security(("bearer_auth" = [])),
    params(("clinic_id" = Uuid, Path, description = "Clinic ID")),
    responses(
        (status = 200, description = "Clinic removed", body = MessageResponse),
        (status = 403, description = "SUPER_ADMIN required"),
        (status = 404, description = "Clinic not found")
    )
)]
pub async fn delete_clinic(
    Extension(principal): Extension<Principal>,
    State(state): State<AppState>,
    Path(clinic_id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    require_super_admin(&principal)?;

    state.admin_service.delete_clinic(clinic_id).await?;
    Ok(Json(MessageResponse::new("Clinic removed successfully")))
}

/// All users with clinic, role and plan summaries
#[utoipa::path(
    get,
    path = "/superadmin/users",
    tag = "Super Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All users", body = Vec<AdminUser>),
        (status = 403, description = "SUPER_ADMIN required")
    )
)]
pub async fn list_users(
    Extension(principal): Extension<Principal>,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<AdminUser>>> {
    require_super_admin(&principal)?;

    let users = state.admin_service.list_users().await?;
    Ok(Json(users))
}

/// Hard-delete a user
#[utoipa::path(
    delete,
    path = "/superadmin/users/{user_id}",
    tag = "Super Admin",
    security(("bearer_auth" = [])),
    params(("user_id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User removed", body = MessageResponse),
        (status = 403, description = "SUPER_ADMIN required"),
        (status = 404, description = "User not found")
    )
)]
pub async fn delete_user(
    Extension(principal): Extension<Principal>,
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    require_super_admin(&principal)?;

    state.admin_service.delete_user(user_id).await?;
    Ok(Json(MessageResponse::new("User removed successfully")))
}
