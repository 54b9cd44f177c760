//! Patient handlers. Thin CRUD behind the subscription gate: every route
//! requires an active subscription, and the history view additionally
//! requires the `patient_history` plan feature.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::api::extractors::ValidatedJson;
use crate::api::AppState;
use crate::config::FEATURE_PATIENT_HISTORY;
use crate::domain::{
    require_any_role, NewPatient, Patient, PatientSummary, PatientUpdate, Principal, RoleName,
};
use crate::errors::AppResult;
use crate::types::MessageResponse;

/// Patient creation request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePatientRequest {
    #[validate(length(min = 1, message = "Full name is required"))]
    pub full_name: String,
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Patient update request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdatePatientRequest {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub full_name: Option<String>,
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Create patient routes (all require an authenticated session).
pub fn patient_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_patients).post(create_patient))
        .route("/:patient_id/history", get(patient_history))
        .route(
            "/:patient_id",
            axum::routing::patch(update_patient).delete(delete_patient),
        )
}

/// List the active clinic's patients
#[utoipa::path(
    get,
    path = "/patients",
    tag = "Patients",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Patients", body = Vec<PatientSummary>),
        (status = 403, description = "Subscription inactive")
    )
)]
pub async fn list_patients(
    Extension(principal): Extension<Principal>,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<PatientSummary>>> {
    let clinic_id = principal.require_clinic()?;
    state.subscription_gate.require_active(clinic_id).await?;

    let patients = state.patient_service.list(clinic_id).await?;
    Ok(Json(patients))
}

/// Register a patient (RECEPTIONIST or ADMIN)
#[utoipa::path(
    post,
    path = "/patients",
    tag = "Patients",
    security(("bearer_auth" = [])),
    request_body = CreatePatientRequest,
    responses(
        (status = 201, description = "Patient created"),
        (status = 403, description = "Role or subscription denial")
    )
)]
pub async fn create_patient(
    Extension(principal): Extension<Principal>,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreatePatientRequest>,
) -> AppResult<(StatusCode, Json<Patient>)> {
    require_any_role(&principal, &[RoleName::Receptionist, RoleName::Admin])?;
    let clinic_id = principal.require_clinic()?;
    state.subscription_gate.require_active(clinic_id).await?;

    let patient = state
        .patient_service
        .create(NewPatient {
            clinic_id,
            full_name: payload.full_name,
            phone: payload.phone,
            email: payload.email,
            date_of_birth: payload.date_of_birth,
            notes: payload.notes,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(patient)))
}

/// Full patient record including clinical notes
/// (requires the `patient_history` plan feature)
#[utoipa::path(
    get,
    path = "/patients/{patient_id}/history",
    tag = "Patients",
    security(("bearer_auth" = [])),
    params(("patient_id" = Uuid, Path, description = "Patient ID")),
    responses(
        (status = 200, description = "Patient history"),
        (status = 403, description = "Feature not in plan"),
        (status = 404, description = "Patient not found")
    )
)]
pub async fn patient_history(
    Extension(principal): Extension<Principal>,
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
) -> AppResult<Json<Patient>> {
    let clinic_id = principal.require_clinic()?;
    state.subscription_gate.require_active(clinic_id).await?;
    state
        .subscription_gate
        .require_feature(clinic_id, FEATURE_PATIENT_HISTORY)
        .await?;

    let patient = state.patient_service.history(patient_id, clinic_id).await?;
    Ok(Json(patient))
}

/// Update a patient (RECEPTIONIST or ADMIN)
#[utoipa::path(
    patch,
    path = "/patients/{patient_id}",
    tag = "Patients",
    security(("bearer_auth" = [])),
    params(("patient_id" = Uuid, Path, description = "Patient ID")),
    request_body = UpdatePatientRequest,
    responses(
        (status = 200, description = "Patient updated"),
        (status = 403, description = "Role or subscription denial"),
        (status = 404, description = "Patient not found")
    )
)]
pub async fn update_patient(
    Extension(principal): Extension<Principal>,
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdatePatientRequest>,
) -> AppResult<Json<Patient>> {
    require_any_role(&principal, &[RoleName::Receptionist, RoleName::Admin])?;
    let clinic_id = principal.require_clinic()?;
    state.subscription_gate.require_active(clinic_id).await?;

    let patient = state
        .patient_service
        .update(
            patient_id,
            clinic_id,
            PatientUpdate {
                full_name: payload.full_name,
                phone: payload.phone,
                email: payload.email,
                date_of_birth: payload.date_of_birth,
                notes: payload.notes,
            },
        )
        .await?;

    Ok(Json(patient))
}

/// Delete a patient (ADMIN)
#[utoipa::path(
    delete,
    path = "/patients/{patient_id}",
    tag = "Patients",
    security(("bearer_auth" = [])),
    params(("patient_id" = Uuid, Path, description = "Patient ID")),
    responses(
        (status = 200, description = "Patient deleted", body = MessageResponse),
        (status = 403, description = "ADMIN role required"),
        (status = 404, description = "Patient not found")
    )
)]
pub async fn delete_patient(
    Extension(principal): Extension<Principal>,
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    require_any_role(&principal, &[RoleName::Admin])?;
    let clinic_id = principal.require_clinic()?;
    state.subscription_gate.require_active(clinic_id).await?;

    state.patient_service.delete(patient_id, clinic_id).await?;
    Ok(Json(MessageResponse::new("Patient deleted successfully")))
}
