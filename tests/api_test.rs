//! Handler-level tests for the HTTP surface.
//!
//! These run the real router, middleware and authorization checks against
//! mocked services — no database or Redis needed.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use std::collections::BTreeSet;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use clinic_api::api::{create_router, AppState, StateServices};
use clinic_api::config::Config;
use clinic_api::domain::{
    Clinic, ClinicMembership, ClinicUpdate, NewPatient, Patient, PatientSummary, PatientUpdate,
    Principal, RoleName, SeatUsage, Subscription, SubscriptionStatus, UserResponse,
};
use clinic_api::errors::{AppError, AppResult};
use clinic_api::services::{
    AcceptInviteOutcome, AddedStaff, AdminClinic, AdminService, AdminUser, AuthService,
    AuthSession, BillingCycle, ClinicService, CreatedInvite, InviteSummary, PatientService,
    PlanSummary, SessionCodec, SessionToken, SignupOutcome, StaffMember, StaffService,
    StaffUpdate, SubscriptionGate, SubscriptionOverview, SwitchOutcome,
};

const SECRET: &str = "test-secret-key-for-testing-only-32!";

// =============================================================================
// Mock services
// =============================================================================

fn mock_session() -> SessionToken {
    SessionToken {
        token: "mock-token".to_string(),
        expires_in: 604_800,
    }
}

fn mock_membership(clinic_id: Uuid) -> ClinicMembership {
    ClinicMembership {
        clinic_id,
        clinic_name: "Alpha".to_string(),
        roles: BTreeSet::from([RoleName::Doctor, RoleName::Admin]),
    }
}

fn mock_user() -> UserResponse {
    UserResponse {
        id: Uuid::new_v4(),
        email: "doctor@example.com".to_string(),
        full_name: "Test Doctor".to_string(),
        email_verified: true,
    }
}

struct MockAuthService;

#[async_trait]
impl AuthService for MockAuthService {
    async fn signup(
        &self,
        _email: String,
        _password: String,
        _full_name: String,
    ) -> AppResult<SignupOutcome> {
        Err(AppError::internal("not under test"))
    }

    async fn login(&self, email: String, _password: String) -> AppResult<AuthSession> {
        if email == "doctor@example.com" {
            let clinic_id = Uuid::new_v4();
            Ok(AuthSession {
                user: mock_user(),
                clinics: vec![mock_membership(clinic_id)],
                selected_clinic: mock_membership(clinic_id),
                session: mock_session(),
            })
        } else {
            Err(AppError::InvalidCredentials)
        }
    }

    async fn me(&self, principal: &Principal) -> AppResult<AuthSession> {
        let clinic_id = principal.clinic_id.unwrap_or_else(Uuid::new_v4);
        Ok(AuthSession {
            user: mock_user(),
            clinics: vec![mock_membership(clinic_id)],
            selected_clinic: mock_membership(clinic_id),
            session: mock_session(),
        })
    }

    async fn verify_email(&self, _token: &str) -> AppResult<()> {
        Ok(())
    }

    async fn resend_verification(&self, _email: &str) -> AppResult<()> {
        Ok(())
    }

    async fn accept_invite(
        &self,
        _token: &str,
        _password: Option<String>,
        _full_name: Option<String>,
    ) -> AppResult<AcceptInviteOutcome> {
        Err(AppError::InvalidInvite)
    }
}

struct MockClinicService;

#[async_trait]
impl ClinicService for MockClinicService {
    async fn get_clinic(&self, _user_id: Uuid, clinic_id: Uuid) -> AppResult<Clinic> {
        let now = Utc::now();
        Ok(Clinic {
            id: clinic_id,
            name: "Alpha".to_string(),
            address: None,
            phone: None,
            email: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn update_clinic(&self, clinic_id: Uuid, _update: ClinicUpdate) -> AppResult<Clinic> {
        self.get_clinic(Uuid::new_v4(), clinic_id).await
    }

    async fn switch_clinic(&self, _user_id: Uuid, _clinic_id: Uuid) -> AppResult<SwitchOutcome> {
        Err(AppError::ClinicAccessDenied)
    }
}

struct MockStaffService;

#[async_trait]
impl StaffService for MockStaffService {
    async fn create_invite(
        &self,
        _created_by: Uuid,
        _clinic_id: Uuid,
        _email: String,
        _role: RoleName,
    ) -> AppResult<CreatedInvite> {
        Err(AppError::internal("not under test"))
    }

    async fn list_invites(&self, _clinic_id: Uuid) -> AppResult<Vec<InviteSummary>> {
        Ok(vec![])
    }

    async fn add_staff(
        &self,
        _clinic_id: Uuid,
        _email: String,
        _full_name: String,
        _role: RoleName,
        _also_make_admin: bool,
    ) -> AppResult<AddedStaff> {
        Err(AppError::internal("not under test"))
    }

    async fn list_staff(&self, _clinic_id: Uuid) -> AppResult<Vec<StaffMember>> {
        Ok(vec![])
    }

    async fn update_staff(
        &self,
        _clinic_id: Uuid,
        _user_id: Uuid,
        _update: StaffUpdate,
    ) -> AppResult<()> {
        Ok(())
    }

    async fn remove_staff(&self, _clinic_id: Uuid, _user_id: Uuid) -> AppResult<()> {
        Ok(())
    }

    async fn reset_password(&self, _clinic_id: Uuid, _user_id: Uuid) -> AppResult<String> {
        Ok("temp-password".to_string())
    }
}

/// Gate whose answers are fixed per test.
#[derive(Clone, Copy)]
enum GateMode {
    Allow,
    TrialExpired,
    NoSubscription,
}

struct MockGate {
    mode: GateMode,
    feature_allowed: bool,
}

impl MockGate {
    fn subscription(clinic_id: Uuid) -> Subscription {
        let now = Utc::now();
        Subscription {
            id: Uuid::new_v4(),
            clinic_id,
            plan_id: Uuid::new_v4(),
            status: SubscriptionStatus::Active,
            trial_ends_at: None,
            current_period_start: now,
            current_period_end: now,
            created_at: now,
            updated_at: now,
        }
    }
}

#[async_trait]
impl SubscriptionGate for MockGate {
    async fn require_active(&self, clinic_id: Uuid) -> AppResult<Subscription> {
        match self.mode {
            GateMode::Allow => Ok(Self::subscription(clinic_id)),
            GateMode::TrialExpired => Err(AppError::TrialExpired),
            GateMode::NoSubscription => Err(AppError::SubscriptionRequired),
        }
    }

    async fn require_feature(&self, _clinic_id: Uuid, feature: &str) -> AppResult<()> {
        if self.feature_allowed {
            Ok(())
        } else {
            Err(AppError::FeatureNotInPlan {
                feature: feature.to_string(),
                plan: "STARTER".to_string(),
            })
        }
    }

    async fn check_seat_limit(&self, _clinic_id: Uuid, _role: RoleName) -> AppResult<()> {
        Ok(())
    }

    async fn usage(&self, _clinic_id: Uuid) -> AppResult<SeatUsage> {
        Ok(SeatUsage {
            doctors: 0,
            total_staff: 0,
        })
    }

    async fn overview(&self, _clinic_id: Uuid) -> AppResult<SubscriptionOverview> {
        Err(AppError::NotFound)
    }

    async fn list_plans(&self) -> AppResult<Vec<PlanSummary>> {
        Ok(vec![])
    }

    async fn upgrade(
        &self,
        _clinic_id: Uuid,
        _plan_name: &str,
        _cycle: BillingCycle,
    ) -> AppResult<SubscriptionOverview> {
        Err(AppError::NotFound)
    }

    async fn downgrade(
        &self,
        _clinic_id: Uuid,
        _plan_name: &str,
    ) -> AppResult<SubscriptionOverview> {
        Err(AppError::NotFound)
    }

    async fn cancel(&self, _clinic_id: Uuid) -> AppResult<DateTime<Utc>> {
        Ok(Utc::now())
    }
}

struct MockAdminService;

#[async_trait]
impl AdminService for MockAdminService {
    async fn list_clinics(&self) -> AppResult<Vec<AdminClinic>> {
        Ok(vec![])
    }

    async fn update_clinic(&self, _clinic_id: Uuid, _update: ClinicUpdate) -> AppResult<()> {
        Ok(())
    }

    async fn delete_clinic(&self, _clinic_id: Uuid) -> AppResult<()> {
        Ok(())
    }

    async fn list_users(&self) -> AppResult<Vec<AdminUser>> {
        Ok(vec![])
    }

    async fn delete_user(&self, _user_id: Uuid) -> AppResult<()> {
        Ok(())
    }
}

struct MockPatientService;

#[async_trait]
impl PatientService for MockPatientService {
    async fn list(&self, _clinic_id: Uuid) -> AppResult<Vec<PatientSummary>> {
        Ok(vec![])
    }

    async fn create(&self, new_patient: NewPatient) -> AppResult<Patient> {
        let now = Utc::now();
        Ok(Patient {
            id: Uuid::new_v4(),
            clinic_id: new_patient.clinic_id,
            full_name: new_patient.full_name,
            phone: new_patient.phone,
            email: new_patient.email,
            date_of_birth: new_patient.date_of_birth,
            notes: new_patient.notes,
            created_at: now,
            updated_at: now,
        })
    }

    async fn history(&self, _id: Uuid, clinic_id: Uuid) -> AppResult<Patient> {
        let now = Utc::now();
        Ok(Patient {
            id: Uuid::new_v4(),
            clinic_id,
            full_name: "Pat".to_string(),
            phone: None,
            email: None,
            date_of_birth: None,
            notes: Some("notes".to_string()),
            created_at: now,
            updated_at: now,
        })
    }

    async fn update(
        &self,
        _id: Uuid,
        _clinic_id: Uuid,
        _update: PatientUpdate,
    ) -> AppResult<Patient> {
        Err(AppError::NotFound)
    }

    async fn delete(&self, _id: Uuid, _clinic_id: Uuid) -> AppResult<()> {
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn test_app(gate_mode: GateMode, feature_allowed: bool) -> axum::Router {
    let codec = SessionCodec::new(Config::with_secret(SECRET));
    let state = AppState::for_testing(
        StateServices {
            auth: Arc::new(MockAuthService),
            clinics: Arc::new(MockClinicService),
            staff: Arc::new(MockStaffService),
            subscriptions: Arc::new(MockGate {
                mode: gate_mode,
                feature_allowed,
            }),
            admin: Arc::new(MockAdminService),
            patients: Arc::new(MockPatientService),
        },
        codec,
    );
    create_router(state)
}

fn bearer_for(roles: &[RoleName], clinic_id: Uuid) -> String {
    let codec = SessionCodec::new(Config::with_secret(SECRET));
    let role_set: BTreeSet<RoleName> = roles.iter().copied().collect();
    let session = codec.issue(Uuid::new_v4(), clinic_id, &role_set).unwrap();
    format!("Bearer {}", session.token)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn root_responds() {
    let app = test_app(GateMode::Allow, true);
    let response = app
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_sets_the_session_cookie() {
    let app = test_app(GateMode::Allow, true);
    let response = app
        .oneshot(
            Request::post("/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"email":"doctor@example.com","password":"password123"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(set_cookie.contains("token=mock-token"));
    assert!(set_cookie.contains("HttpOnly"));

    let body = body_json(response).await;
    assert_eq!(body["token"], "mock-token");
}

#[tokio::test]
async fn bad_credentials_are_a_generic_401() {
    let app = test_app(GateMode::Allow, true);
    let response = app
        .oneshot(
            Request::post("/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"email":"nobody@example.com","password":"password123"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn protected_routes_reject_missing_tokens() {
    let app = test_app(GateMode::Allow, true);
    let response = app
        .oneshot(Request::get("/auth/me").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn tampered_tokens_get_the_same_generic_rejection() {
    let app = test_app(GateMode::Allow, true);
    let response = app
        .oneshot(
            Request::get("/auth/me")
                .header(header::AUTHORIZATION, "Bearer not-a-real-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    // Same code as a missing token: cause is never leaked.
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn bearer_tokens_authenticate_without_a_cookie() {
    let app = test_app(GateMode::Allow, true);
    let clinic_id = Uuid::new_v4();
    let response = app
        .oneshot(
            Request::get("/auth/me")
                .header(
                    header::AUTHORIZATION,
                    bearer_for(&[RoleName::Doctor], clinic_id),
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn staff_listing_requires_the_admin_role() {
    let app = test_app(GateMode::Allow, true);
    let clinic_id = Uuid::new_v4();

    let response = app
        .oneshot(
            Request::get(format!("/clinics/{}/staff", clinic_id))
                .header(
                    header::AUTHORIZATION,
                    bearer_for(&[RoleName::Doctor], clinic_id),
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "FORBIDDEN");
    // The denial names both sides for client UX.
    assert_eq!(body["error"]["details"]["required"][0], "ADMIN");
    assert_eq!(body["error"]["details"]["current"][0], "DOCTOR");
}

#[tokio::test]
async fn staff_listing_allows_admins_of_the_clinic() {
    let app = test_app(GateMode::Allow, true);
    let clinic_id = Uuid::new_v4();

    let response = app
        .oneshot(
            Request::get(format!("/clinics/{}/staff", clinic_id))
                .header(
                    header::AUTHORIZATION,
                    bearer_for(&[RoleName::Admin], clinic_id),
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn staff_listing_rejects_admins_of_another_clinic() {
    let app = test_app(GateMode::Allow, true);

    let response = app
        .oneshot(
            Request::get(format!("/clinics/{}/staff", Uuid::new_v4()))
                .header(
                    header::AUTHORIZATION,
                    bearer_for(&[RoleName::Admin], Uuid::new_v4()),
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "CLINIC_ACCESS_DENIED");
}

#[tokio::test]
async fn super_admin_routes_deny_plain_admins() {
    let app = test_app(GateMode::Allow, true);

    let response = app
        .oneshot(
            Request::get("/superadmin/clinics")
                .header(
                    header::AUTHORIZATION,
                    bearer_for(&[RoleName::Admin], Uuid::new_v4()),
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "SUPER_ADMIN_REQUIRED");
}

#[tokio::test]
async fn super_admin_routes_allow_the_capability() {
    let app = test_app(GateMode::Allow, true);

    let response = app
        .oneshot(
            Request::get("/superadmin/clinics")
                .header(
                    header::AUTHORIZATION,
                    bearer_for(&[RoleName::SuperAdmin], Uuid::new_v4()),
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn gated_routes_surface_trial_expiry_with_upgrade_hint() {
    let app = test_app(GateMode::TrialExpired, true);
    let clinic_id = Uuid::new_v4();

    let response = app
        .oneshot(
            Request::get("/patients")
                .header(
                    header::AUTHORIZATION,
                    bearer_for(&[RoleName::Doctor], clinic_id),
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "TRIAL_EXPIRED");
    assert_eq!(body["error"]["details"]["requires_upgrade"], true);
}

#[tokio::test]
async fn gated_routes_surface_missing_subscription() {
    let app = test_app(GateMode::NoSubscription, true);
    let clinic_id = Uuid::new_v4();

    let response = app
        .oneshot(
            Request::get("/patients")
                .header(
                    header::AUTHORIZATION,
                    bearer_for(&[RoleName::Doctor], clinic_id),
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "SUBSCRIPTION_REQUIRED");
}

#[tokio::test]
async fn patient_history_requires_the_plan_feature() {
    let app = test_app(GateMode::Allow, false);
    let clinic_id = Uuid::new_v4();

    let response = app
        .oneshot(
            Request::get(format!("/patients/{}/history", Uuid::new_v4()))
                .header(
                    header::AUTHORIZATION,
                    bearer_for(&[RoleName::Doctor], clinic_id),
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "FEATURE_NOT_IN_PLAN");
    assert_eq!(body["error"]["details"]["feature"], "patient_history");
}

#[tokio::test]
async fn patient_history_allows_when_the_feature_is_in_plan() {
    let app = test_app(GateMode::Allow, true);
    let clinic_id = Uuid::new_v4();

    let response = app
        .oneshot(
            Request::get(format!("/patients/{}/history", Uuid::new_v4()))
                .header(
                    header::AUTHORIZATION,
                    bearer_for(&[RoleName::Doctor], clinic_id),
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn plan_catalog_is_public() {
    let app = test_app(GateMode::Allow, true);
    let response = app
        .oneshot(Request::get("/billing/plans").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
