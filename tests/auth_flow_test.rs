//! Authentication flow tests.
//!
//! Login must project roles through the store, reject users with zero
//! clinic associations, and never reveal whether an email exists.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use clinic_api::config::Config;
use clinic_api::domain::{
    AssociationRow, ClinicRoleMap, Password, Principal, RoleName, User,
};
use clinic_api::errors::{AppError, AppResult};
use clinic_api::infra::{
    ClinicRepository, ClinicRoleRepository, InviteRepository, PatientRepository, PlanRepository,
    SubscriptionRepository, TransactionContext, UnitOfWork, UserProfileUpdate, UserRepository,
};
use clinic_api::jobs::Mailer;
use clinic_api::services::{
    AuthService, Authenticator, ClinicRoleProjector, SessionCodec,
};

const SECRET: &str = "test-secret-key-at-least-32-chars!!";

// =============================================================================
// In-memory user repository
// =============================================================================

struct InMemoryUsers {
    users: Mutex<Vec<User>>,
}

impl InMemoryUsers {
    fn with_user(user: User) -> Self {
        Self {
            users: Mutex::new(vec![user]),
        }
    }

    fn last_login_of(&self, id: Uuid) -> Option<chrono::DateTime<Utc>> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == id)
            .and_then(|u| u.last_login)
    }
}

#[async_trait]
impl UserRepository for InMemoryUsers {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_by_verification_hash(&self, token_hash: &str) -> AppResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.verification_token_hash.as_deref() == Some(token_hash))
            .cloned())
    }

    async fn list(&self) -> AppResult<Vec<User>> {
        Ok(self.users.lock().unwrap().clone())
    }

    async fn touch_last_login(&self, id: Uuid) -> AppResult<()> {
        let mut users = self.users.lock().unwrap();
        let user = users.iter_mut().find(|u| u.id == id).ok_or(AppError::NotFound)?;
        user.last_login = Some(Utc::now());
        Ok(())
    }

    async fn mark_verified(&self, id: Uuid) -> AppResult<()> {
        let mut users = self.users.lock().unwrap();
        let user = users.iter_mut().find(|u| u.id == id).ok_or(AppError::NotFound)?;
        user.email_verified = true;
        user.verification_token_hash = None;
        user.verification_expires = None;
        Ok(())
    }

    async fn set_verification(
        &self,
        id: Uuid,
        token_hash: String,
        expires: chrono::DateTime<Utc>,
    ) -> AppResult<()> {
        let mut users = self.users.lock().unwrap();
        let user = users.iter_mut().find(|u| u.id == id).ok_or(AppError::NotFound)?;
        user.verification_token_hash = Some(token_hash);
        user.verification_expires = Some(expires);
        Ok(())
    }

    async fn update_profile(&self, _id: Uuid, _update: UserProfileUpdate) -> AppResult<User> {
        unimplemented!("not used by these tests")
    }

    async fn set_password(
        &self,
        _id: Uuid,
        _password_hash: String,
        _temp_password: Option<String>,
    ) -> AppResult<()> {
        unimplemented!("not used by these tests")
    }

    async fn hard_delete(&self, _id: Uuid) -> AppResult<()> {
        unimplemented!("not used by these tests")
    }
}

struct TestUnitOfWork {
    users: Arc<InMemoryUsers>,
}

#[async_trait]
impl UnitOfWork for TestUnitOfWork {
    fn users(&self) -> Arc<dyn UserRepository> {
        self.users.clone()
    }

    fn clinics(&self) -> Arc<dyn ClinicRepository> {
        unimplemented!("not used by these tests")
    }

    fn clinic_roles(&self) -> Arc<dyn ClinicRoleRepository> {
        unimplemented!("not used by these tests")
    }

    fn invites(&self) -> Arc<dyn InviteRepository> {
        unimplemented!("not used by these tests")
    }

    fn subscriptions(&self) -> Arc<dyn SubscriptionRepository> {
        unimplemented!("not used by these tests")
    }

    fn plans(&self) -> Arc<dyn PlanRepository> {
        unimplemented!("not used by these tests")
    }

    fn patients(&self) -> Arc<dyn PatientRepository> {
        unimplemented!("not used by these tests")
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

/// Projector backed by a fixed row set.
struct FixedProjector {
    rows: Mutex<Vec<AssociationRow>>,
    system_clinic_id: Uuid,
}

#[async_trait]
impl ClinicRoleProjector for FixedProjector {
    async fn project(&self, _user_id: Uuid) -> AppResult<ClinicRoleMap> {
        ClinicRoleMap::project(self.rows.lock().unwrap().clone())
    }

    fn system_clinic_id(&self) -> Uuid {
        self.system_clinic_id
    }
}

// =============================================================================
// Fixtures
// =============================================================================

fn user_with_password(password: &str) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        email: "doctor@example.com".to_string(),
        password_hash: Password::new(password).unwrap().into_string(),
        full_name: "Test Doctor".to_string(),
        email_verified: true,
        verification_token_hash: None,
        verification_expires: None,
        temp_password: None,
        profile_image: None,
        last_login: None,
        created_at: now,
        updated_at: now,
    }
}

fn authenticator(
    users: Arc<InMemoryUsers>,
    rows: Vec<AssociationRow>,
    system_clinic_id: Uuid,
) -> Authenticator<TestUnitOfWork> {
    let config = Config::with_secret(SECRET);
    let projector = Arc::new(FixedProjector {
        rows: Mutex::new(rows),
        system_clinic_id,
    });

    Authenticator::new(
        Arc::new(TestUnitOfWork { users }),
        SessionCodec::new(config.clone()),
        projector,
        Mailer::disabled(),
        config.frontend_url.clone(),
    )
}

fn row(clinic_id: Uuid, name: &str, role: RoleName) -> AssociationRow {
    AssociationRow {
        clinic_id,
        clinic_name: name.to_string(),
        role,
    }
}

// =============================================================================
// Login
// =============================================================================

#[tokio::test]
async fn login_issues_a_session_for_the_default_clinic() {
    let user = user_with_password("password123");
    let user_id = user.id;
    let users = Arc::new(InMemoryUsers::with_user(user));

    let system = Uuid::new_v4();
    let clinic = Uuid::new_v4();
    let auth = authenticator(
        users.clone(),
        vec![
            row(clinic, "Alpha", RoleName::Doctor),
            row(clinic, "Alpha", RoleName::Admin),
        ],
        system,
    );

    let session = auth
        .login("doctor@example.com".to_string(), "password123".to_string())
        .await
        .unwrap();

    assert_eq!(session.selected_clinic.clinic_id, clinic);
    assert_eq!(
        session.selected_clinic.roles,
        BTreeSet::from([RoleName::Doctor, RoleName::Admin])
    );

    // Token round-trips through the codec with the projected roles.
    let codec = SessionCodec::new(Config::with_secret(SECRET));
    let claims = codec.verify(&session.session.token).unwrap();
    assert_eq!(claims.sub, user_id);
    assert_eq!(claims.clinic_id, clinic);
    assert!(claims.roles.contains(&RoleName::Doctor));

    // Login records last_login.
    assert!(users.last_login_of(user_id).is_some());
}

#[tokio::test]
async fn login_with_wrong_password_is_invalid_credentials() {
    let users = Arc::new(InMemoryUsers::with_user(user_with_password("password123")));
    let auth = authenticator(
        users,
        vec![row(Uuid::new_v4(), "Alpha", RoleName::Doctor)],
        Uuid::new_v4(),
    );

    let err = auth
        .login("doctor@example.com".to_string(), "wrong-password".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidCredentials));
}

#[tokio::test]
async fn login_with_unknown_email_is_the_same_invalid_credentials() {
    let users = Arc::new(InMemoryUsers::with_user(user_with_password("password123")));
    let auth = authenticator(
        users,
        vec![row(Uuid::new_v4(), "Alpha", RoleName::Doctor)],
        Uuid::new_v4(),
    );

    let err = auth
        .login("nobody@example.com".to_string(), "password123".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidCredentials));
}

#[tokio::test]
async fn login_with_zero_associations_fails_with_no_clinic_association() {
    let users = Arc::new(InMemoryUsers::with_user(user_with_password("password123")));
    let auth = authenticator(users, vec![], Uuid::new_v4());

    let err = auth
        .login("doctor@example.com".to_string(), "password123".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NoClinicAssociation));
}

#[tokio::test]
async fn super_admin_capability_rides_into_the_default_clinic_session() {
    let user = user_with_password("password123");
    let users = Arc::new(InMemoryUsers::with_user(user));

    let system = Uuid::new_v4();
    let clinic = Uuid::new_v4();
    let auth = authenticator(
        users,
        vec![
            row(system, "System", RoleName::SuperAdmin),
            row(clinic, "Alpha", RoleName::Doctor),
        ],
        system,
    );

    let session = auth
        .login("doctor@example.com".to_string(), "password123".to_string())
        .await
        .unwrap();

    // The non-System clinic wins the default pick, and SUPER_ADMIN is
    // appended to its session roles.
    assert_eq!(session.selected_clinic.clinic_id, clinic);

    let codec = SessionCodec::new(Config::with_secret(SECRET));
    let claims = codec.verify(&session.session.token).unwrap();
    assert!(claims.roles.contains(&RoleName::SuperAdmin));
    assert!(claims.roles.contains(&RoleName::Doctor));
}

// =============================================================================
// /auth/me refresh
// =============================================================================

#[tokio::test]
async fn me_rederives_roles_and_reissues_the_token() {
    let user = user_with_password("password123");
    let user_id = user.id;
    let users = Arc::new(InMemoryUsers::with_user(user));

    let system = Uuid::new_v4();
    let clinic = Uuid::new_v4();

    let config = Config::with_secret(SECRET);
    let projector = Arc::new(FixedProjector {
        rows: Mutex::new(vec![
            row(clinic, "Alpha", RoleName::Doctor),
            row(clinic, "Alpha", RoleName::Admin),
        ]),
        system_clinic_id: system,
    });
    let auth = Authenticator::new(
        Arc::new(TestUnitOfWork { users }),
        SessionCodec::new(config.clone()),
        projector.clone(),
        Mailer::disabled(),
        config.frontend_url.clone(),
    );

    // The principal's token was issued when the user still held ADMIN.
    let principal = Principal::new(user_id, clinic, [RoleName::Doctor, RoleName::Admin]);

    // An admin revokes the role mid-session.
    *projector.rows.lock().unwrap() = vec![row(clinic, "Alpha", RoleName::Doctor)];

    let session = auth.me(&principal).await.unwrap();

    // The refreshed token carries only the re-derived roles.
    let codec = SessionCodec::new(Config::with_secret(SECRET));
    let claims = codec.verify(&session.session.token).unwrap();
    assert_eq!(claims.roles, vec![RoleName::Doctor]);
}

#[tokio::test]
async fn me_with_zero_associations_rejects_rather_than_degrading() {
    let user = user_with_password("password123");
    let user_id = user.id;
    let users = Arc::new(InMemoryUsers::with_user(user));
    let auth = authenticator(users, vec![], Uuid::new_v4());

    let principal = Principal::new(user_id, Uuid::new_v4(), [RoleName::Doctor]);
    let err = auth.me(&principal).await.unwrap_err();
    assert!(matches!(err, AppError::NoClinicAssociation));
}

// =============================================================================
// Email verification
// =============================================================================

#[tokio::test]
async fn verify_email_consumes_the_token() {
    let (token, token_hash) = clinic_api::domain::generate_token();

    let mut user = user_with_password("password123");
    user.email_verified = false;
    user.verification_token_hash = Some(token_hash);
    user.verification_expires = Some(Utc::now() + chrono::Duration::hours(24));
    let user_id = user.id;

    let users = Arc::new(InMemoryUsers::with_user(user));
    let auth = authenticator(
        users.clone(),
        vec![row(Uuid::new_v4(), "Alpha", RoleName::Doctor)],
        Uuid::new_v4(),
    );

    auth.verify_email(&token).await.unwrap();

    let user = users.find_by_id(user_id).await.unwrap().unwrap();
    assert!(user.email_verified);
    assert!(user.verification_token_hash.is_none());

    // The token hash is gone, so a second attempt fails.
    assert!(auth.verify_email(&token).await.is_err());
}

#[tokio::test]
async fn expired_verification_token_is_rejected() {
    let (token, token_hash) = clinic_api::domain::generate_token();

    let mut user = user_with_password("password123");
    user.email_verified = false;
    user.verification_token_hash = Some(token_hash);
    user.verification_expires = Some(Utc::now() - chrono::Duration::hours(1));

    let users = Arc::new(InMemoryUsers::with_user(user));
    let auth = authenticator(
        users,
        vec![row(Uuid::new_v4(), "Alpha", RoleName::Doctor)],
        Uuid::new_v4(),
    );

    let err = auth.verify_email(&token).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}
