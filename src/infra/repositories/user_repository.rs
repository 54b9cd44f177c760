//! User repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set,
};
use uuid::Uuid;

use super::entities::user::{self, ActiveModel, Entity as UserEntity};
use crate::domain::{NewUser, User};
use crate::errors::{AppError, AppResult};

#[cfg(test)]
use mockall::automock;

/// Partial update of a user's profile fields.
///
/// `profile_image` is doubly optional: the outer level is "change or not",
/// the inner one is the stored value (admins can clear an image).
#[derive(Debug, Clone, Default)]
pub struct UserProfileUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub profile_image: Option<Option<String>>,
}

/// User repository trait for dependency injection.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find user by ID
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Find user by email address
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Find user by the SHA-256 hash of a pending verification token
    async fn find_by_verification_hash(&self, token_hash: &str) -> AppResult<Option<User>>;

    /// List all users
    async fn list(&self) -> AppResult<Vec<User>>;

    /// Record a successful login
    async fn touch_last_login(&self, id: Uuid) -> AppResult<()>;

    /// Mark the email verified and clear the pending token
    async fn mark_verified(&self, id: Uuid) -> AppResult<()>;

    /// Rotate the verification token
    async fn set_verification(
        &self,
        id: Uuid,
        token_hash: String,
        expires: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Update profile fields
    async fn update_profile(&self, id: Uuid, update: UserProfileUpdate) -> AppResult<User>;

    /// Replace the password hash; `temp_password` records an admin-generated
    /// one and is cleared when the user sets their own
    async fn set_password(
        &self,
        id: Uuid,
        password_hash: String,
        temp_password: Option<String>,
    ) -> AppResult<()>;

    /// Permanently delete a user (super-admin only path)
    async fn hard_delete(&self, id: Uuid) -> AppResult<()>;
}

/// Concrete implementation backed by the shared connection pool.
pub struct UserStore {
    db: DatabaseConnection,
}

impl UserStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for UserStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        find_by_id(&self.db, id).await
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        find_by_email(&self.db, email).await
    }

    async fn find_by_verification_hash(&self, token_hash: &str) -> AppResult<Option<User>> {
        let result = UserEntity::find()
            .filter(user::Column::VerificationTokenHash.eq(token_hash))
            .one(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(result.map(User::from))
    }

    async fn list(&self) -> AppResult<Vec<User>> {
        let models = UserEntity::find()
            .all(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(models.into_iter().map(User::from).collect())
    }

    async fn touch_last_login(&self, id: Uuid) -> AppResult<()> {
        let user = UserEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: ActiveModel = user.into();
        active.last_login = Set(Some(Utc::now()));

        active.update(&self.db).await.map_err(AppError::from)?;
        Ok(())
    }

    async fn mark_verified(&self, id: Uuid) -> AppResult<()> {
        let user = UserEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: ActiveModel = user.into();
        active.email_verified = Set(true);
        active.verification_token_hash = Set(None);
        active.verification_expires = Set(None);
        active.updated_at = Set(Utc::now());

        active.update(&self.db).await.map_err(AppError::from)?;
        Ok(())
    }

    async fn set_verification(
        &self,
        id: Uuid,
        token_hash: String,
        expires: DateTime<Utc>,
    ) -> AppResult<()> {
        let user = UserEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: ActiveModel = user.into();
        active.verification_token_hash = Set(Some(token_hash));
        active.verification_expires = Set(Some(expires));
        active.updated_at = Set(Utc::now());

        active.update(&self.db).await.map_err(AppError::from)?;
        Ok(())
    }

    async fn update_profile(&self, id: Uuid, update: UserProfileUpdate) -> AppResult<User> {
        let user = UserEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: ActiveModel = user.into();
        if let Some(full_name) = update.full_name {
            active.full_name = Set(full_name);
        }
        if let Some(email) = update.email {
            active.email = Set(email);
        }
        if let Some(profile_image) = update.profile_image {
            active.profile_image = Set(profile_image);
        }
        active.updated_at = Set(Utc::now());

        let model = active.update(&self.db).await.map_err(AppError::from)?;
        Ok(User::from(model))
    }

    async fn set_password(
        &self,
        id: Uuid,
        password_hash: String,
        temp_password: Option<String>,
    ) -> AppResult<()> {
        let user = UserEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: ActiveModel = user.into();
        active.password_hash = Set(password_hash);
        active.temp_password = Set(temp_password);
        active.updated_at = Set(Utc::now());

        active.update(&self.db).await.map_err(AppError::from)?;
        Ok(())
    }

    async fn hard_delete(&self, id: Uuid) -> AppResult<()> {
        let result = UserEntity::delete_by_id(id)
            .exec(&self.db)
            .await
            .map_err(AppError::from)?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }

        Ok(())
    }
}

// Queries shared with the transaction-scoped repository.

pub(crate) async fn find_by_id<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<Option<User>> {
    let result = UserEntity::find_by_id(id)
        .one(conn)
        .await
        .map_err(AppError::from)?;

    Ok(result.map(User::from))
}

pub(crate) async fn find_by_email<C: ConnectionTrait>(
    conn: &C,
    email: &str,
) -> AppResult<Option<User>> {
    let result = UserEntity::find()
        .filter(user::Column::Email.eq(email))
        .one(conn)
        .await
        .map_err(AppError::from)?;

    Ok(result.map(User::from))
}

pub(crate) async fn create<C: ConnectionTrait>(conn: &C, new_user: NewUser) -> AppResult<User> {
    let now = Utc::now();
    let active_model = ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(new_user.email),
        password_hash: Set(new_user.password_hash),
        full_name: Set(new_user.full_name),
        email_verified: Set(new_user.email_verified),
        verification_token_hash: Set(new_user.verification_token_hash),
        verification_expires: Set(new_user.verification_expires),
        temp_password: Set(new_user.temp_password),
        profile_image: Set(None),
        last_login: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let model = active_model.insert(conn).await.map_err(AppError::from)?;
    Ok(User::from(model))
}
