//! Invite repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use super::entities::invite::{self, ActiveModel, Entity as InviteEntity, Model};
use crate::domain::{Invite, RoleName};
use crate::errors::{AppError, AppResult};

#[cfg(test)]
use mockall::automock;

/// Fields for creating an invite row.
#[derive(Debug, Clone)]
pub struct NewInvite {
    pub email: String,
    pub clinic_id: Uuid,
    pub role: RoleName,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_by: Uuid,
}

/// Invite repository trait for dependency injection.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InviteRepository: Send + Sync {
    /// Create an invite
    async fn create(&self, new_invite: NewInvite) -> AppResult<Invite>;

    /// List a clinic's invites, newest first
    async fn list_by_clinic(&self, clinic_id: Uuid) -> AppResult<Vec<Invite>>;
}

/// Concrete implementation backed by the shared connection pool.
pub struct InviteStore {
    db: DatabaseConnection,
}

impl InviteStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl InviteRepository for InviteStore {
    async fn create(&self, new_invite: NewInvite) -> AppResult<Invite> {
        let active_model = ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(new_invite.email),
            clinic_id: Set(new_invite.clinic_id),
            role: Set(new_invite.role.as_str().to_string()),
            token_hash: Set(new_invite.token_hash),
            expires_at: Set(new_invite.expires_at),
            accepted_at: Set(None),
            created_by: Set(new_invite.created_by),
            created_at: Set(Utc::now()),
        };

        let model = active_model.insert(&self.db).await.map_err(AppError::from)?;
        to_domain(model)
    }

    async fn list_by_clinic(&self, clinic_id: Uuid) -> AppResult<Vec<Invite>> {
        let models = InviteEntity::find()
            .filter(invite::Column::ClinicId.eq(clinic_id))
            .order_by_desc(invite::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(AppError::from)?;

        models.into_iter().map(to_domain).collect()
    }
}

fn to_domain(model: Model) -> AppResult<Invite> {
    let role: RoleName = model
        .role
        .parse()
        .map_err(|e| AppError::internal(format!("corrupt role column: {}", e)))?;

    Ok(Invite {
        id: model.id,
        email: model.email,
        clinic_id: model.clinic_id,
        role,
        token_hash: model.token_hash,
        expires_at: model.expires_at,
        accepted_at: model.accepted_at,
        created_by: model.created_by,
        created_at: model.created_at,
    })
}

// Queries shared with the transaction-scoped repository.

/// Look up an unaccepted invite by token hash. Expiry is checked by the
/// caller so expired and spent tokens produce the same generic denial.
pub(crate) async fn find_unaccepted_by_hash<C: ConnectionTrait>(
    conn: &C,
    token_hash: &str,
) -> AppResult<Option<Invite>> {
    let model = InviteEntity::find()
        .filter(invite::Column::TokenHash.eq(token_hash))
        .filter(invite::Column::AcceptedAt.is_null())
        .one(conn)
        .await
        .map_err(AppError::from)?;

    model.map(to_domain).transpose()
}

/// Consume an invite. The accepted_at write is what makes a second
/// acceptance of the same token fail.
pub(crate) async fn mark_accepted<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<()> {
    let model = InviteEntity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(AppError::InvalidInvite)?;

    let mut active: ActiveModel = model.into();
    active.accepted_at = Set(Some(Utc::now()));

    active.update(conn).await.map_err(AppError::from)?;
    Ok(())
}
