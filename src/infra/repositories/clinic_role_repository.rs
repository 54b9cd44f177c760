//! Clinic/user/role association repository.
//!
//! The association triple is the unit of authorization, so this repository
//! carries the projection input query, the seat counts and the idempotent
//! upsert used everywhere a role is granted.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, FromQueryResult, JoinType,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
};
use uuid::Uuid;

use super::entities::{
    clinic, clinic_user,
    clinic_user::{ActiveModel, Entity as ClinicUserEntity},
    user,
};
use crate::domain::{AssociationRow, RoleName};
use crate::errors::{AppError, AppResult};

#[cfg(test)]
use mockall::automock;

/// One association joined with the member's user record, for staff listings.
#[derive(Debug, Clone, FromQueryResult)]
pub struct StaffAssociation {
    pub user_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub temp_password: Option<String>,
    pub profile_image: Option<String>,
    pub role: String,
}

/// One association joined with both the clinic and the user, across all
/// clinics. Feeds the super-admin aggregations.
#[derive(Debug, Clone, FromQueryResult)]
pub struct GlobalAssociation {
    pub user_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub clinic_id: Uuid,
    pub clinic_name: String,
    pub role: String,
}

/// Association repository trait for dependency injection.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClinicRoleRepository: Send + Sync {
    /// All of a user's associations joined with clinic names
    /// (the Clinic-Role Projector's input)
    async fn find_by_user(&self, user_id: Uuid) -> AppResult<Vec<AssociationRow>>;

    /// The user's roles within one clinic
    async fn roles_in_clinic(&self, user_id: Uuid, clinic_id: Uuid) -> AppResult<Vec<RoleName>>;

    /// Whether the user holds any role in the clinic
    async fn is_member(&self, user_id: Uuid, clinic_id: Uuid) -> AppResult<bool>;

    /// Whether the user holds `role` in any clinic (super-admin lookup)
    async fn has_role_anywhere(&self, user_id: Uuid, role: RoleName) -> AppResult<bool>;

    /// All members of one clinic with their user records
    async fn list_by_clinic(&self, clinic_id: Uuid) -> AppResult<Vec<StaffAssociation>>;

    /// Every association in the system (super-admin aggregation)
    async fn list_all(&self) -> AppResult<Vec<GlobalAssociation>>;

    /// Occupied doctor seats in a clinic
    async fn count_doctors(&self, clinic_id: Uuid) -> AppResult<u64>;

    /// Occupied staff seats in a clinic (all non-administrative roles)
    async fn count_staff(&self, clinic_id: Uuid) -> AppResult<u64>;

    /// Idempotently grant a role (insert with a declared conflict target)
    async fn upsert(&self, user_id: Uuid, clinic_id: Uuid, role: RoleName) -> AppResult<()>;

    /// Revoke one role
    async fn delete_role(&self, user_id: Uuid, clinic_id: Uuid, role: RoleName) -> AppResult<()>;

    /// Remove the user from the clinic entirely
    async fn delete_membership(&self, user_id: Uuid, clinic_id: Uuid) -> AppResult<()>;

    /// Remove every association of a user (hard user delete)
    async fn delete_all_for_user(&self, user_id: Uuid) -> AppResult<()>;
}

/// Concrete implementation backed by the shared connection pool.
pub struct ClinicRoleStore {
    db: DatabaseConnection,
}

impl ClinicRoleStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ClinicRoleRepository for ClinicRoleStore {
    async fn find_by_user(&self, user_id: Uuid) -> AppResult<Vec<AssociationRow>> {
        find_by_user(&self.db, user_id).await
    }

    async fn roles_in_clinic(&self, user_id: Uuid, clinic_id: Uuid) -> AppResult<Vec<RoleName>> {
        roles_in_clinic(&self.db, user_id, clinic_id).await
    }

    async fn is_member(&self, user_id: Uuid, clinic_id: Uuid) -> AppResult<bool> {
        let count = ClinicUserEntity::find()
            .filter(clinic_user::Column::UserId.eq(user_id))
            .filter(clinic_user::Column::ClinicId.eq(clinic_id))
            .count(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(count > 0)
    }

    async fn has_role_anywhere(&self, user_id: Uuid, role: RoleName) -> AppResult<bool> {
        let count = ClinicUserEntity::find()
            .filter(clinic_user::Column::UserId.eq(user_id))
            .filter(clinic_user::Column::Role.eq(role.as_str()))
            .count(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(count > 0)
    }

    async fn list_by_clinic(&self, clinic_id: Uuid) -> AppResult<Vec<StaffAssociation>> {
        let rows = ClinicUserEntity::find()
            .filter(clinic_user::Column::ClinicId.eq(clinic_id))
            .join(JoinType::InnerJoin, clinic_user::Relation::User.def())
            .select_only()
            .column(clinic_user::Column::UserId)
            .column_as(user::Column::FullName, "full_name")
            .column_as(user::Column::Email, "email")
            .column_as(user::Column::TempPassword, "temp_password")
            .column_as(user::Column::ProfileImage, "profile_image")
            .column(clinic_user::Column::Role)
            .order_by_asc(clinic_user::Column::UserId)
            .into_model::<StaffAssociation>()
            .all(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(rows)
    }

    async fn list_all(&self) -> AppResult<Vec<GlobalAssociation>> {
        let rows = ClinicUserEntity::find()
            .join(JoinType::InnerJoin, clinic_user::Relation::Clinic.def())
            .join(JoinType::InnerJoin, clinic_user::Relation::User.def())
            .select_only()
            .column(clinic_user::Column::UserId)
            .column_as(user::Column::FullName, "full_name")
            .column_as(user::Column::Email, "email")
            .column(clinic_user::Column::ClinicId)
            .column_as(clinic::Column::Name, "clinic_name")
            .column(clinic_user::Column::Role)
            .order_by_asc(clinic_user::Column::ClinicId)
            .into_model::<GlobalAssociation>()
            .all(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(rows)
    }

    async fn count_doctors(&self, clinic_id: Uuid) -> AppResult<u64> {
        count_doctors(&self.db, clinic_id).await
    }

    async fn count_staff(&self, clinic_id: Uuid) -> AppResult<u64> {
        count_staff(&self.db, clinic_id).await
    }

    async fn upsert(&self, user_id: Uuid, clinic_id: Uuid, role: RoleName) -> AppResult<()> {
        upsert(&self.db, user_id, clinic_id, role).await
    }

    async fn delete_role(&self, user_id: Uuid, clinic_id: Uuid, role: RoleName) -> AppResult<()> {
        delete_role(&self.db, user_id, clinic_id, role).await
    }

    async fn delete_membership(&self, user_id: Uuid, clinic_id: Uuid) -> AppResult<()> {
        ClinicUserEntity::delete_many()
            .filter(clinic_user::Column::UserId.eq(user_id))
            .filter(clinic_user::Column::ClinicId.eq(clinic_id))
            .exec(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(())
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> AppResult<()> {
        ClinicUserEntity::delete_many()
            .filter(clinic_user::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(())
    }
}

/// Parse a stored role string, surfacing corruption instead of passing it on.
fn parse_role(raw: &str) -> AppResult<RoleName> {
    raw.parse()
        .map_err(|e| AppError::internal(format!("corrupt role column: {}", e)))
}

// Queries shared with the transaction-scoped repository.

#[derive(Debug, FromQueryResult)]
struct ProjectionQueryRow {
    clinic_id: Uuid,
    clinic_name: String,
    role: String,
}

pub(crate) async fn find_by_user<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> AppResult<Vec<AssociationRow>> {
    let rows = ClinicUserEntity::find()
        .filter(clinic_user::Column::UserId.eq(user_id))
        .join(JoinType::InnerJoin, clinic_user::Relation::Clinic.def())
        .select_only()
        .column(clinic_user::Column::ClinicId)
        .column_as(clinic::Column::Name, "clinic_name")
        .column(clinic_user::Column::Role)
        .order_by_asc(clinic_user::Column::ClinicId)
        .into_model::<ProjectionQueryRow>()
        .all(conn)
        .await
        .map_err(AppError::from)?;

    rows.into_iter()
        .map(|row| {
            Ok(AssociationRow {
                clinic_id: row.clinic_id,
                clinic_name: row.clinic_name,
                role: parse_role(&row.role)?,
            })
        })
        .collect()
}

pub(crate) async fn roles_in_clinic<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    clinic_id: Uuid,
) -> AppResult<Vec<RoleName>> {
    let models = ClinicUserEntity::find()
        .filter(clinic_user::Column::UserId.eq(user_id))
        .filter(clinic_user::Column::ClinicId.eq(clinic_id))
        .all(conn)
        .await
        .map_err(AppError::from)?;

    models.iter().map(|m| parse_role(&m.role)).collect()
}

pub(crate) async fn count_doctors<C: ConnectionTrait>(
    conn: &C,
    clinic_id: Uuid,
) -> AppResult<u64> {
    ClinicUserEntity::find()
        .filter(clinic_user::Column::ClinicId.eq(clinic_id))
        .filter(clinic_user::Column::Role.eq(RoleName::Doctor.as_str()))
        .count(conn)
        .await
        .map_err(AppError::from)
}

pub(crate) async fn count_staff<C: ConnectionTrait>(conn: &C, clinic_id: Uuid) -> AppResult<u64> {
    let staff_roles: Vec<&str> = RoleName::ALL
        .iter()
        .filter(|r| r.counts_as_staff())
        .map(|r| r.as_str())
        .collect();

    ClinicUserEntity::find()
        .filter(clinic_user::Column::ClinicId.eq(clinic_id))
        .filter(clinic_user::Column::Role.is_in(staff_roles))
        .count(conn)
        .await
        .map_err(AppError::from)
}

pub(crate) async fn upsert<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    clinic_id: Uuid,
    role: RoleName,
) -> AppResult<()> {
    let active_model = ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        clinic_id: Set(clinic_id),
        role: Set(role.as_str().to_string()),
        created_at: Set(Utc::now()),
    };

    // Declared conflict target instead of swallowing unique-violation errors
    // at every call site.
    ClinicUserEntity::insert(active_model)
        .on_conflict(
            OnConflict::columns([
                clinic_user::Column::UserId,
                clinic_user::Column::ClinicId,
                clinic_user::Column::Role,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(conn)
        .await
        .map_err(AppError::from)?;

    Ok(())
}

pub(crate) async fn delete_role<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    clinic_id: Uuid,
    role: RoleName,
) -> AppResult<()> {
    ClinicUserEntity::delete_many()
        .filter(clinic_user::Column::UserId.eq(user_id))
        .filter(clinic_user::Column::ClinicId.eq(clinic_id))
        .filter(clinic_user::Column::Role.eq(role.as_str()))
        .exec(conn)
        .await
        .map_err(AppError::from)?;

    Ok(())
}

/// Remove the user's seat-occupying roles in a clinic (used when replacing a
/// member's primary role; the ADMIN flag is managed separately).
pub(crate) async fn delete_primary_roles<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    clinic_id: Uuid,
) -> AppResult<()> {
    let primary: Vec<&str> = RoleName::ALL
        .iter()
        .filter(|r| r.counts_as_staff())
        .map(|r| r.as_str())
        .collect();

    ClinicUserEntity::delete_many()
        .filter(clinic_user::Column::UserId.eq(user_id))
        .filter(clinic_user::Column::ClinicId.eq(clinic_id))
        .filter(clinic_user::Column::Role.is_in(primary))
        .exec(conn)
        .await
        .map_err(AppError::from)?;

    Ok(())
}
