//! User database entity for SeaORM.

use sea_orm::entity::prelude::*;

use crate::domain::User;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub email_verified: bool,
    /// SHA-256 of the pending verification token (NULL once verified)
    pub verification_token_hash: Option<String>,
    pub verification_expires: Option<DateTimeUtc>,
    pub temp_password: Option<String>,
    pub profile_image: Option<String>,
    pub last_login: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::clinic_user::Entity")]
    ClinicUsers,
}

impl Related<super::clinic_user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ClinicUsers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Convert database model to domain entity
impl From<Model> for User {
    fn from(model: Model) -> Self {
        User {
            id: model.id,
            email: model.email,
            password_hash: model.password_hash,
            full_name: model.full_name,
            email_verified: model.email_verified,
            verification_token_hash: model.verification_token_hash,
            verification_expires: model.verification_expires,
            temp_password: model.temp_password,
            profile_image: model.profile_image,
            last_login: model.last_login,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
