//! Clinic database entity for SeaORM.

use sea_orm::entity::prelude::*;

use crate::domain::Clinic;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "clinics")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::clinic_user::Entity")]
    ClinicUsers,
    #[sea_orm(has_one = "super::subscription::Entity")]
    Subscription,
}

impl Related<super::clinic_user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ClinicUsers.def()
    }
}

impl Related<super::subscription::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subscription.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Clinic {
    fn from(model: Model) -> Self {
        Clinic {
            id: model.id,
            name: model.name,
            address: model.address,
            phone: model.phone,
            email: model.email,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
