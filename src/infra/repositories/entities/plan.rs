//! Subscription plan entity for SeaORM.

use sea_orm::entity::prelude::*;

use crate::domain::Plan;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "plans")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub name: String,
    pub price_monthly: i64,
    pub price_yearly: i64,
    pub max_doctors: Option<i64>,
    pub max_staff: Option<i64>,
    /// JSON-encoded list of feature tags
    pub features: String,
    pub multi_clinic: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::subscription::Entity")]
    Subscriptions,
}

impl Related<super::subscription::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subscriptions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Plan {
    fn from(model: Model) -> Self {
        // A malformed feature column yields an empty set rather than a crash;
        // gating then fails closed on feature checks.
        let features: Vec<String> = serde_json::from_str(&model.features).unwrap_or_default();
        Plan {
            id: model.id,
            name: model.name,
            price_monthly: model.price_monthly,
            price_yearly: model.price_yearly,
            max_doctors: model.max_doctors,
            max_staff: model.max_staff,
            features,
            multi_clinic: model.multi_clinic,
        }
    }
}
