//! Subscription database entity for SeaORM.

use sea_orm::entity::prelude::*;

use crate::domain::{Subscription, SubscriptionStatus};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "subscriptions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// One subscription per clinic, enforced by a unique index
    #[sea_orm(unique)]
    pub clinic_id: Uuid,
    pub plan_id: Uuid,
    pub status: String,
    pub trial_ends_at: Option<DateTimeUtc>,
    pub current_period_start: DateTimeUtc,
    pub current_period_end: DateTimeUtc,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::clinic::Entity",
        from = "Column::ClinicId",
        to = "super::clinic::Column::Id"
    )]
    Clinic,
    #[sea_orm(
        belongs_to = "super::plan::Entity",
        from = "Column::PlanId",
        to = "super::plan::Column::Id"
    )]
    Plan,
}

impl Related<super::clinic::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Clinic.def()
    }
}

impl Related<super::plan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Plan.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Subscription {
    type Error = sea_orm::DbErr;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let status: SubscriptionStatus = model
            .status
            .parse()
            .map_err(|e: String| sea_orm::DbErr::Type(e))?;
        Ok(Subscription {
            id: model.id,
            clinic_id: model.clinic_id,
            plan_id: model.plan_id,
            status,
            trial_ends_at: model.trial_ends_at,
            current_period_start: model.current_period_start,
            current_period_end: model.current_period_end,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
