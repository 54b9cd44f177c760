//! Migration: subscription plans and per-clinic subscriptions, with the
//! seeded plan catalog.

use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Statement;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Plans::Table)
                    .col(ColumnDef::new(Plans::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Plans::Name).string().not_null().unique_key())
                    .col(ColumnDef::new(Plans::PriceMonthly).big_integer().not_null())
                    .col(ColumnDef::new(Plans::PriceYearly).big_integer().not_null())
                    .col(ColumnDef::new(Plans::MaxDoctors).big_integer().null())
                    .col(ColumnDef::new(Plans::MaxStaff).big_integer().null())
                    .col(ColumnDef::new(Plans::Features).text().not_null())
                    .col(
                        ColumnDef::new(Plans::MultiClinic)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Subscriptions::Table)
                    .col(
                        ColumnDef::new(Subscriptions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Subscriptions::ClinicId)
                            .uuid()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Subscriptions::PlanId).uuid().not_null())
                    .col(
                        ColumnDef::new(Subscriptions::Status)
                            .string()
                            .not_null()
                            .check(Expr::col(Subscriptions::Status).is_in([
                                "trialing",
                                "active",
                                "past_due",
                                "canceled",
                            ])),
                    )
                    .col(
                        ColumnDef::new(Subscriptions::TrialEndsAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Subscriptions::CurrentPeriodStart)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Subscriptions::CurrentPeriodEnd)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Subscriptions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Subscriptions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_subscriptions_clinic")
                            .from(Subscriptions::Table, Subscriptions::ClinicId)
                            .to(Clinics::Table, Clinics::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_subscriptions_plan")
                            .from(Subscriptions::Table, Subscriptions::PlanId)
                            .to(Plans::Table, Plans::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // Seed the plan catalog. ON CONFLICT keeps re-runs of a fresh
        // migration cycle idempotent.
        let seed = r#"
            INSERT INTO plans (id, name, price_monthly, price_yearly, max_doctors, max_staff, features, multi_clinic)
            VALUES
                (gen_random_uuid(), 'STARTER', 2900, 29000, 1, 3, '["patient_history"]', false),
                (gen_random_uuid(), 'GROWTH', 7900, 79000, 5, 15, '["patient_history"]', false),
                (gen_random_uuid(), 'UNLIMITED', 19900, 199000, NULL, NULL, '["patient_history","multi_clinic"]', true)
            ON CONFLICT (name) DO NOTHING
        "#;
        manager
            .get_connection()
            .execute(Statement::from_string(
                manager.get_database_backend(),
                seed.to_string(),
            ))
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Subscriptions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Plans::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Plans {
    Table,
    Id,
    Name,
    PriceMonthly,
    PriceYearly,
    MaxDoctors,
    MaxStaff,
    Features,
    MultiClinic,
}

#[derive(Iden)]
enum Subscriptions {
    Table,
    Id,
    ClinicId,
    PlanId,
    Status,
    TrialEndsAt,
    CurrentPeriodStart,
    CurrentPeriodEnd,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Clinics {
    Table,
    Id,
}
