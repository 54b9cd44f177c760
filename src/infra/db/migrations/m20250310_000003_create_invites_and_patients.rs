//! Migration: invites and clinic-scoped patients.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Invites::Table)
                    .col(ColumnDef::new(Invites::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Invites::Email).string().not_null())
                    .col(ColumnDef::new(Invites::ClinicId).uuid().not_null())
                    .col(ColumnDef::new(Invites::Role).string().not_null())
                    .col(
                        ColumnDef::new(Invites::TokenHash)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Invites::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Invites::AcceptedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Invites::CreatedBy).uuid().not_null())
                    .col(
                        ColumnDef::new(Invites::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_invites_clinic")
                            .from(Invites::Table, Invites::ClinicId)
                            .to(Clinics::Table, Clinics::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Patients::Table)
                    .col(ColumnDef::new(Patients::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Patients::ClinicId).uuid().not_null())
                    .col(ColumnDef::new(Patients::FullName).string().not_null())
                    .col(ColumnDef::new(Patients::Phone).string().null())
                    .col(ColumnDef::new(Patients::Email).string().null())
                    .col(ColumnDef::new(Patients::DateOfBirth).date().null())
                    .col(ColumnDef::new(Patients::Notes).text().null())
                    .col(
                        ColumnDef::new(Patients::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Patients::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_patients_clinic")
                            .from(Patients::Table, Patients::ClinicId)
                            .to(Clinics::Table, Clinics::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_patients_clinic")
                    .table(Patients::Table)
                    .col(Patients::ClinicId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Patients::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Invites::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Invites {
    Table,
    Id,
    Email,
    ClinicId,
    Role,
    TokenHash,
    ExpiresAt,
    AcceptedAt,
    CreatedBy,
    CreatedAt,
}

#[derive(Iden)]
enum Patients {
    Table,
    Id,
    ClinicId,
    FullName,
    Phone,
    Email,
    DateOfBirth,
    Notes,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Clinics {
    Table,
    Id,
}
