//! Migration: users, clinics and the clinic/user/role association.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .col(ColumnDef::new(Users::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Users::Email)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                    .col(ColumnDef::new(Users::FullName).string().not_null())
                    .col(
                        ColumnDef::new(Users::EmailVerified)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Users::VerificationTokenHash).string().null())
                    .col(
                        ColumnDef::new(Users::VerificationExpires)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Users::TempPassword).string().null())
                    .col(ColumnDef::new(Users::ProfileImage).text().null())
                    .col(
                        ColumnDef::new(Users::LastLogin)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Users::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Clinics::Table)
                    .col(ColumnDef::new(Clinics::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Clinics::Name).string().not_null())
                    .col(ColumnDef::new(Clinics::Address).string().null())
                    .col(ColumnDef::new(Clinics::Phone).string().null())
                    .col(ColumnDef::new(Clinics::Email).string().null())
                    .col(
                        ColumnDef::new(Clinics::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Clinics::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ClinicUsers::Table)
                    .col(
                        ColumnDef::new(ClinicUsers::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ClinicUsers::UserId).uuid().not_null())
                    .col(ColumnDef::new(ClinicUsers::ClinicId).uuid().not_null())
                    .col(
                        ColumnDef::new(ClinicUsers::Role)
                            .string()
                            .not_null()
                            .check(
                                Expr::col(ClinicUsers::Role).is_in([
                                    "DOCTOR",
                                    "RECEPTIONIST",
                                    "ADMIN",
                                    "SUPER_ADMIN",
                                ]),
                            ),
                    )
                    .col(
                        ColumnDef::new(ClinicUsers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_clinic_users_user")
                            .from(ClinicUsers::Table, ClinicUsers::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_clinic_users_clinic")
                            .from(ClinicUsers::Table, ClinicUsers::ClinicId)
                            .to(Clinics::Table, Clinics::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Backstop for the concurrent seat-check race: the triple is unique.
        manager
            .create_index(
                Index::create()
                    .name("idx_clinic_users_triple")
                    .table(ClinicUsers::Table)
                    .col(ClinicUsers::UserId)
                    .col(ClinicUsers::ClinicId)
                    .col(ClinicUsers::Role)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_clinic_users_clinic_role")
                    .table(ClinicUsers::Table)
                    .col(ClinicUsers::ClinicId)
                    .col(ClinicUsers::Role)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ClinicUsers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Clinics::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
    Email,
    PasswordHash,
    FullName,
    EmailVerified,
    VerificationTokenHash,
    VerificationExpires,
    TempPassword,
    ProfileImage,
    LastLogin,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Clinics {
    Table,
    Id,
    Name,
    Address,
    Phone,
    Email,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum ClinicUsers {
    Table,
    Id,
    UserId,
    ClinicId,
    Role,
    CreatedAt,
}
