//! Database migrations.
//!
//! Each migration is a separate module following SeaORM conventions.
//! Migration names follow the pattern: m{YYYYMMDD}_{NNNNNN}_{description}

use sea_orm_migration::prelude::*;

mod m20250310_000001_create_identity_tables;
mod m20250310_000002_create_billing_tables;
mod m20250310_000003_create_invites_and_patients;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250310_000001_create_identity_tables::Migration),
            Box::new(m20250310_000002_create_billing_tables::Migration),
            Box::new(m20250310_000003_create_invites_and_patients::Migration),
        ]
    }
}
