pub use sea_orm_migration::prelude::*;

mod m20260101_000001_principals;
mod m20260101_000002_ledger;
mod m20260110_000001_sync;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260101_000001_principals::Migration),
            Box::new(m20260101_000002_ledger::Migration),
            Box::new(m20260110_000001_sync::Migration),
        ]
    }
}
