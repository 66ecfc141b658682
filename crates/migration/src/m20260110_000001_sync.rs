use sea_orm_migration::prelude::*;

use super::m20260101_000001_principals::Principals;

#[derive(DeriveMigrationName)]
pub struct Migration;

fn owner_fk(table: Mirror, name: &str) -> ForeignKeyCreateStatement {
    ForeignKey::create()
        .name(name)
        .from(table, Mirror::OwnerId)
        .to(Principals::Table, Principals::Id)
        .on_delete(ForeignKeyAction::Cascade)
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CredentialRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CredentialRecords::OwnerId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CredentialRecords::TokenCiphertext)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(CredentialRecords::BudgetCiphertext)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(CredentialRecords::AccountCiphertext)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(CredentialRecords::LastSynced).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(CredentialRecords::SyncPeriodMinutes)
                            .integer()
                            .not_null()
                            .default(60),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-credential_records-owner_id")
                            .from(CredentialRecords::Table, CredentialRecords::OwnerId)
                            .to(Principals::Table, Principals::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Mirror::MirrorGroups)
                    .if_not_exists()
                    .col(ColumnDef::new(Mirror::ExternalId).string().not_null())
                    .col(ColumnDef::new(Mirror::OwnerId).string().not_null())
                    .col(ColumnDef::new(Mirror::Name).string().not_null())
                    .col(
                        ColumnDef::new(Mirror::LastUpdated)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(Index::create().col(Mirror::ExternalId).col(Mirror::OwnerId))
                    .foreign_key(&mut owner_fk(Mirror::MirrorGroups, "fk-mirror_groups-owner_id"))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Mirror::MirrorCategories)
                    .if_not_exists()
                    .col(ColumnDef::new(Mirror::ExternalId).string().not_null())
                    .col(ColumnDef::new(Mirror::OwnerId).string().not_null())
                    .col(ColumnDef::new(Mirror::GroupId).string().not_null())
                    .col(ColumnDef::new(Mirror::Name).string().not_null())
                    .col(
                        ColumnDef::new(Mirror::LastUpdated)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(Index::create().col(Mirror::ExternalId).col(Mirror::OwnerId))
                    .foreign_key(&mut owner_fk(
                        Mirror::MirrorCategories,
                        "fk-mirror_categories-owner_id",
                    ))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Mirror::MirrorTransactions)
                    .if_not_exists()
                    .col(ColumnDef::new(Mirror::ExternalId).string().not_null())
                    .col(ColumnDef::new(Mirror::OwnerId).string().not_null())
                    .col(ColumnDef::new(Mirror::AccountId).string().not_null())
                    .col(ColumnDef::new(Mirror::Date).string().not_null())
                    .col(
                        ColumnDef::new(Mirror::AmountMilliunits)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Mirror::PayeeName).string())
                    .col(ColumnDef::new(Mirror::Memo).string())
                    .col(ColumnDef::new(Mirror::CategoryId).string())
                    .col(
                        ColumnDef::new(Mirror::LastUpdated)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(Index::create().col(Mirror::ExternalId).col(Mirror::OwnerId))
                    .foreign_key(&mut owner_fk(
                        Mirror::MirrorTransactions,
                        "fk-mirror_transactions-owner_id",
                    ))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            Mirror::MirrorTransactions,
            Mirror::MirrorCategories,
            Mirror::MirrorGroups,
        ] {
            manager
                .drop_table(Table::drop().table(table).to_owned())
                .await?;
        }
        manager
            .drop_table(Table::drop().table(CredentialRecords::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum CredentialRecords {
    Table,
    OwnerId,
    TokenCiphertext,
    BudgetCiphertext,
    AccountCiphertext,
    LastSynced,
    SyncPeriodMinutes,
}

#[derive(Iden, Clone, Copy)]
enum Mirror {
    MirrorGroups,
    MirrorCategories,
    MirrorTransactions,
    ExternalId,
    OwnerId,
    GroupId,
    Name,
    AccountId,
    Date,
    AmountMilliunits,
    PayeeName,
    Memo,
    CategoryId,
    LastUpdated,
}
