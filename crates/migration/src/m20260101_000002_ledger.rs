use sea_orm_migration::prelude::*;

use super::m20260101_000001_principals::Principals;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Categories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Categories::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Categories::OwnerId).string().not_null())
                    .col(ColumnDef::new(Categories::Name).string().not_null())
                    .col(ColumnDef::new(Categories::NameNorm).string().not_null())
                    .col(ColumnDef::new(Categories::Description).string())
                    .col(ColumnDef::new(Categories::Color).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-categories-owner_id")
                            .from(Categories::Table, Categories::OwnerId)
                            .to(Principals::Table, Principals::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-categories-owner_id-name_norm-unique")
                    .table(Categories::Table)
                    .col(Categories::OwnerId)
                    .col(Categories::NameNorm)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // `owner_id` stays nullable for rows written before ownership.
        manager
            .create_table(
                Table::create()
                    .table(LedgerEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LedgerEntries::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LedgerEntries::OwnerId).string())
                    .col(
                        ColumnDef::new(LedgerEntries::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LedgerEntries::LedgerDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LedgerEntries::EffectiveDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(LedgerEntries::Kind).string().not_null())
                    .col(ColumnDef::new(LedgerEntries::Counterparty).string())
                    .col(ColumnDef::new(LedgerEntries::Description).string())
                    .col(
                        ColumnDef::new(LedgerEntries::Paid)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(LedgerEntries::PaidDate).timestamp_with_time_zone())
                    .col(ColumnDef::new(LedgerEntries::EnteredBy).string().not_null())
                    .col(
                        ColumnDef::new(LedgerEntries::Optional)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(LedgerEntries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LedgerEntries::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-ledger_entries-owner_id")
                            .from(LedgerEntries::Table, LedgerEntries::OwnerId)
                            .to(Principals::Table, Principals::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-ledger_entries-owner_id-effective_date")
                    .table(LedgerEntries::Table)
                    .col(LedgerEntries::OwnerId)
                    .col(LedgerEntries::EffectiveDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EntryCategories::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(EntryCategories::EntryId).uuid().not_null())
                    .col(
                        ColumnDef::new(EntryCategories::CategoryId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EntryCategories::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(EntryCategories::EntryId)
                            .col(EntryCategories::CategoryId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-entry_categories-entry_id")
                            .from(EntryCategories::Table, EntryCategories::EntryId)
                            .to(LedgerEntries::Table, LedgerEntries::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-entry_categories-category_id")
                            .from(EntryCategories::Table, EntryCategories::CategoryId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        for table in [Blobs::SavedFilters, Blobs::CustomReports] {
            manager
                .create_table(
                    Table::create()
                        .table(table)
                        .if_not_exists()
                        .col(ColumnDef::new(Blobs::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Blobs::OwnerId).string().not_null())
                        .col(ColumnDef::new(Blobs::Name).string().not_null())
                        .col(ColumnDef::new(Blobs::Payload).json().not_null())
                        .col(
                            ColumnDef::new(Blobs::Shared)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Blobs::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name(format!("fk-{}-owner_id", table.to_string()))
                                .from(table, Blobs::OwnerId)
                                .to(Principals::Table, Principals::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [Blobs::CustomReports, Blobs::SavedFilters] {
            manager
                .drop_table(Table::drop().table(table).to_owned())
                .await?;
        }
        manager
            .drop_table(Table::drop().table(EntryCategories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LedgerEntries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Categories::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Categories {
    Table,
    Id,
    OwnerId,
    Name,
    NameNorm,
    Description,
    Color,
}

#[derive(Iden)]
enum LedgerEntries {
    Table,
    Id,
    OwnerId,
    AmountMinor,
    LedgerDate,
    EffectiveDate,
    Kind,
    Counterparty,
    Description,
    Paid,
    PaidDate,
    EnteredBy,
    Optional,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum EntryCategories {
    Table,
    EntryId,
    CategoryId,
    AmountMinor,
}

/// Saved filters and custom reports share one shape.
#[derive(Iden, Clone, Copy)]
enum Blobs {
    SavedFilters,
    CustomReports,
    Id,
    OwnerId,
    Name,
    Payload,
    Shared,
    CreatedAt,
}
