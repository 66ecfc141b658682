use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Principals::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Principals::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Principals::DisplayName).string())
                    .col(ColumnDef::new(Principals::Email).string())
                    .col(
                        ColumnDef::new(Principals::Role)
                            .string()
                            .not_null()
                            .default("user"),
                    )
                    .col(
                        ColumnDef::new(Principals::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(Principals::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Grants::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Grants::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Grants::OwnerId).string().not_null())
                    .col(ColumnDef::new(Grants::GranteeId).string().not_null())
                    .col(ColumnDef::new(Grants::ResourceKind).string().not_null())
                    .col(ColumnDef::new(Grants::Action).string().not_null())
                    .col(
                        ColumnDef::new(Grants::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Grants::ExpiresAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-grants-owner_id")
                            .from(Grants::Table, Grants::OwnerId)
                            .to(Principals::Table, Principals::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-grants-grantee_id")
                            .from(Grants::Table, Grants::GranteeId)
                            .to(Principals::Table, Principals::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-grants-unique")
                    .table(Grants::Table)
                    .col(Grants::OwnerId)
                    .col(Grants::GranteeId)
                    .col(Grants::ResourceKind)
                    .col(Grants::Action)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Planner lookups.
        manager
            .create_index(
                Index::create()
                    .name("idx-grants-grantee-kind-action")
                    .table(Grants::Table)
                    .col(Grants::GranteeId)
                    .col(Grants::ResourceKind)
                    .col(Grants::Action)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-grants-owner-grantee")
                    .table(Grants::Table)
                    .col(Grants::OwnerId)
                    .col(Grants::GranteeId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Grants::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Principals::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Principals {
    Table,
    Id,
    DisplayName,
    Email,
    Role,
    Status,
    CreatedAt,
}

#[derive(Iden)]
enum Grants {
    Table,
    Id,
    OwnerId,
    GranteeId,
    ResourceKind,
    Action,
    CreatedAt,
    ExpiresAt,
}
