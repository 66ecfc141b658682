//! Mirrored account transactions from the budgeting service, per owner.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "mirror_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub external_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub owner_id: String,
    pub account_id: String,
    pub date: String,
    pub amount_milliunits: i64,
    pub payee_name: Option<String>,
    pub memo: Option<String>,
    pub category_id: Option<String>,
    pub last_updated: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
