//! Ledger entries: the governed resource.
//!
//! `owner_id` is nullable only for rows written before ownership existed.
//! Such rows are readable by everyone and are claimed by their first writer.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Share of an entry attributed to one category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySplit {
    pub category_id: Uuid,
    pub amount_minor: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub owner_id: Option<String>,
    pub amount_minor: i64,
    pub ledger_date: DateTime<Utc>,
    pub effective_date: DateTime<Utc>,
    pub kind: String,
    pub counterparty: Option<String>,
    pub description: Option<String>,
    pub paid: bool,
    pub paid_date: Option<DateTime<Utc>>,
    pub entered_by: String,
    pub optional: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub categories: Vec<CategorySplit>,
}

/// Input for a new ledger entry.
#[derive(Clone, Debug, Default)]
pub struct NewEntry {
    /// Owner to write on behalf of. Defaults to the caller.
    pub owner_id: Option<String>,
    pub amount_minor: i64,
    pub ledger_date: DateTime<Utc>,
    /// Defaults to `ledger_date`.
    pub effective_date: Option<DateTime<Utc>>,
    pub kind: String,
    pub counterparty: Option<String>,
    pub description: Option<String>,
    pub paid: bool,
    pub paid_date: Option<DateTime<Utc>>,
    pub optional: bool,
    pub categories: Vec<CategorySplit>,
}

/// Partial update; `None` leaves the field untouched.
#[derive(Clone, Debug, Default)]
pub struct EntryUpdate {
    pub amount_minor: Option<i64>,
    pub ledger_date: Option<DateTime<Utc>>,
    pub effective_date: Option<DateTime<Utc>>,
    pub kind: Option<String>,
    pub counterparty: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub paid: Option<bool>,
    pub paid_date: Option<Option<DateTime<Utc>>>,
    pub optional: Option<bool>,
    /// Replaces every category link when present.
    pub categories: Option<Vec<CategorySplit>>,
}

impl EntryUpdate {
    pub fn is_empty(&self) -> bool {
        self.amount_minor.is_none()
            && self.ledger_date.is_none()
            && self.effective_date.is_none()
            && self.kind.is_none()
            && self.counterparty.is_none()
            && self.description.is_none()
            && self.paid.is_none()
            && self.paid_date.is_none()
            && self.optional.is_none()
            && self.categories.is_none()
    }
}

/// Filters for listing entries. Date bounds apply to `effective_date`,
/// `from` inclusive and `to` exclusive.
#[derive(Clone, Debug, Default)]
pub struct EntryFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub kind: Option<String>,
    pub paid: Option<bool>,
    pub optional: Option<bool>,
    /// Restrict to one owner (still intersected with the access plan).
    pub owner_id: Option<String>,
    pub limit: Option<u64>,
}

pub(crate) fn validate_amount(amount_minor: i64) -> ResultEngine<()> {
    if amount_minor <= 0 {
        return Err(EngineError::InvalidAmount(
            "amount_minor must be > 0".to_string(),
        ));
    }
    Ok(())
}

/// Category splits must sum to the entry amount and be individually positive.
pub(crate) fn validate_splits(amount_minor: i64, splits: &[CategorySplit]) -> ResultEngine<()> {
    if splits.is_empty() {
        return Ok(());
    }
    if splits.iter().any(|s| s.amount_minor <= 0) {
        return Err(EngineError::InvalidAmount(
            "category amounts must be > 0".to_string(),
        ));
    }
    let mut seen = std::collections::HashSet::new();
    if !splits.iter().all(|s| seen.insert(s.category_id)) {
        return Err(EngineError::InvalidInput(
            "category listed more than once".to_string(),
        ));
    }
    let total = splits
        .iter()
        .try_fold(0i64, |acc, s| acc.checked_add(s.amount_minor))
        .ok_or_else(|| EngineError::InvalidAmount("amount too large".to_string()))?;
    if total != amount_minor {
        return Err(EngineError::InvalidAmount(format!(
            "category amounts sum to {total}, entry amount is {amount_minor}"
        )));
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "ledger_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub owner_id: Option<String>,
    pub amount_minor: i64,
    pub ledger_date: DateTimeUtc,
    pub effective_date: DateTimeUtc,
    pub kind: String,
    pub counterparty: Option<String>,
    pub description: Option<String>,
    pub paid: bool,
    pub paid_date: Option<DateTimeUtc>,
    pub entered_by: String,
    pub optional: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::entry_categories::Entity")]
    EntryCategories,
}

impl Related<super::entry_categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EntryCategories.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl LedgerEntry {
    pub(crate) fn from_model(model: Model, categories: Vec<CategorySplit>) -> Self {
        Self {
            id: model.id,
            owner_id: model.owner_id,
            amount_minor: model.amount_minor,
            ledger_date: model.ledger_date,
            effective_date: model.effective_date,
            kind: model.kind,
            counterparty: model.counterparty,
            description: model.description,
            paid: model.paid,
            paid_date: model.paid_date,
            entered_by: model.entered_by,
            optional: model.optional,
            created_at: model.created_at,
            updated_at: model.updated_at,
            categories,
        }
    }
}

impl From<&LedgerEntry> for ActiveModel {
    fn from(value: &LedgerEntry) -> Self {
        Self {
            id: ActiveValue::Set(value.id),
            owner_id: ActiveValue::Set(value.owner_id.clone()),
            amount_minor: ActiveValue::Set(value.amount_minor),
            ledger_date: ActiveValue::Set(value.ledger_date),
            effective_date: ActiveValue::Set(value.effective_date),
            kind: ActiveValue::Set(value.kind.clone()),
            counterparty: ActiveValue::Set(value.counterparty.clone()),
            description: ActiveValue::Set(value.description.clone()),
            paid: ActiveValue::Set(value.paid),
            paid_date: ActiveValue::Set(value.paid_date),
            entered_by: ActiveValue::Set(value.entered_by.clone()),
            optional: ActiveValue::Set(value.optional),
            created_at: ActiveValue::Set(value.created_at),
            updated_at: ActiveValue::Set(value.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(amount_minor: i64) -> CategorySplit {
        CategorySplit {
            category_id: Uuid::new_v4(),
            amount_minor,
        }
    }

    #[test]
    fn splits_must_sum_to_amount() {
        assert!(validate_splits(4200, &[split(3000), split(1200)]).is_ok());
        assert!(validate_splits(4200, &[split(3000), split(1000)]).is_err());
        assert!(validate_splits(4200, &[]).is_ok());
    }

    #[test]
    fn splits_reject_duplicates_and_non_positive() {
        let s = split(100);
        assert!(validate_splits(200, &[s, s]).is_err());
        assert!(validate_splits(100, &[split(150), split(-50)]).is_err());
    }
}
