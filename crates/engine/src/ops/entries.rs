use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sea_orm::{
    ActiveValue, DatabaseTransaction, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait, prelude::*,
};
use uuid::Uuid;

use crate::{
    Action, CategorySplit, EngineError, EntryFilter, EntryUpdate, LedgerEntry, NewEntry,
    Principal, ResourceKind, ResultEngine, categories,
    entries::{self, validate_amount, validate_splits},
    entry_categories,
    util::{normalize_optional_text, normalize_required_name},
};

use super::{Engine, with_tx};

impl Engine {
    pub(super) async fn load_splits(
        &self,
        db: &DatabaseTransaction,
        entry_ids: &[Uuid],
    ) -> ResultEngine<HashMap<Uuid, Vec<CategorySplit>>> {
        let mut out: HashMap<Uuid, Vec<CategorySplit>> = HashMap::new();
        if entry_ids.is_empty() {
            return Ok(out);
        }
        let rows = entry_categories::Entity::find()
            .filter(entry_categories::Column::EntryId.is_in(entry_ids.iter().copied()))
            .order_by_asc(entry_categories::Column::EntryId)
            .order_by_asc(entry_categories::Column::CategoryId)
            .all(db)
            .await?;
        for row in rows {
            out.entry(row.entry_id).or_default().push(CategorySplit {
                category_id: row.category_id,
                amount_minor: row.amount_minor,
            });
        }
        Ok(out)
    }

    /// Every linked category must exist and belong to the entry owner.
    async fn require_owned_categories(
        &self,
        db: &DatabaseTransaction,
        owner_id: &str,
        splits: &[CategorySplit],
    ) -> ResultEngine<()> {
        if splits.is_empty() {
            return Ok(());
        }
        let ids: HashSet<Uuid> = splits.iter().map(|s| s.category_id).collect();
        let found = categories::Entity::find()
            .filter(categories::Column::Id.is_in(ids.iter().copied()))
            .filter(categories::Column::OwnerId.eq(owner_id.to_string()))
            .count(db)
            .await?;
        if found != ids.len() as u64 {
            return Err(EngineError::InvalidInput(format!(
                "categories must exist and belong to {owner_id}"
            )));
        }
        Ok(())
    }

    async fn replace_splits(
        &self,
        db: &DatabaseTransaction,
        entry_id: Uuid,
        splits: &[CategorySplit],
    ) -> ResultEngine<()> {
        entry_categories::Entity::delete_many()
            .filter(entry_categories::Column::EntryId.eq(entry_id))
            .exec(db)
            .await?;
        if splits.is_empty() {
            return Ok(());
        }
        let rows = splits.iter().map(|s| entry_categories::ActiveModel {
            entry_id: ActiveValue::Set(entry_id),
            category_id: ActiveValue::Set(s.category_id),
            amount_minor: ActiveValue::Set(s.amount_minor),
        });
        entry_categories::Entity::insert_many(rows).exec(db).await?;
        Ok(())
    }

    /// Loads an entry for writing.
    ///
    /// Rows outside the read plan are reported as missing; rows the caller
    /// can read but not write are forbidden.
    async fn require_entry_write(
        &self,
        db: &DatabaseTransaction,
        actor: &Principal,
        entry_id: Uuid,
    ) -> ResultEngine<entries::Model> {
        let model = entries::Entity::find_by_id(entry_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("entry not exists".to_string()))?;
        let Some(owner) = model.owner_id.as_deref() else {
            return Ok(model);
        };
        if self
            .check_for(db, actor, owner, ResourceKind::Transactions, Action::Write)
            .await?
        {
            return Ok(model);
        }
        if self
            .check_for(db, actor, owner, ResourceKind::Transactions, Action::Read)
            .await?
        {
            return Err(EngineError::Forbidden(
                "no write access to this entry".to_string(),
            ));
        }
        Err(EngineError::KeyNotFound("entry not exists".to_string()))
    }

    /// Creates a ledger entry owned by the caller or, given a write grant,
    /// by `new.owner_id`.
    pub async fn create_entry(&self, user_id: &str, new: NewEntry) -> ResultEngine<LedgerEntry> {
        validate_amount(new.amount_minor)?;
        validate_splits(new.amount_minor, &new.categories)?;
        let kind = normalize_required_name(&new.kind, "kind")?;

        with_tx!(self, |db_tx| {
            let actor = self.require_actor(&db_tx, user_id).await?;
            let owner = self
                .owner_on_write(
                    &db_tx,
                    &actor,
                    new.owner_id.as_deref(),
                    ResourceKind::Transactions,
                )
                .await?;
            self.require_owned_categories(&db_tx, &owner, &new.categories)
                .await?;

            let now = Utc::now();
            let entry = LedgerEntry {
                id: Uuid::new_v4(),
                owner_id: Some(owner),
                amount_minor: new.amount_minor,
                ledger_date: new.ledger_date,
                effective_date: new.effective_date.unwrap_or(new.ledger_date),
                kind,
                counterparty: normalize_optional_text(new.counterparty.as_deref()),
                description: normalize_optional_text(new.description.as_deref()),
                paid: new.paid,
                paid_date: new.paid_date,
                entered_by: actor.id.clone(),
                optional: new.optional,
                created_at: now,
                updated_at: now,
                categories: new.categories.clone(),
            };
            let model: entries::ActiveModel = (&entry).into();
            model.insert(&db_tx).await?;
            self.replace_splits(&db_tx, entry.id, &entry.categories)
                .await?;
            Ok(entry)
        })
    }

    /// Lists entries visible to the caller, newest effective date first.
    pub async fn list_entries(
        &self,
        user_id: &str,
        filter: EntryFilter,
    ) -> ResultEngine<Vec<LedgerEntry>> {
        with_tx!(self, |db_tx| {
            let (actor, plan) = self
                .plan_access(&db_tx, user_id, ResourceKind::Transactions, Action::Read)
                .await?;

            let mut query =
                entries::Entity::find().filter(plan.predicate(entries::Column::OwnerId));
            if let Some(from) = filter.from {
                query = query.filter(entries::Column::EffectiveDate.gte(from));
            }
            if let Some(to) = filter.to {
                query = query.filter(entries::Column::EffectiveDate.lt(to));
            }
            if let Some(kind) = filter.kind.as_deref() {
                query = query.filter(entries::Column::Kind.eq(kind.trim()));
            }
            if let Some(paid) = filter.paid {
                query = query.filter(entries::Column::Paid.eq(paid));
            }
            if let Some(optional) = filter.optional {
                query = query.filter(entries::Column::Optional.eq(optional));
            }
            if let Some(owner) = filter.owner_id.as_deref() {
                query = query.filter(entries::Column::OwnerId.eq(owner));
            }
            query = query
                .order_by_desc(entries::Column::EffectiveDate)
                .order_by_desc(entries::Column::CreatedAt)
                .order_by_asc(entries::Column::Id);
            if let Some(limit) = filter.limit {
                query = query.limit(limit);
            }
            let models = query.all(&db_tx).await?;

            let legacy = models.iter().filter(|m| m.owner_id.is_none()).count();
            self.note_legacy_rows(&actor.id, "ledger_entries", legacy);

            let ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();
            let mut splits = self.load_splits(&db_tx, &ids).await?;
            Ok(models
                .into_iter()
                .map(|m| {
                    let categories = splits.remove(&m.id).unwrap_or_default();
                    LedgerEntry::from_model(m, categories)
                })
                .collect())
        })
    }

    /// Return one entry if it is visible to the caller.
    pub async fn entry(&self, user_id: &str, entry_id: Uuid) -> ResultEngine<LedgerEntry> {
        with_tx!(self, |db_tx| {
            let (actor, plan) = self
                .plan_access(&db_tx, user_id, ResourceKind::Transactions, Action::Read)
                .await?;
            let model = entries::Entity::find_by_id(entry_id)
                .filter(plan.predicate(entries::Column::OwnerId))
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("entry not exists".to_string()))?;
            if model.owner_id.is_none() {
                self.note_legacy_rows(&actor.id, "ledger_entries", 1);
            }
            let mut splits = self.load_splits(&db_tx, &[model.id]).await?;
            let categories = splits.remove(&model.id).unwrap_or_default();
            Ok(LedgerEntry::from_model(model, categories))
        })
    }

    /// Applies a partial update.
    ///
    /// A row without an owner is claimed by the caller. When the amount
    /// changes, either new splits are supplied or the existing ones must
    /// still add up.
    pub async fn update_entry(
        &self,
        user_id: &str,
        entry_id: Uuid,
        update: EntryUpdate,
    ) -> ResultEngine<LedgerEntry> {
        if update.is_empty() {
            return Err(EngineError::InvalidInput("nothing to update".to_string()));
        }
        let kind = update
            .kind
            .as_deref()
            .map(|k| normalize_required_name(k, "kind"))
            .transpose()?;

        with_tx!(self, |db_tx| {
            let actor = self.require_actor(&db_tx, user_id).await?;
            let model = self.require_entry_write(&db_tx, &actor, entry_id).await?;

            let owner = match model.owner_id.clone() {
                Some(owner) => owner,
                None => {
                    self.note_legacy_rows(&actor.id, "ledger_entries", 1);
                    tracing::info!(entry = %entry_id, principal = %actor.id, "legacy entry claimed");
                    actor.id.clone()
                }
            };

            let amount_minor = update.amount_minor.unwrap_or(model.amount_minor);
            validate_amount(amount_minor)?;

            let existing = self
                .load_splits(&db_tx, &[entry_id])
                .await?
                .remove(&entry_id)
                .unwrap_or_default();
            let splits = match update.categories.as_ref() {
                Some(splits) => {
                    validate_splits(amount_minor, splits)?;
                    self.require_owned_categories(&db_tx, &owner, splits)
                        .await?;
                    self.replace_splits(&db_tx, entry_id, splits).await?;
                    splits.clone()
                }
                None => {
                    if amount_minor != model.amount_minor {
                        validate_splits(amount_minor, &existing)?;
                    }
                    existing
                }
            };

            let mut active: entries::ActiveModel = model.into();
            active.owner_id = ActiveValue::Set(Some(owner));
            active.amount_minor = ActiveValue::Set(amount_minor);
            if let Some(ledger_date) = update.ledger_date {
                active.ledger_date = ActiveValue::Set(ledger_date);
            }
            if let Some(effective_date) = update.effective_date {
                active.effective_date = ActiveValue::Set(effective_date);
            }
            if let Some(kind) = kind {
                active.kind = ActiveValue::Set(kind);
            }
            if let Some(counterparty) = update.counterparty.as_ref() {
                active.counterparty =
                    ActiveValue::Set(normalize_optional_text(counterparty.as_deref()));
            }
            if let Some(description) = update.description.as_ref() {
                active.description =
                    ActiveValue::Set(normalize_optional_text(description.as_deref()));
            }
            if let Some(paid) = update.paid {
                active.paid = ActiveValue::Set(paid);
            }
            if let Some(paid_date) = update.paid_date {
                active.paid_date = ActiveValue::Set(paid_date);
            }
            if let Some(optional) = update.optional {
                active.optional = ActiveValue::Set(optional);
            }
            active.updated_at = ActiveValue::Set(Utc::now());
            let model = active.update(&db_tx).await?;

            Ok(LedgerEntry::from_model(model, splits))
        })
    }

    /// Deletes an entry and its category links.
    pub async fn delete_entry(&self, user_id: &str, entry_id: Uuid) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let actor = self.require_actor(&db_tx, user_id).await?;
            let model = self.require_entry_write(&db_tx, &actor, entry_id).await?;
            if model.owner_id.is_none() {
                self.note_legacy_rows(&actor.id, "ledger_entries", 1);
            }
            entry_categories::Entity::delete_many()
                .filter(entry_categories::Column::EntryId.eq(entry_id))
                .exec(&db_tx)
                .await?;
            entries::Entity::delete_by_id(entry_id).exec(&db_tx).await?;
            Ok(())
        })
    }
}
