//! Local mirror of the budgeting service, written by the synchronizer.
//!
//! Upserts are keyed by `(external_id, owner_id)` and run as single
//! statements outside any transaction, so a cancelled sync leaves whatever
//! it already wrote. Rows missing upstream are never pruned.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, QueryFilter, QueryOrder, TransactionTrait, prelude::*, sea_query::OnConflict,
};

use crate::{
    Action, MirrorCategory, MirrorGroup, MirroredTransaction, ResourceKind, ResultEngine,
    mirror_categories, mirror_groups, mirror_transactions, util::name_key,
};

use super::{Engine, with_tx};

impl Engine {
    pub async fn upsert_mirror_group(
        &self,
        owner_id: &str,
        external_id: &str,
        name: &str,
        at: DateTime<Utc>,
    ) -> ResultEngine<()> {
        let active = mirror_groups::ActiveModel {
            external_id: ActiveValue::Set(external_id.to_string()),
            owner_id: ActiveValue::Set(owner_id.to_string()),
            name: ActiveValue::Set(name.to_string()),
            last_updated: ActiveValue::Set(at),
        };
        mirror_groups::Entity::insert(active)
            .on_conflict(
                OnConflict::columns([
                    mirror_groups::Column::ExternalId,
                    mirror_groups::Column::OwnerId,
                ])
                .update_columns([mirror_groups::Column::Name, mirror_groups::Column::LastUpdated])
                .to_owned(),
            )
            .exec_without_returning(&self.database)
            .await?;
        Ok(())
    }

    pub async fn upsert_mirror_category(
        &self,
        owner_id: &str,
        group_id: &str,
        external_id: &str,
        name: &str,
        at: DateTime<Utc>,
    ) -> ResultEngine<()> {
        let active = mirror_categories::ActiveModel {
            external_id: ActiveValue::Set(external_id.to_string()),
            owner_id: ActiveValue::Set(owner_id.to_string()),
            group_id: ActiveValue::Set(group_id.to_string()),
            name: ActiveValue::Set(name.to_string()),
            last_updated: ActiveValue::Set(at),
        };
        mirror_categories::Entity::insert(active)
            .on_conflict(
                OnConflict::columns([
                    mirror_categories::Column::ExternalId,
                    mirror_categories::Column::OwnerId,
                ])
                .update_columns([
                    mirror_categories::Column::GroupId,
                    mirror_categories::Column::Name,
                    mirror_categories::Column::LastUpdated,
                ])
                .to_owned(),
            )
            .exec_without_returning(&self.database)
            .await?;
        Ok(())
    }

    pub async fn upsert_mirror_transaction(
        &self,
        owner_id: &str,
        tx: &MirroredTransaction,
        at: DateTime<Utc>,
    ) -> ResultEngine<()> {
        let active = mirror_transactions::ActiveModel {
            external_id: ActiveValue::Set(tx.external_id.clone()),
            owner_id: ActiveValue::Set(owner_id.to_string()),
            account_id: ActiveValue::Set(tx.account_id.clone()),
            date: ActiveValue::Set(tx.date.clone()),
            amount_milliunits: ActiveValue::Set(tx.amount_milliunits),
            payee_name: ActiveValue::Set(tx.payee_name.clone()),
            memo: ActiveValue::Set(tx.memo.clone()),
            category_id: ActiveValue::Set(tx.category_id.clone()),
            last_updated: ActiveValue::Set(at),
        };
        mirror_transactions::Entity::insert(active)
            .on_conflict(
                OnConflict::columns([
                    mirror_transactions::Column::ExternalId,
                    mirror_transactions::Column::OwnerId,
                ])
                .update_columns([
                    mirror_transactions::Column::AccountId,
                    mirror_transactions::Column::Date,
                    mirror_transactions::Column::AmountMilliunits,
                    mirror_transactions::Column::PayeeName,
                    mirror_transactions::Column::Memo,
                    mirror_transactions::Column::CategoryId,
                    mirror_transactions::Column::LastUpdated,
                ])
                .to_owned(),
            )
            .exec_without_returning(&self.database)
            .await?;
        Ok(())
    }

    /// Mirrored groups and their categories visible under the caller's
    /// `categories` plan.
    pub async fn list_mirror_categories(&self, user_id: &str) -> ResultEngine<Vec<MirrorGroup>> {
        with_tx!(self, |db_tx| {
            let (_, plan) = self
                .plan_access(&db_tx, user_id, ResourceKind::Categories, Action::Read)
                .await?;
            let groups = mirror_groups::Entity::find()
                .filter(plan.predicate(mirror_groups::Column::OwnerId))
                .order_by_asc(mirror_groups::Column::OwnerId)
                .order_by_asc(mirror_groups::Column::Name)
                .all(&db_tx)
                .await?;
            let categories = mirror_categories::Entity::find()
                .filter(plan.predicate(mirror_categories::Column::OwnerId))
                .order_by_asc(mirror_categories::Column::Name)
                .all(&db_tx)
                .await?;

            let mut by_group: BTreeMap<(String, String), Vec<MirrorCategory>> = BTreeMap::new();
            for c in categories {
                by_group
                    .entry((c.owner_id, c.group_id.clone()))
                    .or_default()
                    .push(MirrorCategory {
                        external_id: c.external_id,
                        group_id: c.group_id,
                        name: c.name,
                        last_updated: c.last_updated,
                    });
            }

            Ok(groups
                .into_iter()
                .map(|g| {
                    let categories = by_group
                        .remove(&(g.owner_id.clone(), g.external_id.clone()))
                        .unwrap_or_default();
                    MirrorGroup {
                        external_id: g.external_id,
                        owner_id: g.owner_id,
                        name: g.name,
                        last_updated: g.last_updated,
                        categories,
                    }
                })
                .collect())
        })
    }

    /// Mirrored account transactions visible under the caller's
    /// `transactions` plan, newest first.
    pub async fn list_mirror_transactions(
        &self,
        user_id: &str,
    ) -> ResultEngine<Vec<MirroredTransaction>> {
        with_tx!(self, |db_tx| {
            let (_, plan) = self
                .plan_access(&db_tx, user_id, ResourceKind::Transactions, Action::Read)
                .await?;
            let rows = mirror_transactions::Entity::find()
                .filter(plan.predicate(mirror_transactions::Column::OwnerId))
                .order_by_desc(mirror_transactions::Column::Date)
                .order_by_asc(mirror_transactions::Column::ExternalId)
                .all(&db_tx)
                .await?;
            Ok(rows
                .into_iter()
                .map(|m| MirroredTransaction {
                    external_id: m.external_id,
                    account_id: m.account_id,
                    date: m.date,
                    amount_milliunits: m.amount_milliunits,
                    payee_name: m.payee_name,
                    memo: m.memo,
                    category_id: m.category_id,
                })
                .collect())
        })
    }

    /// Maps a category name to a mirrored external id, ignoring case.
    ///
    /// Looks at every mirror row under the caller's `categories` plan and
    /// prefers the caller's own rows when several owners share a name.
    pub async fn resolve_mirror_category(
        &self,
        user_id: &str,
        name: &str,
    ) -> ResultEngine<Option<String>> {
        let wanted = name_key(name);
        with_tx!(self, |db_tx| {
            let (actor, plan) = self
                .plan_access(&db_tx, user_id, ResourceKind::Categories, Action::Read)
                .await?;
            let rows = mirror_categories::Entity::find()
                .filter(plan.predicate(mirror_categories::Column::OwnerId))
                .order_by_asc(mirror_categories::Column::OwnerId)
                .order_by_asc(mirror_categories::Column::ExternalId)
                .all(&db_tx)
                .await?;
            let mut matches = rows.into_iter().filter(|r| name_key(&r.name) == wanted);
            let first = matches.next();
            let own = first
                .as_ref()
                .filter(|r| r.owner_id == actor.id)
                .cloned()
                .or_else(|| matches.find(|r| r.owner_id == actor.id));
            Ok(own.or(first).map(|r| r.external_id))
        })
    }
}
