use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use sea_orm::{QueryFilter, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Action, EngineError, ResourceKind, ResultEngine, categories, entries};

use super::{Engine, with_tx};

/// Bucket used by [`Engine::summarize`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportGroupBy {
    #[default]
    Kind,
    /// `YYYY-MM` of the effective date.
    Month,
    /// Category name; entries without links fall under `Uncategorized`.
    Category,
}

impl TryFrom<&str> for ReportGroupBy {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "kind" => Ok(Self::Kind),
            "month" => Ok(Self::Month),
            "category" => Ok(Self::Category),
            other => Err(EngineError::InvalidInput(format!(
                "invalid grouping: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ReportFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub paid: Option<bool>,
    pub optional: Option<bool>,
    pub owner_id: Option<String>,
    pub group_by: ReportGroupBy,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindTotal {
    pub key: String,
    pub total_minor: i64,
    pub count: u64,
}

const UNCATEGORIZED: &str = "Uncategorized";

impl Engine {
    /// Totals of the entries visible under the `reports` plan, largest
    /// first, ties broken by key.
    pub async fn summarize(
        &self,
        user_id: &str,
        filter: ReportFilter,
    ) -> ResultEngine<Vec<KindTotal>> {
        with_tx!(self, |db_tx| {
            let (actor, plan) = self
                .plan_access(&db_tx, user_id, ResourceKind::Reports, Action::Read)
                .await?;

            let mut query =
                entries::Entity::find().filter(plan.predicate(entries::Column::OwnerId));
            if let Some(from) = filter.from {
                query = query.filter(entries::Column::EffectiveDate.gte(from));
            }
            if let Some(to) = filter.to {
                query = query.filter(entries::Column::EffectiveDate.lt(to));
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
            let models = query.all(&db_tx).await?;

            let legacy = models.iter().filter(|m| m.owner_id.is_none()).count();
            self.note_legacy_rows(&actor.id, "ledger_entries", legacy);

            let mut buckets: BTreeMap<String, (i64, u64)> = BTreeMap::new();
            let mut add = |key: String, amount: i64| -> ResultEngine<()> {
                let slot = buckets.entry(key).or_default();
                slot.0 = slot
                    .0
                    .checked_add(amount)
                    .ok_or_else(|| EngineError::InvalidAmount("total overflow".to_string()))?;
                slot.1 += 1;
                Ok(())
            };

            match filter.group_by {
                ReportGroupBy::Kind => {
                    for m in &models {
                        add(m.kind.clone(), m.amount_minor)?;
                    }
                }
                ReportGroupBy::Month => {
                    for m in &models {
                        add(m.effective_date.format("%Y-%m").to_string(), m.amount_minor)?;
                    }
                }
                ReportGroupBy::Category => {
                    let ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();
                    let splits = self.load_splits(&db_tx, &ids).await?;
                    let category_ids: Vec<Uuid> = splits
                        .values()
                        .flatten()
                        .map(|s| s.category_id)
                        .collect();
                    let names: HashMap<Uuid, String> = if category_ids.is_empty() {
                        HashMap::new()
                    } else {
                        categories::Entity::find()
                            .filter(categories::Column::Id.is_in(category_ids))
                            .all(&db_tx)
                            .await?
                            .into_iter()
                            .map(|c| (c.id, c.name))
                            .collect()
                    };
                    for m in &models {
                        match splits.get(&m.id) {
                            Some(parts) if !parts.is_empty() => {
                                for part in parts {
                                    let name = names
                                        .get(&part.category_id)
                                        .cloned()
                                        .unwrap_or_else(|| UNCATEGORIZED.to_string());
                                    add(name, part.amount_minor)?;
                                }
                            }
                            _ => add(UNCATEGORIZED.to_string(), m.amount_minor)?,
                        }
                    }
                }
            }

            let mut totals: Vec<KindTotal> = buckets
                .into_iter()
                .map(|(key, (total_minor, count))| KindTotal {
                    key,
                    total_minor,
                    count,
                })
                .collect();
            totals.sort_by(|a, b| {
                b.total_minor
                    .cmp(&a.total_minor)
                    .then_with(|| a.key.cmp(&b.key))
            });
            Ok(totals)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grouping_parses_known_values() {
        assert_eq!(ReportGroupBy::try_from("kind").unwrap(), ReportGroupBy::Kind);
        assert_eq!(ReportGroupBy::try_from("month").unwrap(), ReportGroupBy::Month);
        assert_eq!(
            ReportGroupBy::try_from("category").unwrap(),
            ReportGroupBy::Category
        );
        assert!(ReportGroupBy::try_from("week").is_err());
    }
}
