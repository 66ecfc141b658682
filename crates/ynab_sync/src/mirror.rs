//! Remote mirror: pulls categories, then account transactions.

use chrono::{DateTime, Utc};
use engine::{Credentials, MirroredTransaction};
use serde::Serialize;

use crate::{SyncError, Synchronizer};

/// What one successful sync wrote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub groups: usize,
    pub categories: usize,
    pub transactions: usize,
    pub synced_at: DateTime<Utc>,
}

impl Synchronizer {
    /// Full sync for one principal: category mirror, transaction mirror,
    /// then `last_synced = now`.
    ///
    /// Any failure leaves `last_synced` untouched. Rows already upserted stay.
    pub async fn sync_principal(
        &self,
        principal_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SyncReport, SyncError> {
        let credentials = self
            .engine
            .load_credentials(principal_id, &self.vault)
            .await?;

        let (groups, categories) = self
            .mirror_categories(principal_id, &credentials, now)
            .await?;
        let transactions = self
            .mirror_transactions(principal_id, &credentials, now)
            .await?;

        self.engine.mark_synced(principal_id, now).await?;
        tracing::info!(
            principal = principal_id,
            groups,
            categories,
            transactions,
            "sync completed"
        );

        Ok(SyncReport {
            groups,
            categories,
            transactions,
            synced_at: now,
        })
    }

    async fn mirror_categories(
        &self,
        principal_id: &str,
        credentials: &Credentials,
        now: DateTime<Utc>,
    ) -> Result<(usize, usize), SyncError> {
        let remote = self
            .client
            .category_groups(&credentials.token, &credentials.budget_id)
            .await?;

        let mut groups = 0;
        let mut categories = 0;
        for group in remote.iter().filter(|g| !g.deleted) {
            self.engine
                .upsert_mirror_group(principal_id, &group.id, &group.name, now)
                .await?;
            groups += 1;
            for category in group.categories.iter().filter(|c| !c.deleted) {
                self.engine
                    .upsert_mirror_category(principal_id, &group.id, &category.id, &category.name, now)
                    .await?;
                categories += 1;
            }
        }
        Ok((groups, categories))
    }

    async fn mirror_transactions(
        &self,
        principal_id: &str,
        credentials: &Credentials,
        now: DateTime<Utc>,
    ) -> Result<usize, SyncError> {
        let remote = self
            .client
            .transactions(
                &credentials.token,
                &credentials.budget_id,
                &credentials.account_id,
            )
            .await?;

        let mut count = 0;
        for tx in remote.into_iter().filter(|t| !t.deleted) {
            let mirrored = MirroredTransaction {
                external_id: tx.id,
                account_id: tx.account_id,
                date: tx.date,
                amount_milliunits: tx.amount,
                payee_name: tx.payee_name,
                memo: tx.memo,
                category_id: tx.category_id,
            };
            self.engine
                .upsert_mirror_transaction(principal_id, &mirrored, now)
                .await?;
            count += 1;
        }
        Ok(count)
    }
}
