//! Remote dispatcher: pushes one split transaction upstream.
//!
//! Never retried and never queued; the caller sees the upstream status.

use chrono::NaiveDate;
use engine::Money;
use serde::Serialize;

use crate::{
    SyncError, Synchronizer,
    client::{NewTransactionBody, NewTransactionDto, SubTransactionDto},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Split {
    /// Matched case-insensitively against mirrored category names.
    pub category_name: String,
    pub amount: Money,
    pub memo: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitTransaction {
    /// `YYYY-MM-DD`.
    pub date: String,
    pub payee_name: Option<String>,
    pub memo: Option<String>,
    pub splits: Vec<Split>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    pub status: u16,
    pub amount_milliunits: i64,
}

impl Synchronizer {
    /// Resolves every split's category under the principal's scope and
    /// posts a single transaction carrying the splits as subtransactions.
    pub async fn dispatch(
        &self,
        principal_id: &str,
        tx: SplitTransaction,
    ) -> Result<DispatchOutcome, SyncError> {
        if tx.splits.is_empty() {
            return Err(SyncError::InvalidInput(
                "at least one split is required".to_string(),
            ));
        }
        if NaiveDate::parse_from_str(&tx.date, "%Y-%m-%d").is_err() {
            return Err(SyncError::InvalidInput(format!(
                "date must be YYYY-MM-DD, got {}",
                tx.date
            )));
        }

        let credentials = self
            .engine
            .load_credentials(principal_id, &self.vault)
            .await?;

        let overflow = || SyncError::InvalidInput("split amount is too large".to_string());
        let mut total = Money::ZERO;
        let mut subtransactions = Vec::with_capacity(tx.splits.len());
        for split in tx.splits {
            let amount = split.amount.checked_to_milliunits().ok_or_else(overflow)?;
            total = total.checked_add(split.amount).ok_or_else(overflow)?;
            let category_id = self
                .engine
                .resolve_mirror_category(principal_id, &split.category_name)
                .await?
                .ok_or_else(|| SyncError::UnknownCategory(split.category_name.clone()))?;
            subtransactions.push(SubTransactionDto {
                amount,
                category_id,
                memo: split.memo,
            });
        }
        let total = total.checked_to_milliunits().ok_or_else(overflow)?;

        let body = NewTransactionBody {
            transaction: NewTransactionDto {
                account_id: credentials.account_id.clone(),
                date: tx.date,
                amount: total,
                payee_name: tx.payee_name,
                memo: tx.memo,
                subtransactions,
            },
        };

        let status = self
            .client
            .create_transaction(&credentials.token, &credentials.budget_id, &body)
            .await
            .inspect_err(|err| {
                tracing::warn!(principal = principal_id, "dispatch failed: {err}");
            })?;

        Ok(DispatchOutcome {
            status,
            amount_milliunits: total,
        })
    }
}
