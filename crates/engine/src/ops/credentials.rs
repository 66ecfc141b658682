use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, Condition, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
    sea_query::Expr,
};

use crate::{
    CredentialInput, CredentialStatus, CredentialVault, Credentials, DEFAULT_SYNC_PERIOD_MINUTES,
    EngineError, ResultEngine, SyncCandidate, credentials,
};

use super::{Engine, with_tx};

/// Seals `value` unless it is blank, in which case the field is cleared.
fn seal(vault: &CredentialVault, value: &str) -> ResultEngine<String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(String::new());
    }
    vault.encrypt_to_string(value)
}

impl Engine {
    /// Stores (or partially replaces) the caller's credentials.
    ///
    /// Fields left as `None` keep their stored value; empty strings clear
    /// them.
    pub async fn set_credentials(
        &self,
        user_id: &str,
        vault: &CredentialVault,
        input: CredentialInput,
    ) -> ResultEngine<CredentialStatus> {
        if let Some(period) = input.sync_period_minutes
            && period <= 0
        {
            return Err(EngineError::InvalidInput(
                "sync_period_minutes must be > 0".to_string(),
            ));
        }
        let token = input.token.as_deref().map(|v| seal(vault, v)).transpose()?;
        let budget = input
            .budget_id
            .as_deref()
            .map(|v| seal(vault, v))
            .transpose()?;
        let account = input
            .account_id
            .as_deref()
            .map(|v| seal(vault, v))
            .transpose()?;

        with_tx!(self, |db_tx| {
            let actor = self.require_actor(&db_tx, user_id).await?;
            let existing = credentials::Entity::find_by_id(actor.id.clone())
                .one(&db_tx)
                .await?;

            let model = match existing {
                Some(model) => {
                    let mut active: credentials::ActiveModel = model.into();
                    if let Some(token) = token {
                        active.token_ciphertext = ActiveValue::Set(token);
                    }
                    if let Some(budget) = budget {
                        active.budget_ciphertext = ActiveValue::Set(budget);
                    }
                    if let Some(account) = account {
                        active.account_ciphertext = ActiveValue::Set(account);
                    }
                    if let Some(period) = input.sync_period_minutes {
                        active.sync_period_minutes = ActiveValue::Set(period);
                    }
                    active.update(&db_tx).await?
                }
                None => {
                    let active = credentials::ActiveModel {
                        owner_id: ActiveValue::Set(actor.id.clone()),
                        token_ciphertext: ActiveValue::Set(token.unwrap_or_default()),
                        budget_ciphertext: ActiveValue::Set(budget.unwrap_or_default()),
                        account_ciphertext: ActiveValue::Set(account.unwrap_or_default()),
                        last_synced: ActiveValue::Set(None),
                        sync_period_minutes: ActiveValue::Set(
                            input
                                .sync_period_minutes
                                .unwrap_or(DEFAULT_SYNC_PERIOD_MINUTES),
                        ),
                    };
                    active.insert(&db_tx).await?
                }
            };
            tracing::info!(
                principal = %actor.id,
                complete = model.has_credentials(),
                "credentials stored"
            );
            Ok(CredentialStatus::from(&model))
        })
    }

    /// Whether the caller has usable credentials and when it last synced.
    pub async fn credential_status(&self, user_id: &str) -> ResultEngine<CredentialStatus> {
        with_tx!(self, |db_tx| {
            let actor = self.require_actor(&db_tx, user_id).await?;
            let status = credentials::Entity::find_by_id(actor.id)
                .one(&db_tx)
                .await?
                .map(|m| CredentialStatus::from(&m))
                .unwrap_or(CredentialStatus {
                    has_credentials: false,
                    last_synced: None,
                    sync_period_minutes: DEFAULT_SYNC_PERIOD_MINUTES,
                });
            Ok(status)
        })
    }

    pub async fn delete_credentials(&self, user_id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let actor = self.require_actor(&db_tx, user_id).await?;
            let res = credentials::Entity::delete_by_id(actor.id.clone())
                .exec(&db_tx)
                .await?;
            if res.rows_affected == 0 {
                return Err(EngineError::KeyNotFound(
                    "credentials not exists".to_string(),
                ));
            }
            tracing::info!(principal = %actor.id, "credentials deleted");
            Ok(())
        })
    }

    /// Decrypts a principal's credentials.
    ///
    /// Returns [`EngineError::NotConfigured`] unless all three secrets are
    /// present.
    pub async fn load_credentials(
        &self,
        principal_id: &str,
        vault: &CredentialVault,
    ) -> ResultEngine<Credentials> {
        with_tx!(self, |db_tx| {
            let model = credentials::Entity::find_by_id(principal_id.to_string())
                .one(&db_tx)
                .await?
                .filter(credentials::Model::has_credentials)
                .ok_or_else(|| {
                    EngineError::NotConfigured(format!("no credentials for {principal_id}"))
                })?;
            Ok(Credentials {
                token: vault.decrypt_string(&model.token_ciphertext)?,
                budget_id: vault.decrypt_string(&model.budget_ciphertext)?,
                account_id: vault.decrypt_string(&model.account_ciphertext)?,
            })
        })
    }

    /// Principals with complete credentials, in id order.
    pub async fn sync_candidates(&self) -> ResultEngine<Vec<SyncCandidate>> {
        with_tx!(self, |db_tx| {
            let rows = credentials::Entity::find()
                .filter(credentials::Column::TokenCiphertext.ne(""))
                .filter(credentials::Column::BudgetCiphertext.ne(""))
                .filter(credentials::Column::AccountCiphertext.ne(""))
                .order_by_asc(credentials::Column::OwnerId)
                .all(&db_tx)
                .await?;
            Ok(rows
                .into_iter()
                .map(|m| SyncCandidate {
                    principal_id: m.owner_id,
                    last_synced: m.last_synced,
                    sync_period_minutes: m.sync_period_minutes,
                })
                .collect())
        })
    }

    /// Records a successful sync at `at`.
    ///
    /// `last_synced` only moves forward; returns whether it changed.
    pub async fn mark_synced(&self, principal_id: &str, at: DateTime<Utc>) -> ResultEngine<bool> {
        with_tx!(self, |db_tx| {
            let res = credentials::Entity::update_many()
                .col_expr(credentials::Column::LastSynced, Expr::value(at))
                .filter(credentials::Column::OwnerId.eq(principal_id.to_string()))
                .filter(
                    Condition::any()
                        .add(credentials::Column::LastSynced.is_null())
                        .add(credentials::Column::LastSynced.lt(at)),
                )
                .exec(&db_tx)
                .await?;
            Ok(res.rows_affected > 0)
        })
    }
}
