use chrono::Utc;
use sea_orm::{ActiveValue, QueryOrder, TransactionTrait, prelude::*};

use crate::{
    EngineError, NewPrincipal, Principal, PrincipalStatus, ResultEngine, Role, principals,
    util::normalize_optional_text,
};

use super::{Engine, with_tx};

impl Engine {
    /// Return the principal, creating it on first sight.
    ///
    /// Known principals keep their role and status; display name and email
    /// are refreshed when the identity provider reports new values.
    pub async fn ensure_principal(&self, new: NewPrincipal) -> ResultEngine<Principal> {
        let id = new.id.trim().to_string();
        if id.is_empty() {
            return Err(EngineError::InvalidId("principal id is empty".to_string()));
        }
        let display_name = normalize_optional_text(new.display_name.as_deref());
        let email = normalize_optional_text(new.email.as_deref());

        with_tx!(self, |db_tx| {
            let existing = principals::Entity::find_by_id(id.clone())
                .one(&db_tx)
                .await?;
            let model = match existing {
                Some(model) => {
                    let stale_name = display_name.is_some() && display_name != model.display_name;
                    let stale_email = email.is_some() && email != model.email;
                    if stale_name || stale_email {
                        let mut active: principals::ActiveModel = model.into();
                        if stale_name {
                            active.display_name = ActiveValue::Set(display_name);
                        }
                        if stale_email {
                            active.email = ActiveValue::Set(email);
                        }
                        active.update(&db_tx).await?
                    } else {
                        model
                    }
                }
                None => {
                    let active = principals::ActiveModel {
                        id: ActiveValue::Set(id.clone()),
                        display_name: ActiveValue::Set(display_name),
                        email: ActiveValue::Set(email),
                        role: ActiveValue::Set(new.role.as_str().to_string()),
                        status: ActiveValue::Set(new.status.as_str().to_string()),
                        created_at: ActiveValue::Set(Utc::now()),
                    };
                    let model = active
                        .insert(&db_tx)
                        .await
                        .map_err(|err| EngineError::from_insert(err, id.clone()))?;
                    tracing::info!(principal = %id, role = new.role.as_str(), "principal created");
                    model
                }
            };
            Principal::try_from(model)
        })
    }

    /// Return a principal by id.
    pub async fn principal(&self, principal_id: &str) -> ResultEngine<Principal> {
        with_tx!(self, |db_tx| {
            self.require_principal(&db_tx, principal_id).await
        })
    }

    /// Lists every principal. Admin only.
    pub async fn list_principals(&self, user_id: &str) -> ResultEngine<Vec<Principal>> {
        with_tx!(self, |db_tx| {
            let actor = self.require_actor(&db_tx, user_id).await?;
            if !actor.role.is_admin() {
                return Err(EngineError::Forbidden(
                    "listing principals requires admin".to_string(),
                ));
            }
            principals::Entity::find()
                .order_by_asc(principals::Column::CreatedAt)
                .order_by_asc(principals::Column::Id)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(Principal::try_from)
                .collect()
        })
    }

    /// Changes the role of `target_id`.
    ///
    /// The actor must be at least admin and strictly above the target's
    /// current role, and may not hand out a role above its own.
    pub async fn set_role(
        &self,
        user_id: &str,
        target_id: &str,
        role: Role,
    ) -> ResultEngine<Principal> {
        with_tx!(self, |db_tx| {
            let actor = self.require_actor(&db_tx, user_id).await?;
            let target = self.require_principal(&db_tx, target_id).await?;

            if !actor.role.is_admin() || target.role >= actor.role || role > actor.role {
                tracing::warn!(
                    actor = %actor.id,
                    target = %target.id,
                    requested = role.as_str(),
                    "role change refused"
                );
                return Err(EngineError::Forbidden(format!(
                    "cannot set role {} on {}",
                    role.as_str(),
                    target.id
                )));
            }

            let active = principals::ActiveModel {
                id: ActiveValue::Set(target.id.clone()),
                role: ActiveValue::Set(role.as_str().to_string()),
                ..Default::default()
            };
            let model = active.update(&db_tx).await?;
            tracing::info!(
                actor = %actor.id,
                target = %target.id,
                from = target.role.as_str(),
                to = role.as_str(),
                "role changed"
            );
            Principal::try_from(model)
        })
    }

    /// Approves or rejects a principal. Admin only; an actor cannot change
    /// its own status or the status of someone at or above its role.
    pub async fn set_status(
        &self,
        user_id: &str,
        target_id: &str,
        status: PrincipalStatus,
    ) -> ResultEngine<Principal> {
        with_tx!(self, |db_tx| {
            let actor = self.require_actor(&db_tx, user_id).await?;
            let target = self.require_principal(&db_tx, target_id).await?;

            if !actor.role.is_admin() || target.role >= actor.role {
                return Err(EngineError::Forbidden(format!(
                    "cannot change status of {}",
                    target.id
                )));
            }

            let active = principals::ActiveModel {
                id: ActiveValue::Set(target.id.clone()),
                status: ActiveValue::Set(status.as_str().to_string()),
                ..Default::default()
            };
            let model = active.update(&db_tx).await?;
            tracing::info!(
                actor = %actor.id,
                target = %target.id,
                status = status.as_str(),
                "principal status changed"
            );
            Principal::try_from(model)
        })
    }
}
