use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, Condition, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait,
    prelude::*,
};
use uuid::Uuid;

use crate::{
    Action, EngineError, Grant, GrantDirection, GrantView, Principal, ResourceKind, ResultEngine,
    grants,
};

use super::{Engine, with_tx};

/// Grant `action` on `kind` rows of `owner_id` (the caller when `None`) to
/// `grantee_id`.
#[derive(Clone, Debug)]
pub struct GrantRequest {
    pub owner_id: Option<String>,
    pub grantee_id: String,
    pub kind: ResourceKind,
    pub action: Action,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug)]
pub struct RevokeRequest {
    pub owner_id: Option<String>,
    pub grantee_id: String,
    pub kind: ResourceKind,
    pub action: Action,
}

impl Engine {
    /// Only the owner itself or an admin may manage an owner's grants.
    async fn require_grant_manager(
        &self,
        db: &DatabaseTransaction,
        actor: &Principal,
        owner_id: Option<&str>,
    ) -> ResultEngine<String> {
        let owner = owner_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(actor.id.as_str())
            .to_string();
        if owner != actor.id {
            if !actor.role.is_admin() {
                return Err(EngineError::Forbidden(
                    "only the owner or an admin may manage grants".to_string(),
                ));
            }
            self.require_principal(db, &owner).await?;
        }
        Ok(owner)
    }

    /// Creates a grant, or refreshes `expires_at` of the identical one.
    ///
    /// Returns the grant id either way.
    pub async fn grant(&self, user_id: &str, request: GrantRequest) -> ResultEngine<Uuid> {
        let grantee_id = request.grantee_id.trim().to_string();
        with_tx!(self, |db_tx| {
            let actor = self.require_actor(&db_tx, user_id).await?;
            let owner_id = self
                .require_grant_manager(&db_tx, &actor, request.owner_id.as_deref())
                .await?;
            if owner_id == grantee_id {
                return Err(EngineError::InvalidInput(
                    "owner and grantee must differ".to_string(),
                ));
            }
            self.find_principal(&db_tx, &grantee_id)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("grantee not exists".to_string()))?;

            let existing = grants::Entity::find()
                .filter(grants::Column::OwnerId.eq(owner_id.clone()))
                .filter(grants::Column::GranteeId.eq(grantee_id.clone()))
                .filter(grants::Column::ResourceKind.eq(request.kind.as_str()))
                .filter(grants::Column::Action.eq(request.action.as_str()))
                .one(&db_tx)
                .await?;

            let id = match existing {
                Some(model) => {
                    let id = model.id;
                    if model.expires_at != request.expires_at {
                        let mut active: grants::ActiveModel = model.into();
                        active.expires_at = ActiveValue::Set(request.expires_at);
                        active.update(&db_tx).await?;
                    }
                    id
                }
                None => {
                    let id = Uuid::new_v4();
                    let active = grants::ActiveModel {
                        id: ActiveValue::Set(id),
                        owner_id: ActiveValue::Set(owner_id.clone()),
                        grantee_id: ActiveValue::Set(grantee_id.clone()),
                        resource_kind: ActiveValue::Set(request.kind.as_str().to_string()),
                        action: ActiveValue::Set(request.action.as_str().to_string()),
                        created_at: ActiveValue::Set(Utc::now()),
                        expires_at: ActiveValue::Set(request.expires_at),
                    };
                    active
                        .insert(&db_tx)
                        .await
                        .map_err(|err| EngineError::from_insert(err, "grant"))?;
                    id
                }
            };

            tracing::info!(
                actor = %actor.id,
                owner = %owner_id,
                grantee = %grantee_id,
                kind = request.kind.as_str(),
                action = request.action.as_str(),
                "grant stored"
            );
            Ok(id)
        })
    }

    /// Deletes the grant matching the request exactly.
    pub async fn revoke(&self, user_id: &str, request: RevokeRequest) -> ResultEngine<()> {
        let grantee_id = request.grantee_id.trim().to_string();
        with_tx!(self, |db_tx| {
            let actor = self.require_actor(&db_tx, user_id).await?;
            let owner_id = self
                .require_grant_manager(&db_tx, &actor, request.owner_id.as_deref())
                .await?;

            let res = grants::Entity::delete_many()
                .filter(grants::Column::OwnerId.eq(owner_id.clone()))
                .filter(grants::Column::GranteeId.eq(grantee_id.clone()))
                .filter(grants::Column::ResourceKind.eq(request.kind.as_str()))
                .filter(grants::Column::Action.eq(request.action.as_str()))
                .exec(&db_tx)
                .await?;
            if res.rows_affected == 0 {
                return Err(EngineError::KeyNotFound("grant not exists".to_string()));
            }
            tracing::info!(
                actor = %actor.id,
                owner = %owner_id,
                grantee = %grantee_id,
                kind = request.kind.as_str(),
                action = request.action.as_str(),
                "grant revoked"
            );
            Ok(())
        })
    }

    /// Grants the caller holds or has issued, expired ones included.
    pub async fn list_grants(&self, user_id: &str) -> ResultEngine<Vec<GrantView>> {
        with_tx!(self, |db_tx| {
            let actor = self.require_actor(&db_tx, user_id).await?;
            let rows = grants::Entity::find()
                .filter(
                    Condition::any()
                        .add(grants::Column::OwnerId.eq(actor.id.clone()))
                        .add(grants::Column::GranteeId.eq(actor.id.clone())),
                )
                .order_by_asc(grants::Column::CreatedAt)
                .order_by_asc(grants::Column::Id)
                .all(&db_tx)
                .await?;

            let now = Utc::now();
            rows.into_iter()
                .map(|model| {
                    let grant = Grant::try_from(model)?;
                    let direction = if grant.grantee_id == actor.id {
                        GrantDirection::Held
                    } else {
                        GrantDirection::Issued
                    };
                    let active = grant.is_active_at(now);
                    Ok(GrantView {
                        grant,
                        direction,
                        active,
                    })
                })
                .collect()
        })
    }
}
