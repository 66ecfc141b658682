//! Access planner.
//!
//! For a `(principal, kind, action)` triple the planner computes the set of
//! owners whose rows the principal may touch and turns it into a condition on
//! an owner column. Admins get [`OwnerScope::Everyone`], which is never
//! materialized as a list.
//!
//! Rows whose owner is `NULL` predate ownership. They are admitted for reads
//! by anyone and for writes by the current principal, who then claims them.

use std::collections::BTreeSet;

use chrono::Utc;
use sea_orm::{Condition, DatabaseTransaction, QueryFilter, TransactionTrait, prelude::*};

use crate::{
    Action, EngineError, Principal, PrincipalStatus, ResourceKind, ResultEngine, grants,
    principals,
};

use super::{Engine, with_tx};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OwnerScope {
    /// Every owner (admin roles).
    Everyone,
    /// An explicit set that always contains the principal itself.
    Owners(BTreeSet<String>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessPlan {
    pub principal: String,
    pub kind: ResourceKind,
    pub action: Action,
    pub scope: OwnerScope,
}

impl AccessPlan {
    /// Condition restricting rows to the effective owner set.
    ///
    /// Owners are bound one parameter each (`owner IN (?, ?, …)`), never
    /// spliced into the SQL text.
    pub fn predicate<C: ColumnTrait>(&self, owner_column: C) -> Condition {
        match &self.scope {
            OwnerScope::Everyone => Condition::all(),
            OwnerScope::Owners(owners) => Condition::any()
                .add(owner_column.is_in(owners.iter().cloned()))
                .add(owner_column.is_null()),
        }
    }

    /// In-memory counterpart of [`AccessPlan::predicate`].
    pub fn admits(&self, owner: Option<&str>) -> bool {
        match (&self.scope, owner) {
            (OwnerScope::Everyone, _) | (_, None) => true,
            (OwnerScope::Owners(owners), Some(owner)) => owners.contains(owner),
        }
    }

    pub fn is_everyone(&self) -> bool {
        matches!(self.scope, OwnerScope::Everyone)
    }

    /// Enumerated owners, `None` for [`OwnerScope::Everyone`].
    pub fn owners(&self) -> Option<&BTreeSet<String>> {
        match &self.scope {
            OwnerScope::Everyone => None,
            OwnerScope::Owners(owners) => Some(owners),
        }
    }
}

fn active_grant() -> Condition {
    Condition::any()
        .add(grants::Column::ExpiresAt.is_null())
        .add(grants::Column::ExpiresAt.gt(Utc::now()))
}

impl Engine {
    pub(super) async fn find_principal(
        &self,
        db: &DatabaseTransaction,
        principal_id: &str,
    ) -> ResultEngine<Option<Principal>> {
        principals::Entity::find_by_id(principal_id.to_string())
            .one(db)
            .await?
            .map(Principal::try_from)
            .transpose()
    }

    pub(super) async fn require_principal(
        &self,
        db: &DatabaseTransaction,
        principal_id: &str,
    ) -> ResultEngine<Principal> {
        self.find_principal(db, principal_id)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("principal not exists".to_string()))
    }

    /// Loads the calling principal. Unknown callers are unauthenticated and
    /// rejected callers are refused outright.
    pub(super) async fn require_actor(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
    ) -> ResultEngine<Principal> {
        let actor = self
            .find_principal(db, user_id)
            .await?
            .ok_or_else(|| EngineError::Unauthenticated("unknown principal".to_string()))?;
        if actor.status == PrincipalStatus::Rejected {
            return Err(EngineError::Forbidden("principal was rejected".to_string()));
        }
        Ok(actor)
    }

    pub(super) async fn plan_for(
        &self,
        db: &DatabaseTransaction,
        actor: &Principal,
        kind: ResourceKind,
        action: Action,
    ) -> ResultEngine<AccessPlan> {
        if actor.role.is_admin() {
            return Ok(AccessPlan {
                principal: actor.id.clone(),
                kind,
                action,
                scope: OwnerScope::Everyone,
            });
        }

        let rows = grants::Entity::find()
            .filter(grants::Column::GranteeId.eq(actor.id.clone()))
            .filter(grants::Column::ResourceKind.is_in(kind.covered_by()))
            .filter(grants::Column::Action.is_in(action.covered_by()))
            .filter(active_grant())
            .all(db)
            .await?;

        let mut owners = BTreeSet::from([actor.id.clone()]);
        owners.extend(rows.into_iter().map(|g| g.owner_id));

        Ok(AccessPlan {
            principal: actor.id.clone(),
            kind,
            action,
            scope: OwnerScope::Owners(owners),
        })
    }

    pub(super) async fn plan_access(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
        kind: ResourceKind,
        action: Action,
    ) -> ResultEngine<(Principal, AccessPlan)> {
        let actor = self.require_actor(db, user_id).await?;
        let plan = self.plan_for(db, &actor, kind, action).await?;
        Ok((actor, plan))
    }

    pub(super) async fn check_for(
        &self,
        db: &DatabaseTransaction,
        grantee: &Principal,
        owner_id: &str,
        kind: ResourceKind,
        action: Action,
    ) -> ResultEngine<bool> {
        if grantee.role.is_admin() || grantee.id == owner_id {
            return Ok(true);
        }
        let found = grants::Entity::find()
            .filter(grants::Column::GranteeId.eq(grantee.id.clone()))
            .filter(grants::Column::OwnerId.eq(owner_id.to_string()))
            .filter(grants::Column::ResourceKind.is_in(kind.covered_by()))
            .filter(grants::Column::Action.is_in(action.covered_by()))
            .filter(active_grant())
            .one(db)
            .await?
            .is_some();
        Ok(found)
    }

    /// Owner to stamp on a new row: the caller unless `supplied` names
    /// another principal the caller may write for.
    pub(super) async fn owner_on_write(
        &self,
        db: &DatabaseTransaction,
        actor: &Principal,
        supplied: Option<&str>,
        kind: ResourceKind,
    ) -> ResultEngine<String> {
        let Some(owner) = supplied.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(actor.id.clone());
        };
        if owner == actor.id {
            return Ok(owner.to_string());
        }
        self.require_principal(db, owner).await?;
        if !self
            .check_for(db, actor, owner, kind, Action::Write)
            .await?
        {
            return Err(EngineError::Forbidden(format!(
                "no write access to {} of {owner}",
                kind.as_str()
            )));
        }
        Ok(owner.to_string())
    }

    /// Computes the access plan for a principal.
    pub async fn access_plan(
        &self,
        user_id: &str,
        kind: ResourceKind,
        action: Action,
    ) -> ResultEngine<AccessPlan> {
        with_tx!(self, |db_tx| {
            let (_, plan) = self.plan_access(&db_tx, user_id, kind, action).await?;
            Ok(plan)
        })
    }

    /// Whether `grantee_id` may perform `action` on `kind` rows of `owner_id`.
    ///
    /// True for admins, for the owner itself, and when a non-expired grant
    /// covers the request (`all` covers every kind, `write` covers `read`).
    pub async fn check(
        &self,
        grantee_id: &str,
        owner_id: &str,
        kind: ResourceKind,
        action: Action,
    ) -> ResultEngine<bool> {
        with_tx!(self, |db_tx| {
            let Some(grantee) = self.find_principal(&db_tx, grantee_id).await? else {
                return Ok(false);
            };
            self.check_for(&db_tx, &grantee, owner_id, kind, action)
                .await
        })
    }

    /// Resolves the owner of a row about to be written.
    pub async fn effective_owner_on_write(
        &self,
        user_id: &str,
        supplied_owner: Option<&str>,
        kind: ResourceKind,
    ) -> ResultEngine<String> {
        with_tx!(self, |db_tx| {
            let actor = self.require_actor(&db_tx, user_id).await?;
            self.owner_on_write(&db_tx, &actor, supplied_owner, kind)
                .await
        })
    }
}
