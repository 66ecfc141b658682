use chrono::Utc;
use sea_orm::{ActiveValue, Condition, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    Action, EngineError, NewBlob, OwnedBlob, ResourceKind, ResultEngine, custom_reports,
    saved_filters, util::normalize_required_name,
};

use super::{Engine, with_tx};

/// Generates create/list/get/delete for an owner-scoped JSON table.
///
/// Visibility is the access plan for `$kind`, narrowed to shared rows and
/// the caller's own rows unless the caller is an admin.
macro_rules! impl_owned_blob {
    (
        $module:ident,
        $kind:expr,
        $label:literal,
        create: $create:ident,
        list: $list:ident,
        get: $get:ident,
        delete: $delete:ident $(,)?
    ) => {
        #[doc = concat!("Stores a new ", $label, ".")]
        pub async fn $create(&self, user_id: &str, new: NewBlob) -> ResultEngine<OwnedBlob> {
            let name = normalize_required_name(&new.name, $label)?;
            with_tx!(self, |db_tx| {
                let actor = self.require_actor(&db_tx, user_id).await?;
                let owner = self
                    .owner_on_write(&db_tx, &actor, new.owner_id.as_deref(), $kind)
                    .await?;
                let active = $module::ActiveModel {
                    id: ActiveValue::Set(Uuid::new_v4()),
                    owner_id: ActiveValue::Set(owner),
                    name: ActiveValue::Set(name),
                    payload: ActiveValue::Set(new.payload.clone()),
                    shared: ActiveValue::Set(new.shared),
                    created_at: ActiveValue::Set(Utc::now()),
                };
                let model = active.insert(&db_tx).await?;
                Ok(OwnedBlob::from(model))
            })
        }

        #[doc = concat!("Lists every ", $label, " visible to the caller, newest first.")]
        pub async fn $list(&self, user_id: &str) -> ResultEngine<Vec<OwnedBlob>> {
            with_tx!(self, |db_tx| {
                let (actor, plan) = self
                    .plan_access(&db_tx, user_id, $kind, Action::Read)
                    .await?;
                let mut query =
                    $module::Entity::find().filter(plan.predicate($module::Column::OwnerId));
                if !plan.is_everyone() {
                    query = query.filter(
                        Condition::any()
                            .add($module::Column::Shared.eq(true))
                            .add($module::Column::OwnerId.eq(actor.id.clone())),
                    );
                }
                let models = query
                    .order_by_desc($module::Column::CreatedAt)
                    .order_by_asc($module::Column::Id)
                    .all(&db_tx)
                    .await?;
                Ok(models.into_iter().map(OwnedBlob::from).collect())
            })
        }

        #[doc = concat!("Return one ", $label, " if it is visible to the caller.")]
        pub async fn $get(&self, user_id: &str, id: Uuid) -> ResultEngine<OwnedBlob> {
            with_tx!(self, |db_tx| {
                let (actor, plan) = self
                    .plan_access(&db_tx, user_id, $kind, Action::Read)
                    .await?;
                let model = $module::Entity::find_by_id(id)
                    .filter(plan.predicate($module::Column::OwnerId))
                    .one(&db_tx)
                    .await?
                    .filter(|m| plan.is_everyone() || m.shared || m.owner_id == actor.id)
                    .ok_or_else(|| EngineError::KeyNotFound(format!("{} not exists", $label)))?;
                Ok(OwnedBlob::from(model))
            })
        }

        #[doc = concat!("Deletes a ", $label, ".")]
        pub async fn $delete(&self, user_id: &str, id: Uuid) -> ResultEngine<()> {
            with_tx!(self, |db_tx| {
                let actor = self.require_actor(&db_tx, user_id).await?;
                let not_found = || EngineError::KeyNotFound(format!("{} not exists", $label));
                let model = $module::Entity::find_by_id(id)
                    .one(&db_tx)
                    .await?
                    .ok_or_else(not_found)?;

                let visible = actor.role.is_admin()
                    || model.owner_id == actor.id
                    || (model.shared
                        && self
                            .check_for(&db_tx, &actor, &model.owner_id, $kind, Action::Read)
                            .await?);
                if !visible {
                    return Err(not_found());
                }
                if !self
                    .check_for(&db_tx, &actor, &model.owner_id, $kind, Action::Write)
                    .await?
                {
                    return Err(EngineError::Forbidden(format!(
                        "no write access to this {}",
                        $label
                    )));
                }
                $module::Entity::delete_by_id(id).exec(&db_tx).await?;
                Ok(())
            })
        }
    };
}

impl Engine {
    impl_owned_blob!(
        saved_filters,
        ResourceKind::Transactions,
        "saved filter",
        create: create_saved_filter,
        list: list_saved_filters,
        get: saved_filter,
        delete: delete_saved_filter,
    );

    impl_owned_blob!(
        custom_reports,
        ResourceKind::Reports,
        "custom report",
        create: create_custom_report,
        list: list_custom_reports,
        get: custom_report,
        delete: delete_custom_report,
    );
}
