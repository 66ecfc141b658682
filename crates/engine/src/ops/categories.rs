use sea_orm::{
    ActiveValue, DatabaseTransaction, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
    prelude::*,
};
use uuid::Uuid;

use crate::{
    Action, Category, CategoryUpdate, EngineError, NewCategory, Principal, ResourceKind,
    ResultEngine, categories, entry_categories,
    util::{name_key, normalize_optional_text, normalize_required_name},
};

use super::{Engine, with_tx};

impl Engine {
    async fn ensure_category_name_free(
        &self,
        db: &DatabaseTransaction,
        owner_id: &str,
        name: &str,
        name_norm: &str,
        except: Option<Uuid>,
    ) -> ResultEngine<()> {
        let mut query = categories::Entity::find()
            .filter(categories::Column::OwnerId.eq(owner_id.to_string()))
            .filter(categories::Column::NameNorm.eq(name_norm.to_string()));
        if let Some(id) = except {
            query = query.filter(categories::Column::Id.ne(id));
        }
        if query.one(db).await?.is_some() {
            return Err(EngineError::ExistingKey(name.to_string()));
        }
        Ok(())
    }

    async fn require_category_write(
        &self,
        db: &DatabaseTransaction,
        actor: &Principal,
        category_id: Uuid,
    ) -> ResultEngine<categories::Model> {
        let model = categories::Entity::find_by_id(category_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("category not exists".to_string()))?;
        if self
            .check_for(db, actor, &model.owner_id, ResourceKind::Categories, Action::Write)
            .await?
        {
            return Ok(model);
        }
        if self
            .check_for(db, actor, &model.owner_id, ResourceKind::Categories, Action::Read)
            .await?
        {
            return Err(EngineError::Forbidden(
                "no write access to this category".to_string(),
            ));
        }
        Err(EngineError::KeyNotFound("category not exists".to_string()))
    }

    /// Creates a category. Names are unique per owner, ignoring case,
    /// Unicode width and repeated whitespace.
    pub async fn create_category(
        &self,
        user_id: &str,
        new: NewCategory,
    ) -> ResultEngine<Category> {
        let name = normalize_required_name(&new.name, "category")?;
        let name_norm = name_key(&name);
        with_tx!(self, |db_tx| {
            let actor = self.require_actor(&db_tx, user_id).await?;
            let owner = self
                .owner_on_write(
                    &db_tx,
                    &actor,
                    new.owner_id.as_deref(),
                    ResourceKind::Categories,
                )
                .await?;
            self.ensure_category_name_free(&db_tx, &owner, &name, &name_norm, None)
                .await?;

            let active = categories::ActiveModel {
                id: ActiveValue::Set(Uuid::new_v4()),
                owner_id: ActiveValue::Set(owner),
                name: ActiveValue::Set(name.clone()),
                name_norm: ActiveValue::Set(name_norm),
                description: ActiveValue::Set(normalize_optional_text(new.description.as_deref())),
                color: ActiveValue::Set(normalize_optional_text(new.color.as_deref())),
            };
            let model = active
                .insert(&db_tx)
                .await
                .map_err(|err| EngineError::from_insert(err, name.clone()))?;
            Ok(Category::from(model))
        })
    }

    /// Lists categories visible to the caller, ordered by name.
    pub async fn list_categories(&self, user_id: &str) -> ResultEngine<Vec<Category>> {
        with_tx!(self, |db_tx| {
            let (_, plan) = self
                .plan_access(&db_tx, user_id, ResourceKind::Categories, Action::Read)
                .await?;
            let models = categories::Entity::find()
                .filter(plan.predicate(categories::Column::OwnerId))
                .order_by_asc(categories::Column::NameNorm)
                .order_by_asc(categories::Column::OwnerId)
                .all(&db_tx)
                .await?;
            Ok(models.into_iter().map(Category::from).collect())
        })
    }

    pub async fn update_category(
        &self,
        user_id: &str,
        category_id: Uuid,
        update: CategoryUpdate,
    ) -> ResultEngine<Category> {
        let name = update
            .name
            .as_deref()
            .map(|n| normalize_required_name(n, "category"))
            .transpose()?;
        with_tx!(self, |db_tx| {
            let actor = self.require_actor(&db_tx, user_id).await?;
            let model = self
                .require_category_write(&db_tx, &actor, category_id)
                .await?;

            let owner_id = model.owner_id.clone();
            let mut active: categories::ActiveModel = model.into();
            if let Some(name) = name {
                let name_norm = name_key(&name);
                self.ensure_category_name_free(
                    &db_tx,
                    &owner_id,
                    &name,
                    &name_norm,
                    Some(category_id),
                )
                .await?;
                active.name = ActiveValue::Set(name);
                active.name_norm = ActiveValue::Set(name_norm);
            }
            if let Some(description) = update.description.as_ref() {
                active.description =
                    ActiveValue::Set(normalize_optional_text(description.as_deref()));
            }
            if let Some(color) = update.color.as_ref() {
                active.color = ActiveValue::Set(normalize_optional_text(color.as_deref()));
            }
            let model = active.update(&db_tx).await?;
            Ok(Category::from(model))
        })
    }

    /// Deletes a category that no entry links to.
    pub async fn delete_category(&self, user_id: &str, category_id: Uuid) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let actor = self.require_actor(&db_tx, user_id).await?;
            self.require_category_write(&db_tx, &actor, category_id)
                .await?;
            let links = entry_categories::Entity::find()
                .filter(entry_categories::Column::CategoryId.eq(category_id))
                .count(&db_tx)
                .await?;
            if links > 0 {
                return Err(EngineError::InvalidInput(format!(
                    "category is linked to {links} entries"
                )));
            }
            categories::Entity::delete_by_id(category_id)
                .exec(&db_tx)
                .await?;
            Ok(())
        })
    }
}
