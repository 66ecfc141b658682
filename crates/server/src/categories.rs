//! Categories API endpoints.

use api_types::category::{CategoryNew, CategoryPatch, CategoryView};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use engine::{Category, CategoryUpdate, NewCategory};
use uuid::Uuid;

use crate::{ServerError, identity::AuthContext, server::ServerState};

fn map_category(category: Category) -> CategoryView {
    CategoryView {
        id: category.id,
        owner_id: category.owner_id,
        name: category.name,
        description: category.description,
        color: category.color,
    }
}

pub async fn list(
    Extension(auth): Extension<AuthContext>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<CategoryView>>, ServerError> {
    let categories = state
        .engine
        .list_categories(&auth.principal_id)
        .await?
        .into_iter()
        .map(map_category)
        .collect();
    Ok(Json(categories))
}

pub async fn create(
    Extension(auth): Extension<AuthContext>,
    State(state): State<ServerState>,
    Json(payload): Json<CategoryNew>,
) -> Result<(StatusCode, Json<CategoryView>), ServerError> {
    let category = state
        .engine
        .create_category(
            &auth.principal_id,
            NewCategory {
                owner_id: payload.owner_id,
                name: payload.name,
                description: payload.description,
                color: payload.color,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(map_category(category))))
}

pub async fn update(
    Extension(auth): Extension<AuthContext>,
    State(state): State<ServerState>,
    Path(category_id): Path<Uuid>,
    Json(payload): Json<CategoryPatch>,
) -> Result<Json<CategoryView>, ServerError> {
    if payload.name.is_none() && payload.description.is_none() && payload.color.is_none() {
        return Err(ServerError::Generic(
            "provide at least one of name, description or color".to_string(),
        ));
    }

    let category = state
        .engine
        .update_category(
            &auth.principal_id,
            category_id,
            CategoryUpdate {
                name: payload.name,
                description: payload.description,
                color: payload.color,
            },
        )
        .await?;
    Ok(Json(map_category(category)))
}

pub async fn delete(
    Extension(auth): Extension<AuthContext>,
    State(state): State<ServerState>,
    Path(category_id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .delete_category(&auth.principal_id, category_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
