//! Saved filters and custom reports endpoints.

use api_types::blob::{BlobNew, BlobView};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use engine::{NewBlob, OwnedBlob};
use uuid::Uuid;

use crate::{ServerError, identity::AuthContext, server::ServerState};

fn map_blob(blob: OwnedBlob) -> BlobView {
    BlobView {
        id: blob.id,
        owner_id: blob.owner_id,
        name: blob.name,
        payload: blob.payload,
        shared: blob.shared,
        created_at: blob.created_at,
    }
}

fn new_blob(payload: BlobNew) -> NewBlob {
    NewBlob {
        owner_id: payload.owner_id,
        name: payload.name,
        payload: payload.payload,
        shared: payload.shared,
    }
}

pub async fn list_filters(
    Extension(auth): Extension<AuthContext>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<BlobView>>, ServerError> {
    let filters = state.engine.list_saved_filters(&auth.principal_id).await?;
    Ok(Json(filters.into_iter().map(map_blob).collect()))
}

pub async fn create_filter(
    Extension(auth): Extension<AuthContext>,
    State(state): State<ServerState>,
    Json(payload): Json<BlobNew>,
) -> Result<(StatusCode, Json<BlobView>), ServerError> {
    let filter = state
        .engine
        .create_saved_filter(&auth.principal_id, new_blob(payload))
        .await?;
    Ok((StatusCode::CREATED, Json(map_blob(filter))))
}

pub async fn get_filter(
    Extension(auth): Extension<AuthContext>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BlobView>, ServerError> {
    let filter = state.engine.saved_filter(&auth.principal_id, id).await?;
    Ok(Json(map_blob(filter)))
}

pub async fn delete_filter(
    Extension(auth): Extension<AuthContext>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .delete_saved_filter(&auth.principal_id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_reports(
    Extension(auth): Extension<AuthContext>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<BlobView>>, ServerError> {
    let reports = state.engine.list_custom_reports(&auth.principal_id).await?;
    Ok(Json(reports.into_iter().map(map_blob).collect()))
}

pub async fn create_report(
    Extension(auth): Extension<AuthContext>,
    State(state): State<ServerState>,
    Json(payload): Json<BlobNew>,
) -> Result<(StatusCode, Json<BlobView>), ServerError> {
    let report = state
        .engine
        .create_custom_report(&auth.principal_id, new_blob(payload))
        .await?;
    Ok((StatusCode::CREATED, Json(map_blob(report))))
}

pub async fn get_report(
    Extension(auth): Extension<AuthContext>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BlobView>, ServerError> {
    let report = state.engine.custom_report(&auth.principal_id, id).await?;
    Ok(Json(map_blob(report)))
}

pub async fn delete_report(
    Extension(auth): Extension<AuthContext>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .delete_custom_report(&auth.principal_id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
