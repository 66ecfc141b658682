//! Grants API endpoints.

use api_types::permission::{
    Action as ApiAction, Direction, GrantCreated, GrantNew, GrantRevoke, GrantView,
    ResourceKind as ApiKind,
};
use axum::{Extension, Json, extract::State, http::StatusCode};
use engine::{Action, GrantDirection, GrantRequest, ResourceKind, RevokeRequest};

use crate::{ServerError, identity::AuthContext, server::ServerState};

fn kind_from_api(kind: ApiKind) -> ResourceKind {
    match kind {
        ApiKind::Transactions => ResourceKind::Transactions,
        ApiKind::Categories => ResourceKind::Categories,
        ApiKind::Reports => ResourceKind::Reports,
        ApiKind::All => ResourceKind::All,
    }
}

fn kind_to_api(kind: ResourceKind) -> ApiKind {
    match kind {
        ResourceKind::Transactions => ApiKind::Transactions,
        ResourceKind::Categories => ApiKind::Categories,
        ResourceKind::Reports => ApiKind::Reports,
        ResourceKind::All => ApiKind::All,
    }
}

fn action_from_api(action: ApiAction) -> Action {
    match action {
        ApiAction::Read => Action::Read,
        ApiAction::Write => Action::Write,
    }
}

fn action_to_api(action: Action) -> ApiAction {
    match action {
        Action::Read => ApiAction::Read,
        Action::Write => ApiAction::Write,
    }
}

fn map_view(view: engine::GrantView) -> GrantView {
    GrantView {
        id: view.grant.id,
        owner_id: view.grant.owner_id,
        grantee_id: view.grant.grantee_id,
        resource_kind: kind_to_api(view.grant.resource_kind),
        action: action_to_api(view.grant.action),
        created_at: view.grant.created_at,
        expires_at: view.grant.expires_at,
        direction: match view.direction {
            GrantDirection::Held => Direction::Held,
            GrantDirection::Issued => Direction::Issued,
        },
        active: view.active,
    }
}

pub async fn list(
    Extension(auth): Extension<AuthContext>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<GrantView>>, ServerError> {
    let grants = state.engine.list_grants(&auth.principal_id).await?;
    Ok(Json(grants.into_iter().map(map_view).collect()))
}

pub async fn grant(
    Extension(auth): Extension<AuthContext>,
    State(state): State<ServerState>,
    Json(payload): Json<GrantNew>,
) -> Result<(StatusCode, Json<GrantCreated>), ServerError> {
    let id = state
        .engine
        .grant(
            &auth.principal_id,
            GrantRequest {
                owner_id: payload.owner_id,
                grantee_id: payload.grantee_id,
                kind: kind_from_api(payload.resource_kind),
                action: action_from_api(payload.action),
                expires_at: payload.expires_at,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(GrantCreated { id })))
}

pub async fn revoke(
    Extension(auth): Extension<AuthContext>,
    State(state): State<ServerState>,
    Json(payload): Json<GrantRevoke>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .revoke(
            &auth.principal_id,
            RevokeRequest {
                owner_id: payload.owner_id,
                grantee_id: payload.grantee_id,
                kind: kind_from_api(payload.resource_kind),
                action: action_from_api(payload.action),
            },
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
