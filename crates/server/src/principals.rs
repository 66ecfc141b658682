//! Principal and role endpoints.

use api_types::principal::{
    PrincipalView, Role as ApiRole, RoleSet, Status as ApiStatus, StatusSet,
};
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use engine::{Principal, PrincipalStatus, Role};

use crate::{ServerError, identity::AuthContext, server::ServerState};

fn role_to_api(role: Role) -> ApiRole {
    match role {
        Role::User => ApiRole::User,
        Role::Admin => ApiRole::Admin,
        Role::SuperAdmin => ApiRole::SuperAdmin,
    }
}

fn role_from_api(role: ApiRole) -> Role {
    match role {
        ApiRole::User => Role::User,
        ApiRole::Admin => Role::Admin,
        ApiRole::SuperAdmin => Role::SuperAdmin,
    }
}

fn status_to_api(status: PrincipalStatus) -> ApiStatus {
    match status {
        PrincipalStatus::Pending => ApiStatus::Pending,
        PrincipalStatus::Approved => ApiStatus::Approved,
        PrincipalStatus::Rejected => ApiStatus::Rejected,
    }
}

fn status_from_api(status: ApiStatus) -> PrincipalStatus {
    match status {
        ApiStatus::Pending => PrincipalStatus::Pending,
        ApiStatus::Approved => PrincipalStatus::Approved,
        ApiStatus::Rejected => PrincipalStatus::Rejected,
    }
}

fn map_principal(principal: Principal) -> PrincipalView {
    PrincipalView {
        id: principal.id,
        display_name: principal.display_name,
        email: principal.email,
        role: role_to_api(principal.role),
        status: status_to_api(principal.status),
        created_at: principal.created_at,
    }
}

pub async fn me(
    Extension(auth): Extension<AuthContext>,
    State(state): State<ServerState>,
) -> Result<Json<PrincipalView>, ServerError> {
    let principal = state.engine.principal(&auth.principal_id).await?;
    Ok(Json(map_principal(principal)))
}

pub async fn list(
    Extension(auth): Extension<AuthContext>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<PrincipalView>>, ServerError> {
    let principals = state.engine.list_principals(&auth.principal_id).await?;
    Ok(Json(principals.into_iter().map(map_principal).collect()))
}

pub async fn set_role(
    Extension(auth): Extension<AuthContext>,
    State(state): State<ServerState>,
    Path(target_id): Path<String>,
    Json(payload): Json<RoleSet>,
) -> Result<Json<PrincipalView>, ServerError> {
    let principal = state
        .engine
        .set_role(&auth.principal_id, &target_id, role_from_api(payload.role))
        .await?;
    Ok(Json(map_principal(principal)))
}

pub async fn set_status(
    Extension(auth): Extension<AuthContext>,
    State(state): State<ServerState>,
    Path(target_id): Path<String>,
    Json(payload): Json<StatusSet>,
) -> Result<Json<PrincipalView>, ServerError> {
    let principal = state
        .engine
        .set_status(
            &auth.principal_id,
            &target_id,
            status_from_api(payload.status),
        )
        .await?;
    Ok(Json(map_principal(principal)))
}
