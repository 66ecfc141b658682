//! Budgeting-service credentials of the caller.

use api_types::credentials::{CredentialsPut, CredentialsStatus};
use axum::{Extension, Json, extract::State, http::StatusCode};
use engine::{CredentialInput, CredentialStatus};

use crate::{ServerError, identity::AuthContext, server::ServerState};

fn map_status(status: CredentialStatus) -> CredentialsStatus {
    CredentialsStatus {
        has_credentials: status.has_credentials,
        last_synced: status.last_synced,
        sync_period_minutes: status.sync_period_minutes,
    }
}

pub async fn status(
    Extension(auth): Extension<AuthContext>,
    State(state): State<ServerState>,
) -> Result<Json<CredentialsStatus>, ServerError> {
    let status = state.engine.credential_status(&auth.principal_id).await?;
    Ok(Json(map_status(status)))
}

pub async fn put(
    Extension(auth): Extension<AuthContext>,
    State(state): State<ServerState>,
    Json(payload): Json<CredentialsPut>,
) -> Result<Json<CredentialsStatus>, ServerError> {
    let status = state
        .engine
        .set_credentials(
            &auth.principal_id,
            &state.vault,
            CredentialInput {
                token: payload.token,
                budget_id: payload.budget_id,
                account_id: payload.account_id,
                sync_period_minutes: payload.sync_period_minutes,
            },
        )
        .await?;
    Ok(Json(map_status(status)))
}

pub async fn delete(
    Extension(auth): Extension<AuthContext>,
    State(state): State<ServerState>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_credentials(&auth.principal_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
