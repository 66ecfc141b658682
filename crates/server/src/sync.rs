//! On-demand sync, sync status and the remote mirror/dispatch endpoints.

use api_types::{
    remote::{
        DispatchResult, RemoteCategory, RemoteGroup, RemoteTransaction, SplitTransactionNew,
    },
    sync::{SyncReport, SyncStatus},
};
use axum::{Extension, Json, extract::State, http::StatusCode};
use chrono::{Duration, Utc};
use engine::{Money, MirrorGroup};
use ynab_sync::{Split, SplitTransaction};

use crate::{ServerError, identity::AuthContext, server::ServerState};

pub async fn sync_now(
    Extension(auth): Extension<AuthContext>,
    State(state): State<ServerState>,
) -> Result<Json<SyncReport>, ServerError> {
    let report = state
        .sync
        .sync_now(&auth.principal_id, Utc::now())
        .await?;
    Ok(Json(SyncReport {
        groups: report.groups,
        categories: report.categories,
        transactions: report.transactions,
        synced_at: report.synced_at,
    }))
}

pub async fn status(
    Extension(auth): Extension<AuthContext>,
    State(state): State<ServerState>,
) -> Result<Json<SyncStatus>, ServerError> {
    let status = state.engine.credential_status(&auth.principal_id).await?;
    let next_due = status.has_credentials.then(|| match status.last_synced {
        Some(last) => last + Duration::minutes(i64::from(status.sync_period_minutes)),
        None => Utc::now(),
    });
    Ok(Json(SyncStatus {
        has_credentials: status.has_credentials,
        last_synced: status.last_synced,
        sync_period_minutes: status.sync_period_minutes,
        next_due,
    }))
}

fn map_group(group: MirrorGroup) -> RemoteGroup {
    RemoteGroup {
        id: group.external_id,
        owner_id: group.owner_id,
        name: group.name,
        last_updated: group.last_updated,
        categories: group
            .categories
            .into_iter()
            .map(|c| RemoteCategory {
                id: c.external_id,
                name: c.name,
            })
            .collect(),
    }
}

pub async fn remote_categories(
    Extension(auth): Extension<AuthContext>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<RemoteGroup>>, ServerError> {
    let groups = state
        .engine
        .list_mirror_categories(&auth.principal_id)
        .await?;
    Ok(Json(groups.into_iter().map(map_group).collect()))
}

pub async fn remote_transactions(
    Extension(auth): Extension<AuthContext>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<RemoteTransaction>>, ServerError> {
    let transactions = state
        .engine
        .list_mirror_transactions(&auth.principal_id)
        .await?
        .into_iter()
        .map(|tx| RemoteTransaction {
            id: tx.external_id,
            account_id: tx.account_id,
            date: tx.date,
            amount_milliunits: tx.amount_milliunits,
            payee_name: tx.payee_name,
            memo: tx.memo,
            category_id: tx.category_id,
        })
        .collect();
    Ok(Json(transactions))
}

pub async fn dispatch(
    Extension(auth): Extension<AuthContext>,
    State(state): State<ServerState>,
    Json(payload): Json<SplitTransactionNew>,
) -> Result<(StatusCode, Json<DispatchResult>), ServerError> {
    let tx = SplitTransaction {
        date: payload.date,
        payee_name: payload.payee_name,
        memo: payload.memo,
        splits: payload
            .splits
            .into_iter()
            .map(|line| Split {
                category_name: line.category_name,
                amount: Money::from_cents(line.amount_minor),
                memo: line.memo,
            })
            .collect(),
    };
    let outcome = state.sync.dispatch(&auth.principal_id, tx).await?;
    Ok((
        StatusCode::CREATED,
        Json(DispatchResult {
            status: outcome.status,
            amount_milliunits: outcome.amount_milliunits,
        }),
    ))
}
