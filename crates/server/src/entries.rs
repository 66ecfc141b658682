//! Ledger entries API endpoints.

use api_types::entry::{CategorySplit, EntryNew, EntryPatch, EntryQuery, EntryView};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use engine::{EntryFilter, EntryUpdate, LedgerEntry, Money, NewEntry};
use uuid::Uuid;

use crate::{ServerError, identity::AuthContext, server::ServerState};

fn split_from_api(split: CategorySplit) -> engine::CategorySplit {
    engine::CategorySplit {
        category_id: split.category_id,
        amount_minor: split.amount_minor,
    }
}

fn map_entry(entry: LedgerEntry) -> EntryView {
    EntryView {
        id: entry.id,
        owner_id: entry.owner_id,
        amount_minor: entry.amount_minor,
        amount: Money::from_cents(entry.amount_minor).to_string(),
        ledger_date: entry.ledger_date,
        effective_date: entry.effective_date,
        kind: entry.kind,
        counterparty: entry.counterparty,
        description: entry.description,
        paid: entry.paid,
        paid_date: entry.paid_date,
        entered_by: entry.entered_by,
        optional: entry.optional,
        created_at: entry.created_at,
        updated_at: entry.updated_at,
        categories: entry
            .categories
            .into_iter()
            .map(|s| CategorySplit {
                category_id: s.category_id,
                amount_minor: s.amount_minor,
            })
            .collect(),
    }
}

pub async fn list(
    Extension(auth): Extension<AuthContext>,
    State(state): State<ServerState>,
    Query(query): Query<EntryQuery>,
) -> Result<Json<Vec<EntryView>>, ServerError> {
    let filter = EntryFilter {
        from: query.from,
        to: query.to,
        kind: query.kind,
        paid: query.paid,
        optional: query.optional,
        owner_id: query.owner_id,
        limit: query.limit,
    };
    let entries = state
        .engine
        .list_entries(&auth.principal_id, filter)
        .await?
        .into_iter()
        .map(map_entry)
        .collect();
    Ok(Json(entries))
}

pub async fn create(
    Extension(auth): Extension<AuthContext>,
    State(state): State<ServerState>,
    Json(payload): Json<EntryNew>,
) -> Result<(StatusCode, Json<EntryView>), ServerError> {
    let new = NewEntry {
        owner_id: payload.owner_id,
        amount_minor: payload.amount_minor,
        ledger_date: payload.ledger_date,
        effective_date: payload.effective_date,
        kind: payload.kind,
        counterparty: payload.counterparty,
        description: payload.description,
        paid: payload.paid,
        paid_date: payload.paid_date,
        optional: payload.optional,
        categories: payload.categories.into_iter().map(split_from_api).collect(),
    };
    let entry = state.engine.create_entry(&auth.principal_id, new).await?;
    Ok((StatusCode::CREATED, Json(map_entry(entry))))
}

pub async fn get(
    Extension(auth): Extension<AuthContext>,
    State(state): State<ServerState>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<EntryView>, ServerError> {
    let entry = state.engine.entry(&auth.principal_id, entry_id).await?;
    Ok(Json(map_entry(entry)))
}

pub async fn update(
    Extension(auth): Extension<AuthContext>,
    State(state): State<ServerState>,
    Path(entry_id): Path<Uuid>,
    Json(payload): Json<EntryPatch>,
) -> Result<Json<EntryView>, ServerError> {
    let update = EntryUpdate {
        amount_minor: payload.amount_minor,
        ledger_date: payload.ledger_date,
        effective_date: payload.effective_date,
        kind: payload.kind,
        counterparty: payload.counterparty,
        description: payload.description,
        paid: payload.paid,
        paid_date: payload.paid_date,
        optional: payload.optional,
        categories: payload
            .categories
            .map(|splits| splits.into_iter().map(split_from_api).collect()),
    };
    let entry = state
        .engine
        .update_entry(&auth.principal_id, entry_id, update)
        .await?;
    Ok(Json(map_entry(entry)))
}

pub async fn delete(
    Extension(auth): Extension<AuthContext>,
    State(state): State<ServerState>,
    Path(entry_id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .delete_entry(&auth.principal_id, entry_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
