use api_types::report::{GroupBy, SummaryQuery, SummaryRow};
use axum::{
    Extension, Json,
    extract::{Query, State},
};
use engine::{Money, ReportFilter, ReportGroupBy};

use crate::{ServerError, identity::AuthContext, server::ServerState};

pub async fn summary(
    Extension(auth): Extension<AuthContext>,
    State(state): State<ServerState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<Vec<SummaryRow>>, ServerError> {
    let filter = ReportFilter {
        from: query.from,
        to: query.to,
        paid: query.paid,
        optional: query.optional,
        owner_id: query.owner_id,
        group_by: match query.group_by {
            GroupBy::Kind => ReportGroupBy::Kind,
            GroupBy::Month => ReportGroupBy::Month,
            GroupBy::Category => ReportGroupBy::Category,
        },
    };
    let rows = state
        .engine
        .summarize(&auth.principal_id, filter)
        .await?
        .into_iter()
        .map(|row| SummaryRow {
            total: Money::from_cents(row.total_minor).to_string(),
            key: row.key,
            total_minor: row.total_minor,
            count: row.count,
        })
        .collect();
    Ok(Json(rows))
}
