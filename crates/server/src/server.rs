use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, Request, State},
    http::{HeaderValue, Method, header},
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use engine::{CredentialVault, Engine};
use serde::Deserialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use ynab_sync::Synchronizer;

use crate::{
    ServerError, blobs, categories, credentials, entries, identity::IdentityResolver, permissions,
    principals, reports, sync,
};

/// Shared, read-only request context.
#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
    pub vault: Arc<CredentialVault>,
    pub identity: Arc<IdentityResolver>,
    pub sync: Arc<Synchronizer>,
}

#[derive(Debug, Deserialize)]
struct LegacyAuth {
    auth: Option<String>,
}

async fn auth(
    State(state): State<ServerState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    Query(legacy): Query<LegacyAuth>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let token = bearer.as_ref().map(|TypedHeader(auth)| auth.token());
    let context = state
        .identity
        .resolve(&state.engine, token, legacy.auth.as_deref())
        .await?;

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

async fn health() -> &'static str {
    "ok"
}

/// All API routes behind authentication, without CORS.
pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/entries", get(entries::list).post(entries::create))
        .route(
            "/entries/{id}",
            get(entries::get).patch(entries::update).delete(entries::delete),
        )
        .route("/categories", get(categories::list).post(categories::create))
        .route(
            "/categories/{id}",
            axum::routing::patch(categories::update).delete(categories::delete),
        )
        .route("/filters", get(blobs::list_filters).post(blobs::create_filter))
        .route(
            "/filters/{id}",
            get(blobs::get_filter).delete(blobs::delete_filter),
        )
        .route(
            "/custom-reports",
            get(blobs::list_reports).post(blobs::create_report),
        )
        .route(
            "/custom-reports/{id}",
            get(blobs::get_report).delete(blobs::delete_report),
        )
        .route(
            "/permissions",
            get(permissions::list)
                .post(permissions::grant)
                .delete(permissions::revoke),
        )
        .route("/me", get(principals::me))
        .route("/users", get(principals::list))
        .route("/users/{id}/role", put(principals::set_role))
        .route("/users/{id}/status", put(principals::set_status))
        .route("/reports/summary", get(reports::summary))
        .route("/sync", post(sync::sync_now))
        .route("/sync/status", get(sync::status))
        .route(
            "/credentials",
            get(credentials::status)
                .put(credentials::put)
                .delete(credentials::delete),
        )
        .route("/remote/categories", get(sync::remote_categories))
        .route(
            "/remote/transactions",
            get(sync::remote_transactions).post(sync::dispatch),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth))
        .route("/health", get(health))
        .with_state(state)
}

fn cors(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// [`router`] wrapped in the CORS policy.
pub fn app(state: ServerState, allowed_origins: &[String]) -> Router {
    router(state).layer(cors(allowed_origins))
}

pub async fn run_with_listener(
    state: ServerState,
    allowed_origins: &[String],
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app(state, allowed_origins)).await
}
