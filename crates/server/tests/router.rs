use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use sea_orm::Database;
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header as header_is, method, path},
};

use engine::{CredentialVault, Engine, NewPrincipal, PrincipalStatus, Role};
use migration::MigratorTrait;
use server::{
    DEV_ADMIN_ID, IdentityError, IdentityResolver, ServerState, TokenVerifier, VerifiedIdentity,
};
use ynab_sync::{Synchronizer, YnabClient};

/// Accepts `token-<id>` and authenticates as `<id>`.
struct StaticVerifier;

#[async_trait]
impl TokenVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, IdentityError> {
        let subject = token
            .strip_prefix("token-")
            .ok_or_else(|| IdentityError::InvalidToken("unknown token".to_string()))?;
        Ok(VerifiedIdentity {
            subject: subject.to_string(),
            email: Some(format!("{subject}@example.com")),
            display_name: None,
        })
    }
}

async fn state_with(identity: IdentityResolver) -> ServerState {
    state_with_upstream(identity, "http://127.0.0.1:9").await
}

async fn state_with_upstream(identity: IdentityResolver, upstream: &str) -> ServerState {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Arc::new(Engine::builder().database(db).build().await.unwrap());
    let vault = Arc::new(CredentialVault::new(b"router-test-key").unwrap());
    let client = YnabClient::new(upstream).unwrap();
    let sync = Arc::new(Synchronizer::new(
        Arc::clone(&engine),
        Arc::clone(&vault),
        client,
    ));
    ServerState {
        engine,
        vault,
        identity: Arc::new(identity),
        sync,
    }
}

async fn add_principal(state: &ServerState, id: &str, role: Role, status: PrincipalStatus) {
    state
        .engine
        .ensure_principal(NewPrincipal {
            role,
            status,
            ..NewPrincipal::user(id)
        })
        .await
        .unwrap();
}

async fn app() -> (Router, ServerState) {
    let state = state_with(IdentityResolver::new(Some(Arc::new(StaticVerifier)))).await;
    for (id, role) in [
        ("p1", Role::User),
        ("p2", Role::User),
        ("p3", Role::User),
        ("admin", Role::Admin),
    ] {
        add_principal(&state, id, role, PrincipalStatus::Approved).await;
    }
    (server::router(state.clone()), state)
}

async fn call(
    router: &Router,
    method: &str,
    uri: &str,
    principal: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(principal) = principal {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer token-{principal}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn requests_without_credentials_are_unauthenticated() {
    let (router, _) = app().await;

    let (status, body) = call(&router, "GET", "/entries", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthenticated");
    assert_eq!(body["error"], "authentication required");

    let request = Request::builder()
        .uri("/entries")
        .header(header::AUTHORIZATION, "Bearer forged")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (status, _) = call(&router, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn granted_partner_sees_entries_and_stranger_does_not() {
    let (router, _) = app().await;

    let (status, created) = call(
        &router,
        "POST",
        "/entries",
        Some("p1"),
        Some(json!({
            "amount_minor": 1250,
            "ledger_date": "2025-04-01T00:00:00Z",
            "kind": "Food",
            "paid": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["amount"], "12.50");
    assert_eq!(created["owner_id"], "p1");

    let (status, _) = call(
        &router,
        "POST",
        "/permissions",
        Some("p1"),
        Some(json!({"grantee_id": "p2", "resource_kind": "transactions", "action": "read"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, seen) = call(&router, "GET", "/entries", Some("p2"), None).await;
    assert_eq!(status, StatusCode::OK);
    let seen = seen.as_array().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0]["amount"], "12.50");

    let (_, hidden) = call(&router, "GET", "/entries", Some("p3"), None).await;
    assert!(hidden.as_array().unwrap().is_empty());

    let uri = format!("/entries/{}", created["id"].as_str().unwrap());
    let (status, body) = call(&router, "GET", &uri, Some("p3"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");

    let (status, body) = call(
        &router,
        "PATCH",
        &uri,
        Some("p2"),
        Some(json!({"paid": false})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "forbidden");

    let (status, listed) = call(&router, "GET", "/permissions", Some("p2"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed[0]["direction"], "held");
    assert_eq!(listed[0]["active"], true);
}

#[tokio::test]
async fn summary_groups_visible_entries() {
    let (router, _) = app().await;
    for (kind, amount, paid) in [
        ("Food", 10_000, true),
        ("Food", 5_000, true),
        ("Housing", 20_000, true),
        ("Bills", 8_000, false),
    ] {
        let (status, _) = call(
            &router,
            "POST",
            "/entries",
            Some("p1"),
            Some(json!({
                "amount_minor": amount,
                "ledger_date": "2025-04-01T00:00:00Z",
                "kind": kind,
                "paid": paid
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, rows) = call(
        &router,
        "GET",
        "/reports/summary?paid=true",
        Some("p1"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["key"], "Housing");
    assert_eq!(rows[0]["total"], "200.00");
    assert_eq!(rows[1]["key"], "Food");
    assert_eq!(rows[1]["count"], 2);
}

#[tokio::test]
async fn role_changes_follow_hierarchy() {
    let (router, _) = app().await;

    let (status, body) = call(
        &router,
        "PUT",
        "/users/p2/role",
        Some("admin"),
        Some(json!({"role": "admin"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "admin");

    let (status, body) = call(
        &router,
        "PUT",
        "/users/p3/role",
        Some("p1"),
        Some(json!({"role": "admin"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "forbidden");

    let (status, _) = call(&router, "GET", "/users", Some("p1"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, me) = call(&router, "GET", "/me", Some("p1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], "p1");
    assert_eq!(me["status"], "approved");
}

#[tokio::test]
async fn first_sight_creates_pending_principal() {
    let (router, state) = app().await;

    let (status, me) = call(&router, "GET", "/me", Some("newcomer"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["status"], "pending");
    assert_eq!(me["email"], "newcomer@example.com");
    assert!(state.engine.principal("newcomer").await.is_ok());
}

#[tokio::test]
async fn rejected_principal_is_refused() {
    let (router, state) = app().await;
    add_principal(&state, "blocked", Role::User, PrincipalStatus::Rejected).await;

    let (status, body) = call(&router, "GET", "/me", Some("blocked"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "forbidden");
}

#[tokio::test]
async fn legacy_query_auth_only_for_known_principals() {
    let state = state_with(
        IdentityResolver::new(Some(Arc::new(StaticVerifier))).legacy_query_auth(true),
    )
    .await;
    add_principal(&state, "p1", Role::User, PrincipalStatus::Approved).await;
    let router = server::router(state.clone());

    let (status, me) = call(&router, "GET", "/me?auth=p1", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], "p1");

    let (status, _) = call(&router, "GET", "/me?auth=ghost", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(state.engine.principal("ghost").await.is_err());

    let strict = server::router(
        state_with(IdentityResolver::new(Some(Arc::new(StaticVerifier)))).await,
    );
    let (status, _) = call(&strict, "GET", "/me?auth=p1", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn dev_identity_only_without_verifier() {
    let dev = server::router(state_with(IdentityResolver::new(None).allow_dev_identity(true)).await);
    let (status, me) = call(&dev, "GET", "/me", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], DEV_ADMIN_ID);
    assert_eq!(me["role"], "admin");

    let locked = server::router(state_with(IdentityResolver::new(None)).await);
    let (status, _) = call(&locked, "GET", "/me", Some("p1"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn credentials_round_trip_and_dispatch_needs_them() {
    let (router, _) = app().await;

    let (status, body) = call(
        &router,
        "POST",
        "/remote/transactions",
        Some("p1"),
        Some(json!({
            "date": "2025-06-01",
            "splits": [{"category_name": "Food", "amount_minor": 3000}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(body["kind"], "not_configured");

    let (status, stored) = call(
        &router,
        "PUT",
        "/credentials",
        Some("p1"),
        Some(json!({"token": "t", "budget_id": "b", "account_id": "a", "sync_period_minutes": 30})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored["has_credentials"], true);
    assert_eq!(stored["sync_period_minutes"], 30);

    let (status, sync) = call(&router, "GET", "/sync/status", Some("p1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sync["has_credentials"], true);
    assert!(sync["next_due"].is_string());

    let (status, body) = call(
        &router,
        "POST",
        "/remote/transactions",
        Some("p1"),
        Some(json!({
            "date": "2025-06-01",
            "splits": [{"category_name": "Food", "amount_minor": 3000}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "unknown_category");

    let (status, _) = call(&router, "DELETE", "/credentials", Some("p1"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, after) = call(&router, "GET", "/credentials", Some("p1"), None).await;
    assert_eq!(after["has_credentials"], false);
}

#[tokio::test]
async fn categories_and_filters_crud() {
    let (router, _) = app().await;

    let (status, category) = call(
        &router,
        "POST",
        "/categories",
        Some("p1"),
        Some(json!({"name": "Groceries", "color": "#00ff00"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(
        &router,
        "POST",
        "/categories",
        Some("p1"),
        Some(json!({"name": "groceries"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "conflict");

    let uri = format!("/categories/{}", category["id"].as_str().unwrap());
    let (status, renamed) = call(
        &router,
        "PATCH",
        &uri,
        Some("p1"),
        Some(json!({"name": "Food", "color": null})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renamed["name"], "Food");
    assert_eq!(renamed["color"], Value::Null);

    let (status, filter) = call(
        &router,
        "POST",
        "/filters",
        Some("p1"),
        Some(json!({"name": "Unpaid", "payload": {"paid": false}})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(filter["shared"], false);

    let (_, listed) = call(&router, "GET", "/filters", Some("p1"), None).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let uri = format!("/filters/{}", filter["id"].as_str().unwrap());
    let (status, _) = call(&router, "DELETE", &uri, Some("p1"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&router, "DELETE", &uri, Some("p1"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sync_and_dispatch_reach_upstream() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/budgets/b/categories"))
        .and(header_is("authorization", "Bearer t"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"category_groups": [
            {"id": "g1", "name": "Everyday", "categories": [
                {"id": "c-food", "name": "Food"},
                {"id": "c-fun", "name": "Fun"}
            ]}
        ]}})))
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/budgets/b/accounts/a/transactions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"transactions": [
            {"id": "t1", "date": "2025-05-30", "amount": -12340, "account_id": "a",
             "payee_name": "Bakery", "memo": null, "category_id": "c-food"}
        ]}})))
        .mount(&upstream)
        .await;
    Mock::given(method("POST"))
        .and(path("/budgets/b/transactions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"data": {}})))
        .expect(1)
        .mount(&upstream)
        .await;

    let state = state_with_upstream(
        IdentityResolver::new(Some(Arc::new(StaticVerifier))),
        &upstream.uri(),
    )
    .await;
    add_principal(&state, "p1", Role::User, PrincipalStatus::Approved).await;
    let router = server::router(state);

    let (status, _) = call(
        &router,
        "PUT",
        "/credentials",
        Some("p1"),
        Some(json!({"token": "t", "budget_id": "b", "account_id": "a", "sync_period_minutes": 60})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, report) = call(&router, "POST", "/sync", Some("p1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["groups"], 1);
    assert_eq!(report["categories"], 2);
    assert_eq!(report["transactions"], 1);

    let (status, groups) = call(&router, "GET", "/remote/categories", Some("p1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(groups[0]["categories"].as_array().unwrap().len(), 2);

    let (status, too_large) = call(
        &router,
        "POST",
        "/remote/transactions",
        Some("p1"),
        Some(json!({
            "date": "2025-06-01",
            "splits": [{"category_name": "Food", "amount_minor": i64::MAX / 5}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(too_large["kind"], "invalid_input");

    let (status, result) = call(
        &router,
        "POST",
        "/remote/transactions",
        Some("p1"),
        Some(json!({
            "date": "2025-06-01",
            "payee_name": "Market",
            "splits": [
                {"category_name": "food", "amount_minor": 3000},
                {"category_name": "Fun", "amount_minor": 1200}
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(result["amount_milliunits"], 42_000);
}
