use std::{sync::Arc, time::Duration as StdDuration};

use chrono::{DateTime, Duration, TimeZone, Utc};
use sea_orm::Database;
use serde_json::{Value, json};
use tokio::task::JoinSet;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

use engine::{
    CredentialInput, CredentialVault, Engine, Money, NewPrincipal, PrincipalStatus, Role,
};
use migration::MigratorTrait;
use ynab_sync::{Split, SplitTransaction, SyncError, SyncScheduler, Synchronizer, YnabClient};

const CATEGORIES: &str = "/budgets/budget-1/categories";
const TRANSACTIONS: &str = "/budgets/budget-1/accounts/account-1/transactions";

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

async fn synchronizer(server: &MockServer) -> Arc<Synchronizer> {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db).build().await.unwrap();
    engine
        .ensure_principal(NewPrincipal {
            status: PrincipalStatus::Approved,
            role: Role::User,
            ..NewPrincipal::user("p")
        })
        .await
        .unwrap();

    let vault = CredentialVault::new(b"sync-test-key").unwrap();
    engine
        .set_credentials(
            "p",
            &vault,
            CredentialInput {
                token: Some("token-p".to_string()),
                budget_id: Some("budget-1".to_string()),
                account_id: Some("account-1".to_string()),
                sync_period_minutes: Some(60),
            },
        )
        .await
        .unwrap();

    let client = YnabClient::new(server.uri()).unwrap();
    Arc::new(Synchronizer::new(Arc::new(engine), Arc::new(vault), client))
}

fn categories_body() -> Value {
    json!({"data": {"category_groups": [
        {"id": "g1", "name": "Everyday", "categories": [
            {"id": "c-food", "name": "Food"},
            {"id": "c-fun", "name": "Fun"}
        ]},
        {"id": "g-old", "name": "Retired", "deleted": true, "categories": []}
    ]}})
}

fn transactions_body() -> Value {
    json!({"data": {"transactions": [
        {"id": "t1", "date": "2025-05-30", "amount": -12340, "account_id": "account-1",
         "payee_name": "Bakery", "memo": null, "category_id": "c-food"}
    ]}})
}

async fn last_synced(sync: &Synchronizer) -> Option<DateTime<Utc>> {
    sync.engine().credential_status("p").await.unwrap().last_synced
}

async fn drain(children: &mut JoinSet<ynab_sync::SyncOutcome>) -> Vec<bool> {
    let mut outcomes = Vec::new();
    while let Some(joined) = children.join_next().await {
        let (_, result) = joined.unwrap();
        outcomes.push(result.is_ok());
    }
    outcomes
}

#[tokio::test]
async fn sync_mirrors_categories_and_transactions() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CATEGORIES))
        .and(header("authorization", "Bearer token-p"))
        .respond_with(ResponseTemplate::new(200).set_body_json(categories_body()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(TRANSACTIONS))
        .respond_with(ResponseTemplate::new(200).set_body_json(transactions_body()))
        .mount(&server)
        .await;

    let sync = synchronizer(&server).await;
    let report = sync.sync_principal("p", t0()).await.unwrap();
    assert_eq!(report.groups, 1);
    assert_eq!(report.categories, 2);
    assert_eq!(report.transactions, 1);
    assert_eq!(last_synced(&sync).await, Some(t0()));

    let groups = sync.engine().list_mirror_categories("p").await.unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].categories.len(), 2);
    let mirrored = sync.engine().list_mirror_transactions("p").await.unwrap();
    assert_eq!(mirrored[0].amount_milliunits, -12_340);
}

#[tokio::test]
async fn scheduler_waits_for_period_and_retries_after_failure() {
    let server = MockServer::start().await;
    let sync = synchronizer(&server).await;
    let t = t0();
    sync.engine()
        .mark_synced("p", t - Duration::minutes(59))
        .await
        .unwrap();
    let scheduler = SyncScheduler::new(Arc::clone(&sync));
    let mut children = JoinSet::new();

    // Period not elapsed yet.
    assert_eq!(scheduler.tick_at(t, &mut children).await.unwrap(), 0);

    // Upstream failure leaves last_synced alone.
    let failing = Mock::given(method("GET"))
        .and(path(CATEGORIES))
        .respond_with(ResponseTemplate::new(500))
        .mount_as_scoped(&server)
        .await;
    let t2 = t + Duration::minutes(2);
    assert_eq!(scheduler.tick_at(t2, &mut children).await.unwrap(), 1);
    assert_eq!(drain(&mut children).await, vec![false]);
    assert_eq!(last_synced(&sync).await, Some(t - Duration::minutes(59)));
    drop(failing);

    // Still due on the next tick, which now succeeds.
    Mock::given(method("GET"))
        .and(path(CATEGORIES))
        .respond_with(ResponseTemplate::new(200).set_body_json(categories_body()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(TRANSACTIONS))
        .respond_with(ResponseTemplate::new(200).set_body_json(transactions_body()))
        .mount(&server)
        .await;
    assert_eq!(scheduler.tick_at(t2, &mut children).await.unwrap(), 1);
    assert_eq!(drain(&mut children).await, vec![true]);
    assert_eq!(last_synced(&sync).await, Some(t2));
    assert!(!scheduler.is_in_flight("p"));

    assert_eq!(
        scheduler
            .tick_at(t2 + Duration::minutes(1), &mut children)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn running_sync_blocks_overlapping_ticks_and_manual_syncs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CATEGORIES))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(categories_body())
                .set_delay(StdDuration::from_millis(500)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(TRANSACTIONS))
        .respond_with(ResponseTemplate::new(200).set_body_json(transactions_body()))
        .mount(&server)
        .await;
    let sync = synchronizer(&server).await;
    let scheduler = SyncScheduler::new(Arc::clone(&sync));
    let mut children = JoinSet::new();

    assert_eq!(scheduler.tick_at(t0(), &mut children).await.unwrap(), 1);
    assert!(scheduler.is_in_flight("p"));
    assert_eq!(scheduler.tick_at(t0(), &mut children).await.unwrap(), 0);
    assert!(matches!(
        sync.sync_now("p", t0()).await,
        Err(SyncError::InProgress(id)) if id == "p"
    ));

    assert_eq!(drain(&mut children).await, vec![true]);
    assert!(!scheduler.is_in_flight("p"));
    assert_eq!(last_synced(&sync).await, Some(t0()));
}

#[tokio::test]
async fn timed_out_sync_frees_slot_and_keeps_last_synced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CATEGORIES))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(categories_body())
                .set_delay(StdDuration::from_secs(5)),
        )
        .mount(&server)
        .await;
    let sync = synchronizer(&server).await;
    let scheduler =
        SyncScheduler::new(Arc::clone(&sync)).task_deadline(StdDuration::from_millis(50));
    let mut children = JoinSet::new();

    assert_eq!(scheduler.tick_at(t0(), &mut children).await.unwrap(), 1);
    let (principal, result) = children.join_next().await.unwrap().unwrap();
    assert_eq!(principal, "p");
    assert!(matches!(result, Err(SyncError::Timeout)));
    assert!(!scheduler.is_in_flight("p"));
    assert_eq!(last_synced(&sync).await, None);
}

#[tokio::test]
async fn upstream_error_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CATEGORIES))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    let sync = synchronizer(&server).await;

    let err = sync.sync_principal("p", t0()).await.unwrap_err();
    assert!(matches!(err, SyncError::Upstream { status: 401 }));
    assert!(sync.engine().list_mirror_categories("p").await.unwrap().is_empty());
    assert_eq!(last_synced(&sync).await, None);
}

async fn seed_mirror(sync: &Synchronizer) {
    let engine = sync.engine();
    engine
        .upsert_mirror_group("p", "g1", "Everyday", t0())
        .await
        .unwrap();
    engine
        .upsert_mirror_category("p", "g1", "c-food", "Food", t0())
        .await
        .unwrap();
    engine
        .upsert_mirror_category("p", "g1", "c-fun", "Fun", t0())
        .await
        .unwrap();
}

fn split(name: &str, cents: i64) -> Split {
    Split {
        category_name: name.to_string(),
        amount: Money::from_cents(cents),
        memo: None,
    }
}

#[tokio::test]
async fn dispatch_sends_milliunit_splits() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/budgets/budget-1/transactions"))
        .and(header("authorization", "Bearer token-p"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"data": {}})))
        .expect(1)
        .mount(&server)
        .await;
    let sync = synchronizer(&server).await;
    seed_mirror(&sync).await;

    let outcome = sync
        .dispatch(
            "p",
            SplitTransaction {
                date: "2025-06-01".to_string(),
                payee_name: Some("Market".to_string()),
                memo: None,
                splits: vec![split("food", 3000), split("FUN", 1200)],
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.status, 201);
    assert_eq!(outcome.amount_milliunits, 42_000);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let tx = &body["transaction"];
    assert_eq!(tx["amount"], 42_000);
    assert_eq!(tx["account_id"], "account-1");
    assert_eq!(tx["subtransactions"][0]["amount"], 30_000);
    assert_eq!(tx["subtransactions"][0]["category_id"], "c-food");
    assert_eq!(tx["subtransactions"][1]["amount"], 12_000);
    assert_eq!(tx["subtransactions"][1]["category_id"], "c-fun");
}

#[tokio::test]
async fn dispatch_rejects_bad_input_before_calling_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;
    let sync = synchronizer(&server).await;
    seed_mirror(&sync).await;

    let empty = sync
        .dispatch(
            "p",
            SplitTransaction {
                date: "2025-06-01".to_string(),
                payee_name: None,
                memo: None,
                splits: vec![],
            },
        )
        .await;
    assert!(matches!(empty, Err(SyncError::InvalidInput(_))));

    let unknown = sync
        .dispatch(
            "p",
            SplitTransaction {
                date: "2025-06-01".to_string(),
                payee_name: None,
                memo: None,
                splits: vec![split("Food", 100), split("Travel", 100)],
            },
        )
        .await;
    assert!(matches!(unknown, Err(SyncError::UnknownCategory(name)) if name == "Travel"));
}

#[tokio::test]
async fn dispatch_surfaces_upstream_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;
    let sync = synchronizer(&server).await;
    seed_mirror(&sync).await;

    let result = sync
        .dispatch(
            "p",
            SplitTransaction {
                date: "2025-06-01".to_string(),
                payee_name: None,
                memo: None,
                splits: vec![split("Food", 100)],
            },
        )
        .await;
    assert!(matches!(result, Err(SyncError::Upstream { status: 400 })));
}

#[tokio::test]
async fn dispatch_rejects_amounts_beyond_milliunit_range() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;
    let sync = synchronizer(&server).await;
    seed_mirror(&sync).await;

    let single = sync
        .dispatch(
            "p",
            SplitTransaction {
                date: "2025-06-01".to_string(),
                payee_name: None,
                memo: None,
                splits: vec![split("Food", i64::MAX / 5)],
            },
        )
        .await;
    assert!(matches!(single, Err(SyncError::InvalidInput(_))));

    // Each split fits on its own, the total does not.
    let summed = sync
        .dispatch(
            "p",
            SplitTransaction {
                date: "2025-06-01".to_string(),
                payee_name: None,
                memo: None,
                splits: vec![
                    split("Food", i64::MAX / 25),
                    split("Fun", i64::MAX / 25),
                    split("Food", i64::MAX / 25),
                ],
            },
        )
        .await;
    assert!(matches!(summed, Err(SyncError::InvalidInput(_))));
}
