use chrono::{TimeZone, Utc};
use sea_orm::Database;

use engine::{
    CategorySplit, Engine, KindTotal, NewCategory, NewEntry, NewPrincipal, PrincipalStatus,
    ReportFilter, ReportGroupBy, Role,
};
use migration::MigratorTrait;

async fn engine() -> Engine {
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
    engine
}

fn entry(kind: &str, amount_minor: i64, paid: bool, month: u32) -> NewEntry {
    NewEntry {
        amount_minor,
        ledger_date: Utc.with_ymd_and_hms(2025, month, 3, 8, 0, 0).unwrap(),
        kind: kind.to_string(),
        paid,
        ..Default::default()
    }
}

fn total(key: &str, total_minor: i64, count: u64) -> KindTotal {
    KindTotal {
        key: key.to_string(),
        total_minor,
        count,
    }
}

#[tokio::test]
async fn paid_entries_grouped_by_kind_descending() {
    let engine = engine().await;
    for (kind, amount, paid) in [
        ("Food", 10000, true),
        ("Food", 5000, true),
        ("Housing", 20000, true),
        ("Fun", 6000, true),
        ("Bills", 8000, false),
    ] {
        engine
            .create_entry("p", entry(kind, amount, paid, 1))
            .await
            .unwrap();
    }

    let totals = engine
        .summarize(
            "p",
            ReportFilter {
                paid: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(
        totals,
        vec![
            total("Housing", 20000, 1),
            total("Food", 15000, 2),
            total("Fun", 6000, 1),
        ]
    );
}

#[tokio::test]
async fn month_and_category_grouping() {
    let engine = engine().await;
    engine
        .create_entry("p", entry("Food", 300, true, 1))
        .await
        .unwrap();
    engine
        .create_entry("p", entry("Food", 700, true, 2))
        .await
        .unwrap();

    let by_month = engine
        .summarize(
            "p",
            ReportFilter {
                group_by: ReportGroupBy::Month,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(
        by_month,
        vec![total("2025-02", 700, 1), total("2025-01", 300, 1)]
    );

    let coffee = engine
        .create_category(
            "p",
            NewCategory {
                name: "Coffee".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let mut split = entry("Food", 500, true, 3);
    split.categories = vec![CategorySplit {
        category_id: coffee.id,
        amount_minor: 500,
    }];
    engine.create_entry("p", split).await.unwrap();

    let by_category = engine
        .summarize(
            "p",
            ReportFilter {
                group_by: ReportGroupBy::Category,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(
        by_category,
        vec![total("Uncategorized", 1000, 2), total("Coffee", 500, 1)]
    );
}
