use sea_orm::Database;

use engine::{Engine, EngineError, NewPrincipal, PrincipalStatus, Role};
use migration::MigratorTrait;

async fn engine() -> Engine {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    Engine::builder().database(db).build().await.unwrap()
}

async fn principal(engine: &Engine, id: &str, role: Role) {
    engine
        .ensure_principal(NewPrincipal {
            role,
            status: PrincipalStatus::Approved,
            ..NewPrincipal::user(id)
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn first_sight_creates_pending_user() {
    let engine = engine().await;
    let created = engine
        .ensure_principal(NewPrincipal {
            email: Some("ada@example.com".to_string()),
            ..NewPrincipal::user("ada")
        })
        .await
        .unwrap();
    assert_eq!(created.role, Role::User);
    assert_eq!(created.status, PrincipalStatus::Pending);

    let again = engine
        .ensure_principal(NewPrincipal {
            display_name: Some("Ada".to_string()),
            role: Role::SuperAdmin,
            ..NewPrincipal::user("ada")
        })
        .await
        .unwrap();
    assert_eq!(again.role, Role::User);
    assert_eq!(again.display_name.as_deref(), Some("Ada"));
    assert_eq!(again.email.as_deref(), Some("ada@example.com"));
    assert_eq!(again.created_at, created.created_at);

    let blank = engine.ensure_principal(NewPrincipal::user("  ")).await;
    assert!(matches!(blank, Err(EngineError::InvalidId(_))));
}

#[tokio::test]
async fn admin_promotes_user_but_user_cannot() {
    let engine = engine().await;
    principal(&engine, "a", Role::Admin).await;
    principal(&engine, "u", Role::User).await;
    principal(&engine, "u2", Role::User).await;

    let promoted = engine.set_role("a", "u", Role::Admin).await.unwrap();
    assert_eq!(promoted.role, Role::Admin);

    let refused = engine.set_role("u2", "u", Role::Admin).await;
    assert!(matches!(refused, Err(EngineError::Forbidden(_))));
    assert_eq!(engine.principal("u").await.unwrap().role, Role::Admin);
}

#[tokio::test]
async fn role_changes_stay_below_the_actor() {
    let engine = engine().await;
    principal(&engine, "root", Role::SuperAdmin).await;
    principal(&engine, "a", Role::Admin).await;
    principal(&engine, "b", Role::Admin).await;
    principal(&engine, "u", Role::User).await;

    let above = engine.set_role("a", "u", Role::SuperAdmin).await;
    assert!(matches!(above, Err(EngineError::Forbidden(_))));

    let peer = engine.set_role("a", "b", Role::User).await;
    assert!(matches!(peer, Err(EngineError::Forbidden(_))));

    let own = engine.set_role("a", "a", Role::User).await;
    assert!(matches!(own, Err(EngineError::Forbidden(_))));

    let demoted = engine.set_role("root", "b", Role::User).await.unwrap();
    assert_eq!(demoted.role, Role::User);

    let missing = engine.set_role("root", "ghost", Role::User).await;
    assert!(matches!(missing, Err(EngineError::KeyNotFound(_))));
}

#[tokio::test]
async fn status_and_listing_are_admin_only() {
    let engine = engine().await;
    principal(&engine, "a", Role::Admin).await;
    engine
        .ensure_principal(NewPrincipal::user("newcomer"))
        .await
        .unwrap();

    let listed = engine.list_principals("a").await.unwrap();
    assert_eq!(listed.len(), 2);

    let by_newcomer = engine.list_principals("newcomer").await;
    assert!(matches!(by_newcomer, Err(EngineError::Forbidden(_))));

    let approved = engine
        .set_status("a", "newcomer", PrincipalStatus::Approved)
        .await
        .unwrap();
    assert_eq!(approved.status, PrincipalStatus::Approved);

    let by_user = engine
        .set_status("newcomer", "a", PrincipalStatus::Rejected)
        .await;
    assert!(matches!(by_user, Err(EngineError::Forbidden(_))));
}
