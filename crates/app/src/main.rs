use std::{error::Error, sync::Arc, time::Duration};

use engine::{CredentialVault, Engine};
use migration::{Migrator, MigratorTrait};
use server::{IdentityResolver, JwtVerifier, ServerState, ServiceAccount, TokenVerifier};
use settings::Settings;
use thiserror::Error;
use ynab_sync::{SyncScheduler, Synchronizer, YnabClient};

mod settings;

type BoxError = Box<dyn Error + Send + Sync>;

const SCHEMA_PROBE_DEADLINE: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
enum StartupError {
    #[error("identity credentials are required when ENV={0}")]
    IdentityRequired(String),
    #[error("database did not answer within {0:?}")]
    DatabaseTimeout(Duration),
}

/// Which supervised task ended.
enum Exit {
    Server,
    Scheduler,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let settings = Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "tandem={level},server={level},engine={level},ynab_sync={level},metrics={level}",
            level = settings.log_level
        ))
        .init();

    let deployment = settings.deployment()?;
    let vault = Arc::new(CredentialVault::from_config(
        settings.encryption_key.as_deref(),
    )?);
    let verifier = build_verifier(&settings)?;
    if verifier.is_none() && deployment.requires_identity() {
        return Err(StartupError::IdentityRequired(settings.env.clone()).into());
    }
    if verifier.is_none() && deployment.is_development() {
        tracing::warn!("no identity verifier configured, serving every request as dev-admin");
    }

    let db = connect(&settings.database_url).await?;
    let engine = Arc::new(Engine::builder().database(db).build().await?);

    let client = YnabClient::new(settings.ynab_base_url.as_str())?;
    let sync = Arc::new(Synchronizer::new(
        Arc::clone(&engine),
        Arc::clone(&vault),
        client,
    ));
    let identity = IdentityResolver::new(verifier)
        .allow_dev_identity(deployment.is_development())
        .legacy_query_auth(settings.legacy_query_auth);
    let state = ServerState {
        engine,
        vault,
        identity: Arc::new(identity),
        sync: Arc::clone(&sync),
    };

    let listener = tokio::net::TcpListener::bind(settings.address()).await?;
    let origins = settings.cors_origins();

    let mut tasks = tokio::task::JoinSet::new();
    tasks.spawn(async move {
        if let Err(err) = server::run_with_listener(state, &origins, listener).await {
            tracing::error!("server failed: {err}");
        }
        Exit::Server
    });
    tasks.spawn(async move {
        SyncScheduler::new(sync).run().await;
        Exit::Scheduler
    });

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Exit::Scheduler) => tracing::debug!("sync scheduler stopped"),
            Ok(Exit::Server) => {
                tasks.shutdown().await;
                break;
            }
            Err(err) => {
                tracing::error!("task failed: {err}");
                tasks.shutdown().await;
                break;
            }
        }
    }

    Ok(())
}

fn build_verifier(settings: &Settings) -> Result<Option<Arc<dyn TokenVerifier>>, BoxError> {
    if !settings.has_identity_credentials() {
        return Ok(None);
    }
    let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());
    let account = if let Some(json) = non_empty(&settings.identity_credentials_json) {
        ServiceAccount::from_json(&json)?
    } else if let Some(encoded) = non_empty(&settings.identity_credentials_base64) {
        ServiceAccount::from_base64(&encoded)?
    } else if let Some(path) = non_empty(&settings.identity_credentials_file) {
        ServiceAccount::from_file(&path)?
    } else {
        return Ok(None);
    };

    tracing::info!(project = %account.project_id, "identity verifier configured");
    let verifier = JwtVerifier::new(&account, settings.identity_jwks_url.as_deref())?;
    Ok(Some(Arc::new(verifier)))
}

async fn connect(url: &str) -> Result<sea_orm::DatabaseConnection, BoxError> {
    let database = tokio::time::timeout(SCHEMA_PROBE_DEADLINE, async {
        let database = sea_orm::Database::connect(url).await?;
        database.ping().await?;
        Ok::<_, sea_orm::DbErr>(database)
    })
    .await
    .map_err(|_| StartupError::DatabaseTimeout(SCHEMA_PROBE_DEADLINE))??;

    Migrator::up(&database, None).await?;
    tracing::info!("database schema is up to date");
    Ok(database)
}
