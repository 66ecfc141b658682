use std::sync::atomic::{AtomicU64, Ordering};

use sea_orm::DatabaseConnection;

use crate::ResultEngine;

mod access;
mod blobs;
mod categories;
mod credentials;
mod entries;
mod grants;
mod mirror;
mod principals;
mod reports;

pub use access::{AccessPlan, OwnerScope};
pub use grants::{GrantRequest, RevokeRequest};
pub use reports::{KindTotal, ReportFilter, ReportGroupBy};

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    legacy_rows: AtomicU64,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// The underlying connection pool.
    pub fn database(&self) -> &DatabaseConnection {
        &self.database
    }

    /// How many null-owner rows have been served since start-up.
    pub fn legacy_rows_observed(&self) -> u64 {
        self.legacy_rows.load(Ordering::Relaxed)
    }

    fn note_legacy_rows(&self, principal: &str, table: &'static str, count: usize) {
        if count == 0 {
            return;
        }
        let total = self
            .legacy_rows
            .fetch_add(count as u64, Ordering::Relaxed)
            + count as u64;
        tracing::warn!(
            target: "metrics",
            legacy_null_owner_rows = count,
            legacy_null_owner_rows_total = total,
            table,
            principal,
            "served rows without an owner"
        );
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            legacy_rows: AtomicU64::new(0),
        })
    }
}
