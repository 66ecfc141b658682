//! One-way synchronization with the YNAB budgeting service.
//!
//! - the remote mirror pulls each principal's category hierarchy (and
//!   account transactions) into the local `mirror_*` tables;
//! - the dispatcher pushes split transactions upstream;
//! - [`SyncScheduler`] runs the mirror periodically for every principal
//!   whose credentials are complete.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use engine::{CredentialVault, Engine};
use scheduler::InFlight;

pub use client::{DEFAULT_BASE_URL, YnabClient};
pub use dispatch::{DispatchOutcome, Split, SplitTransaction};
pub use error::SyncError;
pub use mirror::SyncReport;
pub use scheduler::{SyncOutcome, SyncScheduler, SyncSlot};

mod client;
mod dispatch;
mod error;
mod mirror;
mod scheduler;

/// Bundles what every sync operation needs: storage, the key used to open
/// stored credentials, and the HTTP client.
#[derive(Debug, Clone)]
pub struct Synchronizer {
    engine: Arc<Engine>,
    vault: Arc<CredentialVault>,
    client: YnabClient,
    in_flight: InFlight,
}

impl Synchronizer {
    pub fn new(engine: Arc<Engine>, vault: Arc<CredentialVault>, client: YnabClient) -> Self {
        Self {
            engine,
            vault,
            client,
            in_flight: InFlight::default(),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn client(&self) -> &YnabClient {
        &self.client
    }

    /// Claims the principal's sync slot, or `None` while a sync runs.
    pub fn claim(&self, principal_id: &str) -> Option<SyncSlot> {
        SyncSlot::acquire(&self.in_flight, principal_id)
    }

    pub fn is_syncing(&self, principal_id: &str) -> bool {
        SyncSlot::is_held(&self.in_flight, principal_id)
    }

    /// On-demand sync that shares the scheduler's per-principal slot.
    ///
    /// Fails with [`SyncError::InProgress`] instead of overlapping a
    /// running sync.
    pub async fn sync_now(
        &self,
        principal_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SyncReport, SyncError> {
        let Some(_slot) = self.claim(principal_id) else {
            return Err(SyncError::InProgress(principal_id.to_string()));
        };
        self.sync_principal(principal_id, now).await
    }
}
