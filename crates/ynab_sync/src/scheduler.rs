//! Periodic sync for every principal with complete credentials.
//!
//! One long-lived task owns the ticker and a `JoinSet` of per-principal
//! children. A principal is never synced twice concurrently: each child holds
//! a [`SyncSlot`] from the synchronizer's in-flight set, released on drop, so
//! a panicking or timed-out child frees its slot too. On-demand syncs claim
//! the same slot.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use chrono::{DateTime, Utc};
use engine::SyncCandidate;
use tokio::task::JoinSet;

use crate::{SyncError, SyncReport, Synchronizer};

const TICK_EVERY: Duration = Duration::from_secs(60);
const TASK_DEADLINE: Duration = Duration::from_secs(5 * 60);

/// Result of one child task, tagged with its principal.
pub type SyncOutcome = (String, Result<SyncReport, SyncError>);

pub(crate) type InFlight = Arc<Mutex<HashSet<String>>>;

pub struct SyncScheduler {
    sync: Arc<Synchronizer>,
    tick_every: Duration,
    task_deadline: Duration,
}

/// Exclusive claim on one principal's sync; released on drop.
#[derive(Debug)]
pub struct SyncSlot {
    set: InFlight,
    principal_id: String,
}

impl SyncSlot {
    /// Claims the slot for `principal_id`, or `None` if already running.
    pub(crate) fn acquire(set: &InFlight, principal_id: &str) -> Option<Self> {
        let mut running = set.lock().unwrap_or_else(PoisonError::into_inner);
        if !running.insert(principal_id.to_string()) {
            return None;
        }
        Some(Self {
            set: Arc::clone(set),
            principal_id: principal_id.to_string(),
        })
    }

    pub(crate) fn is_held(set: &InFlight, principal_id: &str) -> bool {
        set.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(principal_id)
    }
}

impl Drop for SyncSlot {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.principal_id);
    }
}

impl SyncScheduler {
    pub fn new(sync: Arc<Synchronizer>) -> Self {
        Self {
            sync,
            tick_every: TICK_EVERY,
            task_deadline: TASK_DEADLINE,
        }
    }

    /// Overrides the per-task deadline.
    pub fn task_deadline(mut self, deadline: Duration) -> Self {
        self.task_deadline = deadline;
        self
    }

    /// A candidate is due when it never synced or its period has elapsed.
    pub fn is_due(candidate: &SyncCandidate, now: DateTime<Utc>) -> bool {
        match candidate.last_synced {
            None => true,
            Some(last) => {
                now >= last + chrono::Duration::minutes(i64::from(candidate.sync_period_minutes))
            }
        }
    }

    pub fn is_in_flight(&self, principal_id: &str) -> bool {
        self.sync.is_syncing(principal_id)
    }

    /// Spawns a sync child into `children` for every due principal not
    /// already in flight. Returns how many were started.
    pub async fn tick_at(
        &self,
        now: DateTime<Utc>,
        children: &mut JoinSet<SyncOutcome>,
    ) -> Result<usize, SyncError> {
        let candidates = self.sync.engine().sync_candidates().await?;
        let mut started = 0;
        for candidate in candidates {
            if !Self::is_due(&candidate, now) {
                continue;
            }
            let Some(slot) = self.sync.claim(&candidate.principal_id) else {
                tracing::debug!(principal = %candidate.principal_id, "sync already running");
                continue;
            };

            let sync = Arc::clone(&self.sync);
            let deadline = self.task_deadline;
            let principal_id = candidate.principal_id;
            children.spawn(async move {
                let _slot = slot;
                let result =
                    match tokio::time::timeout(deadline, sync.sync_principal(&principal_id, now))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(SyncError::Timeout),
                    };
                (principal_id, result)
            });
            started += 1;
        }
        Ok(started)
    }

    /// Runs until the task is aborted.
    ///
    /// Does nothing when no principal has complete credentials at start.
    pub async fn run(self) {
        match self.sync.engine().sync_candidates().await {
            Ok(candidates) if candidates.is_empty() => {
                tracing::info!("no principal has complete credentials, scheduler idle");
                return;
            }
            Ok(candidates) => {
                tracing::info!("sync scheduler started for {} principals", candidates.len());
            }
            Err(err) => {
                tracing::error!("failed to list sync candidates: {err}");
                return;
            }
        }

        let mut ticker = tokio::time::interval(self.tick_every);
        let mut children = JoinSet::new();
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.tick_at(Utc::now(), &mut children).await {
                        tracing::error!("sync tick failed: {err}");
                    }
                }
                Some(joined) = children.join_next() => log_outcome(joined),
            }
        }
    }
}

fn log_outcome(joined: Result<SyncOutcome, tokio::task::JoinError>) {
    match joined {
        Ok((principal_id, Ok(_))) => {
            tracing::debug!(principal = %principal_id, "sync task finished");
        }
        Ok((principal_id, Err(err))) => {
            tracing::error!(principal = %principal_id, "sync failed: {err}");
        }
        Err(err) => tracing::error!("sync task panicked: {err}"),
    }
}
