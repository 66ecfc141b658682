//! Owner-scoped JSON documents (saved filters, custom reports).
//!
//! They follow the same access plan as ledger entries. The `shared` flag
//! narrows visibility further: a non-shared blob is only readable by its
//! owner and by admins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OwnedBlob {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    pub payload: serde_json::Value,
    pub shared: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewBlob {
    /// Owner to write on behalf of. Defaults to the caller.
    pub owner_id: Option<String>,
    pub name: String,
    pub payload: serde_json::Value,
    pub shared: bool,
}
