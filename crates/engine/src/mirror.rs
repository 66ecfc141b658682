//! Domain views over the mirror tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorCategory {
    pub external_id: String,
    pub group_id: String,
    pub name: String,
    pub last_updated: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorGroup {
    pub external_id: String,
    pub owner_id: String,
    pub name: String,
    pub last_updated: DateTime<Utc>,
    pub categories: Vec<MirrorCategory>,
}

/// One upstream account transaction as stored locally.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirroredTransaction {
    pub external_id: String,
    pub account_id: String,
    /// ISO date (`YYYY-MM-DD`) exactly as the service reports it.
    pub date: String,
    pub amount_milliunits: i64,
    pub payee_name: Option<String>,
    pub memo: Option<String>,
    pub category_id: Option<String>,
}
