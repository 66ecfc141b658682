//! Per-principal credentials for the external budgeting service.
//!
//! All three secrets are stored as vault ciphertext (base64 text). A record
//! is usable only when none of them is empty.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SYNC_PERIOD_MINUTES: i32 = 60;

/// Plaintext credentials, only ever held in memory.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub budget_id: String,
    pub account_id: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("budget_id", &self.budget_id)
            .field("account_id", &self.account_id)
            .finish()
    }
}

/// Input for storing credentials. Empty strings clear a field.
#[derive(Clone, Debug, Default)]
pub struct CredentialInput {
    pub token: Option<String>,
    pub budget_id: Option<String>,
    pub account_id: Option<String>,
    pub sync_period_minutes: Option<i32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialStatus {
    pub has_credentials: bool,
    pub last_synced: Option<DateTime<Utc>>,
    pub sync_period_minutes: i32,
}

/// A principal the scheduler may have to sync.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncCandidate {
    pub principal_id: String,
    pub last_synced: Option<DateTime<Utc>>,
    pub sync_period_minutes: i32,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "credential_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub owner_id: String,
    pub token_ciphertext: String,
    pub budget_ciphertext: String,
    pub account_ciphertext: String,
    pub last_synced: Option<DateTimeUtc>,
    pub sync_period_minutes: i32,
}

impl Model {
    pub fn has_credentials(&self) -> bool {
        !self.token_ciphertext.is_empty()
            && !self.budget_ciphertext.is_empty()
            && !self.account_ciphertext.is_empty()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::principals::Entity",
        from = "Column::OwnerId",
        to = "super::principals::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Principal,
}

impl Related<super::principals::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Principal.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Model> for CredentialStatus {
    fn from(model: &Model) -> Self {
        Self {
            has_credentials: model.has_credentials(),
            last_synced: model.last_synced,
            sync_period_minutes: model.sync_period_minutes,
        }
    }
}
