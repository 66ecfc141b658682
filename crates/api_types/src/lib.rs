//! JSON bodies exchanged with the Tandem HTTP API.
//!
//! Money is always an integer number of cents (`*_minor`), except on the
//! remote wire form which uses milliunits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error body returned by every failing endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    /// Machine-readable kind, e.g. `not_found` or `upstream_error`.
    pub kind: String,
}

pub mod entry {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct CategorySplit {
        pub category_id: Uuid,
        pub amount_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct EntryNew {
        /// Write on behalf of another principal (requires a write grant).
        #[serde(default)]
        pub owner_id: Option<String>,
        pub amount_minor: i64,
        pub ledger_date: DateTime<Utc>,
        #[serde(default)]
        pub effective_date: Option<DateTime<Utc>>,
        pub kind: String,
        #[serde(default)]
        pub counterparty: Option<String>,
        #[serde(default)]
        pub description: Option<String>,
        #[serde(default)]
        pub paid: bool,
        #[serde(default)]
        pub paid_date: Option<DateTime<Utc>>,
        #[serde(default)]
        pub optional: bool,
        #[serde(default)]
        pub categories: Vec<CategorySplit>,
    }

    /// Partial update. Absent fields are untouched; `null` clears nullable
    /// ones.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct EntryPatch {
        #[serde(default)]
        pub amount_minor: Option<i64>,
        #[serde(default)]
        pub ledger_date: Option<DateTime<Utc>>,
        #[serde(default)]
        pub effective_date: Option<DateTime<Utc>>,
        #[serde(default)]
        pub kind: Option<String>,
        #[serde(default, with = "double_option")]
        pub counterparty: Option<Option<String>>,
        #[serde(default, with = "double_option")]
        pub description: Option<Option<String>>,
        #[serde(default)]
        pub paid: Option<bool>,
        #[serde(default, with = "double_option")]
        pub paid_date: Option<Option<DateTime<Utc>>>,
        #[serde(default)]
        pub optional: Option<bool>,
        #[serde(default)]
        pub categories: Option<Vec<CategorySplit>>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct EntryQuery {
        pub from: Option<DateTime<Utc>>,
        pub to: Option<DateTime<Utc>>,
        pub kind: Option<String>,
        pub paid: Option<bool>,
        pub optional: Option<bool>,
        pub owner_id: Option<String>,
        pub limit: Option<u64>,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct EntryView {
        pub id: Uuid,
        pub owner_id: Option<String>,
        pub amount_minor: i64,
        /// `amount_minor` rendered with two decimals.
        pub amount: String,
        pub ledger_date: DateTime<Utc>,
        pub effective_date: DateTime<Utc>,
        pub kind: String,
        pub counterparty: Option<String>,
        pub description: Option<String>,
        pub paid: bool,
        pub paid_date: Option<DateTime<Utc>>,
        pub entered_by: String,
        pub optional: bool,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
        pub categories: Vec<CategorySplit>,
    }
}

pub mod category {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoryNew {
        #[serde(default)]
        pub owner_id: Option<String>,
        pub name: String,
        #[serde(default)]
        pub description: Option<String>,
        #[serde(default)]
        pub color: Option<String>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct CategoryPatch {
        #[serde(default)]
        pub name: Option<String>,
        #[serde(default, with = "double_option")]
        pub description: Option<Option<String>>,
        #[serde(default, with = "double_option")]
        pub color: Option<Option<String>>,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct CategoryView {
        pub id: Uuid,
        pub owner_id: String,
        pub name: String,
        pub description: Option<String>,
        pub color: Option<String>,
    }
}

/// Saved filters and custom reports share these bodies.
pub mod blob {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BlobNew {
        #[serde(default)]
        pub owner_id: Option<String>,
        pub name: String,
        pub payload: serde_json::Value,
        #[serde(default)]
        pub shared: bool,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct BlobView {
        pub id: Uuid,
        pub owner_id: String,
        pub name: String,
        pub payload: serde_json::Value,
        pub shared: bool,
        pub created_at: DateTime<Utc>,
    }
}

pub mod permission {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum ResourceKind {
        Transactions,
        Categories,
        Reports,
        All,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum Action {
        Read,
        Write,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum Direction {
        Held,
        Issued,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GrantNew {
        /// Defaults to the caller. Admins may grant on anyone's behalf.
        #[serde(default)]
        pub owner_id: Option<String>,
        pub grantee_id: String,
        pub resource_kind: ResourceKind,
        pub action: Action,
        #[serde(default)]
        pub expires_at: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GrantCreated {
        pub id: Uuid,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GrantRevoke {
        #[serde(default)]
        pub owner_id: Option<String>,
        pub grantee_id: String,
        pub resource_kind: ResourceKind,
        pub action: Action,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct GrantView {
        pub id: Uuid,
        pub owner_id: String,
        pub grantee_id: String,
        pub resource_kind: ResourceKind,
        pub action: Action,
        pub created_at: DateTime<Utc>,
        pub expires_at: Option<DateTime<Utc>>,
        pub direction: Direction,
        pub active: bool,
    }
}

pub mod principal {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum Role {
        User,
        Admin,
        SuperAdmin,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum Status {
        Pending,
        Approved,
        Rejected,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct PrincipalView {
        pub id: String,
        pub display_name: Option<String>,
        pub email: Option<String>,
        pub role: Role,
        pub status: Status,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RoleSet {
        pub role: Role,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct StatusSet {
        pub status: Status,
    }
}

pub mod report {
    use super::*;

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum GroupBy {
        #[default]
        Kind,
        Month,
        Category,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct SummaryQuery {
        pub from: Option<DateTime<Utc>>,
        pub to: Option<DateTime<Utc>>,
        pub paid: Option<bool>,
        pub optional: Option<bool>,
        pub owner_id: Option<String>,
        #[serde(default)]
        pub group_by: GroupBy,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct SummaryRow {
        pub key: String,
        pub total_minor: i64,
        pub total: String,
        pub count: u64,
    }
}

pub mod credentials {
    use super::*;

    /// Omitted fields keep their stored value; empty strings clear them.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct CredentialsPut {
        #[serde(default)]
        pub token: Option<String>,
        #[serde(default)]
        pub budget_id: Option<String>,
        #[serde(default)]
        pub account_id: Option<String>,
        #[serde(default)]
        pub sync_period_minutes: Option<i32>,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct CredentialsStatus {
        pub has_credentials: bool,
        pub last_synced: Option<DateTime<Utc>>,
        pub sync_period_minutes: i32,
    }
}

pub mod sync {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct SyncReport {
        pub groups: usize,
        pub categories: usize,
        pub transactions: usize,
        pub synced_at: DateTime<Utc>,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct SyncStatus {
        pub has_credentials: bool,
        pub last_synced: Option<DateTime<Utc>>,
        pub sync_period_minutes: i32,
        /// `None` when credentials are incomplete.
        pub next_due: Option<DateTime<Utc>>,
    }
}

pub mod remote {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct RemoteCategory {
        pub id: String,
        pub name: String,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct RemoteGroup {
        pub id: String,
        pub owner_id: String,
        pub name: String,
        pub last_updated: DateTime<Utc>,
        pub categories: Vec<RemoteCategory>,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct RemoteTransaction {
        pub id: String,
        pub account_id: String,
        pub date: String,
        pub amount_milliunits: i64,
        pub payee_name: Option<String>,
        pub memo: Option<String>,
        pub category_id: Option<String>,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct SplitLine {
        pub category_name: String,
        pub amount_minor: i64,
        #[serde(default)]
        pub memo: Option<String>,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct SplitTransactionNew {
        /// `YYYY-MM-DD`.
        pub date: String,
        #[serde(default)]
        pub payee_name: Option<String>,
        #[serde(default)]
        pub memo: Option<String>,
        pub splits: Vec<SplitLine>,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct DispatchResult {
        pub status: u16,
        pub amount_milliunits: i64,
    }
}

/// Serde helper telling "absent" (`None`) from "null" (`Some(None)`).
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_distinguishes_null_from_absent() {
        let patch: entry::EntryPatch =
            serde_json::from_str(r#"{"description": null, "paid": true}"#).unwrap();
        assert_eq!(patch.description, Some(None));
        assert_eq!(patch.counterparty, None);
        assert_eq!(patch.paid, Some(true));
    }

    #[test]
    fn grant_body_uses_snake_case() {
        let grant: permission::GrantNew = serde_json::from_str(
            r#"{"grantee_id": "p2", "resource_kind": "transactions", "action": "read"}"#,
        )
        .unwrap();
        assert_eq!(grant.resource_kind, permission::ResourceKind::Transactions);
        assert_eq!(grant.action, permission::Action::Read);
        assert!(grant.owner_id.is_none());
    }
}
