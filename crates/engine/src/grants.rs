//! Permission grants: `owner` lets `grantee` perform `action` on
//! `resource_kind` rows it owns, optionally until `expires_at`.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Transactions,
    Categories,
    Reports,
    All,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transactions => "transactions",
            Self::Categories => "categories",
            Self::Reports => "reports",
            Self::All => "all",
        }
    }

    /// Storage values of the grants that cover this kind.
    pub(crate) fn covered_by(self) -> Vec<&'static str> {
        match self {
            Self::All => vec![Self::All.as_str()],
            kind => vec![kind.as_str(), Self::All.as_str()],
        }
    }

    /// Whether a grant on `self` covers a request on `requested`.
    pub fn covers(self, requested: ResourceKind) -> bool {
        self == Self::All || self == requested
    }
}

impl TryFrom<&str> for ResourceKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "transactions" => Ok(Self::Transactions),
            "categories" => Ok(Self::Categories),
            "reports" => Ok(Self::Reports),
            "all" => Ok(Self::All),
            other => Err(EngineError::InvalidInput(format!(
                "invalid resource kind: {other}"
            ))),
        }
    }
}

/// Ordered: a `Write` grant also allows `Read`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Read,
    Write,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }

    /// Storage values of the grant actions that satisfy this action.
    pub(crate) fn covered_by(self) -> Vec<&'static str> {
        match self {
            Self::Read => vec![Self::Read.as_str(), Self::Write.as_str()],
            Self::Write => vec![Self::Write.as_str()],
        }
    }
}

impl TryFrom<&str> for Action {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            other => Err(EngineError::InvalidInput(format!("invalid action: {other}"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub id: Uuid,
    pub owner_id: String,
    pub grantee_id: String,
    pub resource_kind: ResourceKind,
    pub action: Action,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Grant {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Which side of a grant the listing principal is on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantDirection {
    /// The principal is the grantee.
    Held,
    /// The principal is the owner.
    Issued,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrantView {
    pub grant: Grant,
    pub direction: GrantDirection,
    pub active: bool,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "grants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub owner_id: String,
    pub grantee_id: String,
    pub resource_kind: String,
    pub action: String,
    pub created_at: DateTimeUtc,
    pub expires_at: Option<DateTimeUtc>,
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
    Owner,
    #[sea_orm(
        belongs_to = "super::principals::Entity",
        from = "Column::GranteeId",
        to = "super::principals::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Grantee,
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Grant {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            resource_kind: ResourceKind::try_from(model.resource_kind.as_str())?,
            action: Action::try_from(model.action.as_str())?,
            owner_id: model.owner_id,
            grantee_id: model.grantee_id,
            created_at: model.created_at,
            expires_at: model.expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_covers_every_concrete_kind() {
        for kind in [
            ResourceKind::Transactions,
            ResourceKind::Categories,
            ResourceKind::Reports,
        ] {
            assert!(ResourceKind::All.covers(kind));
            assert!(kind.covers(kind));
            assert!(kind.covered_by().contains(&"all"));
        }
        assert!(!ResourceKind::Transactions.covers(ResourceKind::Reports));
    }

    #[test]
    fn write_covers_read() {
        assert!(Action::Read.covered_by().contains(&"write"));
        assert!(!Action::Write.covered_by().contains(&"read"));
    }

    #[test]
    fn expiry_boundary() {
        let now = Utc::now();
        let mut grant = Grant {
            id: Uuid::new_v4(),
            owner_id: "o".to_string(),
            grantee_id: "g".to_string(),
            resource_kind: ResourceKind::All,
            action: Action::Read,
            created_at: now,
            expires_at: None,
        };
        assert!(grant.is_active_at(now));
        grant.expires_at = Some(now - chrono::Duration::milliseconds(1));
        assert!(!grant.is_active_at(now));
        grant.expires_at = Some(now);
        assert!(!grant.is_active_at(now));
    }
}
