//! Storage and authorization core for the household ledger.
//!
//! [`Engine`] owns the database connection and exposes every operation the
//! HTTP layer and the synchronizer need. Each operation takes the calling
//! principal's id and derives an [`AccessPlan`] inside its own database
//! transaction before touching owner-scoped rows.

pub use blobs::{NewBlob, OwnedBlob};
pub use categories::{Category, CategoryUpdate, NewCategory};
pub use credentials::{
    CredentialInput, CredentialStatus, Credentials, DEFAULT_SYNC_PERIOD_MINUTES, SyncCandidate,
};
pub use entries::{CategorySplit, EntryFilter, EntryUpdate, LedgerEntry, NewEntry};
pub use error::EngineError;
pub use grants::{Action, Grant, GrantDirection, GrantView, ResourceKind};
pub use mirror::{MirrorCategory, MirrorGroup, MirroredTransaction};
pub use money::Money;
pub use ops::{
    AccessPlan, Engine, EngineBuilder, GrantRequest, KindTotal, OwnerScope, ReportFilter,
    ReportGroupBy, RevokeRequest,
};
pub use principals::{NewPrincipal, Principal, PrincipalStatus, Role};
pub use vault::CredentialVault;

mod blobs;
mod categories;
mod credentials;
mod custom_reports;
mod entries;
mod entry_categories;
mod error;
mod grants;
mod mirror;
mod mirror_categories;
mod mirror_groups;
mod mirror_transactions;
mod money;
mod ops;
mod principals;
mod saved_filters;
mod util;
mod vault;

type ResultEngine<T> = Result<T, EngineError>;
