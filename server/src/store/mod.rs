//! The store handle: one open connection shared by every operation of a run.
//!
//! # Thread Safety
//!
//! Implementations are `Send + Sync` and take `&self` everywhere, so a single
//! handle can sit behind an `Arc` and serve concurrent callers. Consistency
//! under concurrent writes comes from the database itself; the handle only
//! guards the connection object.
//!
//! # Invariants
//!
//! - `close` succeeds at most once. Every call after the first, and every
//!   query after a close, returns [`StoreError::Closed`].

mod dialect;
mod pg;
mod sqlite;

pub use dialect::Dialect;
pub use pg::PostgresStore;
pub use sqlite::{IN_MEMORY_LOCATOR, SqliteStore};

use crate::entity::ResourceProvider;
use crate::types::{IdError, PrefixedId, Timestamp};

/// The columns one update writes. Fields left `None` are not touched, so a
/// concurrent writer's change to them survives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceProviderChanges {
    pub updated_at: Timestamp,
    pub name: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
}

/// An open connection to a provisioned store.
pub trait StoreHandle: Send + Sync {
    fn dialect(&self) -> Dialect;

    fn insert_resource_provider(&self, provider: &ResourceProvider) -> Result<(), StoreError>;

    fn resource_provider(&self, id: &PrefixedId) -> Result<Option<ResourceProvider>, StoreError>;

    /// Providers owned by a tenant, oldest first.
    fn resource_providers_for_tenant(
        &self,
        organizational_unit_id: &PrefixedId,
    ) -> Result<Vec<ResourceProvider>, StoreError>;

    /// Write only the changed columns and return the row as stored, or
    /// `None` if no row had that id.
    fn update_resource_provider(
        &self,
        id: &PrefixedId,
        changes: &ResourceProviderChanges,
    ) -> Result<Option<ResourceProvider>, StoreError>;

    /// Returns `false` if no row had that id.
    fn delete_resource_provider(&self, id: &PrefixedId) -> Result<bool, StoreError>;

    /// Close the underlying connection.
    fn close(&self) -> Result<(), StoreError>;
}

/// Errors from a store handle.
#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    Postgres(postgres::Error),
    /// The handle was already closed.
    Closed,
    /// A thread panicked while holding the connection.
    LockPoisoned,
    /// A stored value could not be decoded.
    Corrupt(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(e) => write!(f, "sqlite error: {e}"),
            Self::Postgres(e) => write!(f, "postgres error: {e}"),
            Self::Closed => write!(f, "store is closed"),
            Self::LockPoisoned => write!(f, "store lock poisoned"),
            Self::Corrupt(msg) => write!(f, "corrupt row: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Sqlite(e) => Some(e),
            Self::Postgres(e) => Some(e),
            Self::Closed | Self::LockPoisoned | Self::Corrupt(_) => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Sqlite(e)
    }
}

impl From<postgres::Error> for StoreError {
    fn from(e: postgres::Error) -> Self {
        Self::Postgres(e)
    }
}

impl From<IdError> for StoreError {
    fn from(e: IdError) -> Self {
        Self::Corrupt(e.to_string())
    }
}
