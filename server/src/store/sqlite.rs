//! Embedded `SQLite` store.

use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags, OptionalExtension, ToSql, params};

use crate::entity::ResourceProvider;
use crate::store::{Dialect, ResourceProviderChanges, StoreError, StoreHandle};
use crate::types::{PrefixedId, Timestamp};

/// Locator used when no descriptor is given: a named in-memory database in
/// shared-cache mode with foreign key enforcement.
pub const IN_MEMORY_LOCATOR: &str = "file:registry?mode=memory&cache=shared&_fk=1";

/// How long a statement waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Schema for embedded stores. Every statement is create-if-absent.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS resource_providers (
    id TEXT NOT NULL PRIMARY KEY,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    name TEXT NOT NULL,
    description TEXT NULL,
    organizational_unit_id TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS resourceprovider_organizational_unit_id
    ON resource_providers (organizational_unit_id);
CREATE INDEX IF NOT EXISTS resourceprovider_created_at
    ON resource_providers (created_at);
";

const RETURNING_COLUMNS: &str =
    "id, created_at, updated_at, name, description, organizational_unit_id";

const SELECT_COLUMNS: &str =
    "SELECT id, created_at, updated_at, name, description, organizational_unit_id FROM resource_providers";

type RawRow = (String, i64, i64, String, Option<String>, String);

/// `SQLite` store over a single connection.
pub struct SqliteStore {
    conn: Mutex<Option<Connection>>,
    locator: String,
}

impl SqliteStore {
    /// Open a connection. `locator` is a file path or a `file:` URI.
    ///
    /// A `_fk=1` (or `_foreign_keys=1`) query parameter turns on foreign key
    /// enforcement for the connection.
    pub fn open(locator: &str) -> Result<Self, StoreError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(locator, flags)?;
        if foreign_keys_requested(locator) {
            conn.pragma_update(None, "foreign_keys", true)?;
        }
        conn.busy_timeout(BUSY_TIMEOUT)?;

        tracing::debug!(locator, "opened sqlite store");
        Ok(Self {
            conn: Mutex::new(Some(conn)),
            locator: locator.to_string(),
        })
    }

    /// Create the schema if it does not exist yet.
    pub fn create_schema(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| conn.execute_batch(SCHEMA))
    }

    #[allow(clippy::significant_drop_tightening)]
    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StoreError> {
        let guard = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        let conn = guard.as_ref().ok_or(StoreError::Closed)?;
        Ok(f(conn)?)
    }
}

fn foreign_keys_requested(locator: &str) -> bool {
    let Some((_, query)) = locator.split_once('?') else {
        return false;
    };
    query.split('&').any(|pair| {
        matches!(
            pair.split_once('='),
            Some(("_fk" | "_foreign_keys", "1" | "true" | "on" | "yes"))
        )
    })
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn into_provider(raw: RawRow) -> Result<ResourceProvider, StoreError> {
    let (id, created_at, updated_at, name, description, organizational_unit_id) = raw;
    Ok(ResourceProvider {
        id: PrefixedId::parse(&id)?,
        created_at: Timestamp(created_at),
        updated_at: Timestamp(updated_at),
        name,
        description,
        organizational_unit_id: PrefixedId::parse(&organizational_unit_id)?,
    })
}

impl StoreHandle for SqliteStore {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn insert_resource_provider(&self, provider: &ResourceProvider) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO resource_providers \
                 (id, created_at, updated_at, name, description, organizational_unit_id) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    provider.id.as_str(),
                    provider.created_at.as_millis(),
                    provider.updated_at.as_millis(),
                    provider.name,
                    provider.description,
                    provider.organizational_unit_id.as_str(),
                ],
            )
        })?;
        Ok(())
    }

    fn resource_provider(&self, id: &PrefixedId) -> Result<Option<ResourceProvider>, StoreError> {
        let raw = self.with_conn(|conn| {
            conn.query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id.as_str()],
                read_row,
            )
            .optional()
        })?;
        raw.map(into_provider).transpose()
    }

    fn resource_providers_for_tenant(
        &self,
        organizational_unit_id: &PrefixedId,
    ) -> Result<Vec<ResourceProvider>, StoreError> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{SELECT_COLUMNS} WHERE organizational_unit_id = ?1 ORDER BY created_at, id"
            ))?;
            stmt.query_map(params![organizational_unit_id.as_str()], read_row)?
                .collect::<rusqlite::Result<Vec<_>>>()
        })?;
        rows.into_iter().map(into_provider).collect()
    }

    fn update_resource_provider(
        &self,
        id: &PrefixedId,
        changes: &ResourceProviderChanges,
    ) -> Result<Option<ResourceProvider>, StoreError> {
        let id = id.as_str();
        let updated_at = changes.updated_at.as_millis();
        let mut values: Vec<&dyn ToSql> = vec![&id, &updated_at];
        let mut sets = vec!["updated_at = ?2".to_string()];
        if let Some(name) = &changes.name {
            values.push(name);
            sets.push(format!("name = ?{}", values.len()));
        }
        if let Some(description) = &changes.description {
            values.push(description);
            sets.push(format!("description = ?{}", values.len()));
        }

        let sql = format!(
            "UPDATE resource_providers SET {} WHERE id = ?1 RETURNING {RETURNING_COLUMNS}",
            sets.join(", ")
        );
        let raw = self.with_conn(|conn| {
            conn.query_row(&sql, values.as_slice(), read_row).optional()
        })?;
        raw.map(into_provider).transpose()
    }

    fn delete_resource_provider(&self, id: &PrefixedId) -> Result<bool, StoreError> {
        let changed = self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM resource_providers WHERE id = ?1",
                params![id.as_str()],
            )
        })?;
        Ok(changed > 0)
    }

    #[allow(clippy::significant_drop_tightening)]
    fn close(&self) -> Result<(), StoreError> {
        let mut guard = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        let conn = guard.take().ok_or(StoreError::Closed)?;
        conn.close().map_err(|(_, e)| StoreError::Sqlite(e))?;
        tracing::debug!(locator = %self.locator, "closed sqlite store");
        Ok(())
    }
}
