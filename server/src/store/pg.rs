//! Server store speaking the Postgres wire protocol.
//!
//! Used for both Postgres and CockroachDB. Schema is owned by the external
//! migration tool, so this module never issues DDL.
//!
//! The client drives its own small async runtime internally. Do not call into
//! it from an async task; hop onto a blocking thread first.

use std::sync::Mutex;

use postgres::types::ToSql;
use postgres::{Client, NoTls, Row};

use crate::entity::ResourceProvider;
use crate::store::{Dialect, ResourceProviderChanges, StoreError, StoreHandle};
use crate::types::{PrefixedId, Timestamp};

const RETURNING_COLUMNS: &str =
    "id, created_at, updated_at, name, description, organizational_unit_id";

const SELECT_COLUMNS: &str =
    "SELECT id, created_at, updated_at, name, description, organizational_unit_id FROM resource_providers";

/// Postgres store over a single client connection.
pub struct PostgresStore {
    client: Mutex<Option<Client>>,
}

impl PostgresStore {
    /// Connect to `uri` (`postgres://` or `postgresql://`).
    pub fn connect(uri: &str) -> Result<Self, StoreError> {
        let client = Client::connect(uri, NoTls)?;
        tracing::debug!("connected to postgres store");
        Ok(Self {
            client: Mutex::new(Some(client)),
        })
    }

    #[allow(clippy::significant_drop_tightening)]
    fn with_client<T>(
        &self,
        f: impl FnOnce(&mut Client) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.client.lock().map_err(|_| StoreError::LockPoisoned)?;
        let client = guard.as_mut().ok_or(StoreError::Closed)?;
        f(client)
    }
}

fn into_provider(row: &Row) -> Result<ResourceProvider, StoreError> {
    let id: String = row.try_get("id")?;
    let organizational_unit_id: String = row.try_get("organizational_unit_id")?;
    Ok(ResourceProvider {
        id: PrefixedId::parse(&id)?,
        created_at: Timestamp(row.try_get("created_at")?),
        updated_at: Timestamp(row.try_get("updated_at")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        organizational_unit_id: PrefixedId::parse(&organizational_unit_id)?,
    })
}

impl StoreHandle for PostgresStore {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn insert_resource_provider(&self, provider: &ResourceProvider) -> Result<(), StoreError> {
        self.with_client(|client| {
            client.execute(
                "INSERT INTO resource_providers \
                 (id, created_at, updated_at, name, description, organizational_unit_id) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
                &[
                    &provider.id.as_str(),
                    &provider.created_at.as_millis(),
                    &provider.updated_at.as_millis(),
                    &provider.name,
                    &provider.description,
                    &provider.organizational_unit_id.as_str(),
                ],
            )?;
            Ok(())
        })
    }

    fn resource_provider(&self, id: &PrefixedId) -> Result<Option<ResourceProvider>, StoreError> {
        self.with_client(|client| {
            client
                .query_opt(&format!("{SELECT_COLUMNS} WHERE id = $1"), &[&id.as_str()])?
                .as_ref()
                .map(into_provider)
                .transpose()
        })
    }

    fn resource_providers_for_tenant(
        &self,
        organizational_unit_id: &PrefixedId,
    ) -> Result<Vec<ResourceProvider>, StoreError> {
        self.with_client(|client| {
            client
                .query(
                    &format!(
                        "{SELECT_COLUMNS} WHERE organizational_unit_id = $1 ORDER BY created_at, id"
                    ),
                    &[&organizational_unit_id.as_str()],
                )?
                .iter()
                .map(into_provider)
                .collect()
        })
    }

    fn update_resource_provider(
        &self,
        id: &PrefixedId,
        changes: &ResourceProviderChanges,
    ) -> Result<Option<ResourceProvider>, StoreError> {
        let id = id.as_str();
        let updated_at = changes.updated_at.as_millis();
        let mut values: Vec<&(dyn ToSql + Sync)> = vec![&id, &updated_at];
        let mut sets = vec!["updated_at = $2".to_string()];
        if let Some(name) = &changes.name {
            values.push(name);
            sets.push(format!("name = ${}", values.len()));
        }
        if let Some(description) = &changes.description {
            values.push(description);
            sets.push(format!("description = ${}", values.len()));
        }

        let sql = format!(
            "UPDATE resource_providers SET {} WHERE id = $1 RETURNING {RETURNING_COLUMNS}",
            sets.join(", ")
        );
        self.with_client(|client| {
            client
                .query_opt(&sql, &values)?
                .as_ref()
                .map(into_provider)
                .transpose()
        })
    }

    fn delete_resource_provider(&self, id: &PrefixedId) -> Result<bool, StoreError> {
        self.with_client(|client| {
            let changed = client.execute(
                "DELETE FROM resource_providers WHERE id = $1",
                &[&id.as_str()],
            )?;
            Ok(changed > 0)
        })
    }

    #[allow(clippy::significant_drop_tightening)]
    fn close(&self) -> Result<(), StoreError> {
        let mut guard = self.client.lock().map_err(|_| StoreError::LockPoisoned)?;
        let client = guard.take().ok_or(StoreError::Closed)?;
        client.close()?;
        tracing::debug!("closed postgres store");
        Ok(())
    }
}
