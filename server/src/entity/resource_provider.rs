//! The resource provider entity and its builders.
//!
//! Builders apply the hooks bound in the [`EntityRuntime`]: generated id and
//! audit timestamps on create, a fresh `updated_at` on update, and the `name`
//! validators before every save.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::runtime::EntityRuntime;
use crate::entity::schema::ValidationError;
use crate::store::{ResourceProviderChanges, StoreError, StoreHandle};
use crate::types::{IdPrefix, PrefixedId, Timestamp};

/// Prefix of resource provider ids.
pub const RESOURCE_PROVIDER_PREFIX: IdPrefix = IdPrefix::new("rsrcpvd");

/// A persisted resource provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceProvider {
    pub id: PrefixedId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The tenant that owns this provider.
    #[serde(rename = "organizationalUnitID")]
    pub organizational_unit_id: PrefixedId,
}

/// Builder for creating a resource provider.
#[derive(Debug, Clone, Default)]
pub struct ResourceProviderCreate {
    name: Option<String>,
    description: Option<String>,
    organizational_unit_id: Option<PrefixedId>,
}

impl ResourceProviderCreate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn organizational_unit_id(mut self, id: PrefixedId) -> Self {
        self.organizational_unit_id = Some(id);
        self
    }

    /// Validate, fill defaults and persist.
    ///
    /// # Errors
    ///
    /// Fails if a required field is unset, a validator rejects a value, or
    /// the store rejects the insert.
    pub fn save(
        self,
        store: &dyn StoreHandle,
        runtime: &EntityRuntime,
    ) -> Result<ResourceProvider, EntityError> {
        let hooks = runtime.resource_provider();

        let name = self.name.ok_or(EntityError::MissingField("name"))?;
        hooks
            .name
            .validate(&name)
            .map_err(|source| EntityError::Validation {
                field: "name",
                source,
            })?;
        let organizational_unit_id = self
            .organizational_unit_id
            .filter(|id| !id.is_empty())
            .ok_or(EntityError::MissingField("organizational_unit_id"))?;

        let provider = ResourceProvider {
            id: (hooks.default_id)(),
            created_at: (hooks.default_created_at)(),
            updated_at: (hooks.default_updated_at)(),
            name,
            description: self.description,
            organizational_unit_id,
        };
        store.insert_resource_provider(&provider)?;

        tracing::debug!("created resource provider {}", provider.id);
        Ok(provider)
    }
}

/// Builder for updating an existing resource provider.
#[derive(Debug, Clone)]
pub struct ResourceProviderUpdate {
    id: PrefixedId,
    name: Option<String>,
    description: Option<Option<String>>,
}

impl ResourceProviderUpdate {
    #[must_use]
    pub const fn new(id: PrefixedId) -> Self {
        Self {
            id,
            name: None,
            description: None,
        }
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(Some(description.into()));
        self
    }

    #[must_use]
    pub fn clear_description(mut self) -> Self {
        self.description = Some(None);
        self
    }

    /// Validate, refresh `updated_at` and write the set fields.
    ///
    /// Only the fields set on this builder are written. The returned provider
    /// is the row as stored after the update.
    ///
    /// # Errors
    ///
    /// Fails if the provider does not exist, a validator rejects a value, or
    /// the store rejects the update.
    pub fn save(
        self,
        store: &dyn StoreHandle,
        runtime: &EntityRuntime,
    ) -> Result<ResourceProvider, EntityError> {
        let hooks = runtime.resource_provider();

        if let Some(name) = &self.name {
            hooks
                .name
                .validate(name)
                .map_err(|source| EntityError::Validation {
                    field: "name",
                    source,
                })?;
        }
        let changes = ResourceProviderChanges {
            updated_at: (hooks.update_default_updated_at)(),
            name: self.name,
            description: self.description,
        };

        let provider = store
            .update_resource_provider(&self.id, &changes)?
            .ok_or(EntityError::NotFound(self.id))?;
        tracing::debug!("updated resource provider {}", provider.id);
        Ok(provider)
    }
}

/// Delete a resource provider by id.
///
/// # Errors
///
/// Returns [`EntityError::NotFound`] if nothing was deleted.
pub fn delete_resource_provider(
    store: &dyn StoreHandle,
    id: &PrefixedId,
) -> Result<(), EntityError> {
    if store.delete_resource_provider(id)? {
        tracing::debug!("deleted resource provider {id}");
        Ok(())
    } else {
        Err(EntityError::NotFound(id.clone()))
    }
}

/// Errors from entity builders.
#[derive(Debug)]
pub enum EntityError {
    /// A required field was never set.
    MissingField(&'static str),
    /// A validator rejected a field value.
    Validation {
        field: &'static str,
        source: ValidationError,
    },
    /// No entity exists with this id.
    NotFound(PrefixedId),
    Store(StoreError),
}

impl fmt::Display for EntityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "missing required field \"{field}\""),
            Self::Validation { field, source } => {
                write!(f, "validator failed for field \"{field}\": {source}")
            }
            Self::NotFound(id) => write!(f, "resource provider not found: {id}"),
            Self::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for EntityError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Validation { source, .. } => Some(source),
            Self::Store(e) => Some(e),
            Self::MissingField(_) | Self::NotFound(_) => None,
        }
    }
}

impl From<StoreError> for EntityError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}
