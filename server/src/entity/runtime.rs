//! Runtime registry of entity field behaviour.
//!
//! At startup every entity schema is read once and each field that declares a
//! default, an update default, or validators is bound into a slot keyed by
//! `(entity, field)`. Entity builders consult the slots instead of deriving
//! defaults themselves.
//!
//! # Invariants
//!
//! - A slot is bound at most once. Binding a key that is already bound is a
//!   no-op, so registering schemas twice or in any order is harmless.
//! - The registry is immutable after [`EntityRuntimeBuilder::build`]; it is
//!   shared by reference (usually behind an `Arc`) rather than as a global.
//! - Every slot the builders depend on is resolved to its concrete function
//!   type during `build`, so a schema/runtime mismatch fails at startup.

use std::collections::HashMap;
use std::fmt;

use crate::entity::schema::{
    EntityKind, EntitySchema, FieldDescriptor, ResourceProviderSchema, TextValidator,
    ValidationError, ValueFn, ValueShape,
};
use crate::types::{PrefixedId, Timestamp};

/// Address of a field slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldKey {
    pub entity: EntityKind,
    pub field: &'static str,
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.entity, self.field)
    }
}

/// Behaviour bound to one field.
#[derive(Debug, Clone, Default)]
pub struct FieldHooks {
    pub default: Option<ValueFn>,
    pub update_default: Option<ValueFn>,
    pub validators: Vec<TextValidator>,
}

impl FieldHooks {
    /// Run every validator against `value`, stopping at the first failure.
    pub fn validate(&self, value: &str) -> Result<(), ValidationError> {
        self.validators.iter().try_for_each(|validator| validator(value))
    }
}

/// Resolved hooks for the resource provider builders.
#[derive(Debug, Clone)]
pub struct ResourceProviderHooks {
    pub default_id: fn() -> PrefixedId,
    pub default_created_at: fn() -> Timestamp,
    pub default_updated_at: fn() -> Timestamp,
    pub update_default_updated_at: fn() -> Timestamp,
    pub name: FieldHooks,
}

/// Collects schema bindings before the registry is frozen.
#[derive(Debug, Default)]
pub struct EntityRuntimeBuilder {
    slots: HashMap<FieldKey, FieldHooks>,
}

impl EntityRuntimeBuilder {
    /// Bind every field of `S` that declares runtime behaviour.
    #[must_use]
    pub fn register<S: EntitySchema>(mut self) -> Self {
        for field in S::fields() {
            self.bind(S::KIND, field);
        }
        self
    }

    fn bind(&mut self, entity: EntityKind, field: FieldDescriptor) {
        if !field.has_runtime_behaviour() {
            return;
        }
        let key = FieldKey {
            entity,
            field: field.name,
        };
        self.slots.entry(key).or_insert_with(|| {
            tracing::trace!("binding runtime hooks for {key}");
            FieldHooks {
                default: field.default,
                update_default: field.update_default,
                validators: field.validators,
            }
        });
    }

    /// Freeze the bindings and resolve the slots the builders need.
    ///
    /// # Errors
    ///
    /// Returns a [`RuntimeBindError`] if a required slot is missing or holds a
    /// function of the wrong shape.
    pub fn build(self) -> Result<EntityRuntime, RuntimeBindError> {
        let resource_provider = self.resolve_resource_provider()?;
        tracing::debug!("entity runtime bound {} field slots", self.slots.len());
        Ok(EntityRuntime {
            slots: self.slots,
            resource_provider,
        })
    }

    fn resolve_resource_provider(&self) -> Result<ResourceProviderHooks, RuntimeBindError> {
        let entity = EntityKind::ResourceProvider;
        Ok(ResourceProviderHooks {
            default_id: self.id_fn(entity, "id", Slot::Default)?,
            default_created_at: self.timestamp_fn(entity, "created_at", Slot::Default)?,
            default_updated_at: self.timestamp_fn(entity, "updated_at", Slot::Default)?,
            update_default_updated_at: self.timestamp_fn(
                entity,
                "updated_at",
                Slot::UpdateDefault,
            )?,
            name: self
                .slots
                .get(&FieldKey {
                    entity,
                    field: "name",
                })
                .cloned()
                .unwrap_or_default(),
        })
    }

    fn value_fn(
        &self,
        entity: EntityKind,
        field: &'static str,
        slot: Slot,
    ) -> Result<(FieldKey, ValueFn), RuntimeBindError> {
        let key = FieldKey { entity, field };
        let hooks = self.slots.get(&key);
        let value = match slot {
            Slot::Default => hooks.and_then(|h| h.default),
            Slot::UpdateDefault => hooks.and_then(|h| h.update_default),
        };
        value
            .map(|value| (key, value))
            .ok_or(RuntimeBindError::Missing { key, slot })
    }

    fn timestamp_fn(
        &self,
        entity: EntityKind,
        field: &'static str,
        slot: Slot,
    ) -> Result<fn() -> Timestamp, RuntimeBindError> {
        match self.value_fn(entity, field, slot)? {
            (_, ValueFn::Timestamp(f)) => Ok(f),
            (key, other) => Err(RuntimeBindError::UnexpectedShape {
                key,
                slot,
                expected: ValueShape::Timestamp,
                found: other.shape(),
            }),
        }
    }

    fn id_fn(
        &self,
        entity: EntityKind,
        field: &'static str,
        slot: Slot,
    ) -> Result<fn() -> PrefixedId, RuntimeBindError> {
        match self.value_fn(entity, field, slot)? {
            (_, ValueFn::Id(f)) => Ok(f),
            (key, other) => Err(RuntimeBindError::UnexpectedShape {
                key,
                slot,
                expected: ValueShape::Id,
                found: other.shape(),
            }),
        }
    }
}

/// Frozen registry of entity field behaviour.
#[derive(Debug)]
pub struct EntityRuntime {
    slots: HashMap<FieldKey, FieldHooks>,
    resource_provider: ResourceProviderHooks,
}

impl EntityRuntime {
    #[must_use]
    pub fn builder() -> EntityRuntimeBuilder {
        EntityRuntimeBuilder::default()
    }

    /// Bind every schema the registry knows about.
    ///
    /// # Errors
    ///
    /// Returns a [`RuntimeBindError`] on a schema/runtime mismatch.
    pub fn initialize() -> Result<Self, RuntimeBindError> {
        Self::builder().register::<ResourceProviderSchema>().build()
    }

    /// Hooks bound to a field, if it declared any.
    #[must_use]
    pub fn hooks(&self, entity: EntityKind, field: &'static str) -> Option<&FieldHooks> {
        self.slots.get(&FieldKey { entity, field })
    }

    #[must_use]
    pub const fn resource_provider(&self) -> &ResourceProviderHooks {
        &self.resource_provider
    }

    /// Number of bound slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Which function of a slot is being resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Default,
    UpdateDefault,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::UpdateDefault => f.write_str("update default"),
        }
    }
}

/// A schema descriptor does not match what the runtime expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeBindError {
    /// A required default was never declared.
    Missing { key: FieldKey, slot: Slot },
    /// A default was declared with the wrong value type.
    UnexpectedShape {
        key: FieldKey,
        slot: Slot,
        expected: ValueShape,
        found: ValueShape,
    },
}

impl fmt::Display for RuntimeBindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { key, slot } => write!(f, "{key} declares no {slot}"),
            Self::UnexpectedShape {
                key,
                slot,
                expected,
                found,
            } => write!(f, "{key} {slot} produces {found}, expected {expected}"),
        }
    }
}

impl std::error::Error for RuntimeBindError {}
