//! Static field descriptors for entity types.
//!
//! Each entity type describes its fields once, including any runtime
//! behaviour: a default value on create, a default value on update, and
//! validators run before every save. The descriptors carry typed function
//! pointers, so the runtime registry never has to guess at a signature.

use std::fmt;

use crate::entity::resource_provider::RESOURCE_PROVIDER_PREFIX;
use crate::types::{PrefixedId, Timestamp};

/// The entity types known to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    ResourceProvider,
}

impl EntityKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ResourceProvider => "resource_provider",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value-producing function declared on a field.
#[derive(Debug, Clone, Copy)]
pub enum ValueFn {
    Timestamp(fn() -> Timestamp),
    Id(fn() -> PrefixedId),
    Text(fn() -> String),
}

impl ValueFn {
    #[must_use]
    pub const fn shape(&self) -> ValueShape {
        match self {
            Self::Timestamp(_) => ValueShape::Timestamp,
            Self::Id(_) => ValueShape::Id,
            Self::Text(_) => ValueShape::Text,
        }
    }
}

/// The value type a [`ValueFn`] produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    Timestamp,
    Id,
    Text,
}

impl fmt::Display for ValueShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timestamp => f.write_str("timestamp"),
            Self::Id => f.write_str("prefixed id"),
            Self::Text => f.write_str("text"),
        }
    }
}

/// Validator for a string field. Called by the builders before save.
pub type TextValidator = fn(&str) -> Result<(), ValidationError>;

/// Descriptor for a single entity field.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: &'static str,
    /// Value used when the field is unset on create.
    pub default: Option<ValueFn>,
    /// Value written on every update.
    pub update_default: Option<ValueFn>,
    pub validators: Vec<TextValidator>,
}

impl FieldDescriptor {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            default: None,
            update_default: None,
            validators: Vec::new(),
        }
    }

    #[must_use]
    pub const fn default_value(mut self, value: ValueFn) -> Self {
        self.default = Some(value);
        self
    }

    #[must_use]
    pub const fn update_default(mut self, value: ValueFn) -> Self {
        self.update_default = Some(value);
        self
    }

    #[must_use]
    pub fn validate(mut self, validator: TextValidator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Whether the field declares any runtime behaviour at all.
    #[must_use]
    pub fn has_runtime_behaviour(&self) -> bool {
        self.default.is_some() || self.update_default.is_some() || !self.validators.is_empty()
    }
}

/// Static schema of an entity type.
pub trait EntitySchema {
    const KIND: EntityKind;

    /// Field descriptors, mixin fields included.
    fn fields() -> Vec<FieldDescriptor>;
}

/// Audit timestamps shared by every entity.
pub struct TimestampsMixin;

impl TimestampsMixin {
    #[must_use]
    pub fn fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::new("created_at").default_value(ValueFn::Timestamp(Timestamp::now)),
            FieldDescriptor::new("updated_at")
                .default_value(ValueFn::Timestamp(Timestamp::now))
                .update_default(ValueFn::Timestamp(Timestamp::now)),
        ]
    }
}

/// Schema of the resource provider entity.
pub struct ResourceProviderSchema;

fn new_resource_provider_id() -> PrefixedId {
    PrefixedId::generate(RESOURCE_PROVIDER_PREFIX)
}

impl EntitySchema for ResourceProviderSchema {
    const KIND: EntityKind = EntityKind::ResourceProvider;

    fn fields() -> Vec<FieldDescriptor> {
        let mut fields = TimestampsMixin::fields();
        fields.extend([
            FieldDescriptor::new("id").default_value(ValueFn::Id(new_resource_provider_id)),
            FieldDescriptor::new("name").validate(not_empty),
            FieldDescriptor::new("description"),
            FieldDescriptor::new("organizational_unit_id"),
        ]);
        fields
    }
}

/// Rejects the empty string.
pub fn not_empty(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        Err(ValidationError::new("value must not be empty"))
    } else {
        Ok(())
    }
}

/// A field value was rejected by a validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}
