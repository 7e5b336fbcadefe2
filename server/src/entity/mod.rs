//! Entity schemas, the runtime registry that binds their field behaviour,
//! and the builders that consult it.

pub mod resource_provider;
pub mod runtime;
pub mod schema;

pub use resource_provider::{
    EntityError, RESOURCE_PROVIDER_PREFIX, ResourceProvider, ResourceProviderCreate,
    ResourceProviderUpdate, delete_resource_provider,
};
pub use runtime::{EntityRuntime, EntityRuntimeBuilder, FieldHooks, FieldKey, RuntimeBindError};
pub use schema::{EntityKind, EntitySchema, FieldDescriptor, ValidationError, ValueFn};
