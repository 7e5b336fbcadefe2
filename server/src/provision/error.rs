use std::fmt;

use crate::entity::RuntimeBindError;
use crate::provision::container::ContainerError;
use crate::provision::descriptor::DescriptorError;
use crate::provision::migrate::MigrationError;
use crate::store::StoreError;

/// A failure that makes the whole run meaningless.
///
/// Nothing in the provisioning path panics; every fatal condition ends up
/// here and the lifecycle controller turns it into a failing exit code.
#[derive(Debug)]
pub enum FatalSetupError {
    /// The connection descriptor was rejected. Nothing was acquired.
    Config(DescriptorError),
    /// An entity field hook did not match its declared shape.
    Binding(RuntimeBindError),
    /// The ephemeral container could not be started.
    Container(ContainerError),
    /// The store could not be opened.
    Connect(StoreError),
    /// Embedded schema creation failed.
    Schema(StoreError),
    /// The migration tool failed.
    Migration(MigrationError),
    /// Setup was requested after teardown.
    TornDown,
    /// A thread panicked while holding the lifecycle state.
    LockPoisoned,
}

impl fmt::Display for FatalSetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "invalid test database descriptor: {e}"),
            Self::Binding(e) => write!(f, "failed binding entity runtime: {e}"),
            Self::Container(e) => write!(f, "failed starting db test container: {e}"),
            Self::Connect(e) => write!(f, "failed opening connection to database: {e}"),
            Self::Schema(e) => write!(f, "failed creating db schema: {e}"),
            Self::Migration(e) => write!(f, "failed running database migrations: {e}"),
            Self::TornDown => write!(f, "test environment was already torn down"),
            Self::LockPoisoned => write!(f, "test environment lock poisoned"),
        }
    }
}

impl std::error::Error for FatalSetupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Binding(e) => Some(e),
            Self::Container(e) => Some(e),
            Self::Connect(e) | Self::Schema(e) => Some(e),
            Self::Migration(e) => Some(e),
            Self::TornDown | Self::LockPoisoned => None,
        }
    }
}

impl From<DescriptorError> for FatalSetupError {
    fn from(e: DescriptorError) -> Self {
        Self::Config(e)
    }
}

impl From<RuntimeBindError> for FatalSetupError {
    fn from(e: RuntimeBindError) -> Self {
        Self::Binding(e)
    }
}

impl From<ContainerError> for FatalSetupError {
    fn from(e: ContainerError) -> Self {
        Self::Container(e)
    }
}

impl From<MigrationError> for FatalSetupError {
    fn from(e: MigrationError) -> Self {
        Self::Migration(e)
    }
}
