//! Test database provisioning.
//!
//! A connection descriptor is parsed into a [`BackendPlan`], the plan is
//! resolved into a connection string (starting an ephemeral container if
//! needed), and [`StoreProvisioner`] opens the store and brings its schema up
//! to date. Every failure is a [`FatalSetupError`].

mod container;
mod descriptor;
mod docker;
mod error;
mod migrate;
mod provisioner;

pub use container::{ContainerEngine, ContainerError, ContainerHandle, ContainerKind, ContainerRequest};
pub use descriptor::{BackendPlan, DescriptorError, SelectedBackend, select_backend};
pub use docker::{DockerContainer, DockerEngine};
pub use error::FatalSetupError;
pub use migrate::{MigrationError, MigrationRunner};
pub use provisioner::{PostgresConnector, ServerConnector, StoreProvisioner};
