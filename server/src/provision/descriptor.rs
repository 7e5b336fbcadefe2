//! Connection descriptor parsing and backend selection.
//!
//! Grammar, in priority order:
//!
//! | descriptor                          | dialect  | locator              |
//! |-------------------------------------|----------|----------------------|
//! | empty                               | sqlite   | shared in-memory db  |
//! | `sqlite://<locator>`                | sqlite   | `<locator>`          |
//! | `postgres://…`, `postgresql://…`    | postgres | the whole descriptor |
//! | `docker://<image>`                  | postgres | started container    |
//!
//! Anything else is rejected before any resource is acquired.

use std::fmt;
use std::path::PathBuf;

use crate::provision::container::{
    ContainerEngine, ContainerError, ContainerHandle, ContainerKind, ContainerRequest,
};
use crate::store::{Dialect, IN_MEMORY_LOCATOR};

const SQLITE_SCHEME: &str = "sqlite://";
const POSTGRES_SCHEMES: [&str; 2] = ["postgres://", "postgresql://"];
const DOCKER_SCHEME: &str = "docker://";

/// A parsed connection descriptor. Parsing acquires nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendPlan {
    Embedded { locator: String },
    Server { uri: String },
    Container { kind: ContainerKind, image: String },
}

impl BackendPlan {
    /// Parse a descriptor.
    ///
    /// # Errors
    ///
    /// Returns a [`DescriptorError`] for unknown schemes and unsupported
    /// container images.
    pub fn parse(descriptor: &str) -> Result<Self, DescriptorError> {
        if descriptor.is_empty() {
            return Ok(Self::Embedded {
                locator: IN_MEMORY_LOCATOR.to_string(),
            });
        }
        if let Some(locator) = descriptor.strip_prefix(SQLITE_SCHEME) {
            return Ok(Self::Embedded {
                locator: locator.to_string(),
            });
        }
        if POSTGRES_SCHEMES
            .iter()
            .any(|scheme| descriptor.starts_with(scheme))
        {
            return Ok(Self::Server {
                uri: descriptor.to_string(),
            });
        }
        if let Some(image) = descriptor.strip_prefix(DOCKER_SCHEME) {
            let kind = ContainerKind::from_image(image)
                .ok_or_else(|| DescriptorError::UnsupportedImage(image.to_string()))?;
            return Ok(Self::Container {
                kind,
                image: image.to_string(),
            });
        }
        Err(DescriptorError::UnsupportedDescriptor(descriptor.to_string()))
    }

    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        match self {
            Self::Embedded { .. } => Dialect::Sqlite,
            Self::Server { .. } | Self::Container { .. } => Dialect::Postgres,
        }
    }
}

/// The outcome of backend selection: where to connect, and the container
/// backing that location if one was started.
#[derive(Debug)]
pub struct SelectedBackend {
    pub dialect: Dialect,
    pub uri: String,
    pub container: Option<Box<dyn ContainerHandle>>,
}

/// Resolve a plan into a connection string, starting a container if the plan
/// asks for one. `init_scripts` are only used by Postgres containers.
///
/// # Errors
///
/// Fails if the container cannot be started.
pub fn select_backend(
    plan: BackendPlan,
    engine: &dyn ContainerEngine,
    init_scripts: &[PathBuf],
) -> Result<SelectedBackend, ContainerError> {
    let dialect = plan.dialect();
    match plan {
        BackendPlan::Embedded { locator } => Ok(SelectedBackend {
            dialect,
            uri: locator,
            container: None,
        }),
        BackendPlan::Server { uri } => Ok(SelectedBackend {
            dialect,
            uri,
            container: None,
        }),
        BackendPlan::Container { kind, image } => {
            let init_scripts = match kind {
                ContainerKind::Postgres => init_scripts.to_vec(),
                ContainerKind::CockroachDb => Vec::new(),
            };
            let container = engine.start(&ContainerRequest {
                kind,
                image,
                init_scripts,
            })?;
            Ok(SelectedBackend {
                dialect,
                uri: container.uri().to_string(),
                container: Some(container),
            })
        }
    }
}

/// A descriptor the selector does not understand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    UnsupportedDescriptor(String),
    UnsupportedImage(String),
}

impl fmt::Display for DescriptorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedDescriptor(descriptor) => {
                write!(f, "unsupported connection descriptor: '{descriptor}'")
            }
            Self::UnsupportedImage(image) => write!(f, "unsupported container image: '{image}'"),
        }
    }
}

impl std::error::Error for DescriptorError {}
