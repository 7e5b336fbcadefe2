//! Ephemeral database containers.
//!
//! The engine is an opaque collaborator: it starts a disposable server from
//! an image and hands back a handle that knows the connection URI and how to
//! terminate the container.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

/// The server flavour inside a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    CockroachDb,
    Postgres,
}

impl ContainerKind {
    /// Pick the flavour from an image tag, e.g. `cockroachdb/cockroach:v23.1`
    /// or `postgres:16`.
    #[must_use]
    pub fn from_image(image: &str) -> Option<Self> {
        if ["cockroach", "cockroachdb", "crdb"]
            .iter()
            .any(|prefix| image.starts_with(prefix))
        {
            Some(Self::CockroachDb)
        } else if image.starts_with("postgres") {
            Some(Self::Postgres)
        } else {
            None
        }
    }

    /// The port the server listens on inside the container.
    #[must_use]
    pub const fn port(self) -> u16 {
        match self {
            Self::CockroachDb => 26257,
            Self::Postgres => 5432,
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CockroachDb => f.write_str("cockroachdb"),
            Self::Postgres => f.write_str("postgres"),
        }
    }
}

/// What to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRequest {
    pub kind: ContainerKind,
    pub image: String,
    /// Scripts run by the server before it first accepts connections.
    pub init_scripts: Vec<PathBuf>,
}

/// Starts ephemeral containers. Startup blocks until the server is ready.
pub trait ContainerEngine: Send + Sync {
    fn start(&self, request: &ContainerRequest) -> Result<Box<dyn ContainerHandle>, ContainerError>;
}

/// A running container, owned by whoever started it.
pub trait ContainerHandle: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    /// Connection URI for the server in the container.
    fn uri(&self) -> &str;

    /// Stop and remove the container.
    fn terminate(self: Box<Self>) -> Result<(), ContainerError>;
}

/// Errors from the container engine.
#[derive(Debug)]
pub enum ContainerError {
    /// The engine command could not be run at all.
    Spawn { command: String, source: io::Error },
    /// The engine command exited unsuccessfully.
    CommandFailed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },
    /// The server port was not published to the host.
    PortNotPublished { id: String, output: String },
    /// The server did not report readiness in time.
    NotReady { id: String, waited: Duration },
    /// An init script could not be resolved.
    InitScript { path: PathBuf, source: io::Error },
}

impl fmt::Display for ContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn { command, source } => write!(f, "failed to run '{command}': {source}"),
            Self::CommandFailed {
                command,
                status,
                stderr,
            } => write!(f, "'{command}' exited with {status}: {}", stderr.trim()),
            Self::PortNotPublished { id, output } => {
                write!(f, "container {id} has no published port: '{}'", output.trim())
            }
            Self::NotReady { id, waited } => {
                write!(f, "container {id} not ready after {}s", waited.as_secs())
            }
            Self::InitScript { path, source } => {
                write!(f, "init script {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ContainerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn { source, .. } | Self::InitScript { source, .. } => Some(source),
            Self::CommandFailed { .. } | Self::PortNotPublished { .. } | Self::NotReady { .. } => {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_image() {
        for image in [
            "cockroach",
            "cockroachdb/cockroach:latest-v23.1",
            "crdb:v22",
        ] {
            assert_eq!(ContainerKind::from_image(image), Some(ContainerKind::CockroachDb));
        }
        for image in ["postgres", "postgres:16-alpine"] {
            assert_eq!(ContainerKind::from_image(image), Some(ContainerKind::Postgres));
        }
        for image in ["", "mysql:8", "library/postgres:16"] {
            assert_eq!(ContainerKind::from_image(image), None);
        }
    }

    #[test]
    fn test_ports() {
        assert_eq!(ContainerKind::CockroachDb.port(), 26257);
        assert_eq!(ContainerKind::Postgres.port(), 5432);
    }
}
