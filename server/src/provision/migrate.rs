//! External migration tool invocation for server stores.
//!
//! The tool is run as `<program> migrate apply --dir file://<dir> --url <uri>`.
//! Its stdout and stderr are forwarded line by line to our stdout while it
//! runs, and the combined output is kept for the error value.

use std::fmt;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

/// Runs the migration tool against a connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRunner {
    program: String,
    migrations_dir: PathBuf,
}

impl MigrationRunner {
    #[must_use]
    pub fn new(program: impl Into<String>, migrations_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            migrations_dir: migrations_dir.into(),
        }
    }

    fn args(&self, uri: &str) -> Vec<String> {
        vec![
            "migrate".to_string(),
            "apply".to_string(),
            "--dir".to_string(),
            format!("file://{}", self.migrations_dir.display()),
            "--url".to_string(),
            uri.to_string(),
        ]
    }

    /// Apply all pending migrations. Blocks until the tool exits.
    ///
    /// # Errors
    ///
    /// Fails if the tool cannot be started or exits non-zero.
    pub fn apply(&self, uri: &str) -> Result<(), MigrationError> {
        tracing::info!(
            program = %self.program,
            dir = %self.migrations_dir.display(),
            "running database migrations"
        );

        let mut child = Command::new(&self.program)
            .args(self.args(uri))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| MigrationError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let captured = Arc::new(Mutex::new(Vec::new()));
        let mut forwarders = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            forwarders.push(forward(stdout, Arc::clone(&captured)));
        }
        if let Some(stderr) = child.stderr.take() {
            forwarders.push(forward(stderr, Arc::clone(&captured)));
        }

        let status = child.wait().map_err(MigrationError::Wait)?;
        for forwarder in forwarders {
            // A forwarder only stops early on a read error; the exit status
            // still decides the outcome.
            let _ = forwarder.join();
        }

        if status.success() {
            tracing::info!("database migrations applied");
            return Ok(());
        }

        let output = {
            let captured = captured.lock().unwrap_or_else(PoisonError::into_inner);
            String::from_utf8_lossy(&captured).into_owned()
        };
        tracing::error!(%status, "migration tool failed");
        Err(MigrationError::Failed { status, output })
    }
}

/// Copy a child stream line by line to our stdout and into `captured`.
fn forward(
    stream: impl Read + Send + 'static,
    captured: Arc<Mutex<Vec<u8>>>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let mut stdout = io::stdout().lock();
                    let _ = stdout.write_all(&line);
                    let _ = stdout.flush();
                    drop(stdout);
                    captured
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend_from_slice(&line);
                }
            }
        }
    })
}

/// Errors from running the migration tool.
#[derive(Debug)]
pub enum MigrationError {
    /// The tool could not be started.
    Spawn { program: String, source: io::Error },
    /// Waiting for the tool failed.
    Wait(io::Error),
    /// The tool exited unsuccessfully.
    Failed { status: ExitStatus, output: String },
}

impl fmt::Display for MigrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn { program, source } => {
                write!(f, "failed to start migration tool '{program}': {source}")
            }
            Self::Wait(e) => write!(f, "failed waiting for migration tool: {e}"),
            Self::Failed { status, output } => {
                write!(f, "migration tool exited with {status}")?;
                let output = output.trim();
                if !output.is_empty() {
                    write!(f, ":\n{output}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for MigrationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn { source, .. } => Some(source),
            Self::Wait(e) => Some(e),
            Self::Failed { .. } => None,
        }
    }
}
