//! Registry configuration.
//!
//! Configuration is read from environment variables. Every variable has a
//! default, so an empty environment yields a working setup backed by an
//! in-memory embedded store.
//!
//! # Environment Variables
//!
//! - `REGISTRY_TESTDB_URI`: connection descriptor for the test database
//!   (default: empty, meaning the shared in-memory store)
//! - `REGISTRY_MIGRATIONS_DIR`: migrations applied to server stores
//!   (default: `../db/migrations`)
//! - `REGISTRY_MIGRATE_BIN`: migration tool executable (default: `atlas`)
//! - `REGISTRY_POSTGRES_INIT_SCRIPT`: script run inside Postgres containers
//!   before first connection (default: `testdata/postgres_init.sh`)
//! - `REGISTRY_LISTEN_PORT`: port the binary listens on (default: `8080`)
//!
//! Relative paths resolve against the working directory, which is the
//! `server/` package directory under `cargo test`.

use std::path::PathBuf;

pub const TESTDB_URI_VAR: &str = "REGISTRY_TESTDB_URI";
pub const MIGRATIONS_DIR_VAR: &str = "REGISTRY_MIGRATIONS_DIR";
pub const MIGRATE_BIN_VAR: &str = "REGISTRY_MIGRATE_BIN";
pub const POSTGRES_INIT_SCRIPT_VAR: &str = "REGISTRY_POSTGRES_INIT_SCRIPT";
pub const LISTEN_PORT_VAR: &str = "REGISTRY_LISTEN_PORT";

/// Registry configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Connection descriptor. The descriptor grammar is checked when the
    /// store is provisioned, not here.
    pub testdb_uri: String,
    pub migrations_dir: PathBuf,
    pub migrate_bin: String,
    pub postgres_init_script: PathBuf,
    pub listen_port: u16,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            testdb_uri: String::new(),
            migrations_dir: PathBuf::from(Self::DEFAULT_MIGRATIONS_DIR),
            migrate_bin: Self::DEFAULT_MIGRATE_BIN.to_string(),
            postgres_init_script: PathBuf::from(Self::DEFAULT_POSTGRES_INIT_SCRIPT),
            listen_port: Self::DEFAULT_PORT,
        }
    }
}

impl RegistryConfig {
    pub const DEFAULT_PORT: u16 = 8080;
    pub const DEFAULT_MIGRATIONS_DIR: &'static str = "../db/migrations";
    pub const DEFAULT_MIGRATE_BIN: &'static str = "atlas";
    pub const DEFAULT_POSTGRES_INIT_SCRIPT: &'static str = "testdata/postgres_init.sh";

    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its
    /// value.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `REGISTRY_LISTEN_PORT` is set but not a valid port number
    /// - `REGISTRY_MIGRATE_BIN` is set but empty
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let testdb_uri = lookup(TESTDB_URI_VAR).unwrap_or(defaults.testdb_uri);
        let migrations_dir = lookup(MIGRATIONS_DIR_VAR)
            .filter(|dir| !dir.is_empty())
            .map_or(defaults.migrations_dir, PathBuf::from);
        let migrate_bin = match lookup(MIGRATE_BIN_VAR) {
            Some(bin) if bin.is_empty() => {
                return Err(ConfigError::InvalidValue {
                    name: MIGRATE_BIN_VAR.to_string(),
                    message: "must not be empty".to_string(),
                });
            }
            Some(bin) => bin,
            None => defaults.migrate_bin,
        };
        let postgres_init_script = lookup(POSTGRES_INIT_SCRIPT_VAR)
            .filter(|path| !path.is_empty())
            .map_or(defaults.postgres_init_script, PathBuf::from);
        let listen_port = match lookup(LISTEN_PORT_VAR) {
            Some(value) => parse_port(&value)?,
            None => defaults.listen_port,
        };

        Ok(Self {
            testdb_uri,
            migrations_dir,
            migrate_bin,
            postgres_init_script,
            listen_port,
        })
    }
}

fn parse_port(value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
        name: LISTEN_PORT_VAR.to_string(),
        message: format!("'{value}' is not a valid port number (must be 0-65535)"),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_in(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = RegistryConfig::from_lookup(lookup_in(&[])).unwrap();
        assert_eq!(config, RegistryConfig::default());
        assert_eq!(config.testdb_uri, "");
        assert_eq!(config.listen_port, 8080);
        assert_eq!(config.migrate_bin, "atlas");
        assert_eq!(config.migrations_dir, PathBuf::from("../db/migrations"));
    }

    #[test]
    fn test_overrides() {
        let config = RegistryConfig::from_lookup(lookup_in(&[
            (TESTDB_URI_VAR, "docker://postgres:16"),
            (MIGRATIONS_DIR_VAR, "/srv/migrations"),
            (MIGRATE_BIN_VAR, "/usr/local/bin/atlas"),
            (POSTGRES_INIT_SCRIPT_VAR, "/srv/init.sh"),
            (LISTEN_PORT_VAR, "9000"),
        ]))
        .unwrap();
        assert_eq!(config.testdb_uri, "docker://postgres:16");
        assert_eq!(config.migrations_dir, PathBuf::from("/srv/migrations"));
        assert_eq!(config.migrate_bin, "/usr/local/bin/atlas");
        assert_eq!(config.postgres_init_script, PathBuf::from("/srv/init.sh"));
        assert_eq!(config.listen_port, 9000);
    }

    #[test]
    fn test_invalid_port() {
        let err = RegistryConfig::from_lookup(lookup_in(&[(LISTEN_PORT_VAR, "99999")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                name: LISTEN_PORT_VAR.to_string(),
                message: "'99999' is not a valid port number (must be 0-65535)".to_string(),
            }
        );
    }

    #[test]
    fn test_empty_migrate_bin_is_rejected() {
        let err = RegistryConfig::from_lookup(lookup_in(&[(MIGRATE_BIN_VAR, "")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name, .. } if name == MIGRATE_BIN_VAR));
    }

    #[test]
    fn test_config_error_display_invalid() {
        let error = ConfigError::InvalidValue {
            name: "TEST_VAR".to_string(),
            message: "bad value".to_string(),
        };
        assert_eq!(error.to_string(), "invalid value for TEST_VAR: bad value");
    }
}
