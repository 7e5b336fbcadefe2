//! Process lifecycle for a batch of operations against a provisioned store.
//!
//! ```text
//! Uninitialized --setup--> Provisioned --teardown--> TornDown
//! ```
//!
//! # Invariants
//!
//! - Provisioning happens at most once per [`Lifecycle`]. The state lock is
//!   held while provisioning, so concurrent callers wait and then observe the
//!   provisioned environment.
//! - Teardown closes the store before terminating the container, attempts
//!   both even when the first fails, and leaves the lifecycle in `TornDown`
//!   for good.
//! - The batch's exit code wins over any teardown failure.

use std::panic::{self, AssertUnwindSafe};
use std::process::ExitCode;
use std::sync::{Arc, Mutex, PoisonError};

use crate::entity::EntityRuntime;
use crate::provision::{ContainerError, ContainerHandle, FatalSetupError};
use crate::store::{Dialect, StoreError, StoreHandle};

/// Everything operations need from a provisioned run.
pub struct Environment {
    dialect: Dialect,
    store: Arc<dyn StoreHandle>,
    runtime: Arc<EntityRuntime>,
}

impl Environment {
    #[must_use]
    pub fn new(dialect: Dialect, store: Arc<dyn StoreHandle>, runtime: Arc<EntityRuntime>) -> Self {
        Self {
            dialect,
            store,
            runtime,
        }
    }

    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn StoreHandle> {
        &self.store
    }

    #[must_use]
    pub fn runtime(&self) -> &Arc<EntityRuntime> {
        &self.runtime
    }
}

/// The result of provisioning: an open store and the container behind it, if
/// any. Whoever holds this owns both.
pub struct Provisioned {
    pub dialect: Dialect,
    pub store: Arc<dyn StoreHandle>,
    pub container: Option<Box<dyn ContainerHandle>>,
}

/// Something that can produce a ready store.
///
/// On error, implementations release anything they acquired before
/// returning.
pub trait Provision {
    fn provision(&self) -> Result<Provisioned, FatalSetupError>;
}

enum State {
    Uninitialized,
    Provisioned {
        environment: Arc<Environment>,
        container: Option<Box<dyn ContainerHandle>>,
    },
    TornDown,
}

/// Outcome of each teardown step. `None` means the step had nothing to do.
#[derive(Debug, Default)]
pub struct TeardownReport {
    pub store_close: Option<Result<(), StoreError>>,
    pub container_terminate: Option<Result<(), ContainerError>>,
}

impl TeardownReport {
    /// True if no step failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        !matches!(self.store_close, Some(Err(_))) && !matches!(self.container_terminate, Some(Err(_)))
    }
}

/// Drives one provision/teardown cycle.
pub struct Lifecycle<P> {
    provisioner: P,
    state: Mutex<State>,
}

impl<P: Provision> Lifecycle<P> {
    #[must_use]
    pub const fn new(provisioner: P) -> Self {
        Self {
            provisioner,
            state: Mutex::new(State::Uninitialized),
        }
    }

    /// Bind the entity runtime and provision the store, once. Later calls
    /// return the same environment.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error hit while binding or provisioning, or
    /// [`FatalSetupError::TornDown`] after teardown.
    #[allow(clippy::significant_drop_tightening)]
    pub fn setup(&self) -> Result<Arc<Environment>, FatalSetupError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| FatalSetupError::LockPoisoned)?;
        match &*state {
            State::Provisioned { environment, .. } => return Ok(Arc::clone(environment)),
            State::TornDown => return Err(FatalSetupError::TornDown),
            State::Uninitialized => {}
        }

        let runtime = EntityRuntime::initialize()?;
        let Provisioned {
            dialect,
            store,
            container,
        } = self.provisioner.provision()?;

        let environment = Arc::new(Environment::new(dialect, store, Arc::new(runtime)));
        *state = State::Provisioned {
            environment: Arc::clone(&environment),
            container,
        };
        tracing::info!(%dialect, "test environment provisioned");
        Ok(environment)
    }

    /// Release the store and container. Idempotent; the lifecycle cannot be
    /// set up again afterwards.
    pub fn teardown(&self) -> TeardownReport {
        let previous = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *state, State::TornDown)
        };
        let State::Provisioned {
            environment,
            container,
        } = previous
        else {
            return TeardownReport::default();
        };

        let store_close = environment.store().close();
        if let Err(e) = &store_close {
            tracing::error!("failed closing test store: {e}");
        }

        let container_terminate = container.map(|container| {
            let id = container.id().to_string();
            let terminated = container.terminate();
            if let Err(e) = &terminated {
                tracing::error!(container = %id, "failed terminating db test container: {e}");
            }
            terminated
        });

        TeardownReport {
            store_close: Some(store_close),
            container_terminate,
        }
    }

    /// Set up, run `batch`, tear down, and return the batch's exit code.
    ///
    /// A setup failure or a panicking batch yields [`ExitCode::FAILURE`].
    /// Teardown failures are logged but never change the exit code.
    pub fn run(&self, batch: impl FnOnce(&Environment) -> ExitCode) -> ExitCode {
        let code = match self.setup() {
            Ok(environment) => {
                match panic::catch_unwind(AssertUnwindSafe(|| batch(&environment))) {
                    Ok(code) => code,
                    Err(_) => {
                        tracing::error!("test batch panicked");
                        ExitCode::FAILURE
                    }
                }
            }
            Err(e) => {
                tracing::error!("test environment setup failed: {e}");
                ExitCode::FAILURE
            }
        };

        let report = self.teardown();
        if !report.is_clean() {
            tracing::warn!("teardown reported errors; exit code reflects the batch result");
        }
        code
    }
}
