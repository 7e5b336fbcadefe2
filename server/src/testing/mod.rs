//! Helpers for tests: isolated stores, seeded entities, clients and servers.

mod fakes;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use rand::Rng;
use tokio::task::JoinHandle;

pub use fakes::{CallLog, FakeConnector, FakeContainer, FakeEngine, FakeStore};

use crate::api::{AppState, InProcessExecutor, RegistryClient, SocketExecutor, router};
use crate::entity::{EntityError, EntityRuntime, ResourceProvider, ResourceProviderCreate};
use crate::lifecycle::Environment;
use crate::provision::FatalSetupError;
use crate::store::{Dialect, SqliteStore, StoreError};
use crate::types::{IdPrefix, PrefixedId};

/// Prefix of tenant ids minted by tests.
pub const TENANT_PREFIX: IdPrefix = IdPrefix::new("testtnt");

static TEST_DB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A shared-cache in-memory locator that no other test uses.
#[must_use]
pub fn unique_memory_locator() -> String {
    let counter = TEST_DB_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!(
        "file:registry_test_{}_{counter}?mode=memory&cache=shared&_fk=1",
        std::process::id()
    )
}

/// A fresh in-memory store with the schema in place.
pub fn memory_store() -> Result<SqliteStore, StoreError> {
    let store = SqliteStore::open(&unique_memory_locator())?;
    store.create_schema()?;
    Ok(store)
}

/// A provisioned environment over a fresh in-memory store.
pub fn memory_environment() -> Result<Environment, FatalSetupError> {
    let runtime = EntityRuntime::initialize()?;
    let store = memory_store().map_err(FatalSetupError::Schema)?;
    Ok(Environment::new(
        Dialect::Sqlite,
        Arc::new(store),
        Arc::new(runtime),
    ))
}

/// Client that serves requests in memory against `environment`.
#[must_use]
pub fn graph_test_client(environment: &Environment) -> RegistryClient<InProcessExecutor> {
    RegistryClient::new(InProcessExecutor::new(router(AppState::from_environment(
        environment,
    ))))
}

/// Install a tracing subscriber for test output. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resource_registry=info".into()),
        )
        .with_test_writer()
        .try_init();
}

const ADJECTIVES: &[&str] = &[
    "amber", "brisk", "calm", "dusty", "eager", "frosty", "gentle", "hollow", "idle", "jolly",
    "keen", "lunar", "mellow", "nimble", "polar", "quiet", "rapid", "silent", "tidal", "vivid",
];

const NOUNS: &[&str] = &[
    "anchor", "beacon", "canyon", "delta", "ember", "falcon", "glacier", "harbor", "island",
    "juniper", "kestrel", "lagoon", "meadow", "nebula", "orchid", "prairie", "quarry", "ridge",
    "summit", "tundra",
];

fn fake_name() -> String {
    let mut rng = rand::rng();
    let adjective = ADJECTIVES[rng.random_range(0..ADJECTIVES.len())];
    let noun = NOUNS[rng.random_range(0..NOUNS.len())];
    format!("{adjective} {noun} {}", rng.random_range(100..1000))
}

/// Stages a resource provider for a test. Unset fields get a fake name and a
/// fresh tenant id with [`TENANT_PREFIX`].
#[derive(Debug, Clone, Default)]
pub struct ResourceProviderBuilder {
    name: Option<String>,
    description: Option<String>,
    organizational_unit_id: Option<PrefixedId>,
}

impl ResourceProviderBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn organizational_unit_id(mut self, id: PrefixedId) -> Self {
        self.organizational_unit_id = Some(id);
        self
    }

    /// Fill unset fields and persist through the environment's store.
    pub fn create(self, environment: &Environment) -> Result<ResourceProvider, EntityError> {
        let mut create = ResourceProviderCreate::new()
            .name(self.name.unwrap_or_else(fake_name))
            .organizational_unit_id(
                self.organizational_unit_id
                    .unwrap_or_else(|| PrefixedId::generate(TENANT_PREFIX)),
            );
        if let Some(description) = self.description {
            create = create.description(description);
        }
        create.save(environment.store().as_ref(), environment.runtime())
    }
}

/// A real server on an ephemeral localhost port. Stops when dropped.
pub struct TestServer {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl TestServer {
    pub async fn start(app: Router) -> io::Result<Self> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("test server error: {e}");
            }
        });
        Ok(Self { addr, task })
    }

    /// Serve the registry API over `environment`.
    pub async fn for_environment(environment: &Environment) -> io::Result<Self> {
        Self::start(router(AppState::from_environment(environment))).await
    }

    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    #[must_use]
    pub const fn client(&self) -> RegistryClient<SocketExecutor> {
        RegistryClient::new(SocketExecutor::new(self.addr))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
