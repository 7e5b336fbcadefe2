//! Test doubles for the provisioning seams. They share a [`CallLog`] so tests
//! can assert ordering.

use std::sync::{Arc, Mutex, PoisonError};

use crate::entity::ResourceProvider;
use crate::provision::{
    ContainerEngine, ContainerError, ContainerHandle, ContainerRequest, ServerConnector,
};
use crate::store::{Dialect, ResourceProviderChanges, SqliteStore, StoreError, StoreHandle};
use crate::testing::memory_store;
use crate::types::PrefixedId;

/// Ordered record of calls made on fakes.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<&'static str>>>);

impl CallLog {
    pub fn record(&self, call: &'static str) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    #[must_use]
    pub fn calls(&self) -> Vec<&'static str> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }
}

/// A container that only records termination.
#[derive(Debug)]
pub struct FakeContainer {
    uri: String,
    log: CallLog,
    fail_terminate: bool,
}

impl FakeContainer {
    #[must_use]
    pub fn new(uri: impl Into<String>, log: CallLog) -> Self {
        Self {
            uri: uri.into(),
            log,
            fail_terminate: false,
        }
    }

    #[must_use]
    pub const fn failing_terminate(mut self) -> Self {
        self.fail_terminate = true;
        self
    }
}

impl ContainerHandle for FakeContainer {
    fn id(&self) -> &str {
        "fake-container"
    }

    fn uri(&self) -> &str {
        &self.uri
    }

    fn terminate(self: Box<Self>) -> Result<(), ContainerError> {
        self.log.record("container.terminate");
        if self.fail_terminate {
            return Err(ContainerError::NotReady {
                id: self.id().to_string(),
                waited: std::time::Duration::ZERO,
            });
        }
        Ok(())
    }
}

/// An engine that hands out [`FakeContainer`]s pointing at a fixed URI.
#[derive(Debug, Default)]
pub struct FakeEngine {
    uri: String,
    log: CallLog,
    requests: Mutex<Vec<ContainerRequest>>,
}

impl FakeEngine {
    #[must_use]
    pub fn new(uri: impl Into<String>, log: CallLog) -> Self {
        Self {
            uri: uri.into(),
            log,
            requests: Mutex::default(),
        }
    }

    /// Every request seen so far.
    #[must_use]
    pub fn requests(&self) -> Vec<ContainerRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ContainerEngine for FakeEngine {
    fn start(&self, request: &ContainerRequest) -> Result<Box<dyn ContainerHandle>, ContainerError> {
        self.log.record("engine.start");
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        Ok(Box::new(FakeContainer::new(self.uri.clone(), self.log.clone())))
    }
}

/// An embedded store that records `close` and can be told to fail it.
pub struct FakeStore {
    inner: SqliteStore,
    log: CallLog,
    fail_close: bool,
}

impl FakeStore {
    #[must_use]
    pub const fn new(inner: SqliteStore, log: CallLog) -> Self {
        Self {
            inner,
            log,
            fail_close: false,
        }
    }

    #[must_use]
    pub const fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }
}

impl StoreHandle for FakeStore {
    fn dialect(&self) -> Dialect {
        self.inner.dialect()
    }

    fn insert_resource_provider(&self, provider: &ResourceProvider) -> Result<(), StoreError> {
        self.inner.insert_resource_provider(provider)
    }

    fn resource_provider(&self, id: &PrefixedId) -> Result<Option<ResourceProvider>, StoreError> {
        self.inner.resource_provider(id)
    }

    fn resource_providers_for_tenant(
        &self,
        organizational_unit_id: &PrefixedId,
    ) -> Result<Vec<ResourceProvider>, StoreError> {
        self.inner.resource_providers_for_tenant(organizational_unit_id)
    }

    fn update_resource_provider(
        &self,
        id: &PrefixedId,
        changes: &ResourceProviderChanges,
    ) -> Result<Option<ResourceProvider>, StoreError> {
        self.inner.update_resource_provider(id, changes)
    }

    fn delete_resource_provider(&self, id: &PrefixedId) -> Result<bool, StoreError> {
        self.inner.delete_resource_provider(id)
    }

    fn close(&self) -> Result<(), StoreError> {
        self.log.record("store.close");
        let closed = self.inner.close();
        if self.fail_close {
            return Err(StoreError::Corrupt("synthetic close failure".to_string()));
        }
        closed
    }
}

/// Connects every server URI to a fresh in-memory [`FakeStore`].
#[derive(Debug, Clone, Default)]
pub struct FakeConnector {
    log: CallLog,
}

impl FakeConnector {
    #[must_use]
    pub const fn new(log: CallLog) -> Self {
        Self { log }
    }
}

impl ServerConnector for FakeConnector {
    fn connect(&self, _uri: &str) -> Result<Arc<dyn StoreHandle>, StoreError> {
        self.log.record("store.connect");
        Ok(Arc::new(FakeStore::new(memory_store()?, self.log.clone())))
    }
}
