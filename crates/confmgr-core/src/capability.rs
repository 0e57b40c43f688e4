//! The connection capability every subsystem client implements, and the
//! catalog mapping daemon names to implementations.
//!
//! The registry never knows how a client talks to its daemon. It only
//! drives the lifecycle (`connect`/`disconnect`/`is_connected`) and hands
//! the capability to whoever dispatches configuration requests.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;

use crate::{ClientName, ClientResult, ConfigObject};

/// One page of a bulk read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkPage {
    pub objects: Vec<ConfigObject>,
    /// Marker to pass to the next `bulk_get` call.
    pub next_marker: i64,
    /// True if more objects remain after this page.
    pub more: bool,
}

impl BulkPage {
    pub fn count(&self) -> usize {
        self.objects.len()
    }
}

/// Connection to one subsystem daemon.
///
/// Implementations must be safe to call concurrently: the bulk-connect loop,
/// the per-client worker and request dispatchers may all hold the same
/// capability. Any state behind `connect`/`disconnect` is synchronised by
/// the implementation, not by the registry.
#[async_trait]
pub trait ConnectionCapability: Send + Sync {
    /// Binds the capability to its daemon. Called once, before the
    /// capability is shared.
    fn initialize(&mut self, name: &ClientName, address: &str);

    /// Attempts to connect. Returns true if the client is connected afterwards.
    async fn connect(&self) -> bool;

    /// Tears the connection down. Returns true if a connection was closed.
    async fn disconnect(&self) -> bool;

    fn is_connected(&self) -> bool;

    /// Name of the daemon this capability talks to.
    fn server_name(&self) -> &str;

    async fn create(&self, object: &ConfigObject) -> ClientResult<bool>;

    async fn delete(&self, object: &ConfigObject, key: &str) -> ClientResult<bool>;

    /// Applies `desired` over `current`; `changed` lists the attributes that differ.
    async fn update(
        &self,
        current: &ConfigObject,
        desired: &ConfigObject,
        changed: &[String],
        key: &str,
    ) -> ClientResult<bool>;

    async fn get(&self, object: &ConfigObject) -> ClientResult<ConfigObject>;

    async fn bulk_get(
        &self,
        object: &ConfigObject,
        marker: i64,
        count: i64,
    ) -> ClientResult<BulkPage>;

    async fn execute_action(&self, object: &ConfigObject) -> ClientResult<()>;
}

/// Builds an uninitialised capability.
pub type CapabilityConstructor = Box<dyn Fn() -> Box<dyn ConnectionCapability> + Send + Sync>;

/// Maps daemon names to the capability implementation that talks to them.
///
/// Only names present in the catalog get a handle in the registry.
#[derive(Default)]
pub struct CapabilityCatalog {
    constructors: HashMap<String, CapabilityConstructor>,
}

impl CapabilityCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constructor for `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn() -> Box<dyn ConnectionCapability> + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Box::new(constructor));
    }

    /// Builder-style variant of [`register`](Self::register).
    #[must_use]
    pub fn with<F>(mut self, name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn() -> Box<dyn ConnectionCapability> + Send + Sync + 'static,
    {
        self.register(name, constructor);
        self
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Creates a fresh, uninitialised capability for `name`.
    pub fn instantiate(&self, name: &str) -> Option<Box<dyn ConnectionCapability>> {
        self.constructors.get(name).map(|build| build())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

impl fmt::Debug for CapabilityCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityCatalog")
            .field("names", &self.names())
            .finish()
    }
}
