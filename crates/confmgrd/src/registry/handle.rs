//! In-process handle for one subsystem client.
//!
//! A `ClientHandle` pairs a client's name with its connection capability and
//! remembers the last connectivity the registry observed. Handles are shared
//! as `Arc<ClientHandle>` between the registry, the per-client workers and
//! the object directory.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Timestamps that cannot be represented are reported as `None`

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use confmgr_core::{ClientName, ConnectionCapability};

/// Sentinel stored in `connected_since_ms` while disconnected.
const NOT_CONNECTED: i64 = i64::MIN;

/// Handle to one subsystem client.
pub struct ClientHandle {
    name: ClientName,
    address: String,

    /// Connection to the daemon; synchronises itself
    capability: Arc<dyn ConnectionCapability>,

    /// Last connectivity observed through this handle
    connected: AtomicBool,

    /// Unix millis of the last disconnected → connected transition
    connected_since_ms: AtomicI64,
}

/// Point-in-time view of a client for status output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientSnapshot {
    pub name: ClientName,
    pub address: String,
    pub connected: bool,
    pub connected_since: Option<DateTime<Utc>>,
}

impl ClientHandle {
    /// Creates a handle around an initialised capability.
    pub fn new(
        name: ClientName,
        address: impl Into<String>,
        capability: Box<dyn ConnectionCapability>,
    ) -> Self {
        Self {
            name,
            address: address.into(),
            capability: Arc::from(capability),
            connected: AtomicBool::new(false),
            connected_since_ms: AtomicI64::new(NOT_CONNECTED),
        }
    }

    pub fn name(&self) -> &ClientName {
        &self.name
    }

    /// Address the capability was initialised with (`localhost:<port>`).
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The capability, for dispatching configuration requests.
    pub fn capability(&self) -> &Arc<dyn ConnectionCapability> {
        &self.capability
    }

    /// Asks the capability whether it is connected and records the answer.
    pub fn is_connected(&self) -> bool {
        let connected = self.capability.is_connected();
        self.record(connected);
        connected
    }

    /// Last observed connectivity, without asking the capability.
    pub fn last_known_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// When the client last became connected, if it still is.
    pub fn connected_since(&self) -> Option<DateTime<Utc>> {
        match self.connected_since_ms.load(Ordering::SeqCst) {
            NOT_CONNECTED => None,
            ms => DateTime::from_timestamp_millis(ms),
        }
    }

    /// Makes one connection attempt. Returns true if connected afterwards.
    pub async fn connect(&self) -> bool {
        let _ = self.capability.connect().await;
        self.is_connected()
    }

    /// Disconnects if currently connected.
    ///
    /// Returns true if a disconnect was issued.
    pub async fn disconnect_if_connected(&self) -> bool {
        if !self.is_connected() {
            debug!(client = %self.name, "Client already disconnected");
            return false;
        }
        let closed = self.capability.disconnect().await;
        self.record(self.capability.is_connected());
        info!(client = %self.name, closed, "Disconnected from client");
        true
    }

    pub fn snapshot(&self) -> ClientSnapshot {
        ClientSnapshot {
            name: self.name.clone(),
            address: self.address.clone(),
            connected: self.last_known_connected(),
            connected_since: self.connected_since(),
        }
    }

    fn record(&self, connected: bool) {
        let was = self.connected.swap(connected, Ordering::SeqCst);
        if was == connected {
            return;
        }
        if connected {
            self.connected_since_ms
                .store(Utc::now().timestamp_millis(), Ordering::SeqCst);
            info!(client = %self.name, address = %self.address, "Client connected");
        } else {
            self.connected_since_ms.store(NOT_CONNECTED, Ordering::SeqCst);
            info!(client = %self.name, "Client connection lost");
        }
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("connected", &self.last_known_connected())
            .finish()
    }
}
