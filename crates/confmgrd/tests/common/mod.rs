//! Shared helpers for confmgrd integration tests.
//!
//! `ScriptedClient` is an in-memory connection capability whose behaviour is
//! driven through a shared `Script`: how many connect attempts it takes to
//! succeed, whether the daemon is reachable at all, and call counters.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use confmgr_core::{
    BulkPage, CapabilityCatalog, ClientError, ClientName, ClientResult, ConfigObject,
    ConnectionCapability,
};
use confmgrd::registry::{ClientHandle, ClientRegistry, RetryPolicy};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Scripted Client
// ============================================================================

/// Controls and observes a `ScriptedClient`.
#[derive(Debug)]
pub struct Script {
    /// Connect attempts needed before one succeeds (1 = first attempt)
    succeed_on_attempt: AtomicU32,
    reachable: AtomicBool,
    connected: AtomicBool,
    connect_calls: AtomicU32,
    disconnect_calls: AtomicU32,
    initialized_address: std::sync::Mutex<Option<String>>,
}

impl Script {
    /// A client that connects on its `attempt`-th try.
    pub fn connects_on(attempt: u32) -> Arc<Self> {
        Arc::new(Self {
            succeed_on_attempt: AtomicU32::new(attempt),
            reachable: AtomicBool::new(true),
            connected: AtomicBool::new(false),
            connect_calls: AtomicU32::new(0),
            disconnect_calls: AtomicU32::new(0),
            initialized_address: std::sync::Mutex::new(None),
        })
    }

    /// A client that connects on the first try.
    pub fn connectable() -> Arc<Self> {
        Self::connects_on(1)
    }

    /// A client whose daemon is down until `set_reachable(true)`.
    pub fn unreachable() -> Arc<Self> {
        let script = Self::connects_on(1);
        script.set_reachable(false);
        script
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Simulates the daemon dropping the connection.
    pub fn drop_connection(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn connect_calls(&self) -> u32 {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> u32 {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    pub fn address(&self) -> Option<String> {
        self.initialized_address.lock().unwrap().clone()
    }
}

pub struct ScriptedClient {
    name: String,
    script: Arc<Script>,
}

#[async_trait]
impl ConnectionCapability for ScriptedClient {
    fn initialize(&mut self, name: &ClientName, address: &str) {
        self.name = name.to_string();
        *self.script.initialized_address.lock().unwrap() = Some(address.to_string());
    }

    async fn connect(&self) -> bool {
        let calls = self.script.connect_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.script.reachable.load(Ordering::SeqCst)
            && calls >= self.script.succeed_on_attempt.load(Ordering::SeqCst)
        {
            self.script.connected.store(true, Ordering::SeqCst);
        }
        self.script.is_connected()
    }

    async fn disconnect(&self) -> bool {
        self.script.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.script.connected.swap(false, Ordering::SeqCst)
    }

    fn is_connected(&self) -> bool {
        self.script.is_connected()
    }

    fn server_name(&self) -> &str {
        &self.name
    }

    async fn create(&self, _object: &ConfigObject) -> ClientResult<bool> {
        self.require_connection().map(|_| true)
    }

    async fn delete(&self, _object: &ConfigObject, _key: &str) -> ClientResult<bool> {
        self.require_connection().map(|_| true)
    }

    async fn update(
        &self,
        _current: &ConfigObject,
        _desired: &ConfigObject,
        _changed: &[String],
        _key: &str,
    ) -> ClientResult<bool> {
        self.require_connection().map(|_| true)
    }

    async fn get(&self, object: &ConfigObject) -> ClientResult<ConfigObject> {
        self.require_connection().map(|_| object.clone())
    }

    async fn bulk_get(
        &self,
        object: &ConfigObject,
        marker: i64,
        _count: i64,
    ) -> ClientResult<BulkPage> {
        self.require_connection()?;
        Ok(BulkPage {
            objects: vec![object.clone()],
            next_marker: marker + 1,
            more: false,
        })
    }

    async fn execute_action(&self, _object: &ConfigObject) -> ClientResult<()> {
        self.require_connection()
    }
}

impl ScriptedClient {
    fn require_connection(&self) -> ClientResult<()> {
        if self.script.is_connected() {
            Ok(())
        } else {
            Err(ClientError::NotConnected {
                client: self.name.clone(),
            })
        }
    }
}

/// Catalog whose clients follow the given scripts.
pub fn catalog(scripts: &[(&str, &Arc<Script>)]) -> CapabilityCatalog {
    let mut catalog = CapabilityCatalog::new();
    for (name, script) in scripts {
        let script = Arc::clone(script);
        catalog.register(*name, move || {
            Box::new(ScriptedClient {
                name: String::new(),
                script: Arc::clone(&script),
            })
        });
    }
    catalog
}

// ============================================================================
// Files and Registries
// ============================================================================

/// Writes `contents` to `name` inside `dir`.
pub fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).expect("write test file");
    path
}

/// Client descriptor JSON for `(name, port)` pairs.
pub fn clients_json(clients: &[(&str, u16)]) -> String {
    let entries: Vec<String> = clients
        .iter()
        .map(|(name, port)| format!(r#"{{"Name": "{name}", "Port": {port}}}"#))
        .collect();
    format!("[{}]", entries.join(", "))
}

/// Fixed one-second polling, matching the classic 1 Hz retry.
pub fn one_hz() -> RetryPolicy {
    RetryPolicy::fixed(Duration::from_secs(1))
}

/// Builds a registry for the scripted clients (ports assigned from 10001).
pub fn registry_for(scripts: &[(&str, &Arc<Script>)]) -> ClientRegistry {
    registry_with(scripts, one_hz(), CancellationToken::new())
}

pub fn registry_with(
    scripts: &[(&str, &Arc<Script>)],
    policy: RetryPolicy,
    cancel_token: CancellationToken,
) -> ClientRegistry {
    let dir = tempfile::tempdir().expect("create temp dir");
    let ports: Vec<(&str, u16)> = scripts
        .iter()
        .enumerate()
        .map(|(i, (name, _))| (*name, 10001 + i as u16))
        .collect();
    let path = write_file(&dir, "clients.json", &clients_json(&ports));
    let (registry, report) =
        ClientRegistry::build(&path, &catalog(scripts), policy, cancel_token).expect("build registry");
    assert!(report.is_clean(), "unexpected warnings: {report:?}");
    registry
}

/// Waits (in virtual time when paused) until `check` holds.
pub async fn wait_until(limit: Duration, mut check: impl FnMut() -> bool) -> bool {
    let start = tokio::time::Instant::now();
    while start.elapsed() < limit {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    check()
}

/// Connectivity as observed through the registry handle.
pub fn handle_connected(handle: &ClientHandle) -> bool {
    handle.is_connected()
}
