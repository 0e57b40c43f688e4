//! The client connection registry.
//!
//! `ClientRegistry` owns one `ClientHandle` per known subsystem daemon. The
//! set of handles is fixed at construction; afterwards only connectivity
//! changes.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Readiness channel send failures are logged but don't abort connecting

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use confmgr_core::{
    BuildReport, CapabilityCatalog, ClientName, ConfigWarning, ReadinessEvent, StatusEvent,
};
use confmgr_protocol::{parse_client_descriptors, RawClientDescriptor};

use super::commands::{ClientIntent, RegistryError, WorkerCommand};
use super::handle::{ClientHandle, ClientSnapshot};
use super::retry::{is_progress_tick, RetryPolicy};
use super::worker::ClientWorker;

/// Registry of subsystem client handles.
///
/// # Thread Safety
///
/// The handle map is immutable after construction, so the registry is
/// shared as `Arc<ClientRegistry>` without locks. Connectivity lives in the
/// handles and their capabilities.
///
/// Once the status listener runs, per-client connect and disconnect
/// requests go through the client's worker, so they are ordered with
/// status events for that client.
pub struct ClientRegistry {
    clients: HashMap<ClientName, Arc<ClientHandle>>,

    /// Worker queues, set when the status listener starts
    workers: OnceLock<HashMap<ClientName, mpsc::UnboundedSender<WorkerCommand>>>,

    /// Set once bulk connect completes
    ready: AtomicBool,

    policy: RetryPolicy,

    /// Stops every retry loop and the status listener
    cancel_token: CancellationToken,
}

impl ClientRegistry {
    /// Reads the client descriptor file and builds a handle per known client.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ReadDescriptors` if the file cannot be read
    /// - `RegistryError::ParseDescriptors` if it is not a valid descriptor list
    pub fn build(
        path: impl AsRef<Path>,
        catalog: &CapabilityCatalog,
        policy: RetryPolicy,
        cancel_token: CancellationToken,
    ) -> Result<(Self, BuildReport), RegistryError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| RegistryError::ReadDescriptors {
            path: path.to_path_buf(),
            source,
        })?;
        let descriptors =
            parse_client_descriptors(&contents).map_err(|source| RegistryError::ParseDescriptors {
                path: path.to_path_buf(),
                source,
            })?;

        debug!(path = %path.display(), count = descriptors.len(), "Read client descriptors");
        Ok(Self::from_descriptors(
            &descriptors,
            catalog,
            policy,
            cancel_token,
        ))
    }

    /// Builds the registry from already-parsed descriptors.
    ///
    /// Descriptors naming a daemon the catalog does not know are skipped and
    /// reported. A name listed twice keeps its last entry.
    pub fn from_descriptors(
        descriptors: &[RawClientDescriptor],
        catalog: &CapabilityCatalog,
        policy: RetryPolicy,
        cancel_token: CancellationToken,
    ) -> (Self, BuildReport) {
        let mut clients = HashMap::with_capacity(descriptors.len());
        let mut report = BuildReport::new();

        for descriptor in descriptors {
            let name = descriptor.client_name();
            let Some(mut capability) = catalog.instantiate(name.as_str()) else {
                warn!(client = %name, "No client implementation, skipping");
                report.push(ConfigWarning::UnknownClient {
                    name: descriptor.name.clone(),
                });
                continue;
            };

            let address = descriptor.address();
            capability.initialize(&name, &address);

            if clients.contains_key(&name) {
                warn!(client = %name, port = descriptor.port, "Duplicate client descriptor, later entry wins");
                report.push(ConfigWarning::DuplicateClient {
                    name: descriptor.name.clone(),
                    port: descriptor.port,
                });
            }

            let handle = ClientHandle::new(name.clone(), address, capability);
            clients.insert(name, Arc::new(handle));
        }

        info!(
            clients = clients.len(),
            skipped = descriptors.len().saturating_sub(clients.len()),
            "Client registry built"
        );

        let registry = Self {
            clients,
            workers: OnceLock::new(),
            ready: AtomicBool::new(false),
            policy,
            cancel_token,
        };
        (registry, report)
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    pub fn get(&self, name: &str) -> Option<&Arc<ClientHandle>> {
        self.clients.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.clients.contains_key(name)
    }

    pub fn handles(&self) -> impl Iterator<Item = &Arc<ClientHandle>> {
        self.clients.values()
    }

    /// Known client names, sorted.
    pub fn names(&self) -> Vec<ClientName> {
        let mut names: Vec<ClientName> = self.clients.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    /// True once bulk connect has completed.
    ///
    /// Individual clients disconnecting later do not clear readiness; only
    /// `disconnect_from_all_clients` does.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    // ========================================================================
    // Bulk Connect
    // ========================================================================

    /// Connects every client, retrying until all are connected.
    ///
    /// Each client is reported on `progress` once, as it connects, followed
    /// by a final `ReadinessEvent::InitDone`. Readiness is set before the
    /// sentinel is sent.
    ///
    /// # Errors
    ///
    /// - `RegistryError::Cancelled` if the registry is cancelled first;
    ///   readiness stays false and no sentinel is sent
    pub async fn connect_all(
        &self,
        progress: &mpsc::Sender<ReadinessEvent>,
    ) -> Result<(), RegistryError> {
        let mut pending: Vec<Arc<ClientHandle>> = Vec::new();

        for handle in self.clients.values() {
            if handle.connect().await {
                report_progress(progress, ReadinessEvent::Connected(handle.name().clone())).await;
            } else {
                pending.push(Arc::clone(handle));
            }
        }

        if !pending.is_empty() {
            info!(pending = ?pending_names(&pending), "Looking for clients");
        }

        let mut backoff = self.policy.backoff();
        let mut tick: u32 = 0;

        while !pending.is_empty() {
            tokio::select! {
                biased;

                _ = self.cancel_token.cancelled() => {
                    warn!(pending = ?pending_names(&pending), "Bulk connect cancelled");
                    return Err(RegistryError::Cancelled);
                }

                _ = sleep(backoff.next_delay()) => {}
            }

            if is_progress_tick(tick, self.policy.bulk_progress_every) {
                info!(pending = ?pending_names(&pending), tick, "Waiting to connect to clients");
            }

            let mut still_pending = Vec::with_capacity(pending.len());
            for handle in pending.drain(..) {
                if handle.is_connected() {
                    report_progress(progress, ReadinessEvent::Connected(handle.name().clone()))
                        .await;
                } else {
                    handle.connect().await;
                    still_pending.push(handle);
                }
            }
            pending = still_pending;
            tick = tick.saturating_add(1);
        }

        self.ready.store(true, Ordering::SeqCst);
        info!(clients = self.clients.len(), "Connected to all clients");
        report_progress(progress, ReadinessEvent::InitDone).await;
        Ok(())
    }

    // ========================================================================
    // Event-Driven Reconnection
    // ========================================================================

    /// Consumes daemon status events until the channel closes or the
    /// registry is cancelled.
    ///
    /// `stopped`/`restarting` disconnect the client; `up` reconnects it.
    /// Work is queued to the client's worker, so this loop never waits on a
    /// connection attempt. Events for unknown clients are ignored.
    pub async fn listen_to_status_changes(&self, mut events: mpsc::Receiver<StatusEvent>) {
        let workers = self.workers.get_or_init(|| self.spawn_workers());
        info!(workers = workers.len(), "Listening for client status changes");

        loop {
            let event = tokio::select! {
                biased;

                _ = self.cancel_token.cancelled() => break,

                event = events.recv() => event,
            };

            let Some(event) = event else {
                debug!("Status event channel closed");
                break;
            };

            info!(client = %event.name, status = %event.status, "Received client status");

            let Some(worker) = workers.get(event.name.as_str()) else {
                debug!(client = %event.name, "Ignoring status for unknown client");
                continue;
            };

            let command = WorkerCommand::from(ClientIntent::from(event.status));
            if worker.send(command).is_err() {
                warn!(client = %event.name, "Client worker has stopped");
            }
        }

        info!("Status listener stopped");
    }

    fn spawn_workers(&self) -> HashMap<ClientName, mpsc::UnboundedSender<WorkerCommand>> {
        self.clients
            .iter()
            .map(|(name, handle)| {
                let (tx, rx) = mpsc::unbounded_channel();
                let worker = ClientWorker::new(
                    Arc::clone(handle),
                    rx,
                    self.policy.clone(),
                    self.cancel_token.clone(),
                );
                tokio::spawn(worker.run());
                (name.clone(), tx)
            })
            .collect()
    }

    // ========================================================================
    // Queries and Direct Control
    // ========================================================================

    /// Names of clients that are not connected right now, sorted.
    pub fn unconnected_clients(&self) -> Vec<ClientName> {
        let mut names: Vec<ClientName> = self
            .clients
            .values()
            .filter(|handle| !handle.is_connected())
            .map(|handle| handle.name().clone())
            .collect();
        names.sort();
        names
    }

    /// Disconnects `name` if it is known and connected.
    ///
    /// While the status listener runs, the request is queued behind the
    /// client's earlier work and aborts a reconnect in progress.
    ///
    /// Returns true if a disconnect was issued.
    pub async fn disconnect_from_client(&self, name: &str) -> bool {
        let Some(handle) = self.clients.get(name) else {
            debug!(client = name, "Disconnect requested for unknown client");
            return false;
        };

        if let Some(issued) = self.ask_worker(name, ClientIntent::Disconnect).await {
            return issued;
        }
        handle.disconnect_if_connected().await
    }

    /// Connects `name`, retrying with backoff until it connects.
    ///
    /// While the status listener runs, the client's worker does the
    /// retrying; a later disconnect for the client ends the wait with false.
    ///
    /// Returns false for unknown clients or if the registry is cancelled
    /// first.
    pub async fn connect_to_client(&self, name: &str) -> bool {
        let Some(handle) = self.clients.get(name) else {
            debug!(client = name, "Connect requested for unknown client");
            return false;
        };

        if let Some(connected) = self.ask_worker(name, ClientIntent::Connect).await {
            return connected;
        }

        let mut backoff = self.policy.backoff();
        let mut attempt: u32 = 0;

        while !handle.is_connected() {
            attempt = attempt.saturating_add(1);
            if is_progress_tick(attempt, self.policy.reconnect_progress_every) {
                info!(client = name, attempt, "Connecting to client");
            }
            if handle.connect().await {
                break;
            }

            tokio::select! {
                biased;

                _ = self.cancel_token.cancelled() => return false,

                _ = sleep(backoff.next_delay()) => {}
            }
        }
        true
    }

    /// Disconnects every connected client and clears readiness.
    ///
    /// Returns the number of clients disconnected.
    pub async fn disconnect_from_all_clients(&self) -> usize {
        let mut disconnected = 0;
        for name in self.clients.keys() {
            if self.disconnect_from_client(name.as_str()).await {
                disconnected += 1;
            }
        }
        self.ready.store(false, Ordering::SeqCst);
        info!(disconnected, "Disconnected from all clients");
        disconnected
    }

    /// Queues `intent` to the client's worker and waits for the outcome.
    ///
    /// `None` if no worker is running for the client; the caller then acts
    /// on the handle directly.
    async fn ask_worker(&self, name: &str, intent: ClientIntent) -> Option<bool> {
        let worker = self.workers.get()?.get(name)?;
        let (command, reply) = WorkerCommand::with_reply(intent);
        if worker.send(command).is_err() {
            return None;
        }
        reply.await.ok()
    }

    /// Status of every client, sorted by name.
    pub fn snapshot(&self) -> Vec<ClientSnapshot> {
        let mut snapshots: Vec<ClientSnapshot> =
            self.clients.values().map(|handle| handle.snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("clients", &self.names())
            .field("ready", &self.is_ready())
            .finish()
    }
}

async fn report_progress(progress: &mpsc::Sender<ReadinessEvent>, event: ReadinessEvent) {
    // Ignore send error - the caller may have stopped watching progress
    if progress.send(event).await.is_err() {
        debug!("Readiness receiver dropped");
    }
}

fn pending_names(pending: &[Arc<ClientHandle>]) -> Vec<&str> {
    pending.iter().map(|handle| handle.name().as_str()).collect()
}
