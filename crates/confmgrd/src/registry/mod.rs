//! Client connection registry.
//!
//! The registry owns a handle per subsystem daemon, brings every client up
//! at startup and keeps connections in step with the daemons' lifecycle.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  Status Feed    │────▶│ ClientRegistry  │────▶│  ClientWorker   │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//!         │                       │                       │
//!         │   StatusEvent         │   WorkerCommand       │  connect /
//!         │   (mpsc channel)      │   (one queue per      │  disconnect
//!         ▼                       ▼    client)            ▼
//!    up / stopped /         HashMap<ClientName,     ConnectionCapability
//!    restarting             Arc<ClientHandle>>
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

mod clients;
mod commands;
mod handle;
mod retry;
mod worker;

pub use clients::ClientRegistry;
pub use commands::{ClientIntent, RegistryError, WorkerCommand};
pub use handle::{ClientHandle, ClientSnapshot};
pub use retry::{Backoff, RetryPolicy};
pub use worker::ClientWorker;
