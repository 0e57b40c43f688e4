//! confmgr Daemon - Subsystem client registry and object ownership directory
//!
//! This crate provides the core infrastructure of the configuration manager:
//! - `registry` - Client connection registry for the subsystem daemons
//! - `directory` - Object type → owner/listener directory
//! - `context` - The `ControlPlane` context object tying both together
//! - `status_feed` - Unix socket feed of daemon lifecycle events
//! - `tcp_client` - Connection capability probing a daemon's TCP port
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        confmgrd                              │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  ┌─────────────────┐  StatusEvent  ┌──────────────────────┐  │
//! │  │ StatusFeedServer│──────────────▶│   ClientRegistry     │  │
//! │  │  (Unix socket)  │    (mpsc)     │ (handles, readiness) │  │
//! │  └─────────────────┘               └──────────┬───────────┘  │
//! │                                               │ intents      │
//! │                                               ▼              │
//! │  ┌─────────────────┐               ┌──────────────────────┐  │
//! │  │ ObjectDirectory │──references──▶│  ClientWorker        │  │
//! │  │  (read-only)    │               │  (one per client)    │  │
//! │  └─────────────────┘               └──────────────────────┘  │
//! │                                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod config;
pub mod context;
pub mod directory;
pub mod registry;
pub mod status_feed;
pub mod tcp_client;
