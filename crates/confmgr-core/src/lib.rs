//! confmgr Core - Shared types for the configuration manager
//!
//! This crate provides the domain types shared between the daemon
//! (`confmgrd`), the descriptor/status formats (`confmgr-protocol`) and
//! the subsystem client implementations.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod capability;
pub mod client;
pub mod error;
pub mod object;
pub mod status;
pub mod warning;

// Re-exports for convenience
pub use capability::{BulkPage, CapabilityCatalog, ConnectionCapability};
pub use client::ClientName;
pub use error::{ClientError, ClientResult};
pub use object::{Access, ConfigObject};
pub use status::{DaemonStatus, ReadinessEvent, StatusEvent, UnknownStatus, CLIENT_INIT_DONE};
pub use warning::{BuildReport, ConfigWarning};
