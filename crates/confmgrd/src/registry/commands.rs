//! Client worker intents and registry errors.
//!
//! This module defines the message types of the registry:
//! - `ClientIntent`: What a per-client worker is asked to do
//! - `WorkerCommand`: An intent plus an optional reply channel
//! - `RegistryError`: Errors that can occur building or running the registry

use std::path::PathBuf;

use confmgr_core::DaemonStatus;
use confmgr_protocol::DescriptorError;
use thiserror::Error;
use tokio::sync::oneshot;

// ============================================================================
// Client Intents
// ============================================================================

/// Work queued to a client's worker.
///
/// Intents for one client are handled strictly in the order they were sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientIntent {
    /// Connect, retrying until connected or told otherwise.
    Connect,
    /// Disconnect if connected; aborts a reconnect in progress.
    Disconnect,
}

impl From<DaemonStatus> for ClientIntent {
    fn from(status: DaemonStatus) -> Self {
        if status.is_down() {
            Self::Disconnect
        } else {
            Self::Connect
        }
    }
}

/// A queued intent, optionally answered once handled.
///
/// The reply is `true` if a `Disconnect` closed a connection, or if a
/// `Connect` ended with the client connected. Status events carry no reply.
#[derive(Debug)]
pub struct WorkerCommand {
    pub intent: ClientIntent,
    pub respond_to: Option<oneshot::Sender<bool>>,
}

impl WorkerCommand {
    /// A command whose outcome is sent back on the returned receiver.
    pub fn with_reply(intent: ClientIntent) -> (Self, oneshot::Receiver<bool>) {
        let (tx, rx) = oneshot::channel();
        let command = Self {
            intent,
            respond_to: Some(tx),
        };
        (command, rx)
    }

    /// Sends the outcome, if anyone is waiting for it.
    pub fn reply(respond_to: Option<oneshot::Sender<bool>>, outcome: bool) {
        if let Some(tx) = respond_to {
            // Ignore send error - the caller may have given up waiting
            let _ = tx.send(outcome);
        }
    }
}

impl From<ClientIntent> for WorkerCommand {
    fn from(intent: ClientIntent) -> Self {
        Self {
            intent,
            respond_to: None,
        }
    }
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The client descriptor file could not be read.
    #[error("failed to read client descriptors from {}: {source}", .path.display())]
    ReadDescriptors {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The client descriptor file is not valid.
    #[error("failed to parse client descriptors in {}: {source}", .path.display())]
    ParseDescriptors {
        path: PathBuf,
        #[source]
        source: DescriptorError,
    },

    /// The registry was shut down before the operation finished.
    #[error("registry cancelled")]
    Cancelled,
}
