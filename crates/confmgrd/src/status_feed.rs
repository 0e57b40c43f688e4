//! Unix socket feed of daemon status events.
//!
//! The process supervisor connects to this socket and writes one JSON line
//! per lifecycle change. Each parsed line becomes a `StatusEvent` on the
//! channel consumed by `ClientRegistry::listen_to_status_changes`.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Malformed lines are logged and skipped
//! - A closed event channel stops the feed

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use confmgr_core::StatusEvent;
use confmgr_protocol::{parse_status_line, MAX_STATUS_LINE};

/// Errors from the status feed server.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to set up status socket {}: {error}", .path.display())]
    SocketSetup { path: PathBuf, error: String },
}

/// Listens for status lines and forwards them as events.
pub struct StatusFeedServer {
    socket_path: PathBuf,
    events: mpsc::Sender<StatusEvent>,
    cancel_token: CancellationToken,
}

impl StatusFeedServer {
    pub fn new(
        socket_path: impl Into<PathBuf>,
        events: mpsc::Sender<StatusEvent>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            socket_path: socket_path.into(),
            events,
            cancel_token,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Accepts feed connections until cancelled or the event channel closes.
    pub async fn run(&self) -> Result<(), FeedError> {
        let listener = self.bind()?;

        info!(socket = %self.socket_path.display(), "Status feed listening");

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Status feed shutdown requested");
                    break;
                }

                _ = self.events.closed() => {
                    info!("Status event consumer gone, closing feed");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => self.spawn_reader(stream),
                        Err(e) => {
                            error!(error = %e, "Failed to accept status feed connection");
                        }
                    }
                }
            }
        }

        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            debug!(error = %e, "Failed to remove status socket");
        }
        Ok(())
    }

    fn bind(&self) -> Result<UnixListener, FeedError> {
        let setup_error = |e: std::io::Error| FeedError::SocketSetup {
            path: self.socket_path.clone(),
            error: e.to_string(),
        };

        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(setup_error)?;
        }
        if let Some(parent) = self.socket_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(setup_error)?;
            }
        }
        UnixListener::bind(&self.socket_path).map_err(setup_error)
    }

    fn spawn_reader(&self, stream: UnixStream) {
        let events = self.events.clone();
        let cancel_token = self.cancel_token.clone();
        tokio::spawn(async move {
            read_status_lines(stream, events, cancel_token).await;
        });
    }
}

/// Reads status lines from one feed connection.
async fn read_status_lines(
    stream: UnixStream,
    events: mpsc::Sender<StatusEvent>,
    cancel_token: CancellationToken,
) {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();

    loop {
        line.clear();
        let read = tokio::select! {
            _ = cancel_token.cancelled() => break,
            read = reader.read_line(&mut line) => read,
        };

        match read {
            Ok(0) => {
                debug!("Status feed connection closed");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Status feed read failed");
                break;
            }
        }

        if line.trim().is_empty() {
            continue;
        }

        match parse_status_line(&line) {
            Ok(event) => {
                debug!(client = %event.name, status = %event.status, "Status line received");
                if events.send(event).await.is_err() {
                    debug!("Status event channel closed");
                    break;
                }
            }
            Err(e) => {
                let preview: String = line.trim().chars().take(80).collect();
                warn!(error = %e, line = %preview, max = MAX_STATUS_LINE, "Ignoring status line");
            }
        }
    }
}
