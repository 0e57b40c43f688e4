//! Per-client worker - serialises connect/disconnect work for one client.
//!
//! Every known client gets exactly one `ClientWorker`. Status events and
//! operator requests are turned into `WorkerCommand`s and queued to the
//! worker, which handles them one at a time in arrival order. Two requests
//! for the same client can therefore never race, while different clients
//! still progress concurrently.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - A closed command channel ends the worker instead of failing
//! - Reply send failures are ignored

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::commands::{ClientIntent, WorkerCommand};
use super::handle::ClientHandle;
use super::retry::{is_progress_tick, RetryPolicy};

/// Serial executor of commands for one client.
pub struct ClientWorker {
    handle: Arc<ClientHandle>,
    receiver: mpsc::UnboundedReceiver<WorkerCommand>,
    policy: RetryPolicy,
    cancel_token: CancellationToken,
}

/// How a reconnect loop ended.
enum ReconnectOutcome {
    Connected,
    /// Cancelled or the command channel closed
    Stopped,
    /// A disconnect arrived; it has not been handled yet
    Interrupted(WorkerCommand),
}

impl ClientWorker {
    pub fn new(
        handle: Arc<ClientHandle>,
        receiver: mpsc::UnboundedReceiver<WorkerCommand>,
        policy: RetryPolicy,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            handle,
            receiver,
            policy,
            cancel_token,
        }
    }

    /// Runs until the command channel closes or the token is cancelled.
    pub async fn run(mut self) {
        debug!(client = %self.handle.name(), "Client worker starting");

        loop {
            let command = tokio::select! {
                biased;

                _ = self.cancel_token.cancelled() => break,

                command = self.receiver.recv() => command,
            };

            let Some(command) = command else {
                break;
            };

            // A reconnect loop may be cut short by a later disconnect, which
            // then runs next.
            let mut next = Some(command);
            while let Some(command) = next.take() {
                next = self.apply(command).await;
            }
        }

        debug!(client = %self.handle.name(), "Client worker stopped");
    }

    async fn apply(&mut self, command: WorkerCommand) -> Option<WorkerCommand> {
        let WorkerCommand { intent, respond_to } = command;
        match intent {
            ClientIntent::Disconnect => {
                let issued = self.handle.disconnect_if_connected().await;
                WorkerCommand::reply(respond_to, issued);
                None
            }
            ClientIntent::Connect => {
                let mut waiters: Vec<oneshot::Sender<bool>> = respond_to.into_iter().collect();
                let outcome = self.reconnect(&mut waiters).await;

                let connected = matches!(outcome, ReconnectOutcome::Connected);
                for waiter in waiters {
                    WorkerCommand::reply(Some(waiter), connected);
                }

                match outcome {
                    ReconnectOutcome::Interrupted(command) => Some(command),
                    _ => None,
                }
            }
        }
    }

    /// Connects, retrying with backoff until connected.
    ///
    /// Connect requests arriving meanwhile join `waiters` and are answered
    /// with the loop's outcome.
    async fn reconnect(&mut self, waiters: &mut Vec<oneshot::Sender<bool>>) -> ReconnectOutcome {
        let name = self.handle.name().clone();
        if self.handle.is_connected() {
            debug!(client = %name, "Client already connected");
            return ReconnectOutcome::Connected;
        }

        let mut backoff = self.policy.backoff();
        let mut attempt: u32 = 0;

        loop {
            attempt = attempt.saturating_add(1);

            if is_progress_tick(attempt, self.policy.reconnect_progress_every) {
                info!(client = %name, attempt, "Connecting to client");
            }

            // Another path (bulk connect, an operator) may have connected us.
            if self.handle.is_connected() || self.handle.connect().await {
                debug!(client = %name, attempt, "Reconnect succeeded");
                return ReconnectOutcome::Connected;
            }

            // Redundant connect requests must not cut the wait short.
            let wait = sleep(backoff.next_delay());
            tokio::pin!(wait);

            loop {
                tokio::select! {
                    biased;

                    _ = self.cancel_token.cancelled() => {
                        debug!(client = %name, "Reconnect cancelled");
                        return ReconnectOutcome::Stopped;
                    }

                    command = self.receiver.recv() => match command {
                        Some(WorkerCommand { intent: ClientIntent::Connect, respond_to }) => {
                            debug!(client = %name, "Reconnect already in progress");
                            waiters.extend(respond_to);
                        }
                        Some(command) => {
                            info!(client = %name, attempt, "Reconnect aborted by disconnect");
                            return ReconnectOutcome::Interrupted(command);
                        }
                        None => return ReconnectOutcome::Stopped,
                    },

                    _ = &mut wait => break,
                }
            }
        }
    }
}
