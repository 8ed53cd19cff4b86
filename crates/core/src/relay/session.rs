//! The session supervisor.
//!
//! One [`RelaySession`] exists per accepted client connection. It opens the
//! remote session, runs the inbound pump and the outbound watcher side by
//! side, and tears both ends down on the first of: external cancellation, an
//! inbound failure, or an outbound failure. Later outcomes are ignored.

use super::{AudioForwarder, InboundPump, OutboundWatcher, RelaySettings};
use crate::{
    error::RelayError,
    ports::{ClientWriter, FrameReader, RemoteSession, RemoteSessionFactory},
};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, warn};

/// Lifecycle of a relay session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Opening the remote session.
    Initializing,
    /// Both workers running.
    Active,
    /// A terminal event fired; releasing resources.
    Closing,
    /// Client connection and remote session released.
    Closed,
}

/// The single event that ended an active session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Cancelled,
    InboundFailure(RelayError),
    OutboundFailure(RelayError),
}

impl SessionOutcome {
    /// Collapses the outcome into the session's terminal error.
    pub fn into_result(self) -> Result<(), RelayError> {
        match self {
            SessionOutcome::Cancelled => Err(RelayError::Cancelled),
            SessionOutcome::InboundFailure(err) | SessionOutcome::OutboundFailure(err) => Err(err),
        }
    }
}

pub struct RelaySession {
    reader: Option<Box<dyn FrameReader>>,
    client: ClientWriter,
    factory: Arc<dyn RemoteSessionFactory>,
    remote: Option<Arc<dyn RemoteSession>>,
    settings: RelaySettings,
    state: watch::Sender<SessionState>,
}

impl RelaySession {
    pub fn new(
        reader: Box<dyn FrameReader>,
        client: ClientWriter,
        factory: Arc<dyn RemoteSessionFactory>,
        settings: RelaySettings,
    ) -> Self {
        Self {
            reader: Some(reader),
            client,
            factory,
            remote: None,
            settings,
            state: watch::Sender::new(SessionState::Initializing),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Follows state transitions from another task.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Drives the session to completion.
    ///
    /// Returns `Err` only when the remote session could not be opened; the
    /// client connection is closed in that case too. Otherwise returns the
    /// outcome that ended the session, after both ends have been released.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<SessionOutcome, RelayError> {
        let reader = self
            .reader
            .take()
            .ok_or_else(|| RelayError::remote("relay session already ran"))?;

        let created = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            created = self.factory.create_session() => Some(created),
        };
        let remote = match created {
            None => {
                info!("Cancelled while opening remote session");
                self.teardown().await;
                return Ok(SessionOutcome::Cancelled);
            }
            Some(Err(err)) => {
                error!(error = %err, "Failed to create remote session");
                self.teardown().await;
                return Err(err);
            }
            Some(Ok(remote)) => remote,
        };
        self.remote = Some(remote.clone());
        self.set_state(SessionState::Active);
        info!("Remote session established, relaying audio");

        let workers = cancel.child_token();
        // Capacity 2: both workers can always report without blocking.
        let (outcome_tx, mut outcome_rx) = mpsc::channel::<SessionOutcome>(2);

        let forwarder = AudioForwarder::spawn(remote.clone(), &self.settings, workers.clone());
        let inbound = InboundPump::new(reader, forwarder);
        let inbound_handle = tokio::spawn({
            let tx = outcome_tx.clone();
            let token = workers.clone();
            async move {
                let outcome = match inbound.run(&token).await {
                    RelayError::Cancelled => SessionOutcome::Cancelled,
                    err => SessionOutcome::InboundFailure(err),
                };
                let _ = tx.try_send(outcome);
            }
            .in_current_span()
        });

        let outbound = OutboundWatcher::new(remote, self.client.clone());
        let outbound_handle = tokio::spawn({
            let tx = outcome_tx;
            let token = workers.clone();
            async move {
                let outcome = match outbound.run(&token).await {
                    RelayError::Cancelled => SessionOutcome::Cancelled,
                    err => SessionOutcome::OutboundFailure(err),
                };
                let _ = tx.try_send(outcome);
            }
            .in_current_span()
        });

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => SessionOutcome::Cancelled,
            reported = outcome_rx.recv() => reported.unwrap_or_else(|| {
                SessionOutcome::InboundFailure(RelayError::remote("relay workers exited without reporting"))
            }),
        };
        match &outcome {
            SessionOutcome::Cancelled => info!("Session cancelled"),
            SessionOutcome::InboundFailure(err) => info!(error = %err, "Client side ended the session"),
            SessionOutcome::OutboundFailure(err) => info!(error = %err, "Server side ended the session"),
        }

        workers.cancel();
        // A worker may be parked on a read or write that will never complete;
        // aborting it also releases any writer lock it holds.
        inbound_handle.abort();
        outbound_handle.abort();
        let _ = inbound_handle.await;
        let _ = outbound_handle.await;
        self.teardown().await;

        Ok(outcome)
    }

    /// Closes the client connection, then the remote session.
    ///
    /// Safe to call any number of times; only the first call releases anything.
    /// Release failures are logged, never returned.
    pub async fn teardown(&mut self) {
        if self.state() == SessionState::Closed {
            debug!("Session already closed");
            return;
        }
        if self.state() == SessionState::Active {
            self.set_state(SessionState::Closing);
        }

        if self.client.close().await {
            debug!("Client connection closed");
        }
        if let Some(remote) = self.remote.take() {
            if let Err(err) = remote.close().await {
                warn!(error = %err, "Failed to close remote session");
            }
        }

        self.set_state(SessionState::Closed);
        info!("Session closed");
    }

    fn set_state(&self, state: SessionState) {
        let previous = self.state.send_replace(state);
        debug!(from = ?previous, to = ?state, "Session state changed");
    }
}
