//! Relays the remote session's events to the client, in order, untouched.

use crate::{
    error::RelayError,
    ports::{ClientWriter, RemoteSession},
};
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct OutboundWatcher {
    remote: Arc<dyn RemoteSession>,
    client: ClientWriter,
}

impl OutboundWatcher {
    pub fn new(remote: Arc<dyn RemoteSession>, client: ClientWriter) -> Self {
        Self { remote, client }
    }

    /// Runs until the remote stream or the client write path fails, or until
    /// `cancel` fires. The end of the remote stream counts as a failure.
    pub async fn run(self, cancel: &CancellationToken) -> RelayError {
        let mut events = tokio::select! {
            biased;
            _ = cancel.cancelled() => return RelayError::Cancelled,
            events = self.remote.watch_events() => match events {
                Ok(events) => events,
                Err(err) => return err,
            },
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return RelayError::Cancelled,
                next = events.next() => next,
            };

            match next {
                Some(Ok(event)) => {
                    debug!(event_kind = %event.kind, "Relaying server event");
                    // A client that stops reading must not pin the writer lock
                    // past cancellation.
                    let written = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return RelayError::Cancelled,
                        written = self.client.send_text(event.raw) => written,
                    };
                    if let Err(err) = written {
                        return err;
                    }
                }
                Some(Err(err)) => return err,
                None => return RelayError::remote("server event stream ended"),
            }
        }
    }
}
