//! The inbound pump: the only reader of the client connection.

use super::AudioForwarder;
use crate::{
    error::RelayError,
    ports::{Frame, FrameReader},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

/// Reads client frames one at a time and hands audio to the forwarder.
pub struct InboundPump {
    reader: Box<dyn FrameReader>,
    forwarder: AudioForwarder,
}

impl InboundPump {
    pub fn new(reader: Box<dyn FrameReader>, forwarder: AudioForwarder) -> Self {
        Self { reader, forwarder }
    }

    /// Runs until the client connection fails or `cancel` fires, and returns
    /// the error that ended it.
    ///
    /// Cancellation is checked before every read. A read already in progress
    /// is not interrupted.
    pub async fn run(mut self, cancel: &CancellationToken) -> RelayError {
        loop {
            if cancel.is_cancelled() {
                return RelayError::Cancelled;
            }

            let frame = match self.reader.read_frame().await {
                Ok(frame) => frame,
                Err(err) => {
                    if err.is_unexpected_close() {
                        error!(error = %err, "WebSocket read error");
                    } else {
                        debug!(error = %err, "Client connection closed");
                    }
                    return err;
                }
            };

            if let Err(err) = self.handle_frame(frame) {
                error!(error = %err, "Message handling error");
            }
        }
    }

    fn handle_frame(&self, frame: Frame) -> Result<(), RelayError> {
        match frame {
            Frame::Binary(payload) => {
                trace!(frame_len = payload.len(), "Audio frame received");
                self.forwarder.submit(payload);
                Ok(())
            }
            other => Err(RelayError::UnsupportedFrame(other.kind())),
        }
    }
}
