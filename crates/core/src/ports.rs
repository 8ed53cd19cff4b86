//! Boundaries between the relay and the outside world.
//!
//! The relay never touches a concrete transport. The client connection is
//! reached through [`FrameReader`] and [`FrameWriter`], the remote
//! conversational session through [`RemoteSessionFactory`] and
//! [`RemoteSession`]. The service crate provides the WebSocket and realtime
//! implementations; tests provide in-memory ones.

use crate::error::RelayError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::{fmt, pin::Pin, sync::Arc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// The kind tag of a [`Frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Text,
    Binary,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameKind::Text => f.write_str("text"),
            FrameKind::Binary => f.write_str("binary"),
        }
    }
}

/// One data message read from the client connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    /// Raw little-endian PCM16 mono audio.
    Binary(Bytes),
}

impl Frame {
    pub fn kind(&self) -> FrameKind {
        match self {
            Frame::Text(_) => FrameKind::Text,
            Frame::Binary(_) => FrameKind::Binary,
        }
    }
}

/// The read half of a client connection.
///
/// Implementations answer control frames themselves and surface a close
/// frame or the end of the stream as [`RelayError::TransportRead`].
#[async_trait]
pub trait FrameReader: Send {
    async fn read_frame(&mut self) -> Result<Frame, RelayError>;
}

/// The write half of a client connection.
#[async_trait]
pub trait FrameWriter: Send {
    async fn write_text(&mut self, text: String) -> Result<(), RelayError>;
    /// Sends a normal-closure control frame.
    async fn write_close(&mut self) -> Result<(), RelayError>;
    /// Releases the underlying transport.
    async fn shutdown(&mut self) -> Result<(), RelayError>;
}

struct WriterSlot {
    writer: Box<dyn FrameWriter>,
    closed: bool,
}

/// Single-writer handle to the client connection, shared by every task that
/// writes to it.
///
/// All writes, including the close handshake, serialise on one mutex. Once
/// closed, further writes fail without touching the transport.
#[derive(Clone)]
pub struct ClientWriter {
    inner: Arc<Mutex<WriterSlot>>,
}

impl ClientWriter {
    pub fn new(writer: impl FrameWriter + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(WriterSlot {
                writer: Box::new(writer),
                closed: false,
            })),
        }
    }

    pub async fn send_text(&self, text: String) -> Result<(), RelayError> {
        let mut slot = self.inner.lock().await;
        if slot.closed {
            return Err(RelayError::TransportWrite("connection already closed".into()));
        }
        slot.writer.write_text(text).await
    }

    /// Sends a normal-closure frame (best effort) and releases the transport.
    ///
    /// Returns `true` if this call performed the close, `false` if the
    /// connection had already been closed.
    pub async fn close(&self) -> bool {
        let mut slot = self.inner.lock().await;
        if slot.closed {
            return false;
        }
        slot.closed = true;
        if let Err(e) = slot.writer.write_close().await {
            debug!(error = %e, "Failed to send close frame to client");
        }
        if let Err(e) = slot.writer.shutdown().await {
            warn!(error = %e, "Failed to release client connection");
        }
        true
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.closed
    }
}

/// One message emitted by the remote session, relayed verbatim to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEvent {
    /// The event's `type` field, or `"unknown"` when it has none.
    pub kind: String,
    pub raw: String,
}

impl RemoteEvent {
    pub fn from_text(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let kind = serde_json::from_str::<serde_json::Value>(&raw)
            .ok()
            .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(str::to_owned))
            .unwrap_or_else(|| "unknown".to_string());
        Self { kind, raw }
    }
}

/// A lazy, effectively infinite sequence of remote events.
pub type RemoteEventStream = Pin<Box<dyn Stream<Item = Result<RemoteEvent, RelayError>> + Send>>;

/// An established remote conversational session.
///
/// `append_audio` may be called concurrently from several tasks while another
/// task drains the stream returned by `watch_events`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Appends base64 PCM16 audio to the session's input buffer.
    async fn append_audio(&self, encoded: String) -> Result<(), RelayError>;

    /// Hands out the session's event stream. Only the first call succeeds.
    async fn watch_events(&self) -> Result<RemoteEventStream, RelayError>;

    async fn close(&self) -> Result<(), RelayError>;
}

/// Opens remote sessions, one per relayed client.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteSessionFactory: Send + Sync {
    async fn create_session(&self) -> Result<Arc<dyn RemoteSession>, RelayError>;
}
