//! Error taxonomy for the relay pipeline.
//!
//! Errors fall into two groups. Per-frame errors (`MalformedAudio`,
//! `UnsupportedFrame`) are recovered where they happen: logged, and the pump
//! keeps reading. Everything else is terminal for the worker that hit it and
//! drives the session into teardown.

use crate::ports::FrameKind;

/// Every failure the relay can observe.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// An audio payload that cannot be decoded as PCM16 (odd length, bad rate).
    #[error("malformed audio: {0}")]
    MalformedAudio(String),
    /// A frame kind the relay does not handle reached the inbound pump.
    #[error("unhandled message type: {0}")]
    UnsupportedFrame(FrameKind),
    /// Reading from the client connection failed.
    ///
    /// `expected` is true for normal closure (close frame with a normal or
    /// going-away code, or the stream simply ending) and only changes the log
    /// severity.
    #[error("client read failed: {message}")]
    TransportRead { expected: bool, message: String },
    /// Writing to the client connection failed.
    #[error("client write failed: {0}")]
    TransportWrite(String),
    /// Establishing or talking to the remote session failed.
    #[error("remote session error: {0}")]
    RemoteSession(String),
    /// The governing cancellation token fired.
    #[error("session cancelled")]
    Cancelled,
}

impl RelayError {
    /// Builds a remote-session error from anything displayable.
    pub fn remote(err: impl std::fmt::Display) -> Self {
        Self::RemoteSession(err.to_string())
    }

    /// True when the error is the cancellation outcome rather than a fault.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// True for errors scoped to a single frame, which never end a session.
    pub fn is_per_frame(&self) -> bool {
        matches!(self, Self::MalformedAudio(_) | Self::UnsupportedFrame(_))
    }

    /// True for a read failure caused by an abnormal or unexpected closure.
    pub fn is_unexpected_close(&self) -> bool {
        matches!(self, Self::TransportRead { expected: false, .. })
    }
}
