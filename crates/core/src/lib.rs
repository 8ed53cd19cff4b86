//! voicelink core
//!
//! Relays a hardware device's PCM16 audio stream to a remote conversational
//! session and the session's events back to the device. This crate holds the
//! transport-agnostic pieces: the audio transcoder, the ports the relay talks
//! through, and the relay itself. `voicelink-api` wires it to axum and a
//! realtime WebSocket provider.

pub mod audio;
pub mod error;
pub mod ports;
pub mod relay;

pub use error::RelayError;
pub use relay::{RelaySession, RelaySettings, SessionOutcome, SessionState};
