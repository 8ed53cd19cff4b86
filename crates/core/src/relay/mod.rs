//! The bidirectional relay between one client connection and one remote session.
//!
//! - `session`: the supervisor state machine that owns both ends and tears them down.
//! - `inbound`: the single reader loop over client frames.
//! - `forwarder`: the bounded worker pool that transcodes audio and appends it remotely.
//! - `outbound`: relays remote events back to the client in order.

mod forwarder;
mod inbound;
mod outbound;
pub mod session;
#[cfg(test)]
pub(crate) mod testing;

pub use forwarder::AudioForwarder;
pub use inbound::InboundPump;
pub use outbound::OutboundWatcher;
pub use session::{RelaySession, SessionOutcome, SessionState};

use crate::audio::{DEVICE_PCM16_SAMPLE_RATE, REALTIME_PCM16_SAMPLE_RATE};

/// Tunables for one relayed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySettings {
    /// Rate of the PCM16 the client sends.
    pub source_rate: u32,
    /// Rate the remote session expects.
    pub target_rate: u32,
    /// Number of concurrent transcode-and-append workers.
    pub audio_workers: usize,
    /// Frames that may wait for a worker before new ones are dropped.
    pub audio_queue_depth: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            source_rate: DEVICE_PCM16_SAMPLE_RATE,
            target_rate: REALTIME_PCM16_SAMPLE_RATE,
            audio_workers: 4,
            audio_queue_depth: 64,
        }
    }
}
