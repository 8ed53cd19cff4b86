//! Remote conversational session providers.
//!
//! Only the realtime WebSocket API (OpenAI or Azure OpenAI) is implemented.

pub mod realtime;

pub use realtime::{RealtimeSession, RealtimeSessionFactory};
