//! voicelink API Library Crate
//!
//! Everything the relay service needs around `voicelink-core`: configuration,
//! tracing setup, the axum router and WebSocket endpoint, and the realtime
//! remote session provider. The `api` binary is a thin wrapper around this
//! library.

pub mod config;
pub mod handlers;
pub mod provider;
pub mod router;
pub mod state;
pub mod telemetry;
pub mod ws;
