//! WebSocket Relay Endpoint
//!
//! - `connection`: adapts an axum `WebSocket` to the relay's frame ports.
//! - `handler`: upgrades the request and runs one relay session per connection.

pub mod connection;
mod handler;

pub use handler::ws_handler;
