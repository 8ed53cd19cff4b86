//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the resources every
//! relayed connection needs: the remote session factory, the relay tunables
//! and the process-wide shutdown token.

use crate::config::Config;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use voicelink_core::{RelaySettings, ports::RemoteSessionFactory};

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub remote_factory: Arc<dyn RemoteSessionFactory>,
    pub relay_settings: RelaySettings,
    /// Cancelled on shutdown; every session runs under a child of this token.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: Config, remote_factory: Arc<dyn RemoteSessionFactory>) -> Self {
        let relay_settings = config.relay_settings();
        Self {
            config: Arc::new(config),
            remote_factory,
            relay_settings,
            shutdown: CancellationToken::new(),
        }
    }
}
