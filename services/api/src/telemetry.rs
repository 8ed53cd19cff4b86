//! Tracing initialisation for the service binary.

use crate::config::{Config, LogFormat};
use tracing_subscriber::{EnvFilter, fmt::time::ChronoLocal};

/// Installs the global tracing subscriber.
///
/// JSON output carries one object per event with its span context, which is
/// what log shippers in front of the service expect. `pretty` is for local runs.
pub fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(ChronoLocal::rfc_3339())
        .with_target(true);

    match config.log_format {
        LogFormat::Json => builder.json().with_current_span(true).init(),
        LogFormat::Pretty => builder.init(),
    }
}
