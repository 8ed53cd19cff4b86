use std::{fmt::Display, net::SocketAddr, str::FromStr};
use tracing_subscriber::EnvFilter;
use voicelink_core::{
    RelaySettings,
    audio::{DEVICE_PCM16_SAMPLE_RATE, REALTIME_PCM16_SAMPLE_RATE},
};

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which flavour of realtime endpoint the relay talks to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provider {
    /// Azure OpenAI, authenticated with an `api-key` header.
    Azure,
    /// api.openai.com, authenticated with a bearer token.
    OpenAI,
}

/// Output format for log lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub provider: Provider,
    pub realtime_url: String,
    pub realtime_api_key: String,
    pub realtime_instructions: Option<String>,
    pub device_sample_rate: u32,
    pub remote_sample_rate: u32,
    pub audio_workers: usize,
    pub audio_queue_depth: usize,
    /// `RUST_LOG` filter directives, e.g. `info,voicelink_core=debug`.
    pub log_filter: String,
    pub log_format: LogFormat,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let provider_str =
            std::env::var("REALTIME_PROVIDER").unwrap_or_else(|_| "azure".to_string());
        let provider = match provider_str.to_lowercase().as_str() {
            "azure" => Provider::Azure,
            "openai" => Provider::OpenAI,
            other => {
                return Err(ConfigError::InvalidValue(
                    "REALTIME_PROVIDER".to_string(),
                    format!("'{}' is not one of 'azure', 'openai'", other),
                ));
            }
        };

        let realtime_url = std::env::var("REALTIME_URL")
            .map_err(|_| ConfigError::MissingVar("REALTIME_URL".to_string()))?;
        if !(realtime_url.starts_with("wss://") || realtime_url.starts_with("ws://")) {
            return Err(ConfigError::InvalidValue(
                "REALTIME_URL".to_string(),
                "must be a ws:// or wss:// URL".to_string(),
            ));
        }
        let realtime_api_key = std::env::var("REALTIME_API_KEY")
            .map_err(|_| ConfigError::MissingVar("REALTIME_API_KEY".to_string()))?;
        let realtime_instructions = std::env::var("REALTIME_INSTRUCTIONS")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let device_sample_rate = positive_var("DEVICE_SAMPLE_RATE", DEVICE_PCM16_SAMPLE_RATE)?;
        let remote_sample_rate = positive_var("REMOTE_SAMPLE_RATE", REALTIME_PCM16_SAMPLE_RATE)?;
        let audio_workers = positive_var("AUDIO_WORKERS", 4usize)?;
        let audio_queue_depth = positive_var("AUDIO_QUEUE_DEPTH", 64usize)?;

        let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        EnvFilter::try_new(&log_filter)
            .map_err(|e| ConfigError::InvalidValue("RUST_LOG".to_string(), e.to_string()))?;

        let log_format = match std::env::var("LOG_FORMAT")
            .unwrap_or_else(|_| "json".to_string())
            .to_lowercase()
            .as_str()
        {
            "json" => LogFormat::Json,
            "pretty" | "text" => LogFormat::Pretty,
            other => {
                return Err(ConfigError::InvalidValue(
                    "LOG_FORMAT".to_string(),
                    format!("'{}' is not one of 'json', 'pretty'", other),
                ));
            }
        };

        Ok(Self {
            bind_address,
            provider,
            realtime_url,
            realtime_api_key,
            realtime_instructions,
            device_sample_rate,
            remote_sample_rate,
            audio_workers,
            audio_queue_depth,
            log_filter,
            log_format,
        })
    }

    /// The relay tunables derived from this configuration.
    pub fn relay_settings(&self) -> RelaySettings {
        RelaySettings {
            source_rate: self.device_sample_rate,
            target_rate: self.remote_sample_rate,
            audio_workers: self.audio_workers,
            audio_queue_depth: self.audio_queue_depth,
        }
    }
}

/// Reads an optional numeric variable that must be greater than zero.
fn positive_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialEq + Default,
    T::Err: Display,
{
    let Ok(raw) = std::env::var(name) else {
        return Ok(default);
    };
    let value = raw
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))?;
    if value == T::default() {
        return Err(ConfigError::InvalidValue(
            name.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(value)
}
