// ============================================================================
// ELAsTiCC Config - Centralized configuration management
// ============================================================================
//
// This crate provides centralized configuration for the ELAsTiCC streaming
// services.  Everything loads from environment variables with the defaults
// the production deployment uses.
//
// ============================================================================

mod constants;
mod kafka;
mod streamer;
mod tom;

pub use kafka::KafkaConfig;
pub use streamer::StreamerConfig;
pub use tom::TomConfig;

use anyhow::Result;

/// Main configuration structure for the streaming services.
#[derive(Clone, Debug)]
pub struct Config {
    pub kafka: KafkaConfig,
    pub streamer: StreamerConfig,
    pub tom: TomConfig,
    /// tracing filter directive (RUST_LOG)
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            kafka: KafkaConfig::from_env(),
            streamer: StreamerConfig::from_env()?,
            tom: TomConfig::from_env(),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}
