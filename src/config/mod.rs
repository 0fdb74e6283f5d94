//! Configuration management for the ingest pipeline.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support (`CONFIG_PATH`)
//! - Environment variable overrides (highest priority)
//! - Component-wise validation
mod accounts;
mod reconciler;
mod roster;
pub use accounts::*;
pub use reconciler::*;
pub use roster::*;

#[cfg(test)]
mod reconciler_test;

//---
use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Main configuration container for the collector.
///
/// The flat fields map one-to-one onto the required environment variables
/// (`ACCOUNTS_PATH`, `TWITCH_IRC_URI`, ...). Nested sections are overridable
/// with a `__` separator, e.g. `RECONCILER__BURST=4`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IngestConfig {
    /// Path to the account JSON file
    #[serde(default)]
    pub accounts_path: String,

    /// Path to the OAuth token JSON file
    #[serde(default)]
    pub tokens_path: String,

    /// Path to the persisted desired-set JSON file
    #[serde(default)]
    pub channels_path: String,

    /// IRC-over-WebSocket endpoint, e.g. `wss://irc-ws.chat.twitch.tv:443`
    #[serde(default)]
    pub twitch_irc_uri: String,

    /// HTTP control surface bind host
    #[serde(default)]
    pub http_api_host: String,

    /// HTTP control surface bind port
    #[serde(default)]
    pub http_api_port: u16,

    /// Port reserved for the external OAuth helper (validated, unused here)
    #[serde(default)]
    pub oauth_server_port: u16,

    /// Downstream bus broker list, comma separated
    #[serde(default)]
    pub kafka_brokers: String,

    /// Downstream bus topic for chat events
    #[serde(default)]
    pub kafka_topic: String,

    /// Log level when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Deployment environment tag attached to every log line
    #[serde(default)]
    pub app_env: String,

    /// Reconciler rate/timeout tunables
    #[serde(default)]
    pub reconciler: ReconcilerConfig,

    /// Desired-set store tunables
    #[serde(default)]
    pub roster: RosterConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            accounts_path: String::new(),
            tokens_path: String::new(),
            channels_path: String::new(),
            twitch_irc_uri: String::new(),
            http_api_host: String::new(),
            http_api_port: 0,
            oauth_server_port: 0,
            kafka_brokers: String::new(),
            kafka_topic: String::new(),
            log_level: default_log_level(),
            app_env: String::new(),
            reconciler: ReconcilerConfig::default(),
            roster: RosterConfig::default(),
        }
    }
}

impl IngestConfig {
    /// Loads the merged configuration.
    ///
    /// Sources are merged in order (later overrides earlier):
    /// 1. Type defaults
    /// 2. Configuration file from the `CONFIG_PATH` environment variable
    /// 3. Environment variables
    ///
    /// Every required variable is validated here; a missing one fails
    /// startup.
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path));
        }

        builder = builder.add_source(
            Environment::default()
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validates cross-component configuration rules.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("ACCOUNTS_PATH", &self.accounts_path),
            ("TOKENS_PATH", &self.tokens_path),
            ("CHANNELS_PATH", &self.channels_path),
            ("TWITCH_IRC_URI", &self.twitch_irc_uri),
            ("HTTP_API_HOST", &self.http_api_host),
            ("KAFKA_BROKERS", &self.kafka_brokers),
            ("KAFKA_TOPIC", &self.kafka_topic),
        ] {
            if value.trim().is_empty() {
                return Err(Error::InvalidConfig(format!("{name} missing")));
            }
        }

        if self.http_api_port <= 1 || self.http_api_port == u16::MAX {
            return Err(Error::InvalidConfig(
                "HTTP_API_PORT out of bounds".to_string(),
            ));
        }
        if self.oauth_server_port == 0 {
            return Err(Error::InvalidConfig(
                "OAUTH_SERVER_PORT missing".to_string(),
            ));
        }

        self.reconciler.validate()?;
        self.roster.validate()?;
        Ok(())
    }
}
