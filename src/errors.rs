//! Ingest Pipeline Error Hierarchy
//!
//! Defines error types for the collector, categorized by operational
//! concern: configuration, persisted state, transport, and the downstream
//! bus. Protocol-malformed input is never an error; the classifier logs and
//! drops it.

use std::path::PathBuf;

use config::ConfigError;
use tokio::task::JoinError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration loading/merging failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Configuration validation failures (exit at startup)
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Persisted desired-set failures
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Socket and HTTP listener failures
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Downstream bus failures
    #[error(transparent)]
    Bus(#[from] BusError),

    /// Background task failures
    #[error("Background task failed: {0}")]
    TaskFailed(#[from] JoinError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Disk I/O failures during desired-set persistence
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// I/O failure with path context
    #[error("Error occurred at path: {path}")]
    PathError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serialization failures for persisted data
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    /// Persisted desired set belongs to a different account
    #[error("channels file account {found:?} != expected {expected:?}")]
    AccountMismatch { found: String, expected: String },
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// WebSocket dial failure at startup (exit)
    #[error("WebSocket dial failed: {0}")]
    Dial(#[source] tokio_tungstenite::tungstenite::Error),

    /// Socket read failure after startup (cancel scope)
    #[error("Socket read failed: {0}")]
    Read(#[source] tokio_tungstenite::tungstenite::Error),

    /// Socket write failure after startup (cancel scope)
    #[error("Socket write failed: {0}")]
    Write(#[source] tokio_tungstenite::tungstenite::Error),

    /// Peer closed the socket
    #[error("Socket closed by peer")]
    Closed,

    /// HTTP control surface listener failures
    #[error("HTTP listener failed on {address}")]
    Listen {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// HTTP server failures after bind
    #[error("HTTP server failed: {0}")]
    Serve(#[source] std::io::Error),

    /// An inter-stage channel closed out from under its producer
    #[error("{0}")]
    ChannelClosed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// Producer construction failures (exit at startup)
    #[error("Bus producer init failed: {0}")]
    Init(#[source] rdkafka::error::KafkaError),

    /// Per-record delivery failures (logged, record dropped)
    #[error("Bus delivery failed: {0}")]
    Delivery(#[source] rdkafka::error::KafkaError),
}
