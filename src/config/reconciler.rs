use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Rate and timing parameters for the channel reconciler.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReconcilerConfig {
    /// Outbound JOIN/PART rate ceiling
    #[serde(default = "default_tokens_per_second")]
    pub tokens_per_second: f64,

    /// Token bucket capacity (burst)
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Max wait for a Joining/Parting to confirm
    #[serde(default = "default_join_timeout")]
    pub join_timeout_in_ms: u64,

    /// Initial retry delay after a timed-out operation
    #[serde(default = "default_backoff_min")]
    pub backoff_min_in_ms: u64,

    /// Cap on the per-channel retry delay
    #[serde(default = "default_backoff_max")]
    pub backoff_max_in_ms: u64,

    /// Wakeup period for timed reconciliation
    #[serde(default = "default_tick")]
    pub tick_in_ms: u64,
}

impl ReconcilerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tokens_per_second <= 0.0 {
            return Err(Error::InvalidConfig(
                "reconciler.tokens_per_second must be greater than 0".into(),
            ));
        }
        if self.burst == 0 {
            return Err(Error::InvalidConfig(
                "reconciler.burst must be greater than 0".into(),
            ));
        }
        if self.join_timeout_in_ms == 0 {
            return Err(Error::InvalidConfig(
                "reconciler.join_timeout_in_ms must be at least 1ms".into(),
            ));
        }
        if self.backoff_min_in_ms == 0 || self.backoff_min_in_ms > self.backoff_max_in_ms {
            return Err(Error::InvalidConfig(format!(
                "reconciler backoff range {}ms..{}ms is invalid",
                self.backoff_min_in_ms, self.backoff_max_in_ms
            )));
        }
        if self.tick_in_ms == 0 {
            return Err(Error::InvalidConfig(
                "reconciler.tick_in_ms cannot be 0".into(),
            ));
        }
        Ok(())
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_in_ms)
    }

    pub fn backoff_min(&self) -> Duration {
        Duration::from_millis(self.backoff_min_in_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_in_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_in_ms)
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            tokens_per_second: default_tokens_per_second(),
            burst: default_burst(),
            join_timeout_in_ms: default_join_timeout(),
            backoff_min_in_ms: default_backoff_min(),
            backoff_max_in_ms: default_backoff_max(),
            tick_in_ms: default_tick(),
        }
    }
}

fn default_tokens_per_second() -> f64 {
    0.5
}
fn default_burst() -> u32 {
    2
}
// in ms
fn default_join_timeout() -> u64 {
    30_000
}
fn default_backoff_min() -> u64 {
    2_000
}
fn default_backoff_max() -> u64 {
    60_000
}
fn default_tick() -> u64 {
    1_000
}
