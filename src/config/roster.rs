use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Desired-set store tunables.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RosterConfig {
    /// Debounce window between a dirtying intent and the durable write
    #[serde(default = "default_write_debounce")]
    pub write_debounce_in_ms: u64,
}

impl RosterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.write_debounce_in_ms == 0 {
            return Err(Error::InvalidConfig(
                "roster.write_debounce_in_ms cannot be 0".into(),
            ));
        }
        Ok(())
    }

    pub fn write_debounce(&self) -> Duration {
        Duration::from_millis(self.write_debounce_in_ms)
    }
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            write_debounce_in_ms: default_write_debounce(),
        }
    }
}

fn default_write_debounce() -> u64 {
    150
}
