//! Simulator configuration

use std::path::Path;
use std::time::Duration;

use sa818_protocol::DEFAULT_VERSION;
use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::state::DeviceState;

/// Largest accepted `read_chunk_size`
pub const MAX_READ_CHUNK_SIZE: usize = 64 * 1024;

/// Tunables for a simulator instance
///
/// Missing fields take their defaults when deserialized, so a config file
/// only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Upper bound on each wait for incoming bytes, and therefore on how long
    /// a stop request can go unnoticed
    pub poll_interval_ms: u64,
    /// Maximum bytes taken from the transport per read
    pub read_chunk_size: usize,
    /// How long `stop` waits for the responder before abandoning it
    pub stop_timeout_ms: u64,
    /// String returned for `AT+VERSION`
    pub version: String,
    /// Baud rate used when opening a serial transport
    pub baud_rate: u32,
    /// State the module powers up with
    pub initial_state: DeviceState,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            read_chunk_size: 256,
            stop_timeout_ms: 2000,
            version: DEFAULT_VERSION.to_string(),
            baud_rate: 9600,
            initial_state: DeviceState::default(),
        }
    }
}

impl SimulatorConfig {
    /// Load a configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            SimError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Parse and validate a configuration from JSON text
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| SimError::Config(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the responder cannot run with
    pub fn validate(&self) -> Result<(), SimError> {
        if self.poll_interval_ms == 0 {
            return Err(SimError::Config("poll_interval_ms must be non-zero".into()));
        }
        if self.read_chunk_size == 0 || self.read_chunk_size > MAX_READ_CHUNK_SIZE {
            return Err(SimError::Config(format!(
                "read_chunk_size must be between 1 and {}",
                MAX_READ_CHUNK_SIZE
            )));
        }
        if self.version.trim().is_empty() {
            return Err(SimError::Config("version must not be empty".into()));
        }
        Ok(())
    }

    /// Poll interval as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Stop timeout as a duration
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}
