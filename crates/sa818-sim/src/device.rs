//! Virtual SA818 module
//!
//! Applies parsed commands to the shared [`StateStore`] and produces the
//! response the real module would send. Rejected commands leave the state
//! untouched; the state mutation for a command always completes before its
//! response is returned.

use sa818_protocol::{ResultCode, Sa818Command, Sa818Response, VOLUME_MAX, VOLUME_MIN};
use tracing::debug;

use crate::state::{DeviceState, StateStore};

/// Simulated SA818 that answers AT commands
#[derive(Debug, Clone)]
pub struct VirtualSa818 {
    /// Identifier for logging (usually the transport path)
    id: String,
    /// String returned for `AT+VERSION`
    version: String,
    store: StateStore,
}

impl VirtualSa818 {
    /// Create a virtual module backed by `store`
    pub fn new(id: impl Into<String>, version: impl Into<String>, store: StateStore) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            store,
        }
    }

    /// Get the identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the version string
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Get the backing state store
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Snapshot of the current state
    pub fn state(&self) -> DeviceState {
        self.store.snapshot()
    }

    /// Handle one framed command line
    ///
    /// Returns `None` for a blank line, which the module ignores. Every other
    /// line gets exactly one response, `ERROR` if it is not understood.
    pub fn process_line(&self, line: &str) -> Option<Sa818Response> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        self.store.record_command(line);
        let cmd = Sa818Command::parse_lenient(line);
        Some(self.process_command(&cmd))
    }

    /// Apply a parsed command and return the response
    pub fn process_command(&self, cmd: &Sa818Command) -> Sa818Response {
        match cmd {
            Sa818Command::SetGroup(group) => {
                self.store.update(|s| s.apply_group(group));
                debug!(
                    "{}: group set TX={:.4} RX={:.4} SQ={}",
                    self.id, group.freq_tx, group.freq_rx, group.squelch
                );
                Sa818Response::SetGroup(ResultCode::Ok)
            }
            Sa818Command::SetVolume(volume) => {
                if (VOLUME_MIN..=VOLUME_MAX).contains(volume) {
                    self.store.update(|s| s.volume = *volume);
                    debug!("{}: volume set to {}", self.id, volume);
                    Sa818Response::SetVolume(ResultCode::Ok)
                } else {
                    debug!("{}: volume {} out of range", self.id, volume);
                    Sa818Response::SetVolume(ResultCode::Failed)
                }
            }
            Sa818Command::SetFilter(filters) => {
                self.store.update(|s| s.apply_filters(filters));
                debug!("{}: filters set {:?}", self.id, filters);
                Sa818Response::SetFilter(ResultCode::Ok)
            }
            Sa818Command::ReadRssi => Sa818Response::Rssi(self.store.snapshot().rssi),
            Sa818Command::Connect | Sa818Command::Handshake => {
                Sa818Response::Connect(ResultCode::Ok)
            }
            Sa818Command::Version => Sa818Response::Version(self.version.clone()),
            Sa818Command::Unknown(line) => {
                debug!("{}: unknown command {:?}", self.id, line);
                Sa818Response::Error
            }
        }
    }
}
