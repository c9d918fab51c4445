//! Simulated module state
//!
//! [`DeviceState`] is the plain model of the module's configuration and
//! telemetry. [`StateStore`] wraps it for sharing between the responder task,
//! which applies commands, and the owning harness, which reads snapshots and
//! injects RSSI. Every access goes through one lock, so a reader never sees a
//! half-applied `AT+DMOSETGROUP`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use sa818_protocol::{describe_tone_code, Bandwidth, FilterFlags, GroupConfig};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Capacity of the state change broadcast channel
pub const STATE_EVENT_CAPACITY: usize = 64;

/// Most recent command lines kept by a store
pub const RECEIVED_LOG_CAPACITY: usize = 1024;

/// Current configuration and telemetry of the simulated SA818
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceState {
    /// Bandwidth code (0 = 12.5 kHz, 1 = 25 kHz)
    pub bandwidth: u32,
    /// Transmit frequency in MHz
    pub freq_tx: f64,
    /// Receive frequency in MHz
    pub freq_rx: f64,
    /// Transmit tone code
    pub ctcss_tx: u32,
    /// Squelch level
    pub squelch: u32,
    /// Receive tone code
    pub ctcss_rx: u32,
    /// Audio volume (1-8)
    pub volume: u32,
    /// Pre/de-emphasis enabled
    pub pre_emphasis: bool,
    /// High-pass filter enabled
    pub high_pass: bool,
    /// Low-pass filter enabled
    pub low_pass: bool,
    /// Simulated received signal strength
    pub rssi: i32,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            bandwidth: 0,
            freq_tx: 145.500,
            freq_rx: 145.500,
            ctcss_tx: 0,
            squelch: 4,
            ctcss_rx: 0,
            volume: 4,
            pre_emphasis: true,
            high_pass: true,
            low_pass: true,
            rssi: 120,
        }
    }
}

impl DeviceState {
    /// Apply the parameters of an `AT+DMOSETGROUP` command
    pub fn apply_group(&mut self, group: &GroupConfig) {
        self.bandwidth = group.bandwidth;
        self.freq_tx = group.freq_tx;
        self.freq_rx = group.freq_rx;
        self.ctcss_tx = group.ctcss_tx;
        self.squelch = group.squelch;
        self.ctcss_rx = group.ctcss_rx;
    }

    /// Apply the parameters of an `AT+SETFILTER` command
    pub fn apply_filters(&mut self, filters: &FilterFlags) {
        self.pre_emphasis = filters.pre_emphasis;
        self.high_pass = filters.high_pass;
        self.low_pass = filters.low_pass;
    }

    /// Group parameters as they would be sent in `AT+DMOSETGROUP`
    pub fn group(&self) -> GroupConfig {
        GroupConfig {
            bandwidth: self.bandwidth,
            freq_tx: self.freq_tx,
            freq_rx: self.freq_rx,
            ctcss_tx: self.ctcss_tx,
            squelch: self.squelch,
            ctcss_rx: self.ctcss_rx,
        }
    }

    /// Filter flags as they would be sent in `AT+SETFILTER`
    pub fn filters(&self) -> FilterFlags {
        FilterFlags {
            pre_emphasis: self.pre_emphasis,
            high_pass: self.high_pass,
            low_pass: self.low_pass,
        }
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        let bandwidth = match Bandwidth::from_code(self.bandwidth) {
            Some(bw) => format!("{} kHz", bw.khz()),
            None => format!("bw {}", self.bandwidth),
        };
        format!(
            "TX {:.4} MHz ({}) RX {:.4} MHz ({}) {} SQ {} VOL {} PRE {} HPF {} LPF {} RSSI {}",
            self.freq_tx,
            describe_tone_code(self.ctcss_tx),
            self.freq_rx,
            describe_tone_code(self.ctcss_rx),
            bandwidth,
            self.squelch,
            self.volume,
            u8::from(self.pre_emphasis),
            u8::from(self.high_pass),
            u8::from(self.low_pass),
            self.rssi
        )
    }
}

/// Shared, lock-guarded [`DeviceState`]
///
/// Cloning the store yields another handle to the same state. Each mutation
/// that changes the state publishes a snapshot on the broadcast channel the
/// store was created with.
#[derive(Debug, Clone)]
pub struct StateStore {
    state: Arc<RwLock<DeviceState>>,
    /// Most recent command lines, oldest first
    received: Arc<Mutex<VecDeque<String>>>,
    events: broadcast::Sender<DeviceState>,
}

impl StateStore {
    /// Create a store holding `initial`, publishing changes on `events`
    pub fn new(initial: DeviceState, events: broadcast::Sender<DeviceState>) -> Self {
        Self {
            state: Arc::new(RwLock::new(initial)),
            received: Arc::new(Mutex::new(VecDeque::with_capacity(64))),
            events,
        }
    }

    /// Create a store with its own event channel
    pub fn standalone(initial: DeviceState) -> Self {
        let (events, _) = broadcast::channel(STATE_EVENT_CAPACITY);
        Self::new(initial, events)
    }

    /// Consistent copy of the current state
    pub fn snapshot(&self) -> DeviceState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Mutate the state under the write lock
    ///
    /// If the closure changed anything, the new state is published before
    /// the lock is released, so subscribers see changes in the order they
    /// were applied.
    pub fn update<R>(&self, f: impl FnOnce(&mut DeviceState) -> R) -> R {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let before = state.clone();
        let result = f(&mut state);
        if *state != before {
            // No subscribers is fine
            let _ = self.events.send(state.clone());
        }
        result
    }

    /// Inject a new RSSI value
    pub fn set_rssi(&self, value: i32) {
        self.update(|s| s.rssi = value);
    }

    /// Subscribe to state change snapshots
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceState> {
        self.events.subscribe()
    }

    /// Publish the current state without changing it
    pub fn publish_current(&self) {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let _ = self.events.send(state.clone());
    }

    /// Record a command line received from the peer
    ///
    /// Only the last [`RECEIVED_LOG_CAPACITY`] lines are kept.
    pub fn record_command(&self, line: &str) {
        let mut received = self.received.lock().unwrap_or_else(PoisonError::into_inner);
        if received.len() >= RECEIVED_LOG_CAPACITY {
            received.pop_front();
        }
        received.push_back(line.to_string());
    }

    /// Most recent command lines received, oldest first
    pub fn received_commands(&self) -> Vec<String> {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}
