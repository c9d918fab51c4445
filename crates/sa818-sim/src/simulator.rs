//! Simulator lifecycle
//!
//! [`Sa818Simulator`] owns a [`Connector`] and, while running, one responder
//! task holding the opened transport. The owner can read state snapshots and
//! inject RSSI at any time, concurrently with the responder.
//!
//! ```text
//! Stopped --start--> Starting --opened--> Running --stop--> Stopping --> Stopped
//!                       |
//!                       +--open failed--> Stopped
//! ```

use std::io;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::SimulatorConfig;
use crate::device::VirtualSa818;
use crate::error::SimError;
use crate::responder::{run_responder_task, ResponderCommand, ResponderSettings};
use crate::state::{DeviceState, StateStore, STATE_EVENT_CAPACITY};
use crate::transport::{Connector, SerialConnector};

/// Capacity of the responder command channel
const COMMAND_CHANNEL_CAPACITY: usize = 8;

/// Lifecycle state of a simulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// No transport held, no responder running
    Stopped,
    /// Opening the transport
    Starting,
    /// Responder running
    Running,
    /// Waiting for the responder to exit
    Stopping,
}

/// Handle to a running responder task
struct Worker {
    cmd_tx: mpsc::Sender<ResponderCommand>,
    task: JoinHandle<io::Result<()>>,
}

/// Finishes a stop on drop, whether `stop` completed or was cancelled
struct StopGuard<'a> {
    lifecycle: &'a mut LifecycleState,
    worker: Worker,
}

impl Drop for StopGuard<'_> {
    fn drop(&mut self) {
        // No-op if the task already exited
        self.worker.task.abort();
        *self.lifecycle = LifecycleState::Stopped;
    }
}

/// SA818 module simulator attached to a transport
pub struct Sa818Simulator<C: Connector = SerialConnector> {
    connector: C,
    config: SimulatorConfig,
    lifecycle: LifecycleState,
    store: StateStore,
    events: broadcast::Sender<DeviceState>,
    worker: Option<Worker>,
}

impl Sa818Simulator<SerialConnector> {
    /// Create a simulator for the serial port or PTY at `path`
    pub fn new(path: impl Into<String>) -> Self {
        Self::with_config(path, SimulatorConfig::default())
    }

    /// Create a simulator for `path` with custom configuration
    pub fn with_config(path: impl Into<String>, config: SimulatorConfig) -> Self {
        let connector = SerialConnector::new(path, config.baud_rate);
        Self::with_connector(connector, config)
    }
}

impl<C: Connector> Sa818Simulator<C> {
    /// Create a simulator that opens its transport through `connector`
    pub fn with_connector(connector: C, config: SimulatorConfig) -> Self {
        let (events, _) = broadcast::channel(STATE_EVENT_CAPACITY);
        let store = StateStore::new(config.initial_state.clone(), events.clone());
        Self {
            connector,
            config,
            lifecycle: LifecycleState::Stopped,
            store,
            events,
            worker: None,
        }
    }

    /// Path or name of the transport
    pub fn name(&self) -> &str {
        self.connector.name()
    }

    /// Get the configuration
    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Current lifecycle state
    pub fn lifecycle(&self) -> LifecycleState {
        self.lifecycle
    }

    /// Whether the responder is running
    pub fn is_running(&self) -> bool {
        self.lifecycle == LifecycleState::Running
    }

    /// Open the transport and start answering commands
    ///
    /// The module state is reset to the configured initial state. Must be
    /// called from within a Tokio runtime.
    pub fn start(&mut self) -> Result<(), SimError> {
        if self.lifecycle != LifecycleState::Stopped {
            return Err(SimError::FailedPrecondition {
                operation: "start",
                state: self.lifecycle,
            });
        }
        self.config.validate()?;

        self.lifecycle = LifecycleState::Starting;
        let stream = match self.connector.open() {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Failed to start SA818 simulator: {}", e);
                self.lifecycle = LifecycleState::Stopped;
                return Err(e);
            }
        };

        self.store = StateStore::new(self.config.initial_state.clone(), self.events.clone());
        let device = VirtualSa818::new(
            self.connector.name(),
            self.config.version.clone(),
            self.store.clone(),
        );
        let settings = ResponderSettings {
            poll_interval: self.config.poll_interval(),
            read_chunk_size: self.config.read_chunk_size,
        };

        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let task = tokio::spawn(run_responder_task(stream, device, cmd_rx, settings));
        self.worker = Some(Worker { cmd_tx, task });
        self.lifecycle = LifecycleState::Running;

        info!("SA818 simulator started on {}", self.name());
        Ok(())
    }

    /// Stop the responder and release the transport
    ///
    /// Waits up to the configured stop timeout for the responder to exit,
    /// then abandons it. Calling `stop` on a stopped simulator does nothing.
    /// If the returned future is dropped before completing, the responder is
    /// aborted and the simulator is still left Stopped.
    pub async fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            debug!("SA818 simulator on {} already stopped", self.name());
            self.lifecycle = LifecycleState::Stopped;
            return;
        };
        self.lifecycle = LifecycleState::Stopping;

        let name = self.connector.name();
        let stop_timeout = self.config.stop_timeout();
        let mut guard = StopGuard {
            lifecycle: &mut self.lifecycle,
            worker,
        };

        // Fails only if the task already exited
        let _ = guard.worker.cmd_tx.send(ResponderCommand::Shutdown).await;

        match timeout(stop_timeout, &mut guard.worker.task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => warn!("SA818 responder on {} exited with error: {}", name, e),
            Ok(Err(e)) => warn!("SA818 responder on {} failed: {}", name, e),
            Err(_) => warn!(
                "SA818 responder on {} did not stop within {:?}, abandoning it",
                name, stop_timeout
            ),
        }

        drop(guard);
        info!("SA818 simulator stopped on {}", name);
    }

    /// Consistent snapshot of the simulated module state
    ///
    /// After `stop`, this is the state the last run ended with.
    pub fn get_state(&self) -> DeviceState {
        self.store.snapshot()
    }

    /// Inject the RSSI value reported to `RSSI?`
    pub fn set_rssi(&self, value: i32) {
        self.store.set_rssi(value);
    }

    /// Handle to the state of the current run, for use from other tasks
    pub fn store(&self) -> StateStore {
        self.store.clone()
    }

    /// Subscribe to state snapshots published after every change
    ///
    /// A snapshot of the initial state is also published when a run starts.
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceState> {
        self.events.subscribe()
    }

    /// Command lines received during the current (or last) run
    pub fn received_commands(&self) -> Vec<String> {
        self.store.received_commands()
    }
}

impl<C: Connector> Drop for Sa818Simulator<C> {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.task.abort();
        }
    }
}
