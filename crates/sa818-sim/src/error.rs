//! Error types for the simulator

use std::io;

use thiserror::Error;

use crate::simulator::LifecycleState;

/// Errors surfaced to the owner of a simulator
///
/// Protocol faults (unknown commands, out-of-range values) never appear
/// here; they are answered on the wire.
#[derive(Debug, Error)]
pub enum SimError {
    /// Transport could not be opened
    #[error("failed to open transport {name}: {source}")]
    TransportOpen {
        /// Path or name of the transport
        name: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Operation not valid in the current lifecycle state
    #[error("cannot {operation} simulator while {state:?}")]
    FailedPrecondition {
        /// Operation that was attempted
        operation: &'static str,
        /// Lifecycle state at the time
        state: LifecycleState,
    },

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
