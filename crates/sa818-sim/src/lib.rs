//! SA818 Simulation Library
//!
//! This crate simulates an SA818 radio module's AT command interface so that
//! firmware and host software can be tested without the physical module. It
//! includes:
//!
//! - **VirtualSa818**: Applies commands to the simulated state and produces
//!   the module's responses
//! - **Sa818Simulator**: Attaches a responder task to a serial port, PTY or
//!   in-memory stream and manages its start/stop lifecycle
//!
//! # Example
//!
//! ```rust
//! use sa818_sim::{DuplexConnector, Sa818Simulator, SimulatorConfig};
//! use tokio::io::{AsyncReadExt, AsyncWriteExt};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (connector, mut firmware) = DuplexConnector::pair("uart_1", 1024);
//! let mut sim = Sa818Simulator::with_connector(connector, SimulatorConfig::default());
//! sim.start()?;
//!
//! firmware.write_all(b"AT+DMOSETVOLUME=7\r\n").await?;
//! let mut reply = [0u8; 17];
//! firmware.read_exact(&mut reply).await?;
//! assert_eq!(&reply, b"+DMOSETVOLUME:0\r\n");
//! assert_eq!(sim.get_state().volume, 7);
//!
//! sim.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod responder;
pub mod simulator;
pub mod state;
pub mod transport;

pub use config::SimulatorConfig;
pub use device::VirtualSa818;
pub use error::SimError;
pub use responder::{run_responder_task, ResponderCommand, ResponderSettings};
pub use simulator::{LifecycleState, Sa818Simulator};
pub use state::{DeviceState, StateStore};
pub use transport::{Connector, DuplexConnector, SerialConnector, Transport};
