//! Transports the simulator can be attached to
//!
//! A [`Connector`] knows how to open one duplex byte stream. The serial
//! connector opens a TTY or pseudo-terminal path with `tokio-serial`; the
//! duplex connector hands out one end of an in-memory `tokio::io::duplex`
//! pair so tests can play the firmware side without a PTY.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use crate::error::SimError;

/// A duplex byte stream the responder can own
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

/// Opens the transport for a simulator run
pub trait Connector: Send {
    /// Stream type produced by this connector
    type Io: Transport;

    /// Path or name of the transport, for logging
    fn name(&self) -> &str;

    /// Open the transport
    fn open(&mut self) -> Result<Self::Io, SimError>;
}

/// Serial port or pseudo-terminal at a filesystem path
#[derive(Debug, Clone)]
pub struct SerialConnector {
    path: String,
    baud_rate: u32,
}

impl SerialConnector {
    /// Create a connector for `path`
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
        }
    }

    /// Get the baud rate
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

impl Connector for SerialConnector {
    type Io = SerialStream;

    fn name(&self) -> &str {
        &self.path
    }

    /// Must be called from within a Tokio runtime
    fn open(&mut self) -> Result<SerialStream, SimError> {
        tokio_serial::new(&self.path, self.baud_rate)
            .timeout(Duration::from_millis(100))
            .open_native_async()
            .map_err(|e| SimError::TransportOpen {
                name: self.path.clone(),
                source: e.into(),
            })
    }
}

/// One end of an in-memory duplex pair
///
/// The stream can be opened once; later opens fail as if the device had
/// gone away.
#[derive(Debug)]
pub struct DuplexConnector {
    name: String,
    stream: Option<DuplexStream>,
}

impl DuplexConnector {
    /// Create a connector and the peer end the caller talks through
    pub fn pair(name: impl Into<String>, max_buf_size: usize) -> (Self, DuplexStream) {
        let (sim_end, peer_end) = tokio::io::duplex(max_buf_size);
        let connector = Self {
            name: name.into(),
            stream: Some(sim_end),
        };
        (connector, peer_end)
    }

    /// Wrap an existing stream
    pub fn new(name: impl Into<String>, stream: DuplexStream) -> Self {
        Self {
            name: name.into(),
            stream: Some(stream),
        }
    }
}

impl Connector for DuplexConnector {
    type Io = DuplexStream;

    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<DuplexStream, SimError> {
        self.stream.take().ok_or_else(|| SimError::TransportOpen {
            name: self.name.clone(),
            source: io::Error::new(io::ErrorKind::NotConnected, "duplex stream already used"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplex_opens_once() {
        let (mut connector, _peer) = DuplexConnector::pair("duplex", 64);
        assert_eq!(connector.name(), "duplex");
        assert!(connector.open().is_ok());
        assert!(matches!(
            connector.open(),
            Err(SimError::TransportOpen { .. })
        ));
    }

    #[tokio::test]
    async fn test_serial_open_missing_path_fails() {
        let mut connector = SerialConnector::new("/dev/does-not-exist-sa818", 9600);
        let err = connector.open().unwrap_err();
        assert!(matches!(err, SimError::TransportOpen { ref name, .. } if name == "/dev/does-not-exist-sa818"));
    }
}
