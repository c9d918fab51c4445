//! SA818 AT Protocol Library
//!
//! This crate provides framing, parsing and encoding for the AT command
//! protocol spoken by the SA818 VHF/UHF radio module over its UART:
//!
//! - **Framing**: ASCII lines terminated by CR or LF on input, CR LF on output
//! - **Commands**: `AT+DMOSETGROUP`, `AT+DMOSETVOLUME`, `AT+SETFILTER`,
//!   `RSSI?`, `AT+DMOCONNECT`, `AT+VERSION` and the bare `AT` handshake
//! - **Responses**: `+DMO...:<code>`, `RSSI=<n>`, the version string, `ERROR`
//!
//! # Example
//!
//! ```rust
//! use sa818_protocol::{LineCodec, ProtocolCodec, Sa818Command};
//!
//! let mut codec = LineCodec::new();
//! codec.push_bytes(b"AT+DMOSETVOLUME=6\r\nRSSI?\r\n");
//!
//! assert_eq!(codec.next_command(), Some(Sa818Command::SetVolume(6)));
//! assert_eq!(codec.next_command(), Some(Sa818Command::ReadRssi));
//! assert_eq!(codec.next_command(), None);
//! ```

pub mod codec;
pub mod command;
pub mod error;
pub mod response;

pub use codec::LineCodec;
pub use command::{
    describe_tone_code, Bandwidth, FilterFlags, GroupConfig, Sa818Command, VOLUME_MAX, VOLUME_MIN,
};
pub use error::ParseError;
pub use response::{ResultCode, Sa818Response, DEFAULT_VERSION};

/// Terminator appended to every line written to the wire
pub const LINE_TERMINATOR: &[u8] = b"\r\n";

/// Trait for protocol codecs that can parse incoming data streams
pub trait ProtocolCodec {
    /// The command type produced by this codec
    type Command;

    /// Push raw bytes into the codec's buffer
    fn push_bytes(&mut self, data: &[u8]);

    /// Try to extract the next complete command from the buffer
    fn next_command(&mut self) -> Option<Self::Command>;

    /// Try to extract the next complete command along with the line it was
    /// parsed from
    ///
    /// Useful for logging and for recording exactly what the peer sent.
    fn next_command_with_line(&mut self) -> Option<(Self::Command, String)>;

    /// Clear the internal buffer
    fn clear(&mut self);
}

/// Encode a command to the bytes a host writes to the module
pub trait EncodeCommand {
    /// Encode to wire bytes, including the line terminator
    fn encode(&self) -> Vec<u8>;
}
