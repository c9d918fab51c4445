//! SA818 response lines
//!
//! Response tokens are always emitted in the fixed case shown here and
//! terminated with CR LF on the wire.

use std::fmt;

use crate::error::ParseError;
use crate::LINE_TERMINATOR;

/// Firmware version reported by the simulated module
pub const DEFAULT_VERSION: &str = "SA818_V4.2";

/// Result code carried by `+DMO...:<code>` responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    /// Command accepted (`0`)
    Ok,
    /// Command rejected, e.g. a value out of range (`1`)
    Failed,
}

impl ResultCode {
    /// Numeric code as sent on the wire
    pub fn code(&self) -> u8 {
        match self {
            ResultCode::Ok => 0,
            ResultCode::Failed => 1,
        }
    }

    fn from_code(s: &str) -> Option<Self> {
        match s.trim() {
            "0" => Some(ResultCode::Ok),
            "1" => Some(ResultCode::Failed),
            _ => None,
        }
    }
}

/// A response line sent by the module
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sa818Response {
    /// `+DMOSETGROUP:<code>`
    SetGroup(ResultCode),
    /// `+DMOSETVOLUME:<code>`
    SetVolume(ResultCode),
    /// `+DMOSETFILTER:<code>`
    SetFilter(ResultCode),
    /// `RSSI=<value>`
    Rssi(i32),
    /// `+DMOCONNECT:<code>`, also the answer to a bare `AT`
    Connect(ResultCode),
    /// Firmware version string, sent verbatim
    Version(String),
    /// `ERROR`, sent for any unrecognised command
    Error,
}

impl Sa818Response {
    /// Response bytes including the CR LF terminator
    pub fn encode(&self) -> Vec<u8> {
        let mut out = self.to_string().into_bytes();
        out.extend_from_slice(LINE_TERMINATOR);
        out
    }

    /// Whether this response reports success
    pub fn is_ok(&self) -> bool {
        match self {
            Sa818Response::SetGroup(c)
            | Sa818Response::SetVolume(c)
            | Sa818Response::SetFilter(c)
            | Sa818Response::Connect(c) => *c == ResultCode::Ok,
            Sa818Response::Rssi(_) | Sa818Response::Version(_) => true,
            Sa818Response::Error => false,
        }
    }

    /// Parse a response line as a host would read it
    ///
    /// Anything that is not a recognised `+DMO...`, `RSSI=` or `ERROR` line is
    /// taken to be a version string, which is how the firmware driver treats
    /// the reply to `AT+VERSION`.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ParseError::MalformedParameters("empty response".into()));
        }

        if line == "ERROR" {
            return Ok(Sa818Response::Error);
        }

        if let Some(value) = line.strip_prefix("RSSI=") {
            let rssi = value.trim().parse().map_err(|_| ParseError::InvalidNumber {
                field: "RSSI",
                value: value.to_string(),
            })?;
            return Ok(Sa818Response::Rssi(rssi));
        }

        if let Some((token, code)) = line.split_once(':') {
            let result = ResultCode::from_code(code).ok_or_else(|| ParseError::InvalidNumber {
                field: "result code",
                value: code.to_string(),
            })?;
            return match token {
                "+DMOSETGROUP" => Ok(Sa818Response::SetGroup(result)),
                "+DMOSETVOLUME" => Ok(Sa818Response::SetVolume(result)),
                "+DMOSETFILTER" => Ok(Sa818Response::SetFilter(result)),
                "+DMOCONNECT" => Ok(Sa818Response::Connect(result)),
                _ => Err(ParseError::UnknownCommand(line.to_string())),
            };
        }

        Ok(Sa818Response::Version(line.to_string()))
    }
}

impl fmt::Display for Sa818Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sa818Response::SetGroup(c) => write!(f, "+DMOSETGROUP:{}", c.code()),
            Sa818Response::SetVolume(c) => write!(f, "+DMOSETVOLUME:{}", c.code()),
            Sa818Response::SetFilter(c) => write!(f, "+DMOSETFILTER:{}", c.code()),
            Sa818Response::Rssi(v) => write!(f, "RSSI={}", v),
            Sa818Response::Connect(c) => write!(f, "+DMOCONNECT:{}", c.code()),
            Sa818Response::Version(v) => f.write_str(v),
            Sa818Response::Error => f.write_str("ERROR"),
        }
    }
}
