//! SA818 command types and the command-line grammar
//!
//! Commands are ASCII lines. Matching is case-insensitive and anchored at the
//! start of the line only, so trailing content after a recognised command is
//! ignored. Grammars are tried in [`GRAMMARS`] order and the first one whose
//! keyword and parameters both match wins.
//!
//! | Command | Example |
//! |---------|---------|
//! | Set group | `AT+DMOSETGROUP=0,145.5000,145.5000,0000,4,0000` |
//! | Set volume | `AT+DMOSETVOLUME=6` |
//! | Set filters | `AT+SETFILTER=1,0,1` |
//! | Read RSSI | `RSSI?` |
//! | Connect | `AT+DMOCONNECT` |
//! | Version | `AT+VERSION` |
//! | Handshake | `AT` |

use crate::error::ParseError;
use crate::{EncodeCommand, LINE_TERMINATOR};

/// Lowest volume level accepted by `AT+DMOSETVOLUME`
pub const VOLUME_MIN: u32 = 1;
/// Highest volume level accepted by `AT+DMOSETVOLUME`
pub const VOLUME_MAX: u32 = 8;

/// Highest tone code that selects a CTCSS tone (1-38)
const CTCSS_MAX_CODE: u32 = 38;
/// Highest tone code that selects a DCS code (39-121)
const DCS_MAX_CODE: u32 = 121;

/// CTCSS tone frequencies in Hz, indexed by tone code - 1
const CTCSS_TONES_HZ: [f32; 38] = [
    67.0, 71.9, 74.4, 77.0, 79.7, 82.5, 85.4, 88.5, 91.5, 94.8, 97.4, 100.0, 103.5, 107.2,
    110.9, 114.8, 118.8, 123.0, 127.3, 131.8, 136.5, 141.3, 146.2, 151.4, 156.7, 162.2, 167.9,
    173.8, 179.9, 186.2, 192.8, 203.5, 210.7, 218.1, 225.7, 233.6, 241.8, 250.3,
];

/// Channel bandwidth selected by the first `AT+DMOSETGROUP` parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Bandwidth {
    /// 12.5 kHz channel (code 0)
    Narrow,
    /// 25 kHz channel (code 1)
    Wide,
}

impl Bandwidth {
    /// Map a raw bandwidth code to a bandwidth, if it is one the module defines
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Bandwidth::Narrow),
            1 => Some(Bandwidth::Wide),
            _ => None,
        }
    }

    /// Raw code used on the wire
    pub fn code(&self) -> u32 {
        match self {
            Bandwidth::Narrow => 0,
            Bandwidth::Wide => 1,
        }
    }

    /// Channel width in kHz
    pub fn khz(&self) -> f32 {
        match self {
            Bandwidth::Narrow => 12.5,
            Bandwidth::Wide => 25.0,
        }
    }
}

/// Human-readable description of a CTCSS/DCS tone code
///
/// Code 0 disables tone squelch, 1-38 select a CTCSS tone and 39-121 select a
/// DCS code. The simulator never rejects a code; this is for display only.
pub fn describe_tone_code(code: u32) -> String {
    match code {
        0 => "off".to_string(),
        1..=CTCSS_MAX_CODE => format!("CTCSS {:.1} Hz", CTCSS_TONES_HZ[(code - 1) as usize]),
        c if c <= DCS_MAX_CODE => format!("DCS #{}", c - CTCSS_MAX_CODE),
        c => format!("code {}", c),
    }
}

/// Parameters of `AT+DMOSETGROUP=BW,TXF,RXF,TXCTCSS,SQ,RXCTCSS`
///
/// None of the fields are range-checked. It is unknown whether the real
/// module rejects out-of-band frequencies or tone codes, so the simulator
/// accepts whatever parses.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupConfig {
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
}

/// Parameters of `AT+SETFILTER=PRE,HPF,LPF`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FilterFlags {
    /// Pre/de-emphasis enabled
    pub pre_emphasis: bool,
    /// High-pass filter enabled
    pub high_pass: bool,
    /// Low-pass filter enabled
    pub low_pass: bool,
}

/// A parsed SA818 command
#[derive(Debug, Clone, PartialEq)]
pub enum Sa818Command {
    /// Set bandwidth, frequencies, tones and squelch
    SetGroup(GroupConfig),
    /// Set audio volume. The value is whatever the peer sent; range checking
    /// happens when the command is applied so it can be answered with a
    /// failure code instead of `ERROR`.
    SetVolume(u32),
    /// Configure audio filters
    SetFilter(FilterFlags),
    /// Signal strength query: `RSSI?`
    ReadRssi,
    /// Connection handshake: `AT+DMOCONNECT`
    Connect,
    /// Firmware version query: `AT+VERSION`
    Version,
    /// Bare `AT` attention command
    Handshake,
    /// Line that matches no grammar
    Unknown(String),
}

/// How a grammar's keyword is matched against the line
#[derive(Debug, Clone, Copy)]
enum Keyword {
    /// Line starts with the keyword; parameters (if any) follow it
    Prefix(&'static str),
    /// Whole line equals the keyword
    Exact(&'static str),
}

type ParamParser = fn(&mut Scanner<'_>) -> Result<Sa818Command, ParseError>;

/// Command grammars in match priority order
const GRAMMARS: &[(Keyword, ParamParser)] = &[
    (Keyword::Prefix("AT+DMOSETGROUP="), parse_group),
    (Keyword::Prefix("AT+DMOSETVOLUME="), parse_volume),
    (Keyword::Prefix("AT+SETFILTER="), parse_filter),
    (Keyword::Prefix("RSSI?"), read_rssi),
    (Keyword::Prefix("AT+DMOCONNECT"), connect),
    (Keyword::Prefix("AT+VERSION"), version),
    (Keyword::Exact("AT"), handshake),
];

impl Sa818Command {
    /// Parse a single command line (without terminator)
    ///
    /// Surrounding whitespace is ignored. A grammar whose keyword matches but
    /// whose parameters do not parse is skipped, and matching continues with
    /// the next grammar. If nothing matches, [`ParseError::UnknownCommand`]
    /// is returned.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim();

        for (keyword, params) in GRAMMARS {
            let mut scanner = Scanner::new(line);
            let matched = match keyword {
                Keyword::Prefix(kw) => scanner.keyword(kw),
                Keyword::Exact(kw) => line.eq_ignore_ascii_case(kw),
            };
            if !matched {
                continue;
            }
            match params(&mut scanner) {
                Ok(cmd) => return Ok(cmd),
                Err(e) => tracing::trace!("Grammar {:?} rejected {:?}: {}", keyword, line, e),
            }
        }

        Err(ParseError::UnknownCommand(line.to_string()))
    }

    /// Parse a line, mapping anything unrecognised to [`Sa818Command::Unknown`]
    pub fn parse_lenient(line: &str) -> Self {
        Self::parse(line).unwrap_or_else(|_| Sa818Command::Unknown(line.trim().to_string()))
    }

    /// Command text as sent on the wire, without terminator
    pub fn to_line(&self) -> String {
        match self {
            Sa818Command::SetGroup(g) => format!(
                "AT+DMOSETGROUP={},{:.4},{:.4},{:04},{},{:04}",
                g.bandwidth, g.freq_tx, g.freq_rx, g.ctcss_tx, g.squelch, g.ctcss_rx
            ),
            Sa818Command::SetVolume(v) => format!("AT+DMOSETVOLUME={}", v),
            Sa818Command::SetFilter(f) => format!(
                "AT+SETFILTER={},{},{}",
                u8::from(f.pre_emphasis),
                u8::from(f.high_pass),
                u8::from(f.low_pass)
            ),
            Sa818Command::ReadRssi => "RSSI?".to_string(),
            Sa818Command::Connect => "AT+DMOCONNECT".to_string(),
            Sa818Command::Version => "AT+VERSION".to_string(),
            Sa818Command::Handshake => "AT".to_string(),
            Sa818Command::Unknown(s) => s.clone(),
        }
    }
}

impl EncodeCommand for Sa818Command {
    fn encode(&self) -> Vec<u8> {
        let mut out = self.to_line().into_bytes();
        out.extend_from_slice(LINE_TERMINATOR);
        out
    }
}

fn read_rssi(_: &mut Scanner<'_>) -> Result<Sa818Command, ParseError> {
    Ok(Sa818Command::ReadRssi)
}

fn connect(_: &mut Scanner<'_>) -> Result<Sa818Command, ParseError> {
    Ok(Sa818Command::Connect)
}

fn version(_: &mut Scanner<'_>) -> Result<Sa818Command, ParseError> {
    Ok(Sa818Command::Version)
}

fn handshake(_: &mut Scanner<'_>) -> Result<Sa818Command, ParseError> {
    Ok(Sa818Command::Handshake)
}

fn parse_group(s: &mut Scanner<'_>) -> Result<Sa818Command, ParseError> {
    let bandwidth = s.uint("BW")?;
    s.separator()?;
    let freq_tx = s.decimal("TXF")?;
    s.separator()?;
    let freq_rx = s.decimal("RXF")?;
    s.separator()?;
    let ctcss_tx = s.uint("TXCTCSS")?;
    s.separator()?;
    let squelch = s.uint("SQ")?;
    s.separator()?;
    let ctcss_rx = s.uint("RXCTCSS")?;

    Ok(Sa818Command::SetGroup(GroupConfig {
        bandwidth,
        freq_tx,
        freq_rx,
        ctcss_tx,
        squelch,
        ctcss_rx,
    }))
}

fn parse_volume(s: &mut Scanner<'_>) -> Result<Sa818Command, ParseError> {
    // Saturated values are just another out-of-range volume
    Ok(Sa818Command::SetVolume(s.uint("N")?))
}

fn parse_filter(s: &mut Scanner<'_>) -> Result<Sa818Command, ParseError> {
    let pre_emphasis = s.flag("PRE")?;
    s.separator()?;
    let high_pass = s.flag("HPF")?;
    s.separator()?;
    let low_pass = s.flag("LPF")?;

    Ok(Sa818Command::SetFilter(FilterFlags {
        pre_emphasis,
        high_pass,
        low_pass,
    }))
}

/// Cursor over a command line
struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    /// Consume `kw` if the remaining input starts with it (ASCII case-insensitive)
    fn keyword(&mut self, kw: &str) -> bool {
        let rest = self.rest().as_bytes();
        if rest.len() >= kw.len() && rest[..kw.len()].eq_ignore_ascii_case(kw.as_bytes()) {
            // kw is ASCII, so the matched bytes are too and pos stays on a char boundary
            self.pos += kw.len();
            true
        } else {
            false
        }
    }

    /// Consume the longest run of bytes satisfying `pred`
    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a str {
        let rest = self.rest();
        let len = rest.bytes().take_while(|&b| pred(b)).count();
        self.pos += len;
        &rest[..len]
    }

    fn digits(&mut self, field: &'static str) -> Result<&'a str, ParseError> {
        let run = self.take_while(|b| b.is_ascii_digit());
        if run.is_empty() {
            return Err(ParseError::MalformedParameters(format!(
                "expected digits for {}",
                field
            )));
        }
        Ok(run)
    }

    /// Unsigned integer, saturating at `u32::MAX`
    ///
    /// A digit run only fails to convert when it overflows, and any digit
    /// run matches the grammar.
    fn uint(&mut self, field: &'static str) -> Result<u32, ParseError> {
        let run = self.digits(field)?;
        Ok(run.parse().unwrap_or(u32::MAX))
    }

    /// Enable flag: any digit run other than all zeros is true
    fn flag(&mut self, field: &'static str) -> Result<bool, ParseError> {
        let run = self.digits(field)?;
        Ok(run.bytes().any(|b| b != b'0'))
    }

    fn decimal(&mut self, field: &'static str) -> Result<f64, ParseError> {
        let run = self.take_while(|b| b.is_ascii_digit() || b == b'.');
        if run.is_empty() {
            return Err(ParseError::MalformedParameters(format!(
                "expected a number for {}",
                field
            )));
        }
        run.parse().map_err(|_| ParseError::InvalidNumber {
            field,
            value: run.to_string(),
        })
    }

    fn separator(&mut self) -> Result<(), ParseError> {
        if self.keyword(",") {
            Ok(())
        } else {
            Err(ParseError::MalformedParameters(format!(
                "expected ',' at offset {}",
                self.pos
            )))
        }
    }
}
