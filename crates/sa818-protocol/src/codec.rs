//! Streaming line codec
//!
//! Accumulates bytes from the serial stream and splits them into command
//! lines. A line ends at the first CR or LF; `\r\n` therefore yields the line
//! followed by an empty line, which is dropped along with any other
//! whitespace-only line.

use crate::command::Sa818Command;
use crate::ProtocolCodec;

/// Pending bytes allowed without a terminator before the buffer is trimmed
const MAX_PENDING_LEN: usize = 1024;

/// Bytes kept from the tail of an overflowing buffer
const OVERFLOW_KEEP_LEN: usize = 256;

fn is_terminator(b: u8) -> bool {
    b == b'\r' || b == b'\n'
}

/// Streaming SA818 line codec
#[derive(Debug)]
pub struct LineCodec {
    buffer: Vec<u8>,
}

impl LineCodec {
    /// Create a new line codec
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(256),
        }
    }

    /// Extract the next non-empty line, trimmed of surrounding whitespace
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    pub fn next_line(&mut self) -> Option<String> {
        loop {
            let term_pos = self.buffer.iter().position(|&b| is_terminator(b))?;

            let line_bytes: Vec<u8> = self.buffer.drain(..=term_pos).collect();
            let line = String::from_utf8_lossy(&line_bytes[..term_pos]);
            let line = line.trim();

            if !line.is_empty() {
                return Some(line.to_string());
            }
        }
    }

    /// Number of buffered bytes not yet consumed as a line
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolCodec for LineCodec {
    type Command = Sa818Command;

    fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);

        // A peer that never sends a terminator must not grow the buffer forever
        if self.buffer.len() > MAX_PENDING_LEN && !self.buffer.iter().any(|&b| is_terminator(b)) {
            tracing::warn!(
                "Discarding {} unterminated bytes",
                self.buffer.len() - OVERFLOW_KEEP_LEN
            );
            let start = self.buffer.len() - OVERFLOW_KEEP_LEN;
            self.buffer.drain(..start);
        }
    }

    fn next_command(&mut self) -> Option<Self::Command> {
        self.next_command_with_line().map(|(cmd, _)| cmd)
    }

    fn next_command_with_line(&mut self) -> Option<(Self::Command, String)> {
        let line = self.next_line()?;
        let cmd = match Sa818Command::parse(&line) {
            Ok(cmd) => cmd,
            Err(e) => {
                tracing::debug!("Unrecognised SA818 command: {}", e);
                Sa818Command::Unknown(line.clone())
            }
        };
        Some((cmd, line))
    }

    fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line_lf() {
        let mut codec = LineCodec::new();
        codec.push_bytes(b"AT+DMOCONNECT\n");

        assert_eq!(codec.next_line().as_deref(), Some("AT+DMOCONNECT"));
        assert_eq!(codec.next_line(), None);
        assert_eq!(codec.pending_len(), 0);
    }

    #[test]
    fn test_crlf_does_not_produce_extra_line() {
        let mut codec = LineCodec::new();
        codec.push_bytes(b"RSSI?\r\n");

        assert_eq!(codec.next_command(), Some(Sa818Command::ReadRssi));
        assert_eq!(codec.next_command(), None);
    }

    #[test]
    fn test_first_terminator_wins() {
        let mut codec = LineCodec::new();
        codec.push_bytes(b"AT\rAT+VERSION\nRSSI?");

        assert_eq!(codec.next_line().as_deref(), Some("AT"));
        assert_eq!(codec.next_line().as_deref(), Some("AT+VERSION"));
        assert_eq!(codec.next_line(), None);
        assert_eq!(codec.pending_len(), 5);
    }

    #[test]
    fn test_multiple_lines_in_one_chunk() {
        let mut codec = LineCodec::new();
        codec.push_bytes(b"AT\r\nAT+DMOSETVOLUME=5\r\nRSSI?\r\n");

        assert_eq!(codec.next_command(), Some(Sa818Command::Handshake));
        assert_eq!(codec.next_command(), Some(Sa818Command::SetVolume(5)));
        assert_eq!(codec.next_command(), Some(Sa818Command::ReadRssi));
        assert_eq!(codec.next_command(), None);
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut codec = LineCodec::new();
        codec.push_bytes(b"AT+DMOSET");
        assert_eq!(codec.next_command(), None);

        codec.push_bytes(b"VOLUME=3");
        assert_eq!(codec.next_command(), None);

        codec.push_bytes(b"\r");
        assert_eq!(codec.next_command(), Some(Sa818Command::SetVolume(3)));
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let mut codec = LineCodec::new();
        codec.push_bytes(b"\r\n\n  \t \r");
        assert_eq!(codec.next_line(), None);
        assert_eq!(codec.pending_len(), 0);

        codec.push_bytes(b"\n\nAT\n");
        assert_eq!(codec.next_line().as_deref(), Some("AT"));
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut codec = LineCodec::new();
        codec.push_bytes(b"FO\xFFO\n");

        let (cmd, line) = codec.next_command_with_line().unwrap();
        assert_eq!(line, "FO\u{FFFD}O");
        assert_eq!(cmd, Sa818Command::Unknown("FO\u{FFFD}O".to_string()));
    }

    #[test]
    fn test_unknown_command_carries_line() {
        let mut codec = LineCodec::new();
        codec.push_bytes(b"FOO=1\r\n");

        let (cmd, line) = codec.next_command_with_line().unwrap();
        assert_eq!(cmd, Sa818Command::Unknown("FOO=1".to_string()));
        assert_eq!(line, "FOO=1");
    }

    #[test]
    fn test_overflow_keeps_tail() {
        let mut codec = LineCodec::new();
        codec.push_bytes(&[b'X'; MAX_PENDING_LEN + 1]);
        assert_eq!(codec.pending_len(), OVERFLOW_KEEP_LEN);

        codec.push_bytes(b"\nAT\n");
        // The truncated garbage still forms one line before the real command
        assert!(codec.next_line().is_some());
        assert_eq!(codec.next_command(), Some(Sa818Command::Handshake));
    }

    #[test]
    fn test_clear() {
        let mut codec = LineCodec::new();
        codec.push_bytes(b"AT+DMOCON");
        codec.clear();
        codec.push_bytes(b"AT\n");
        assert_eq!(codec.next_command(), Some(Sa818Command::Handshake));
    }
}
