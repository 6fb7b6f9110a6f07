//! Raw trace records and trace-file reading.
//!
//! A raw event is what the transport hands us: a numeric event id, a
//! relative timestamp in milliseconds, and an indexed payload whose layout
//! depends on the event id (see [`crate::events::ids`]). Recorded trace
//! files are either a JSON array of such records or one record per line.

use crate::utils::error::ParseError;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// One record replayed from a trace session or file.
///
/// **Public** - input type of the aggregation core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    /// Numeric event id from the server's manifest
    pub event_id: u16,

    /// Relative timestamp in milliseconds, non-decreasing within a session
    pub timestamp_msec: f64,

    /// Indexed payload fields; layout depends on `event_id`
    #[serde(default)]
    pub payload: Vec<Value>,
}

impl RawEvent {
    /// Read an integer payload field by index.
    ///
    /// Returns `None` when the index is out of range or the field is not a
    /// number - malformed payloads are filtered input, not errors.
    pub fn payload_int(&self, index: usize) -> Option<i64> {
        self.payload.get(index).and_then(Value::as_i64)
    }

    /// Read a string payload field by index.
    pub fn payload_str(&self, index: usize) -> Option<&str> {
        self.payload.get(index).and_then(Value::as_str)
    }
}

/// Read a recorded trace file.
///
/// **Public** - entry point used by the analyze command
///
/// Accepts either a JSON array of [`RawEvent`] records or JSON lines with
/// one record per line. Lines that fail to parse in line mode are skipped
/// with a warning so a single corrupt record does not discard a capture.
pub fn read_trace_file(path: impl AsRef<Path>) -> Result<Vec<RawEvent>, ParseError> {
    let path = path.as_ref();

    debug!("Reading trace file: {}", path.display());

    let mut file = File::open(path)?;

    // Sniff the first non-whitespace byte to pick array vs. lines mode.
    let mut probe = [0u8; 256];
    let read = file.read(&mut probe)?;
    let first = probe[..read]
        .iter()
        .copied()
        .find(|b| !b.is_ascii_whitespace());
    file.seek(SeekFrom::Start(0))?;

    let events = match first {
        Some(b'[') => serde_json::from_reader::<_, Vec<RawEvent>>(BufReader::new(file))?,
        Some(_) => read_json_lines(BufReader::new(file))?,
        None => {
            return Err(ParseError::InvalidFormat(format!(
                "trace file is empty: {}",
                path.display()
            )))
        }
    };

    debug!("Read {} raw events from {}", events.len(), path.display());

    Ok(events)
}

/// Parse one JSON record per line, skipping unparsable lines.
///
/// **Private** - internal helper for read_trace_file
fn read_json_lines(reader: impl BufRead) -> Result<Vec<RawEvent>, ParseError> {
    let mut events = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<RawEvent>(trimmed) {
            Ok(event) => events.push(event),
            Err(e) => warn!("Skipping unparsable trace record on line {}: {}", line_no + 1, e),
        }
    }

    Ok(events)
}
