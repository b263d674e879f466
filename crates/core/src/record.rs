//! Newline-delimited JSON record parsing for the hook log.
//!
//! Hook handlers append one JSON object per line. Parsing is lenient: blank
//! lines and lines that fail to deserialize are skipped, never reported as
//! an error to the caller.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::WatchError;

/// One hook event as written by a handler. The schema is opaque here; the
/// only structural requirement is that the line is a self-contained JSON
/// object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogRecord(Map<String, Value>);

impl LogRecord {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for LogRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Records parsed from a chunk plus the number of lines that were skipped.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ParsedChunk {
    pub records: Vec<LogRecord>,
    pub malformed: usize,
}

/// Parse a block of text into records, in line order.
///
/// Lines that are empty after trimming are ignored. Lines that are not a
/// JSON object are counted in `malformed` and dropped.
pub fn parse_chunk(text: &str) -> ParsedChunk {
    let mut chunk = ParsedChunk::default();

    for (idx, line) in text.split('\n').enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<LogRecord>(line) {
            Ok(record) => chunk.records.push(record),
            Err(e) => {
                tracing::trace!(line = idx + 1, error = %e, "Skipping malformed log line");
                chunk.malformed += 1;
            }
        }
    }

    chunk
}

/// Parse a block of text into records, discarding the malformed count.
pub fn parse_records(text: &str) -> Vec<LogRecord> {
    parse_chunk(text).records
}

/// Read and parse the whole log file.
///
/// A missing file is the normal state before the first hook fires and
/// yields an empty set.
pub async fn read_all_records(path: &Path) -> Result<Vec<LogRecord>, WatchError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(WatchError::io(path, e)),
    };

    let chunk = parse_chunk(&String::from_utf8_lossy(&bytes));
    if chunk.malformed > 0 {
        tracing::debug!(
            path = %path.display(),
            malformed = chunk.malformed,
            "Skipped malformed lines during full read"
        );
    }
    Ok(chunk.records)
}
