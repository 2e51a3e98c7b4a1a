//! JSON-lines trace reading
//!
//! One decoded `TraceEvent` per line, blank lines skipped. This is the only
//! boundary of the analysis that can fail; everything past it recovers
//! locally with diagnostics.

use crate::events::TraceEvent;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while reading a trace file
#[derive(Error, Debug)]
pub enum TraceReadError {
    #[error("failed to open trace file {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to read trace file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed event on line {line}: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },
}

/// Result type for trace reading operations
pub type Result<T> = std::result::Result<T, TraceReadError>;

/// Read a complete event stream from a JSON-lines trace file
pub fn read_events(path: &Path) -> Result<Vec<TraceEvent>> {
    let file = File::open(path).map_err(|source| TraceReadError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let reader = BufReader::new(file);

    let mut events = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let event = serde_json::from_str(trimmed).map_err(|source| TraceReadError::Parse {
            line: number + 1,
            source,
        })?;
        events.push(event);
    }
    tracing::debug!(count = events.len(), "trace loaded");
    Ok(events)
}
