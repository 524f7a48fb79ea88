//! JSON-lines event log: one [`EventEnvelope`] per line.
//!
//! The log is the persisted record of a debate; `replay` folds it back into
//! a [`DebateState`](crux_coordination::DebateState).

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crux_coordination::EventEnvelope;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("event log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("event log {path}, line {line}: {source}")]
    Decode {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Appends envelopes to a file, flushing after each line.
pub struct EventLogWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    written: usize,
}

impl EventLogWriter {
    pub fn create(path: &Path) -> Result<Self, EventLogError> {
        let file = File::create(path).map_err(|source| EventLogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn append(&mut self, envelope: &EventEnvelope) -> Result<(), EventLogError> {
        let io_err = |source: std::io::Error| EventLogError::Io {
            path: self.path.clone(),
            source,
        };
        serde_json::to_writer(&mut self.writer, envelope).map_err(|e| io_err(e.into()))?;
        self.writer.write_all(b"\n").map_err(io_err)?;
        self.writer.flush().map_err(io_err)?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

/// Read every envelope from a log. Blank lines are skipped.
pub fn read_events(path: &Path) -> Result<Vec<EventEnvelope>, EventLogError> {
    let file = File::open(path).map_err(|source| EventLogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut events = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| EventLogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let envelope = serde_json::from_str(&line).map_err(|source| EventLogError::Decode {
            path: path.to_path_buf(),
            line: index + 1,
            source,
        })?;
        events.push(envelope);
    }
    Ok(events)
}
