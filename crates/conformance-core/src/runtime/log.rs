// crates/conformance-core/src/runtime/log.rs
// ============================================================================
// Module: Run Log Sinks
// Description: JSON-lines sinks for run events.
// Purpose: Emit structured run events to stderr, a file, or memory.
// Dependencies: crate::{core, interfaces}, serde_json
// ============================================================================

//! ## Overview
//! Sinks serialize each [`RunEvent`] as one JSON object per line. Write
//! failures are swallowed so logging never changes a verdict.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use crate::core::RunEvent;
use crate::interfaces::RunLogSink;

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Run log sink that writes JSON lines to stderr.
pub struct StderrRunLog;

impl RunLogSink for StderrRunLog {
    fn record(&self, event: &RunEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

/// Run log sink that appends JSON lines to a file.
pub struct FileRunLog {
    /// File handle used for append-only logging.
    file: Mutex<File>,
}

impl FileRunLog {
    /// Opens the log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl RunLogSink for FileRunLog {
    fn record(&self, event: &RunEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op run log sink.
pub struct NoopRunLog;

impl RunLogSink for NoopRunLog {
    fn record(&self, _event: &RunEvent) {}
}

/// Run log sink that keeps events in memory.
#[derive(Default)]
pub struct MemoryRunLog {
    /// Recorded events in arrival order.
    events: Mutex<Vec<RunEvent>>,
}

impl MemoryRunLog {
    /// Creates an empty in-memory sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Returns the recorded events serialized as JSON lines.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.events().iter().filter_map(|event| serde_json::to_string(event).ok()).collect()
    }
}

impl RunLogSink for MemoryRunLog {
    fn record(&self, event: &RunEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
