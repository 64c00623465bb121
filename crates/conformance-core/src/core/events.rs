// crates/conformance-core/src/core/events.rs
// ============================================================================
// Module: Run Events
// Description: Structured run log event payloads.
// Purpose: Describe engine activity as JSON-serializable records.
// Dependencies: crate::core::{identifiers, verdict}, serde
// ============================================================================

//! ## Overview
//! Run events are emitted by the registry and the run coordinator and
//! serialized as one JSON object per line by the configured sink. Events
//! carry state key names but never state values, which may hold secrets.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::core::identifiers::SequenceName;
use crate::core::identifiers::StateKey;
use crate::core::identifiers::TestId;
use crate::core::verdict::RunSummary;
use crate::core::verdict::VerdictKind;

// ============================================================================
// SECTION: Event Payloads
// ============================================================================

/// Structured run event.
#[derive(Debug, Clone, Serialize)]
pub struct RunEvent {
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Event payload, tagged by `event`.
    #[serde(flatten)]
    pub kind: RunEventKind,
}

impl RunEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn now(kind: RunEventKind) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            timestamp_ms,
            kind,
        }
    }
}

/// Run event variants.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEventKind {
    /// A sequence plan was built or validated.
    PlanBuilt {
        /// Sequence names in execution order.
        sequences: Vec<SequenceName>,
    },
    /// A sequence started.
    SequenceStarted {
        /// Target label.
        target: String,
        /// Sequence name.
        sequence: SequenceName,
    },
    /// A step produced its verdict.
    StepFinished {
        /// Sequence name.
        sequence: SequenceName,
        /// Test identifier.
        test_id: TestId,
        /// Primary verdict kind.
        verdict: VerdictKind,
        /// Verdict message, if any.
        message: Option<String>,
        /// Number of secondary warnings.
        warnings: usize,
    },
    /// Step updates were merged into the instance state bag.
    StateMerged {
        /// Sequence name.
        sequence: SequenceName,
        /// Merged keys (values are never logged).
        keys: Vec<StateKey>,
    },
    /// A sequence finished or stopped.
    SequenceFinished {
        /// Sequence name.
        sequence: SequenceName,
        /// Number of step verdicts recorded.
        steps: usize,
        /// True when cancellation stopped the sequence.
        cancelled: bool,
    },
    /// Cancellation was observed and no further steps will start.
    RunCancelled {
        /// Sequences that never started.
        not_started: Vec<SequenceName>,
    },
    /// The run completed.
    RunFinished {
        /// Verdict counts.
        summary: RunSummary,
    },
}
