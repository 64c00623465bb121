// crates/conformance-core/src/core/verdict.rs
// ============================================================================
// Module: Verdicts and Reports
// Description: Step verdicts, sequence run reports, and run summaries.
// Purpose: Record conformance outcomes with citations for the report renderer.
// Dependencies: crate::core::{identifiers, state}, serde
// ============================================================================

//! ## Overview
//! A [`Verdict`] is produced fresh for every executed step and never mutated.
//! [`SequenceReport`] collects the verdicts of one sequence run in step order;
//! [`RunReport`] collects sequence reports in plan order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::SequenceName;
use crate::core::identifiers::StateKey;
use crate::core::identifiers::TestId;
use crate::core::state::StateValue;

// ============================================================================
// SECTION: Verdict
// ============================================================================

/// Outcome of executing one test step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Verdict {
    /// The check passed.
    Pass,
    /// The server violated the check.
    Fail {
        /// Failure message.
        message: String,
    },
    /// The check was not evaluated.
    Skip {
        /// Skip reason.
        reason: String,
    },
    /// Non-blocking conformance note.
    Warning {
        /// Warning message.
        message: String,
    },
    /// The engine could not produce a trustworthy verdict.
    Error {
        /// Underlying cause.
        cause: String,
    },
}

impl Verdict {
    /// Returns the verdict kind.
    #[must_use]
    pub const fn kind(&self) -> VerdictKind {
        match self {
            Self::Pass => VerdictKind::Pass,
            Self::Fail {
                ..
            } => VerdictKind::Fail,
            Self::Skip {
                ..
            } => VerdictKind::Skip,
            Self::Warning {
                ..
            } => VerdictKind::Warning,
            Self::Error {
                ..
            } => VerdictKind::Error,
        }
    }

    /// Returns the message, reason, or cause attached to the verdict.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Pass => None,
            Self::Fail {
                message,
            }
            | Self::Warning {
                message,
            } => Some(message),
            Self::Skip {
                reason,
            } => Some(reason),
            Self::Error {
                cause,
            } => Some(cause),
        }
    }

    /// Returns true for [`Verdict::Pass`].
    #[must_use]
    pub const fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

/// Verdict classification used for logging and counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictKind {
    /// Passed.
    Pass,
    /// Failed.
    Fail,
    /// Skipped.
    Skip,
    /// Warning only.
    Warning,
    /// Engine error.
    Error,
}

impl VerdictKind {
    /// Returns a stable label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Skip => "skip",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

// ============================================================================
// SECTION: Reports
// ============================================================================

/// Verdict of one step with its metadata for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    /// Full test identifier (prefix + step id).
    pub test_id: TestId,
    /// Step name.
    pub name: String,
    /// Specification link cited by the step.
    pub spec_link: String,
    /// Whether the step is optional.
    pub optional: bool,
    /// Primary verdict.
    pub verdict: Verdict,
    /// Secondary, non-blocking warning verdicts.
    pub warnings: Vec<Verdict>,
}

/// Ordered verdicts for one sequence run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceReport {
    /// Sequence name.
    pub sequence: SequenceName,
    /// Whether the sequence is optional.
    pub optional: bool,
    /// Step reports in declared order, for every step that was reached.
    pub steps: Vec<StepReport>,
    /// True when cancellation stopped the sequence before its last step.
    pub cancelled: bool,
    /// Snapshot of the sequence's `requires` and `defines` keys at completion.
    pub state: BTreeMap<StateKey, StateValue>,
}

impl SequenceReport {
    /// Returns the report for a given test identifier.
    #[must_use]
    pub fn step(&self, test_id: &str) -> Option<&StepReport> {
        self.steps.iter().find(|step| step.test_id.as_str() == test_id)
    }
}

/// Reports for every sequence that started, in plan order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Sequence reports.
    pub sequences: Vec<SequenceReport>,
    /// True when the run was cancelled before finishing.
    pub cancelled: bool,
}

impl RunReport {
    /// Returns the report for a named sequence.
    #[must_use]
    pub fn sequence(&self, name: &str) -> Option<&SequenceReport> {
        self.sequences.iter().find(|report| report.sequence.as_str() == name)
    }

    /// Computes verdict counts across the run.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for sequence in &self.sequences {
            for step in &sequence.steps {
                summary.record(step.verdict.kind());
                summary.warnings += step.warnings.len();
                if !sequence.optional && !step.optional {
                    summary.required_total += 1;
                    if step.verdict.is_pass() {
                        summary.required_passed += 1;
                    }
                }
            }
        }
        summary
    }
}

/// Verdict counts for a run.
///
/// # Invariants
/// - `required_*` counts exclude optional sequences and optional steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Passed steps.
    pub passed: usize,
    /// Failed steps.
    pub failed: usize,
    /// Skipped steps.
    pub skipped: usize,
    /// Warnings, both primary and secondary.
    pub warnings: usize,
    /// Steps ending in an engine error.
    pub errors: usize,
    /// Steps that count toward certification.
    pub required_total: usize,
    /// Required steps that passed.
    pub required_passed: usize,
}

impl RunSummary {
    /// Adds one primary verdict to the counts.
    const fn record(&mut self, kind: VerdictKind) {
        match kind {
            VerdictKind::Pass => self.passed += 1,
            VerdictKind::Fail => self.failed += 1,
            VerdictKind::Skip => self.skipped += 1,
            VerdictKind::Warning => self.warnings += 1,
            VerdictKind::Error => self.errors += 1,
        }
    }
}
