// crates/conformance-core/src/runtime/coordinator.rs
// ============================================================================
// Module: Run Coordinator
// Description: Step-by-step sequence execution and plan scheduling.
// Purpose: Convert step outcomes into verdicts and merge state updates.
// Dependencies: crate::{core, interfaces, runtime}, thiserror
// ============================================================================

//! ## Overview
//! The run coordinator executes the steps of a sequence strictly in order,
//! converting every [`StepError`] into a [`Verdict`]. Only configuration
//! errors and an unusable state lock abort the run; an aborted plan still
//! hands back the reports that finished. Plans are executed in
//! dependency waves; sequences within a wave run on scoped threads and share
//! the instance state bag through [`SharedInstanceState`], whose lock is held
//! only while a snapshot is taken or updates are merged.
//!
//! Security posture: run events carry state key names, never values.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

use thiserror::Error;

use crate::core::RunEvent;
use crate::core::RunEventKind;
use crate::core::RunReport;
use crate::core::SequenceDefinition;
use crate::core::SequenceName;
use crate::core::SequenceReport;
use crate::core::SequenceScratch;
use crate::core::SharedInstanceState;
use crate::core::StateError;
use crate::core::StepContext;
use crate::core::StepError;
use crate::core::StepReport;
use crate::core::StepSettings;
use crate::core::TestId;
use crate::core::TestStep;
use crate::core::Verdict;
use crate::interfaces::RunLogSink;
use crate::runtime::cancel::CancellationToken;
use crate::runtime::log::NoopRunLog;
use crate::runtime::registry::SequencePlan;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors that abort a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    /// A step could not construct a collaborator.
    #[error("configuration error in {test_id}: {message}")]
    Configuration {
        /// Step that raised the error.
        test_id: TestId,
        /// Underlying message.
        message: String,
    },
    /// The instance state bag became unusable.
    #[error("instance state unavailable: {0}")]
    State(#[from] StateError),
    /// A sequence worker thread panicked.
    #[error("sequence worker panicked: {0}")]
    Worker(SequenceName),
}

/// A run that aborted, with the reports completed before the abort.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{cause}")]
pub struct RunAbort {
    /// Why the run stopped.
    pub cause: RunError,
    /// Reports of the sequences that finished, in plan order.
    pub partial: RunReport,
}

// ============================================================================
// SECTION: Target
// ============================================================================

/// Label of the system under test, used in logs and reports.
///
/// Connection details (base URL, endpoints) travel through the instance
/// state bag so later sequences can read what earlier ones discovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTarget {
    /// Human-readable target label.
    label: String,
}

impl RunTarget {
    /// Creates a target label.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    /// Returns the target label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

// ============================================================================
// SECTION: Coordinator
// ============================================================================

/// Outcome of one step before it is logged.
struct StepOutcome {
    /// Primary verdict.
    verdict: Verdict,
    /// Secondary warning verdicts.
    warnings: Vec<Verdict>,
    /// True when the remaining steps must not run.
    halt: bool,
}

/// Executes sequences against a shared instance state bag.
pub struct RunCoordinator {
    /// Settings handed to every step.
    settings: StepSettings,
    /// Run event sink.
    log: Arc<dyn RunLogSink>,
    /// Cancellation signal checked before every step.
    cancel: CancellationToken,
    /// Maximum sequences running at once within a wave.
    max_parallel: usize,
}

impl Default for RunCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl RunCoordinator {
    /// Creates a sequential coordinator with default settings and no logging.
    #[must_use]
    pub fn new() -> Self {
        Self {
            settings: StepSettings::default(),
            log: Arc::new(NoopRunLog),
            cancel: CancellationToken::new(),
            max_parallel: 1,
        }
    }

    /// Sets the step settings.
    #[must_use]
    pub const fn with_settings(mut self, settings: StepSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the run event sink.
    #[must_use]
    pub fn with_log_sink(mut self, log: Arc<dyn RunLogSink>) -> Self {
        self.log = log;
        self
    }

    /// Uses an externally owned cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Sets the per-wave parallelism; zero is treated as one.
    #[must_use]
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    /// Returns a handle to the cancellation token.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs one sequence and returns its report.
    ///
    /// When cancellation was raised before the first step the report is
    /// empty and marked cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] when a step raises a configuration error or the
    /// state lock is poisoned.
    pub fn run(
        &self,
        sequence: &SequenceDefinition,
        state: &SharedInstanceState,
        target: &RunTarget,
    ) -> Result<SequenceReport, RunError> {
        Ok(self.execute(sequence, state, target)?.unwrap_or_else(|| SequenceReport {
            sequence: sequence.name.clone(),
            optional: sequence.optional,
            steps: Vec::new(),
            cancelled: true,
            state: BTreeMap::new(),
        }))
    }

    /// Runs every sequence of a plan and returns reports in plan order.
    ///
    /// Sequences that never started because of cancellation have no report.
    ///
    /// # Errors
    ///
    /// Returns [`RunAbort`] when any sequence aborts the run. It carries the
    /// reports of every sequence that finished before the abort.
    pub fn run_plan(
        &self,
        plan: &SequencePlan,
        state: &SharedInstanceState,
        target: &RunTarget,
    ) -> Result<RunReport, RunAbort> {
        let sequences = plan.sequences();
        let mut reports: Vec<Option<SequenceReport>> = vec![None; sequences.len()];
        if let Err(cause) = self.run_waves(plan, state, target, &mut reports) {
            let partial: Vec<SequenceReport> = reports.into_iter().flatten().collect();
            let cancelled =
                self.cancel.is_cancelled() || partial.iter().any(|report| report.cancelled);
            return Err(RunAbort {
                cause,
                partial: RunReport {
                    sequences: partial,
                    cancelled,
                },
            });
        }

        let not_started: Vec<SequenceName> = sequences
            .iter()
            .zip(&reports)
            .filter(|(_, report)| report.is_none())
            .map(|(sequence, _)| sequence.name.clone())
            .collect();
        let sequences: Vec<SequenceReport> = reports.into_iter().flatten().collect();
        let cancelled =
            !not_started.is_empty() || sequences.iter().any(|report| report.cancelled);
        if cancelled {
            self.log.record(&RunEvent::now(RunEventKind::RunCancelled {
                not_started,
            }));
        }
        let report = RunReport {
            sequences,
            cancelled,
        };
        self.log.record(&RunEvent::now(RunEventKind::RunFinished {
            summary: report.summary(),
        }));
        Ok(report)
    }

    /// Executes the plan wave by wave, filling `reports` by plan index.
    ///
    /// Every sibling in a parallel batch is joined and recorded before the
    /// first error of the batch is returned.
    fn run_waves(
        &self,
        plan: &SequencePlan,
        state: &SharedInstanceState,
        target: &RunTarget,
        reports: &mut [Option<SequenceReport>],
    ) -> Result<(), RunError> {
        let sequences = plan.sequences();
        for wave in plan.waves() {
            if self.cancel.is_cancelled() {
                break;
            }
            for batch in wave.chunks(self.max_parallel) {
                if let [index] = batch {
                    reports[*index] = self.execute(&sequences[*index], state, target)?;
                    continue;
                }
                let results = thread::scope(|scope| {
                    let handles: Vec<_> = batch
                        .iter()
                        .map(|&index| {
                            let sequence = &sequences[index];
                            (index, scope.spawn(move || self.execute(sequence, state, target)))
                        })
                        .collect();
                    handles
                        .into_iter()
                        .map(|(index, handle)| {
                            let joined = handle
                                .join()
                                .map_err(|_| RunError::Worker(sequences[index].name.clone()))
                                .and_then(|result| result);
                            (index, joined)
                        })
                        .collect::<Vec<_>>()
                });
                let mut failure = None;
                for (index, result) in results {
                    match result {
                        Ok(report) => reports[index] = report,
                        Err(err) => failure = failure.or(Some(err)),
                    }
                }
                if let Some(err) = failure {
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Runs one sequence; returns `None` when it never started.
    fn execute(
        &self,
        sequence: &SequenceDefinition,
        state: &SharedInstanceState,
        target: &RunTarget,
    ) -> Result<Option<SequenceReport>, RunError> {
        let mut scratch = SequenceScratch::new();
        let mut steps = Vec::with_capacity(sequence.steps.len());
        let mut skip_reason: Option<String> = None;
        let mut cancelled = false;

        if self.cancel.is_cancelled() {
            return Ok(None);
        }
        self.log.record(&RunEvent::now(RunEventKind::SequenceStarted {
            target: target.label().to_string(),
            sequence: sequence.name.clone(),
        }));
        for (index, step) in sequence.steps.iter().enumerate() {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let test_id = step.resolved_test_id(&sequence.test_id_prefix, index);
            let outcome = match &skip_reason {
                Some(reason) => StepOutcome {
                    verdict: Verdict::Skip {
                        reason: reason.clone(),
                    },
                    warnings: Vec::new(),
                    halt: false,
                },
                None => self.execute_step(sequence, step, &test_id, state, &mut scratch)?,
            };
            if step.metadata.precondition && skip_reason.is_none() && !outcome.verdict.is_pass() {
                skip_reason = Some(format!("precondition {test_id} did not pass"));
            }
            self.log.record(&RunEvent::now(RunEventKind::StepFinished {
                sequence: sequence.name.clone(),
                test_id: test_id.clone(),
                verdict: outcome.verdict.kind(),
                message: outcome.verdict.message().map(str::to_string),
                warnings: outcome.warnings.len(),
            }));
            let halt = outcome.halt;
            steps.push(StepReport {
                test_id,
                name: step.metadata.name.clone(),
                spec_link: step.metadata.link.clone(),
                optional: step.metadata.optional,
                verdict: outcome.verdict,
                warnings: outcome.warnings,
            });
            if halt {
                break;
            }
        }

        let mut keys = sequence.requires.clone();
        keys.extend(sequence.defines.iter().cloned());
        let snapshot = state.snapshot()?.project(&keys);
        self.log.record(&RunEvent::now(RunEventKind::SequenceFinished {
            sequence: sequence.name.clone(),
            steps: steps.len(),
            cancelled,
        }));
        Ok(Some(SequenceReport {
            sequence: sequence.name.clone(),
            optional: sequence.optional,
            steps,
            cancelled,
            state: snapshot,
        }))
    }

    /// Runs one step body and merges its updates when it passes.
    fn execute_step(
        &self,
        sequence: &SequenceDefinition,
        step: &TestStep,
        test_id: &TestId,
        state: &SharedInstanceState,
        scratch: &mut SequenceScratch,
    ) -> Result<StepOutcome, RunError> {
        let snapshot = state.snapshot()?;
        if let Some(key) = sequence.requires.iter().find(|key| !snapshot.contains(key)) {
            return Ok(engine_error(StepError::MissingState(key.clone()), Vec::new()));
        }

        let mut ctx = StepContext::new(&snapshot, scratch, self.settings);
        let result = step.body().run(&mut ctx);
        let (updates, warnings) = ctx.finish();

        let verdict = match result {
            Ok(()) => {
                if let Err(err) = updates.ensure_declared(&sequence.defines) {
                    return Ok(engine_error(err, warnings));
                }
                if !updates.is_empty() {
                    match state.merge(&updates) {
                        Ok(()) => {
                            self.log.record(&RunEvent::now(RunEventKind::StateMerged {
                                sequence: sequence.name.clone(),
                                keys: updates.keys().cloned().collect(),
                            }));
                        }
                        Err(StateError::Poisoned) => return Err(StateError::Poisoned.into()),
                        Err(err) => return Ok(engine_error(err, warnings)),
                    }
                }
                Verdict::Pass
            }
            Err(StepError::Skip(reason)) => Verdict::Skip {
                reason,
            },
            Err(err @ (StepError::Assertion(_) | StepError::Transport(_))) => Verdict::Fail {
                message: err.to_string(),
            },
            Err(StepError::Configuration(message)) => {
                return Err(RunError::Configuration {
                    test_id: test_id.clone(),
                    message,
                });
            }
            Err(
                err @ (StepError::MissingState(_)
                | StepError::StateType {
                    ..
                }
                | StepError::Internal(_)),
            ) => return Ok(engine_error(err, warnings)),
        };
        Ok(StepOutcome {
            verdict,
            warnings,
            halt: false,
        })
    }
}

/// Builds an error verdict that halts the owning sequence.
fn engine_error(cause: impl ToString, warnings: Vec<Verdict>) -> StepOutcome {
    StepOutcome {
        verdict: Verdict::Error {
            cause: cause.to_string(),
        },
        warnings,
        halt: true,
    }
}
