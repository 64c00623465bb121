// crates/conformance-core/src/core/step.rs
// ============================================================================
// Module: Step Execution Context
// Description: Read/write access a step body has while it runs.
// Purpose: Mediate state access so the coordinator owns every merge.
// Dependencies: crate::core::{identifiers, state, verdict}, serde_json
// ============================================================================

//! ## Overview
//! A [`StepContext`] exposes a snapshot of the instance state bag, a staging
//! area for updates, a per-sequence scratch map, and a warning channel. Step
//! bodies return `Result<(), StepError>`; the run coordinator alone decides
//! how each [`StepError`] becomes a verdict.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::StateKey;
use crate::core::state::InstanceState;
use crate::core::state::StateUpdates;
use crate::core::state::StateValue;
use crate::core::state::StateValueKind;
use crate::core::verdict::Verdict;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors a step body can return.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    /// A conformance assertion did not hold.
    #[error("{0}")]
    Assertion(String),
    /// The step chose not to evaluate.
    #[error("skipped: {0}")]
    Skip(String),
    /// A required state key was absent (ordering bug upstream).
    #[error("missing required state: {0}")]
    MissingState(StateKey),
    /// A state key held the wrong kind of value.
    #[error("state key {key} is {actual}, expected {expected}")]
    StateType {
        /// Key that was read.
        key: StateKey,
        /// Kind the step expected.
        expected: StateValueKind,
        /// Kind found in the bag.
        actual: StateValueKind,
    },
    /// Network or protocol transport failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// Collaborator construction failed; aborts the run.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Unexpected engine-side failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StepError {
    /// Builds an assertion failure.
    #[must_use]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::Assertion(message.into())
    }

    /// Builds a skip.
    #[must_use]
    pub fn skip(reason: impl Into<String>) -> Self {
        Self::Skip(reason.into())
    }
}

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Run-wide switches visible to step bodies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepSettings {
    /// Skip every transport-security check.
    pub disable_tls_tests: bool,
}

// ============================================================================
// SECTION: Context
// ============================================================================

/// Scratch values shared by the steps of one sequence run.
pub type SequenceScratch = BTreeMap<String, Value>;

/// Execution context handed to a step body.
pub struct StepContext<'a> {
    /// Snapshot of the instance state taken when the step started.
    state: &'a InstanceState,
    /// Scratch map owned by the current sequence run.
    scratch: &'a mut SequenceScratch,
    /// Run-wide settings.
    settings: StepSettings,
    /// Updates staged for merge on success.
    updates: StateUpdates,
    /// Secondary warning verdicts.
    warnings: Vec<Verdict>,
}

impl<'a> StepContext<'a> {
    /// Creates a context over a state snapshot and a sequence scratch map.
    #[must_use]
    pub fn new(
        state: &'a InstanceState,
        scratch: &'a mut SequenceScratch,
        settings: StepSettings,
    ) -> Self {
        Self {
            state,
            scratch,
            settings,
            updates: StateUpdates::new(),
            warnings: Vec::new(),
        }
    }

    /// Returns the run-wide settings.
    #[must_use]
    pub const fn settings(&self) -> StepSettings {
        self.settings
    }

    /// Returns the value stored under `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&StateValue> {
        self.state.get(&StateKey::new(key))
    }

    /// Returns the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::MissingState`] when the key is absent.
    pub fn require(&self, key: &str) -> Result<&StateValue, StepError> {
        self.get(key).ok_or_else(|| StepError::MissingState(StateKey::new(key)))
    }

    /// Returns a required text value.
    ///
    /// # Errors
    ///
    /// Returns [`StepError`] when the key is absent or not text.
    pub fn require_text(&self, key: &str) -> Result<&str, StepError> {
        let value = self.require(key)?;
        value.as_text().ok_or_else(|| type_error(key, StateValueKind::Text, value))
    }

    /// Returns a required boolean value.
    ///
    /// # Errors
    ///
    /// Returns [`StepError`] when the key is absent or not a boolean.
    pub fn require_bool(&self, key: &str) -> Result<bool, StepError> {
        let value = self.require(key)?;
        value.as_bool().ok_or_else(|| type_error(key, StateValueKind::Bool, value))
    }

    /// Returns a required list value. A text value is accepted as a
    /// single-element list.
    ///
    /// # Errors
    ///
    /// Returns [`StepError`] when the key is absent or neither list nor text.
    pub fn require_list(&self, key: &str) -> Result<Vec<String>, StepError> {
        match self.require(key)? {
            StateValue::List(values) => Ok(values.clone()),
            StateValue::Text(value) => Ok(vec![value.clone()]),
            other => Err(type_error(key, StateValueKind::List, other)),
        }
    }

    /// Stages a state update, merged only if the step passes.
    pub fn define(&mut self, key: &str, value: impl Into<StateValue>) {
        self.updates.set(key, value);
    }

    /// Stores a scratch value for later steps of this sequence.
    pub fn stash(&mut self, key: &str, value: Value) {
        self.scratch.insert(key.to_string(), value);
    }

    /// Returns a scratch value stored by an earlier step.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::Internal`] when no earlier step stored `key`.
    pub fn stashed(&self, key: &str) -> Result<&Value, StepError> {
        self.scratch
            .get(key)
            .ok_or_else(|| StepError::Internal(format!("no earlier step produced {key}")))
    }

    /// Records a non-blocking check.
    ///
    /// Assertion and transport failures become warning verdicts and skips are
    /// dropped; every other error is passed through.
    ///
    /// # Errors
    ///
    /// Returns the original error for missing state, configuration, and
    /// internal failures.
    pub fn warn(&mut self, outcome: Result<(), StepError>) -> Result<(), StepError> {
        match outcome {
            Ok(()) | Err(StepError::Skip(_)) => Ok(()),
            Err(StepError::Assertion(message) | StepError::Transport(message)) => {
                self.warnings.push(Verdict::Warning {
                    message,
                });
                Ok(())
            }
            Err(other) => Err(other),
        }
    }

    /// Consumes the context, returning staged updates and warnings.
    #[must_use]
    pub fn finish(self) -> (StateUpdates, Vec<Verdict>) {
        (self.updates, self.warnings)
    }
}

/// Builds a state type error for `key`.
fn type_error(key: &str, expected: StateValueKind, actual: &StateValue) -> StepError {
    StepError::StateType {
        key: StateKey::new(key),
        expected,
        actual: actual.kind(),
    }
}
