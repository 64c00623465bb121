// crates/conformance-core/src/runtime/registry.rs
// ============================================================================
// Module: Sequence Registry and Orderer
// Description: Registration-time validation and dependency ordering.
// Purpose: Produce a validated sequence plan before any sequence runs.
// Dependencies: crate::{core, interfaces}, thiserror
// ============================================================================

//! ## Overview
//! The registry holds every known [`SequenceDefinition`] in declaration
//! order. Registration validates step metadata and identifier uniqueness.
//! Ordering either validates an explicit list ([`SequenceRegistry::validate_ordering`])
//! or derives one ([`SequenceRegistry::plan`]); both yield a [`SequencePlan`]
//! whose every sequence has its `requires` keys defined by an earlier
//! sequence or pre-seeded.
//!
//! Security posture: ordering problems are configuration errors and fail
//! closed at startup, never at run time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;

use crate::core::MetadataIssue;
use crate::core::RunEvent;
use crate::core::RunEventKind;
use crate::core::SequenceDefinition;
use crate::core::SequenceMetadata;
use crate::core::SequenceName;
use crate::core::StateKey;
use crate::core::TestId;
use crate::interfaces::RunLogSink;
use crate::runtime::log::NoopRunLog;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Metadata violation on one registered step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("sequence {sequence} step {position} ({name:?}): {issue}")]
pub struct MetadataError {
    /// Sequence that declared the step.
    pub sequence: SequenceName,
    /// 1-based step position within the sequence.
    pub position: usize,
    /// Step name as declared (possibly empty).
    pub name: String,
    /// The violated metadata rule.
    pub issue: MetadataIssue,
}

/// Registration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A step failed metadata validation.
    #[error("metadata validation failed: {0}")]
    Metadata(#[from] MetadataError),
    /// A sequence with the same name is already registered.
    #[error("duplicate sequence name: {0}")]
    DuplicateSequence(SequenceName),
    /// The test id prefix is empty.
    #[error("sequence {0} has an empty test id prefix")]
    EmptyPrefix(SequenceName),
    /// Another sequence already uses the test id prefix.
    #[error("test id prefix {prefix} of {sequence} is already used by {existing}")]
    DuplicatePrefix {
        /// Rejected sequence.
        sequence: SequenceName,
        /// Conflicting prefix.
        prefix: String,
        /// Sequence that owns the prefix.
        existing: SequenceName,
    },
    /// Two steps of one sequence share a test id.
    #[error("sequence {sequence} declares test id {test_id} more than once")]
    DuplicateStepId {
        /// Sequence declaring the steps.
        sequence: SequenceName,
        /// Repeated test id.
        test_id: TestId,
    },
}

/// Ordering and planning errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderingError {
    /// The ordering names a sequence that is not registered.
    #[error("unknown sequence in ordering: {0}")]
    Unknown(SequenceName),
    /// The ordering lists a sequence more than once.
    #[error("duplicate sequence in ordering: {0}")]
    Duplicate(SequenceName),
    /// The ordering includes an inactive sequence.
    #[error("inactive sequence in ordering: {0}")]
    Inactive(SequenceName),
    /// The ordering omits an active sequence.
    #[error("ordering omits active sequence: {0}")]
    Missing(SequenceName),
    /// A required key is not defined by any earlier sequence or pre-seeded.
    #[error("sequence {sequence} requires {key}, which nothing before it defines")]
    UnsatisfiedRequirement {
        /// Sequence with the unmet requirement.
        sequence: SequenceName,
        /// Missing state key.
        key: StateKey,
    },
    /// The remaining sequences depend on each other.
    #[error("dependency cycle among sequences: {}", join_names(.0))]
    DependencyCycle(Vec<SequenceName>),
}

/// Joins sequence names for error messages.
fn join_names(names: &[SequenceName]) -> String {
    names.iter().map(SequenceName::as_str).collect::<Vec<_>>().join(", ")
}

// ============================================================================
// SECTION: Exemptions
// ============================================================================

/// Step names excused from metadata validation.
///
/// # Invariants
/// - The set is explicit and inspectable; no pattern matching is applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataExemptions {
    /// Exact step names.
    names: BTreeSet<String>,
}

impl MetadataExemptions {
    /// Creates an empty exemption set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an exempt step name.
    #[must_use]
    pub fn exempt(mut self, name: impl Into<String>) -> Self {
        self.names.insert(name.into());
        self
    }

    /// Returns true when `name` is exempt.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Returns the exempt names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for MetadataExemptions {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}

// ============================================================================
// SECTION: Plan
// ============================================================================

/// Validated execution order over active sequences.
///
/// # Invariants
/// - Every sequence's `requires` set is covered by pre-seeded keys and the
///   `defines` sets of the sequences before it.
#[derive(Debug, Clone)]
pub struct SequencePlan {
    /// Sequences in execution order.
    sequences: Vec<Arc<SequenceDefinition>>,
    /// Keys available before the first sequence.
    preseeded: BTreeSet<StateKey>,
}

impl SequencePlan {
    /// Returns the sequences in execution order.
    #[must_use]
    pub fn sequences(&self) -> &[Arc<SequenceDefinition>] {
        &self.sequences
    }

    /// Returns the sequence names in execution order.
    #[must_use]
    pub fn names(&self) -> Vec<SequenceName> {
        self.sequences.iter().map(|sequence| sequence.name.clone()).collect()
    }

    /// Returns the pre-seeded keys the plan was validated against.
    #[must_use]
    pub const fn preseeded(&self) -> &BTreeSet<StateKey> {
        &self.preseeded
    }

    /// Returns the number of planned sequences.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    /// Returns true when nothing is planned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Splits the plan into dependency waves of plan indices.
    ///
    /// A sequence lands in the wave after the last earlier sequence that
    /// defines a key it requires or defines, or that requires a key it
    /// defines. Sequences in one wave share no such edge and may run in
    /// parallel.
    #[must_use]
    pub fn waves(&self) -> Vec<Vec<usize>> {
        let mut levels: Vec<usize> = Vec::with_capacity(self.sequences.len());
        for (index, sequence) in self.sequences.iter().enumerate() {
            let level = self.sequences[..index]
                .iter()
                .zip(levels.iter())
                .filter(|(earlier, _)| conflicts(earlier, sequence))
                .map(|(_, level)| level + 1)
                .max()
                .unwrap_or(0);
            levels.push(level);
        }
        let depth = levels.iter().max().map_or(0, |max| max + 1);
        let mut waves = vec![Vec::new(); depth];
        for (index, level) in levels.into_iter().enumerate() {
            waves[level].push(index);
        }
        waves
    }
}

/// Returns true when `later` must not run concurrently with `earlier`.
fn conflicts(earlier: &SequenceDefinition, later: &SequenceDefinition) -> bool {
    earlier.defines.iter().any(|key| later.requires.contains(key) || later.defines.contains(key))
        || earlier.requires.iter().any(|key| later.defines.contains(key))
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Registry of sequence definitions in declaration order.
pub struct SequenceRegistry {
    /// Registered sequences in declaration order.
    sequences: Vec<Arc<SequenceDefinition>>,
    /// Step names excused from metadata validation.
    exemptions: MetadataExemptions,
    /// Sink receiving `plan_built` events.
    log: Arc<dyn RunLogSink>,
}

impl Default for SequenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceRegistry {
    /// Creates an empty registry with no exemptions.
    #[must_use]
    pub fn new() -> Self {
        Self::with_exemptions(MetadataExemptions::new())
    }

    /// Creates an empty registry with an explicit exemption set.
    #[must_use]
    pub fn with_exemptions(exemptions: MetadataExemptions) -> Self {
        Self {
            sequences: Vec::new(),
            exemptions,
            log: Arc::new(NoopRunLog),
        }
    }

    /// Sets the sink that receives planning events.
    #[must_use]
    pub fn with_log_sink(mut self, log: Arc<dyn RunLogSink>) -> Self {
        self.log = log;
        self
    }

    /// Returns the exemption set.
    #[must_use]
    pub const fn exemptions(&self) -> &MetadataExemptions {
        &self.exemptions
    }

    /// Registers a sequence after validating it.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when a step fails metadata validation or a
    /// name, prefix, or step id collides.
    pub fn register(&mut self, sequence: SequenceDefinition) -> Result<(), RegistryError> {
        if self.get(sequence.name.as_str()).is_some() {
            return Err(RegistryError::DuplicateSequence(sequence.name));
        }
        if sequence.test_id_prefix.trim().is_empty() {
            return Err(RegistryError::EmptyPrefix(sequence.name));
        }
        if let Some(existing) =
            self.sequences.iter().find(|other| other.test_id_prefix == sequence.test_id_prefix)
        {
            return Err(RegistryError::DuplicatePrefix {
                sequence: sequence.name.clone(),
                prefix: sequence.test_id_prefix.clone(),
                existing: existing.name.clone(),
            });
        }
        let mut seen = BTreeSet::new();
        for (index, step) in sequence.steps.iter().enumerate() {
            if !self.exemptions.contains(&step.metadata.name) {
                step.metadata.validate().map_err(|issue| MetadataError {
                    sequence: sequence.name.clone(),
                    position: index + 1,
                    name: step.metadata.name.clone(),
                    issue,
                })?;
            }
            let test_id = step.resolved_test_id(&sequence.test_id_prefix, index);
            if !seen.insert(test_id.clone()) {
                return Err(RegistryError::DuplicateStepId {
                    sequence: sequence.name.clone(),
                    test_id,
                });
            }
        }
        self.sequences.push(Arc::new(sequence));
        Ok(())
    }

    /// Returns the named sequence.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SequenceDefinition> {
        self.sequences.iter().find(|sequence| sequence.name.as_str() == name).map(AsRef::as_ref)
    }

    /// Returns registered sequences in declaration order.
    pub fn sequences(&self) -> impl Iterator<Item = &SequenceDefinition> {
        self.sequences.iter().map(AsRef::as_ref)
    }

    /// Returns metadata for every registered sequence in declaration order.
    #[must_use]
    pub fn metadata(&self) -> Vec<SequenceMetadata> {
        self.sequences.iter().map(|sequence| sequence.metadata()).collect()
    }

    /// Returns the number of registered sequences.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    /// Returns true when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Validates an explicit ordering and returns it as a plan.
    ///
    /// The structural check runs first (unknown, duplicate, inactive, and
    /// omitted sequences), then the dependency check against `preseeded`.
    ///
    /// # Errors
    ///
    /// Returns [`OrderingError`] describing the first violation found.
    pub fn validate_ordering(
        &self,
        order: &[SequenceName],
        preseeded: &BTreeSet<StateKey>,
    ) -> Result<SequencePlan, OrderingError> {
        let mut listed = BTreeSet::new();
        let mut planned = Vec::with_capacity(order.len());
        for name in order {
            let sequence = self
                .sequences
                .iter()
                .find(|sequence| &sequence.name == name)
                .ok_or_else(|| OrderingError::Unknown(name.clone()))?;
            if !listed.insert(name.clone()) {
                return Err(OrderingError::Duplicate(name.clone()));
            }
            if sequence.inactive {
                return Err(OrderingError::Inactive(name.clone()));
            }
            planned.push(Arc::clone(sequence));
        }
        if let Some(missing) =
            self.sequences.iter().find(|sequence| !sequence.inactive && !listed.contains(&sequence.name))
        {
            return Err(OrderingError::Missing(missing.name.clone()));
        }

        let mut available = preseeded.clone();
        for sequence in &planned {
            if let Some(key) = sequence.requires.iter().find(|key| !available.contains(*key)) {
                return Err(OrderingError::UnsatisfiedRequirement {
                    sequence: sequence.name.clone(),
                    key: key.clone(),
                });
            }
            available.extend(sequence.defines.iter().cloned());
        }
        Ok(self.finish_plan(planned, preseeded))
    }

    /// Derives an ordering over all active sequences.
    ///
    /// Repeatedly schedules the earliest-declared sequence whose `requires`
    /// keys are all available, so independent sequences keep declaration
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`OrderingError::UnsatisfiedRequirement`] when a required key
    /// is neither pre-seeded nor defined by any active sequence, and
    /// [`OrderingError::DependencyCycle`] when the remaining sequences
    /// depend on each other.
    pub fn plan(&self, preseeded: &BTreeSet<StateKey>) -> Result<SequencePlan, OrderingError> {
        let mut pending: Vec<&Arc<SequenceDefinition>> =
            self.sequences.iter().filter(|sequence| !sequence.inactive).collect();

        let mut definable = preseeded.clone();
        for sequence in &pending {
            definable.extend(sequence.defines.iter().cloned());
        }
        for sequence in &pending {
            if let Some(key) = sequence.requires.iter().find(|key| !definable.contains(*key)) {
                return Err(OrderingError::UnsatisfiedRequirement {
                    sequence: sequence.name.clone(),
                    key: key.clone(),
                });
            }
        }

        let mut available = preseeded.clone();
        let mut planned = Vec::with_capacity(pending.len());
        while !pending.is_empty() {
            let Some(position) = pending
                .iter()
                .position(|sequence| sequence.requires.iter().all(|key| available.contains(key)))
            else {
                return Err(OrderingError::DependencyCycle(
                    pending.iter().map(|sequence| sequence.name.clone()).collect(),
                ));
            };
            let next = pending.remove(position);
            available.extend(next.defines.iter().cloned());
            planned.push(Arc::clone(next));
        }
        Ok(self.finish_plan(planned, preseeded))
    }

    /// Builds the plan and records the `plan_built` event.
    fn finish_plan(
        &self,
        sequences: Vec<Arc<SequenceDefinition>>,
        preseeded: &BTreeSet<StateKey>,
    ) -> SequencePlan {
        let plan = SequencePlan {
            sequences,
            preseeded: preseeded.clone(),
        };
        self.log.record(&RunEvent::now(RunEventKind::PlanBuilt {
            sequences: plan.names(),
        }));
        plan
    }
}
