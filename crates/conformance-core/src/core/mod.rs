// crates/conformance-core/src/core/mod.rs
// ============================================================================
// Module: Conformance Core Types
// Description: Canonical conformance data model.
// Purpose: Provide stable types for sequences, state, verdicts, and probes.
// Dependencies: serde, serde_json, url
// ============================================================================

//! ## Overview
//! Core types define sequence and step definitions, the instance state bag,
//! verdicts and reports, protocol version probe results, and run events.
//! They are the source of truth for any derived surface (CLI, web, reports).

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod events;
pub mod identifiers;
pub mod probe;
pub mod sequence;
pub mod state;
pub mod step;
pub mod verdict;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use events::RunEvent;
pub use events::RunEventKind;
pub use identifiers::SequenceName;
pub use identifiers::StateKey;
pub use identifiers::TestId;
pub use probe::ProbeResult;
pub use probe::ProtocolVersion;
pub use sequence::MetadataIssue;
pub use sequence::SequenceDefinition;
pub use sequence::SequenceMetadata;
pub use sequence::StepMetadata;
pub use sequence::StepMetadataView;
pub use sequence::TestStep;
pub use state::InstanceState;
pub use state::SharedInstanceState;
pub use state::StateError;
pub use state::StateUpdates;
pub use state::StateValue;
pub use state::StateValueKind;
pub use step::SequenceScratch;
pub use step::StepContext;
pub use step::StepError;
pub use step::StepSettings;
pub use verdict::RunReport;
pub use verdict::RunSummary;
pub use verdict::SequenceReport;
pub use verdict::StepReport;
pub use verdict::Verdict;
pub use verdict::VerdictKind;
