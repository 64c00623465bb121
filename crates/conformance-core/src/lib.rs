// crates/conformance-core/src/lib.rs
// ============================================================================
// Module: Conformance Core Library
// Description: Public API surface for the conformance engine.
// Purpose: Expose core types, interfaces, and runtime helpers.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Conformance core registers citation-tagged test sequences, orders them by
//! their declared state dependencies, and runs them against a target while
//! threading an instance state bag between sequences. Network access lives
//! behind explicit interfaces so the engine stays transport-agnostic.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use interfaces::ProbeConfigError;
pub use interfaces::ProberFactory;
pub use interfaces::ProtocolProbe;
pub use interfaces::RunLogSink;
pub use interfaces::StepBody;
pub use runtime::CancellationToken;
pub use runtime::FileRunLog;
pub use runtime::MemoryRunLog;
pub use runtime::MetadataError;
pub use runtime::MetadataExemptions;
pub use runtime::NoopRunLog;
pub use runtime::OrderingError;
pub use runtime::RegistryError;
pub use runtime::RunAbort;
pub use runtime::RunCoordinator;
pub use runtime::RunError;
pub use runtime::RunTarget;
pub use runtime::SequencePlan;
pub use runtime::SequenceRegistry;
pub use runtime::StderrRunLog;
pub use runtime::assert_previous_versions_denied;
pub use runtime::assert_that;
pub use runtime::assert_tls_at_least;
