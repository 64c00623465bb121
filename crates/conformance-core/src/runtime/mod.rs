// crates/conformance-core/src/runtime/mod.rs
// ============================================================================
// Module: Conformance Runtime
// Description: Registry, orderer, run coordinator, assertions, and log sinks.
// Purpose: Execute registered sequences against a target in a valid order.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules validate and order sequence definitions, execute them
//! step by step, and convert every step outcome into a verdict. The run
//! coordinator is the only component that decides whether an error is
//! recorded or propagated.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod assertions;
pub mod cancel;
pub mod coordinator;
pub mod log;
pub mod registry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use assertions::assert_previous_versions_denied;
pub use assertions::assert_that;
pub use assertions::assert_tls_at_least;
pub use cancel::CancellationToken;
pub use coordinator::RunAbort;
pub use coordinator::RunCoordinator;
pub use coordinator::RunError;
pub use coordinator::RunTarget;
pub use log::FileRunLog;
pub use log::MemoryRunLog;
pub use log::NoopRunLog;
pub use log::StderrRunLog;
pub use registry::MetadataError;
pub use registry::MetadataExemptions;
pub use registry::OrderingError;
pub use registry::RegistryError;
pub use registry::SequencePlan;
pub use registry::SequenceRegistry;
