// crates/conformance-core/src/interfaces/mod.rs
// ============================================================================
// Module: Conformance Interfaces
// Description: Contract surfaces between the engine and its collaborators.
// Purpose: Decouple step bodies, version probes, and log sinks from the runtime.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Interfaces define how the engine integrates with network probes and log
//! pipelines without embedding transport details. The TLS crate implements
//! [`ProtocolProbe`] and [`ProberFactory`]; tests substitute deterministic
//! fakes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::ProbeResult;
use crate::core::ProtocolVersion;
use crate::core::RunEvent;
use crate::core::StepContext;
use crate::core::StepError;

// ============================================================================
// SECTION: Step Body
// ============================================================================

/// Executable body of a test step.
pub trait StepBody: Send + Sync {
    /// Runs the step against the given context.
    ///
    /// # Errors
    ///
    /// Returns [`StepError`] describing why the step did not pass.
    fn run(&self, ctx: &mut StepContext<'_>) -> Result<(), StepError>;
}

impl<F> StepBody for F
where
    F: Fn(&mut StepContext<'_>) -> Result<(), StepError> + Send + Sync,
{
    fn run(&self, ctx: &mut StepContext<'_>) -> Result<(), StepError> {
        self(ctx)
    }
}

// ============================================================================
// SECTION: Protocol Probes
// ============================================================================

/// Construction errors for protocol probes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeConfigError {
    /// Neither an endpoint nor a complete host/port pair was supplied.
    #[error("an endpoint url or a host/port pair is required")]
    MissingTarget,
    /// The endpoint could not be parsed.
    #[error("invalid endpoint {0:?}: {1}")]
    InvalidEndpoint(String, String),
    /// Trust roots or client settings could not be loaded.
    #[error("probe setup failed: {0}")]
    Setup(String),
}

/// Pinned-version connection probe against one target.
pub trait ProtocolProbe: Send + Sync {
    /// Returns true when `version` can be pinned exactly on this platform.
    fn supports_version_pinning(&self, version: ProtocolVersion) -> bool;

    /// Probes a version the server must accept.
    fn probe_must_allow(&self, version: ProtocolVersion) -> ProbeResult;

    /// Probes a version the server must refuse; `allowed` means correctly denied.
    fn probe_must_deny(&self, version: ProtocolVersion, label: &str) -> ProbeResult;
}

/// Builds probes for endpoints discovered at run time.
pub trait ProberFactory: Send + Sync {
    /// Creates a probe for the endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeConfigError`] when the endpoint is unusable.
    fn prober_for(&self, endpoint: &str) -> Result<Box<dyn ProtocolProbe>, ProbeConfigError>;
}

impl From<ProbeConfigError> for StepError {
    fn from(err: ProbeConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

// ============================================================================
// SECTION: Run Log Sink
// ============================================================================

/// Sink for structured run events.
pub trait RunLogSink: Send + Sync {
    /// Records an event. Sinks must not fail the run.
    fn record(&self, event: &RunEvent);
}
