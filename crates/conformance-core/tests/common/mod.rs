// crates/conformance-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared step builders and a deterministic protocol probe.
// Purpose: Keep conformance-core integration tests short and deterministic.
// Dependencies: conformance-core
// ============================================================================

//! ## Overview
//! Builders for citation-complete steps and sequences, plus [`FakeProbe`],
//! a protocol probe driven by a fixed "server accepts version" oracle.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Mutex;

use conformance_core::ProbeResult;
use conformance_core::ProtocolProbe;
use conformance_core::ProtocolVersion;
use conformance_core::SequenceDefinition;
use conformance_core::StepContext;
use conformance_core::StepError;
use conformance_core::StepMetadata;
use conformance_core::TestStep;

// ============================================================================
// SECTION: Builders
// ============================================================================

/// Citation link used by fixture steps.
pub const LINK: &str = "https://tools.ietf.org/html/rfc7591";

/// Builds complete metadata for a fixture step.
pub fn meta(id: u16, name: &str) -> StepMetadata {
    StepMetadata::new(id, name, LINK, format!("{name} must hold."))
}

/// Builds a step from metadata and a closure body.
pub fn step_with<F>(metadata: StepMetadata, body: F) -> TestStep
where
    F: Fn(&mut StepContext<'_>) -> Result<(), StepError> + Send + Sync + 'static,
{
    TestStep::new(metadata, body)
}

/// Builds a step with complete metadata and a closure body.
pub fn step<F>(id: u16, name: &str, body: F) -> TestStep
where
    F: Fn(&mut StepContext<'_>) -> Result<(), StepError> + Send + Sync + 'static,
{
    step_with(meta(id, name), body)
}

/// Builds a step that always passes.
pub fn passing(id: u16, name: &str) -> TestStep {
    step(id, name, |_| Ok(()))
}

/// Builds a described sequence with one passing step.
pub fn sequence(name: &str, prefix: &str) -> SequenceDefinition {
    SequenceDefinition::new(name, format!("{name} title"), prefix)
        .description(format!("{name} checks"))
        .step(passing(1, &format!("{name} first step")))
}

/// Builds a described sequence with no steps.
pub fn empty_sequence(name: &str, prefix: &str) -> SequenceDefinition {
    SequenceDefinition::new(name, format!("{name} title"), prefix)
        .description(format!("{name} checks"))
}

// ============================================================================
// SECTION: Fake Probe
// ============================================================================

/// Protocol probe backed by a fixed acceptance oracle.
pub struct FakeProbe {
    /// Versions the simulated server accepts.
    accepted: BTreeSet<ProtocolVersion>,
    /// Versions the simulated platform can pin.
    pinnable: BTreeSet<ProtocolVersion>,
    /// Versions probed, in call order.
    calls: Mutex<Vec<ProtocolVersion>>,
}

impl FakeProbe {
    /// Simulates a server accepting exactly `accepted`; every version is pinnable.
    pub fn accepting(accepted: &[ProtocolVersion]) -> Self {
        Self {
            accepted: accepted.iter().copied().collect(),
            pinnable: ProtocolVersion::ALL.into_iter().collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Restricts the versions the simulated platform can pin.
    pub fn pinnable(mut self, pinnable: &[ProtocolVersion]) -> Self {
        self.pinnable = pinnable.iter().copied().collect();
        self
    }

    /// Returns the probed versions in call order.
    pub fn calls(&self) -> Vec<ProtocolVersion> {
        self.calls.lock().unwrap().clone()
    }
}

impl ProtocolProbe for FakeProbe {
    fn supports_version_pinning(&self, version: ProtocolVersion) -> bool {
        self.pinnable.contains(&version)
    }

    fn probe_must_allow(&self, version: ProtocolVersion) -> ProbeResult {
        self.calls.lock().unwrap().push(version);
        if self.accepted.contains(&version) {
            ProbeResult::conformant(format!("Allowed connection with {}", version.label()))
        } else {
            ProbeResult::violation("Caught TLS error: received fatal alert: ProtocolVersion")
        }
    }

    fn probe_must_deny(&self, version: ProtocolVersion, label: &str) -> ProbeResult {
        self.calls.lock().unwrap().push(version);
        if self.accepted.contains(&version) {
            ProbeResult::violation(format!("Should not allow connections with {label}"))
        } else {
            ProbeResult::conformant(
                "Correctly denied connection: received fatal alert: ProtocolVersion",
            )
        }
    }
}
