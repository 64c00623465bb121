// crates/conformance-core/src/runtime/assertions.rs
// ============================================================================
// Module: Assertion Library
// Description: Predicate helpers that turn checks into step outcomes.
// Purpose: Express conformance checks as typed results, never panics.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Assertions return `Result<(), StepError>`. A failed predicate becomes
//! [`StepError::Assertion`]; a check the platform cannot perform becomes
//! [`StepError::Skip`]. Callers wrap non-blocking checks with
//! [`StepContext::warn`](crate::core::StepContext::warn).

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::ProtocolVersion;
use crate::core::StepError;
use crate::interfaces::ProtocolProbe;

// ============================================================================
// SECTION: Assertions
// ============================================================================

/// Fails with `message` unless `condition` holds.
///
/// # Errors
///
/// Returns [`StepError::Assertion`] when `condition` is false.
pub fn assert_that(condition: bool, message: impl Into<String>) -> Result<(), StepError> {
    if condition { Ok(()) } else { Err(StepError::Assertion(message.into())) }
}

/// Requires the server to accept a connection pinned to `minimum`.
///
/// # Errors
///
/// Returns [`StepError::Skip`] when `minimum` cannot be pinned on this
/// platform, and [`StepError::Assertion`] carrying the probe detail when the
/// pinned connection fails.
pub fn assert_tls_at_least(
    probe: &dyn ProtocolProbe,
    minimum: ProtocolVersion,
) -> Result<(), StepError> {
    if !probe.supports_version_pinning(minimum) {
        return Err(StepError::skip(format!(
            "{} version pinning is not supported on this platform",
            minimum.label()
        )));
    }
    let result = probe.probe_must_allow(minimum);
    assert_that(result.allowed, result.detail)
}

/// Requires the server to refuse every version older than `minimum`.
///
/// Versions this platform cannot pin are left out; when none can be pinned
/// the whole check is skipped.
///
/// # Errors
///
/// Returns [`StepError::Assertion`] listing every accepted legacy version,
/// or [`StepError::Skip`] when no older version can be probed.
pub fn assert_previous_versions_denied(
    probe: &dyn ProtocolProbe,
    minimum: ProtocolVersion,
) -> Result<(), StepError> {
    let testable: Vec<ProtocolVersion> = minimum
        .predecessors()
        .into_iter()
        .filter(|version| probe.supports_version_pinning(*version))
        .collect();
    if testable.is_empty() {
        return Err(StepError::skip(format!(
            "no version older than {} can be pinned on this platform",
            minimum.label()
        )));
    }
    let violations: Vec<String> = testable
        .into_iter()
        .map(|version| probe.probe_must_deny(version, version.label()))
        .filter(|result| !result.allowed)
        .map(|result| result.detail)
        .collect();
    assert_that(violations.is_empty(), violations.join("; "))
}
