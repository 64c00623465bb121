// crates/conformance-core/tests/assertions.rs
// ============================================================================
// Module: Assertion Library Tests
// Description: Protocol-version assertions against a simulated server.
// Purpose: Ensure probe outcomes map to pass, fail, and skip deterministically.
// Dependencies: conformance-core
// ============================================================================
//! ## Overview
//! Uses [`common::FakeProbe`] as a deterministic "server accepts version"
//! oracle to check the allow/deny complement and the assertion helpers.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use conformance_core::ProtocolProbe;
use conformance_core::ProtocolVersion;
use conformance_core::StepError;
use conformance_core::assert_previous_versions_denied;
use conformance_core::assert_that;
use conformance_core::assert_tls_at_least;

use crate::common::FakeProbe;

// ============================================================================
// SECTION: Complement
// ============================================================================

#[test]
fn allow_and_deny_probes_are_complements() {
    for version in ProtocolVersion::ALL {
        for server_accepts in [true, false] {
            let accepted = if server_accepts { vec![version] } else { Vec::new() };
            let probe = FakeProbe::accepting(&accepted);
            let allow = probe.probe_must_allow(version);
            let deny = probe.probe_must_deny(version, version.label());
            assert_ne!(
                allow.allowed, deny.allowed,
                "exactly one probe must report conformance for {version} (accepts={server_accepts})"
            );
            assert_eq!(allow.allowed, server_accepts);
        }
    }
}

#[test]
fn deny_violation_names_the_version_label() {
    let probe = FakeProbe::accepting(&[ProtocolVersion::Tls1_0]);
    let result = probe.probe_must_deny(ProtocolVersion::Tls1_0, ProtocolVersion::Tls1_0.label());
    assert_eq!(result.detail, "Should not allow connections with TLSv1.0");
}

// ============================================================================
// SECTION: assert_that
// ============================================================================

#[test]
fn assert_that_maps_false_to_assertion_failure() {
    assert_eq!(assert_that(true, "unused"), Ok(()));
    assert_eq!(assert_that(false, "boom"), Err(StepError::Assertion("boom".to_string())));
}

// ============================================================================
// SECTION: assert_tls_at_least
// ============================================================================

#[test]
fn tls_at_least_passes_when_minimum_accepted() {
    let probe = FakeProbe::accepting(&[ProtocolVersion::Tls1_2, ProtocolVersion::Tls1_3]);
    assert_eq!(assert_tls_at_least(&probe, ProtocolVersion::Tls1_2), Ok(()));
    assert_eq!(probe.calls(), vec![ProtocolVersion::Tls1_2]);
}

#[test]
fn tls_at_least_fails_with_probe_detail() {
    let probe = FakeProbe::accepting(&[ProtocolVersion::Tls1_3]);
    let err = assert_tls_at_least(&probe, ProtocolVersion::Tls1_2).unwrap_err();
    assert_eq!(
        err,
        StepError::Assertion("Caught TLS error: received fatal alert: ProtocolVersion".to_string())
    );
}

#[test]
fn tls_at_least_skips_when_pinning_unsupported() {
    let probe = FakeProbe::accepting(&[ProtocolVersion::Tls1_2]).pinnable(&[ProtocolVersion::Tls1_3]);
    let err = assert_tls_at_least(&probe, ProtocolVersion::Tls1_2).unwrap_err();
    assert!(matches!(err, StepError::Skip(_)));
    assert!(probe.calls().is_empty(), "no probe is attempted when pinning is unsupported");
}

// ============================================================================
// SECTION: assert_previous_versions_denied
// ============================================================================

#[test]
fn previous_versions_denied_passes_for_modern_server() {
    let probe = FakeProbe::accepting(&[ProtocolVersion::Tls1_2, ProtocolVersion::Tls1_3]);
    assert_eq!(assert_previous_versions_denied(&probe, ProtocolVersion::Tls1_2), Ok(()));
    assert_eq!(
        probe.calls(),
        vec![ProtocolVersion::Ssl3, ProtocolVersion::Tls1_0, ProtocolVersion::Tls1_1]
    );
}

#[test]
fn previous_versions_denied_lists_every_accepted_legacy_version() {
    let probe = FakeProbe::accepting(&[
        ProtocolVersion::Tls1_0,
        ProtocolVersion::Tls1_1,
        ProtocolVersion::Tls1_2,
    ]);
    let err = assert_previous_versions_denied(&probe, ProtocolVersion::Tls1_2).unwrap_err();
    assert_eq!(
        err,
        StepError::Assertion(
            "Should not allow connections with TLSv1.0; Should not allow connections with TLSv1.1"
                .to_string()
        )
    );
}

#[test]
fn previous_versions_denied_ignores_unpinnable_versions() {
    let probe = FakeProbe::accepting(&[ProtocolVersion::Ssl3, ProtocolVersion::Tls1_2])
        .pinnable(&[ProtocolVersion::Tls1_1, ProtocolVersion::Tls1_2]);
    assert_eq!(assert_previous_versions_denied(&probe, ProtocolVersion::Tls1_2), Ok(()));
    assert_eq!(probe.calls(), vec![ProtocolVersion::Tls1_1]);
}

#[test]
fn previous_versions_denied_skips_when_nothing_is_pinnable() {
    let probe = FakeProbe::accepting(&[ProtocolVersion::Tls1_2])
        .pinnable(&[ProtocolVersion::Tls1_2, ProtocolVersion::Tls1_3]);
    let err = assert_previous_versions_denied(&probe, ProtocolVersion::Tls1_2).unwrap_err();
    assert!(matches!(err, StepError::Skip(_)));
}
