// crates/conformance-sequences/src/resources.rs
// ============================================================================
// Module: Sequence Resources
// Description: Collaborators shared by every built-in step body.
// Purpose: Hand steps an HTTP client and a probe factory without globals.
// Dependencies: conformance-core, crate::http
// ============================================================================

//! ## Overview
//! [`SequenceResources`] is built once per run and shared by `Arc` with the
//! step closures of every built-in sequence. It also carries the transport
//! security check common to every sequence that talks to a new endpoint.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use conformance_core::ProbeConfigError;
use conformance_core::ProberFactory;
use conformance_core::ProtocolVersion;
use conformance_core::StepContext;
use conformance_core::StepError;
use conformance_core::assert_previous_versions_denied;
use conformance_core::assert_tls_at_least;

use crate::http::JsonClient;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Skip reason used when transport security checks are switched off.
pub const TLS_DISABLED_REASON: &str = "TLS tests have been disabled by configuration.";

// ============================================================================
// SECTION: Resources
// ============================================================================

/// Network collaborators for built-in steps.
#[derive(Clone)]
pub struct SequenceResources {
    /// JSON client for HTTP exchanges.
    pub http: JsonClient,
    /// Factory building version probes for discovered endpoints.
    pub probes: Arc<dyn ProberFactory>,
}

impl SequenceResources {
    /// Bundles an HTTP client with a probe factory.
    #[must_use]
    pub fn new(http: JsonClient, probes: Arc<dyn ProberFactory>) -> Self {
        Self {
            http,
            probes,
        }
    }

    /// Requires TLS 1.2 or newer on `endpoint` and warns when older versions
    /// are still accepted.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::Skip`] when TLS tests are disabled,
    /// [`StepError::Assertion`] when the endpoint is not a usable URL or
    /// TLS 1.2 is refused, and [`StepError::Configuration`] when probe setup
    /// itself fails.
    pub fn check_transport_security(
        &self,
        ctx: &mut StepContext<'_>,
        endpoint: &str,
    ) -> Result<(), StepError> {
        if ctx.settings().disable_tls_tests {
            return Err(StepError::skip(TLS_DISABLED_REASON));
        }
        // Endpoints come from the server under test, so a bad one is a finding.
        let probe = self.probes.prober_for(endpoint).map_err(|err| match err {
            ProbeConfigError::InvalidEndpoint(..) | ProbeConfigError::MissingTarget => {
                StepError::Assertion(format!("Cannot test transport security: {err}"))
            }
            ProbeConfigError::Setup(_) => StepError::from(err),
        })?;
        assert_tls_at_least(probe.as_ref(), ProtocolVersion::Tls1_2)?;
        ctx.warn(assert_previous_versions_denied(probe.as_ref(), ProtocolVersion::Tls1_2))
    }
}
