// crates/conformance-tls/src/error.rs
// ============================================================================
// Module: Probe Failures
// Description: Reasons a pinned-version connection attempt did not complete.
// Purpose: Carry verbatim transport errors into probe detail text.
// Dependencies: rustls, thiserror
// ============================================================================

//! ## Overview
//! A [`ProbeFailure`] is never surfaced as an error to callers. The tester
//! renders it into [`conformance_core::ProbeResult`] detail text, where a
//! failure is a violation for allow probes and conformance for deny probes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io;

use thiserror::Error;

// ============================================================================
// SECTION: Failures
// ============================================================================

/// Why one connection attempt failed.
#[derive(Debug, Error)]
pub(crate) enum ProbeFailure {
    /// Socket-level failure, including timeouts and resets.
    #[error("{0}")]
    Io(#[from] io::Error),
    /// rustls rejected the configuration or the session.
    #[error("{0}")]
    Tls(#[from] rustls::Error),
    /// The host name resolved to no addresses.
    #[error("no address found for {0}")]
    Resolve(String),
    /// The peer closed the connection before answering.
    #[error("connection closed by peer")]
    Closed,
    /// The peer answered with an alert.
    #[error("received fatal alert: {0}")]
    Alert(String),
    /// The peer negotiated a different version than the one offered.
    #[error("server negotiated {negotiated} instead of {requested}")]
    VersionMismatch {
        /// Offered version label.
        requested: &'static str,
        /// Negotiated version label.
        negotiated: String,
    },
    /// The peer answered with something other than a TLS handshake reply.
    #[error("unexpected server reply: {0}")]
    Unexpected(String),
    /// This build cannot offer the version on its own.
    #[error("version pinning for {0} is not supported")]
    Unsupported(&'static str),
    /// The client random could not be generated.
    #[error("failed to generate client random")]
    Random,
}
