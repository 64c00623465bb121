// crates/conformance-tls/src/lib.rs
// ============================================================================
// Module: Conformance TLS
// Description: Protocol-version compliance probes for conformance runs.
// Purpose: Implement the engine's protocol probe contract over real sockets.
// Dependencies: conformance-core, rustls, rustls-pki-types, url, webpki-roots
// ============================================================================

//! ## Overview
//! This crate implements [`conformance_core::ProtocolProbe`] with
//! [`ComplianceTester`] and [`conformance_core::ProberFactory`] with
//! [`TlsProberFactory`]. Every probe opens a fresh connection offering one
//! protocol version and reports the outcome as detail text; nothing here
//! decides verdicts, which is left to the assertion library.
//!
//! Security posture: server responses are untrusted and bounded in size.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod error;
mod hello;
pub mod tester;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use tester::ComplianceTester;
pub use tester::DEFAULT_PROBE_TIMEOUT;
pub use tester::ProbeTarget;
pub use tester::TlsProbeConfig;
pub use tester::TlsProberFactory;
pub use tester::load_root_certificates;
