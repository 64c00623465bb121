// crates/conformance-sequences/src/lib.rs
// ============================================================================
// Module: Conformance Sequences Library
// Description: Built-in sequences and the suite bootstrap.
// Purpose: Expose the authorization sequences and config-driven wiring.
// Dependencies: crate::{discovery, dynamic_registration, http, resources, suite}
// ============================================================================

//! ## Overview
//! Built-in sequences exercise a server's OAuth surface: discovery of the
//! authorization endpoints and dynamic client registration. Steps talk to
//! the server through [`JsonClient`] and probe transport security through a
//! [`conformance_core::ProberFactory`]; [`Suite`] wires both from config.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod discovery;
pub mod dynamic_registration;
pub mod http;
pub mod resources;
pub mod suite;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use discovery::DISCOVERY_SEQUENCE;
pub use discovery::discovery_sequence;
pub use dynamic_registration::DYNAMIC_REGISTRATION_SEQUENCE;
pub use dynamic_registration::dynamic_registration_sequence;
pub use http::HttpClientError;
pub use http::JsonClient;
pub use http::JsonResponse;
pub use resources::SequenceResources;
pub use resources::TLS_DISABLED_REASON;
pub use suite::Suite;
pub use suite::SuiteError;
pub use suite::builtin_sequences;
pub use suite::open_log_sink;
pub use suite::probe_config;
pub use suite::register_builtin_sequences;
pub use suite::resources_from_config;
