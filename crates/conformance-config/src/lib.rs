// crates/conformance-config/src/lib.rs
// ============================================================================
// Module: Conformance Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for conformance.toml semantics.
// Dependencies: conformance-core, serde, toml
// ============================================================================

//! ## Overview
//! `conformance-config` defines the configuration model for conformance runs:
//! run scheduling, protocol probe settings, HTTP client settings, the
//! metadata exemption set, the run log sink, and pre-seeded instance state.
//! Validation is strict and fails closed.
//!
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
