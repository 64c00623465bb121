// crates/conformance-core/src/core/probe.rs
// ============================================================================
// Module: Protocol Version Probes
// Description: Protocol version identifiers and probe results.
// Purpose: Share the version space between the tester and the assertions.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The version space is fixed and enumerable: SSLv3 through TLS 1.3. A
//! [`ProbeResult`] records whether one probe of one version reached the
//! conformant outcome, plus the verbatim detail text.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Protocol Versions
// ============================================================================

/// Transport security protocol version, ordered oldest to newest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolVersion {
    /// SSL 3.0.
    Ssl3,
    /// TLS 1.0.
    Tls1_0,
    /// TLS 1.1.
    Tls1_1,
    /// TLS 1.2.
    Tls1_2,
    /// TLS 1.3.
    Tls1_3,
}

impl ProtocolVersion {
    /// Every known version, oldest first.
    pub const ALL: [Self; 5] = [Self::Ssl3, Self::Tls1_0, Self::Tls1_1, Self::Tls1_2, Self::Tls1_3];

    /// Human-readable label used in verdict messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ssl3 => "SSLv3.0",
            Self::Tls1_0 => "TLSv1.0",
            Self::Tls1_1 => "TLSv1.1",
            Self::Tls1_2 => "TLSv1.2",
            Self::Tls1_3 => "TLSv1.3",
        }
    }

    /// Two-byte wire version (`major`, `minor`).
    #[must_use]
    pub const fn wire(self) -> [u8; 2] {
        match self {
            Self::Ssl3 => [0x03, 0x00],
            Self::Tls1_0 => [0x03, 0x01],
            Self::Tls1_1 => [0x03, 0x02],
            Self::Tls1_2 => [0x03, 0x03],
            Self::Tls1_3 => [0x03, 0x04],
        }
    }

    /// Versions strictly older than `self`, oldest first.
    #[must_use]
    pub fn predecessors(self) -> Vec<Self> {
        Self::ALL.into_iter().filter(|version| *version < self).collect()
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// SECTION: Probe Result
// ============================================================================

/// Result of one pinned-version probe.
///
/// For allow probes `allowed` means the connection succeeded; for deny probes
/// it means the server correctly refused the version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Whether the probe reached the conformant outcome.
    pub allowed: bool,
    /// Human-readable detail, including verbatim transport errors.
    pub detail: String,
}

impl ProbeResult {
    /// Builds a conformant result.
    #[must_use]
    pub fn conformant(detail: impl Into<String>) -> Self {
        Self {
            allowed: true,
            detail: detail.into(),
        }
    }

    /// Builds a non-conformant result.
    #[must_use]
    pub fn violation(detail: impl Into<String>) -> Self {
        Self {
            allowed: false,
            detail: detail.into(),
        }
    }
}
