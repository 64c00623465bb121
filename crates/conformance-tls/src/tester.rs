// crates/conformance-tls/src/tester.rs
// ============================================================================
// Module: Protocol-Version Compliance Tester
// Description: Pinned-version connection probes against one server.
// Purpose: Report whether a server accepts or refuses each protocol version.
// Dependencies: conformance-core, rustls, rustls-pki-types, url, webpki-roots
// ============================================================================

//! ## Overview
//! [`ComplianceTester`] opens one fresh connection per probe, offering
//! exactly one protocol version. TLS 1.2 and 1.3 are pinned through rustls
//! and must complete the handshake plus a minimal HTTP request to count as
//! accepted. SSLv3, TLS 1.0, and TLS 1.1 are probed with a hand-encoded
//! ClientHello (see `hello`), which can be disabled through
//! [`TlsProbeConfig::legacy_hello_probes`].
//!
//! Invariants:
//! - Allow and deny probes of the same version are exact complements.
//! - Any connection error, including certificate failures and timeouts,
//!   means the version was refused.
//! - Probes never return errors; failures become [`ProbeResult`] detail text.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::ErrorKind;
use std::io::Read;
use std::io::Write;
use std::net::TcpStream;
use std::net::ToSocketAddrs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use conformance_core::ProbeConfigError;
use conformance_core::ProbeResult;
use conformance_core::ProberFactory;
use conformance_core::ProtocolProbe;
use conformance_core::ProtocolVersion;
use rustls::ClientConfig;
use rustls::ClientConnection;
use rustls::RootCertStore;
use rustls::StreamOwned;
use rustls::SupportedProtocolVersion;
use rustls::crypto::aws_lc_rs;
use rustls_pki_types::CertificateDer;
use rustls_pki_types::ServerName;
use rustls_pki_types::pem::PemObject;
use url::Host;
use url::Url;

use crate::error::ProbeFailure;
use crate::hello;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Default per-connection timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);
/// Largest response prefix read while waiting for the status line.
const MAX_STATUS_LINE_BYTES: usize = 8 * 1024;
/// User agent sent with the post-handshake request.
const PROBE_USER_AGENT: &str = "conformance-tls";

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Settings shared by every probe a tester issues.
///
/// # Invariants
/// - `timeout` bounds connect, read, and write separately and must be non-zero.
/// - `extra_roots` are trusted in addition to the bundled web PKI roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsProbeConfig {
    /// Per-connection timeout.
    pub timeout: Duration,
    /// Probe SSLv3, TLS 1.0, and TLS 1.1 with hand-encoded hellos.
    pub legacy_hello_probes: bool,
    /// Trust the bundled web PKI roots.
    pub use_webpki_roots: bool,
    /// Additional trust anchors.
    pub extra_roots: Vec<CertificateDer<'static>>,
}

impl Default for TlsProbeConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_PROBE_TIMEOUT,
            legacy_hello_probes: true,
            use_webpki_roots: true,
            extra_roots: Vec::new(),
        }
    }
}

/// Loads every certificate from a PEM file.
///
/// # Errors
///
/// Returns [`ProbeConfigError::Setup`] when the file is unreadable, malformed,
/// or holds no certificates.
pub fn load_root_certificates(
    path: &Path,
) -> Result<Vec<CertificateDer<'static>>, ProbeConfigError> {
    let certs = CertificateDer::pem_file_iter(path)
        .and_then(|certs| certs.collect::<Result<Vec<_>, _>>())
        .map_err(|err| ProbeConfigError::Setup(format!("{}: {err}", path.display())))?;
    if certs.is_empty() {
        let message = format!("{}: no certificates found", path.display());
        return Err(ProbeConfigError::Setup(message));
    }
    Ok(certs)
}

// ============================================================================
// SECTION: Target
// ============================================================================

/// Where a tester connects.
///
/// An endpoint URL takes precedence over the host/port pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeTarget {
    /// Full endpoint URL.
    pub endpoint: Option<String>,
    /// Host name or address.
    pub host: Option<String>,
    /// TCP port.
    pub port: Option<u16>,
}

impl ProbeTarget {
    /// Targets the host and port of an endpoint URL.
    #[must_use]
    pub fn endpoint(url: impl Into<String>) -> Self {
        Self {
            endpoint: Some(url.into()),
            ..Self::default()
        }
    }

    /// Targets an explicit host and port.
    #[must_use]
    pub fn host_port(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: Some(host.into()),
            port: Some(port),
            ..Self::default()
        }
    }
}

// ============================================================================
// SECTION: Tester
// ============================================================================

/// Pinned-version prober for one server.
#[derive(Debug, Clone)]
pub struct ComplianceTester {
    /// Host used for name resolution.
    host: String,
    /// TCP port.
    port: u16,
    /// Host header value.
    authority: String,
    /// Request target for the post-handshake request.
    request_path: String,
    /// Name verified against the server certificate.
    server_name: ServerName<'static>,
    /// Trust anchors.
    roots: Arc<RootCertStore>,
    /// Probe settings.
    config: TlsProbeConfig,
}

impl ComplianceTester {
    /// Builds a tester for a target.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeConfigError::MissingTarget`] when neither an endpoint
    /// nor a complete host/port pair is given, and other variants when the
    /// endpoint or trust roots are unusable.
    pub fn new(target: &ProbeTarget, config: TlsProbeConfig) -> Result<Self, ProbeConfigError> {
        let (host, port, request_path) = match (&target.endpoint, &target.host, target.port) {
            (Some(endpoint), _, _) => parse_endpoint(endpoint)?,
            (None, Some(host), Some(port)) if !host.trim().is_empty() => {
                (host.trim().to_string(), port, "/".to_string())
            }
            _ => return Err(ProbeConfigError::MissingTarget),
        };
        if config.timeout.is_zero() {
            return Err(ProbeConfigError::Setup("probe timeout must be non-zero".to_string()));
        }
        let server_name = ServerName::try_from(host.clone())
            .map_err(|err| ProbeConfigError::InvalidEndpoint(host.clone(), err.to_string()))?;

        let mut roots = RootCertStore::empty();
        if config.use_webpki_roots {
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        }
        for cert in &config.extra_roots {
            roots.add(cert.clone()).map_err(|err| ProbeConfigError::Setup(err.to_string()))?;
        }

        let authority = if host.contains(':') {
            format!("[{host}]:{port}")
        } else {
            format!("{host}:{port}")
        };
        Ok(Self {
            host,
            port,
            authority,
            request_path,
            server_name,
            roots: Arc::new(roots),
            config,
        })
    }

    /// Builds a tester for the host and port of an endpoint URL.
    ///
    /// # Errors
    ///
    /// See [`ComplianceTester::new`].
    pub fn for_endpoint(endpoint: &str, config: TlsProbeConfig) -> Result<Self, ProbeConfigError> {
        Self::new(&ProbeTarget::endpoint(endpoint), config)
    }

    /// Returns the probed host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the probed port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Attempts one connection offering exactly `version`.
    fn attempt(&self, version: ProtocolVersion) -> Result<(), ProbeFailure> {
        match version {
            ProtocolVersion::Tls1_2 => self.pinned_session(&rustls::version::TLS12),
            ProtocolVersion::Tls1_3 => self.pinned_session(&rustls::version::TLS13),
            legacy if self.config.legacy_hello_probes => self.legacy_hello(legacy),
            other => Err(ProbeFailure::Unsupported(other.label())),
        }
    }

    /// Full rustls handshake pinned to one version, then a minimal request.
    fn pinned_session(
        &self,
        version: &'static SupportedProtocolVersion,
    ) -> Result<(), ProbeFailure> {
        let config = ClientConfig::builder_with_provider(Arc::new(aws_lc_rs::default_provider()))
            .with_protocol_versions(&[version])?
            .with_root_certificates(Arc::clone(&self.roots))
            .with_no_client_auth();
        let conn = ClientConnection::new(Arc::new(config), self.server_name.clone())?;
        let mut tls = StreamOwned::new(conn, self.connect()?);
        while tls.conn.is_handshaking() {
            tls.conn.complete_io(&mut tls.sock)?;
        }
        if tls.conn.protocol_version() != Some(version.version) {
            return Err(ProbeFailure::VersionMismatch {
                requested: label_for(version),
                negotiated: "another version".to_string(),
            });
        }

        let request = format!(
            "GET {} HTTP/1.1\r\nHost: {}\r\nUser-Agent: {PROBE_USER_AGENT}\r\n\
             Accept: */*\r\nConnection: close\r\n\r\n",
            self.request_path, self.authority
        );
        tls.write_all(request.as_bytes())?;
        tls.flush()?;
        read_status_line(&mut tls)
    }

    /// Legacy version probe over a raw socket.
    fn legacy_hello(&self, version: ProtocolVersion) -> Result<(), ProbeFailure> {
        let mut stream = self.connect()?;
        let sni = match &self.server_name {
            ServerName::DnsName(name) => Some(name.as_ref()),
            _ => None,
        };
        hello::exchange(&mut stream, version, sni)
    }

    /// Connects to the first reachable resolved address.
    fn connect(&self) -> Result<TcpStream, ProbeFailure> {
        let timeout = self.config.timeout;
        let mut last_error = None;
        for addr in (self.host.as_str(), self.port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(timeout))?;
                    stream.set_write_timeout(Some(timeout))?;
                    return Ok(stream);
                }
                Err(err) => last_error = Some(err),
            }
        }
        Err(last_error.map_or_else(|| ProbeFailure::Resolve(self.host.clone()), ProbeFailure::Io))
    }
}

impl ProtocolProbe for ComplianceTester {
    fn supports_version_pinning(&self, version: ProtocolVersion) -> bool {
        match version {
            ProtocolVersion::Tls1_2 | ProtocolVersion::Tls1_3 => true,
            ProtocolVersion::Ssl3 | ProtocolVersion::Tls1_0 | ProtocolVersion::Tls1_1 => {
                self.config.legacy_hello_probes
            }
        }
    }

    fn probe_must_allow(&self, version: ProtocolVersion) -> ProbeResult {
        match self.attempt(version) {
            Ok(()) => ProbeResult::conformant(format!("Allowed connection with {}", version.label())),
            Err(err) => ProbeResult::violation(format!("Caught TLS error: {err}")),
        }
    }

    fn probe_must_deny(&self, version: ProtocolVersion, label: &str) -> ProbeResult {
        match self.attempt(version) {
            Ok(()) => ProbeResult::violation(format!("Should not allow connections with {label}")),
            Err(err) => ProbeResult::conformant(format!("Correctly denied connection: {err}")),
        }
    }
}

// ============================================================================
// SECTION: Factory
// ============================================================================

/// Builds [`ComplianceTester`]s for endpoints discovered during a run.
#[derive(Debug, Clone, Default)]
pub struct TlsProberFactory {
    /// Settings applied to every tester.
    config: TlsProbeConfig,
}

impl TlsProberFactory {
    /// Creates a factory with shared probe settings.
    #[must_use]
    pub const fn new(config: TlsProbeConfig) -> Self {
        Self {
            config,
        }
    }
}

impl ProberFactory for TlsProberFactory {
    fn prober_for(&self, endpoint: &str) -> Result<Box<dyn ProtocolProbe>, ProbeConfigError> {
        Ok(Box::new(ComplianceTester::for_endpoint(endpoint, self.config.clone())?))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Splits an endpoint URL into host, port, and request target.
fn parse_endpoint(endpoint: &str) -> Result<(String, u16, String), ProbeConfigError> {
    let invalid = |reason: &str| {
        ProbeConfigError::InvalidEndpoint(endpoint.to_string(), reason.to_string())
    };
    let url = Url::parse(endpoint).map_err(|err| invalid(&err.to_string()))?;
    let host = match url.host() {
        Some(Host::Domain(domain)) => domain.to_string(),
        Some(Host::Ipv4(addr)) => addr.to_string(),
        Some(Host::Ipv6(addr)) => addr.to_string(),
        None => return Err(invalid("missing host")),
    };
    let port = url.port_or_known_default().ok_or_else(|| invalid("missing port"))?;
    let mut request_path = url.path().to_string();
    if let Some(query) = url.query() {
        request_path.push('?');
        request_path.push_str(query);
    }
    Ok((host, port, request_path))
}

/// Waits for an HTTP status line on an established session.
fn read_status_line<R: Read>(reader: &mut R) -> Result<(), ProbeFailure> {
    let mut received = Vec::new();
    let mut chunk = [0u8; 512];
    while !received.windows(2).any(|pair| pair == b"\r\n")
        && received.len() < MAX_STATUS_LINE_BYTES
    {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(read) => received.extend_from_slice(chunk.get(.. read).unwrap_or_default()),
            Err(err) if err.kind() == ErrorKind::UnexpectedEof && !received.is_empty() => break,
            Err(err) => return Err(err.into()),
        }
    }
    if received.starts_with(b"HTTP/") {
        Ok(())
    } else if received.is_empty() {
        Err(ProbeFailure::Closed)
    } else {
        Err(ProbeFailure::Unexpected("response is not HTTP".to_string()))
    }
}

/// Label of a rustls-pinned version.
fn label_for(version: &SupportedProtocolVersion) -> &'static str {
    if version.version == rustls::ProtocolVersion::TLSv1_3 {
        ProtocolVersion::Tls1_3.label()
    } else {
        ProtocolVersion::Tls1_2.label()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
