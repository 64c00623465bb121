// crates/conformance-sequences/tests/common/mod.rs
// ============================================================================
// Module: Common Sequence Fixtures
// Description: Local JSON server and deterministic probe factory.
// Purpose: Run built-in sequences end to end without network access.
// Dependencies: conformance-core, conformance-sequences, tiny_http
// ============================================================================

//! ## Overview
//! [`JsonServer`] answers fixed routes over plain HTTP and records every
//! request it sees. [`FakeProbes`] hands out probes driven by a fixed set of
//! accepted protocol versions.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use conformance_core::ProbeConfigError;
use conformance_core::ProbeResult;
use conformance_core::ProberFactory;
use conformance_core::ProtocolProbe;
use conformance_core::ProtocolVersion;
use conformance_sequences::JsonClient;
use conformance_sequences::SequenceResources;
use serde_json::Value;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;

// ============================================================================
// SECTION: JSON Server
// ============================================================================

/// Canned reply for one method and path.
#[derive(Clone)]
pub struct Route {
    /// HTTP method, upper case.
    pub method: &'static str,
    /// Request path.
    pub path: String,
    /// Response status.
    pub status: u16,
    /// Raw response body.
    pub body: String,
}

impl Route {
    /// Replies to `GET path` with a JSON body.
    pub fn get(path: &str, status: u16, body: &Value) -> Self {
        Self {
            method: "GET",
            path: path.to_string(),
            status,
            body: body.to_string(),
        }
    }

    /// Replies to `POST path` with a JSON body.
    pub fn post(path: &str, status: u16, body: &Value) -> Self {
        Self {
            method: "POST",
            path: path.to_string(),
            status,
            body: body.to_string(),
        }
    }

    /// Replies to `method path` with a raw body.
    pub fn raw(method: &'static str, path: &str, status: u16, body: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            status,
            body: body.to_string(),
        }
    }
}

/// Request observed by a [`JsonServer`].
#[derive(Debug, Clone)]
pub struct Recorded {
    /// HTTP method.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Request body as text.
    pub body: String,
}

impl Recorded {
    /// Parses the body as JSON.
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// Plain HTTP server answering fixed routes; unknown routes get 404.
pub struct JsonServer {
    /// Base URL without trailing slash.
    pub base: String,
    /// Requests in arrival order.
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl JsonServer {
    /// Starts a server answering `routes` until the test process exits.
    pub fn start(routes: Vec<Route>) -> Self {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&requests);
        thread::spawn(move || {
            for mut request in server.incoming_requests() {
                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                let method = request.method().to_string();
                let path = request.url().to_string();
                recorder.lock().unwrap().push(Recorded {
                    method: method.clone(),
                    path: path.clone(),
                    body,
                });
                let reply = routes
                    .iter()
                    .find(|route| route.method == method && route.path == path)
                    .map_or_else(
                        || Response::from_string("{}").with_status_code(404),
                        |route| {
                            Response::from_string(route.body.clone())
                                .with_status_code(route.status)
                        },
                    );
                let content_type =
                    Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
                let _ = request.respond(reply.with_header(content_type));
            }
        });
        Self {
            base: format!("http://{addr}"),
            requests,
        }
    }

    /// Returns the absolute URL of `path`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    /// Returns every request seen so far.
    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

// ============================================================================
// SECTION: Fake Probes
// ============================================================================

/// Probe factory simulating a server that accepts a fixed set of versions.
pub struct FakeProbes {
    /// Versions the simulated server accepts.
    accepted: BTreeSet<ProtocolVersion>,
    /// Endpoints probes were requested for.
    endpoints: Arc<Mutex<Vec<String>>>,
}

impl FakeProbes {
    /// Simulates a server accepting exactly `accepted`.
    pub fn accepting(accepted: &[ProtocolVersion]) -> Self {
        Self {
            accepted: accepted.iter().copied().collect(),
            endpoints: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Simulates a well-configured server accepting TLS 1.2 and 1.3 only.
    pub fn modern() -> Self {
        Self::accepting(&[ProtocolVersion::Tls1_2, ProtocolVersion::Tls1_3])
    }

    /// Returns the endpoints probed so far.
    pub fn endpoints(&self) -> Vec<String> {
        self.endpoints.lock().unwrap().clone()
    }
}

impl ProberFactory for FakeProbes {
    fn prober_for(&self, endpoint: &str) -> Result<Box<dyn ProtocolProbe>, ProbeConfigError> {
        self.endpoints.lock().unwrap().push(endpoint.to_string());
        Ok(Box::new(FakeProbe {
            accepted: self.accepted.clone(),
        }))
    }
}

/// Probe answering from a fixed acceptance set.
struct FakeProbe {
    /// Versions the simulated server accepts.
    accepted: BTreeSet<ProtocolVersion>,
}

impl ProtocolProbe for FakeProbe {
    fn supports_version_pinning(&self, _version: ProtocolVersion) -> bool {
        true
    }

    fn probe_must_allow(&self, version: ProtocolVersion) -> ProbeResult {
        if self.accepted.contains(&version) {
            ProbeResult::conformant(format!("Allowed connection with {}", version.label()))
        } else {
            ProbeResult::violation("Caught TLS error: received fatal alert: ProtocolVersion")
        }
    }

    fn probe_must_deny(&self, version: ProtocolVersion, label: &str) -> ProbeResult {
        if self.accepted.contains(&version) {
            ProbeResult::violation(format!("Should not allow connections with {label}"))
        } else {
            ProbeResult::conformant(
                "Correctly denied connection: received fatal alert: ProtocolVersion",
            )
        }
    }
}

/// Factory that fails every probe construction with a fixed error.
pub struct BrokenProbes(pub ProbeConfigError);

impl BrokenProbes {
    /// Rejects every endpoint as unparseable.
    pub fn invalid_endpoint() -> Self {
        Self(ProbeConfigError::InvalidEndpoint(
            "endpoint".to_string(),
            "unsupported".to_string(),
        ))
    }

    /// Fails as if trust roots could not be loaded.
    pub fn setup_failure() -> Self {
        Self(ProbeConfigError::Setup("no trust roots".to_string()))
    }
}

impl ProberFactory for BrokenProbes {
    fn prober_for(&self, _endpoint: &str) -> Result<Box<dyn ProtocolProbe>, ProbeConfigError> {
        Err(self.0.clone())
    }
}

// ============================================================================
// SECTION: Resources
// ============================================================================

/// Builds resources with a short-timeout client and the given probes.
pub fn resources(probes: Arc<dyn ProberFactory>) -> Arc<SequenceResources> {
    let http = JsonClient::new(Duration::from_secs(5), "conformance-tests").unwrap();
    Arc::new(SequenceResources::new(http, probes))
}
