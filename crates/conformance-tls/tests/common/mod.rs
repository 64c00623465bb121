// crates/conformance-tls/tests/common/mod.rs
// ============================================================================
// Module: Common TLS Test Servers
// Description: Local servers with controlled protocol-version behavior.
// Purpose: Exercise real probes without network access.
// Dependencies: rcgen, rustls
// ============================================================================

//! ## Overview
//! [`TlsServer`] is a rustls server pinned to chosen versions with a fresh
//! self-signed certificate for `localhost`. [`raw_server`] answers every
//! connection with fixed bytes, standing in for legacy TLS stacks.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read;
use std::io::Write;
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rcgen::generate_simple_self_signed;
use rustls::ServerConfig;
use rustls::ServerConnection;
use rustls::StreamOwned;
use rustls::SupportedProtocolVersion;
use rustls::pki_types::CertificateDer;
use rustls::pki_types::PrivateKeyDer;
use rustls::pki_types::PrivatePkcs8KeyDer;

// ============================================================================
// SECTION: TLS Server
// ============================================================================

/// Running rustls server and its trust material.
pub struct TlsServer {
    /// Listening port on 127.0.0.1.
    pub port: u16,
    /// Self-signed certificate (DER).
    pub cert_der: CertificateDer<'static>,
    /// Self-signed certificate (PEM).
    pub cert_pem: String,
}

impl TlsServer {
    /// Starts a server accepting only `versions`, serving `connections` clients.
    pub fn start(versions: &[&'static SupportedProtocolVersion], connections: usize) -> Self {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
        let rcgen::CertifiedKey {
            cert,
            signing_key,
        } = generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let cert_pem = cert.pem();
        let cert_der = CertificateDer::from(cert);
        let key_der = PrivateKeyDer::from(PrivatePkcs8KeyDer::from(signing_key.serialize_der()));
        let config = ServerConfig::builder_with_protocol_versions(versions)
            .with_no_client_auth()
            .with_single_cert(vec![cert_der.clone()], key_der)
            .unwrap();
        let config = Arc::new(config);

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        thread::spawn(move || {
            for _ in 0 .. connections {
                let Ok((tcp, _)) = listener.accept() else {
                    return;
                };
                let conn = ServerConnection::new(Arc::clone(&config)).unwrap();
                let mut stream = StreamOwned::new(conn, tcp);
                let mut buf = [0u8; 1024];
                if stream.read(&mut buf).is_err() {
                    continue;
                }
                let _ = stream.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nOK");
                let _ = stream.flush();
            }
        });

        Self {
            port,
            cert_der,
            cert_pem,
        }
    }

    /// Endpoint URL naming the certificate's host.
    pub fn endpoint(&self) -> String {
        format!("https://localhost:{}/metadata", self.port)
    }
}

// ============================================================================
// SECTION: Raw Servers
// ============================================================================

/// Starts a server that reads the client's first flight and replies with `reply`.
pub fn raw_server(reply: Vec<u8>, connections: usize) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        for _ in 0 .. connections {
            let Ok((mut tcp, _)) = listener.accept() else {
                return;
            };
            let mut buf = [0u8; 1024];
            let _ = tcp.read(&mut buf);
            let _ = tcp.write_all(&reply);
            let _ = tcp.flush();
        }
    });
    port
}

/// Starts a server that accepts and never answers.
pub fn silent_server(hold: Duration) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        if let Ok((tcp, _)) = listener.accept() {
            thread::sleep(hold);
            drop(tcp);
        }
    });
    port
}

/// A ServerHello record echoing `wire` as the negotiated version.
pub fn server_hello(wire: [u8; 2]) -> Vec<u8> {
    vec![0x16, wire[0], wire[1], 0x00, 0x06, 0x02, 0x00, 0x00, 0x46, wire[0], wire[1]]
}

/// A fatal `protocol_version` alert record.
pub fn protocol_version_alert() -> Vec<u8> {
    vec![0x15, 0x03, 0x01, 0x00, 0x02, 0x02, 0x46]
}
