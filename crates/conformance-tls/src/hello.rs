// crates/conformance-tls/src/hello.rs
// ============================================================================
// Module: Legacy ClientHello Probe
// Description: Hand-encoded ClientHello exchange for SSLv3, TLS 1.0 and 1.1.
// Purpose: Detect legacy protocol acceptance without a legacy TLS stack.
// Dependencies: conformance-core, rustls (secure random)
// ============================================================================

//! ## Overview
//! rustls cannot negotiate protocol versions older than TLS 1.2, so legacy
//! versions are probed by sending a ClientHello that offers exactly one
//! version and reading the first server record. The server accepts the
//! version only when it answers with a ServerHello echoing it; alerts, closed
//! connections, timeouts, and any other negotiated version count as refusal.
//! No session is established and no application data is exchanged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::ErrorKind;
use std::io::Read;
use std::io::Write;

use conformance_core::ProtocolVersion;

use crate::error::ProbeFailure;

// ============================================================================
// SECTION: Wire Constants
// ============================================================================

/// Handshake record content type.
const CONTENT_HANDSHAKE: u8 = 0x16;
/// Alert record content type.
const CONTENT_ALERT: u8 = 0x15;
/// ClientHello handshake message type.
const HANDSHAKE_CLIENT_HELLO: u8 = 0x01;
/// ServerHello handshake message type.
const HANDSHAKE_SERVER_HELLO: u8 = 0x02;
/// Largest record fragment accepted from the server.
const MAX_FRAGMENT_LEN: usize = 16_384 + 2_048;

/// Cipher suites offered by legacy hellos, ending with the renegotiation SCSV.
pub(crate) const LEGACY_CIPHER_SUITES: [u16; 10] = [
    0x002F, // TLS_RSA_WITH_AES_128_CBC_SHA
    0x0035, // TLS_RSA_WITH_AES_256_CBC_SHA
    0xC013, // TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA
    0xC014, // TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA
    0xC009, // TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA
    0xC00A, // TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA
    0x000A, // TLS_RSA_WITH_3DES_EDE_CBC_SHA
    0x0005, // TLS_RSA_WITH_RC4_128_SHA
    0x0004, // TLS_RSA_WITH_RC4_128_MD5
    0x00FF, // TLS_EMPTY_RENEGOTIATION_INFO_SCSV
];

/// Server name indication extension.
const EXT_SERVER_NAME: u16 = 0x0000;
/// Supported groups extension.
const EXT_SUPPORTED_GROUPS: u16 = 0x000A;
/// EC point formats extension.
const EXT_EC_POINT_FORMATS: u16 = 0x000B;
/// Offered groups: x25519, secp256r1, secp384r1.
const SUPPORTED_GROUPS: [u16; 3] = [0x001D, 0x0017, 0x0018];

// ============================================================================
// SECTION: Exchange
// ============================================================================

/// Sends a single-version ClientHello and interprets the first server record.
///
/// # Errors
///
/// Returns [`ProbeFailure`] when the server does not accept `version`.
pub(crate) fn exchange<S: Read + Write>(
    stream: &mut S,
    version: ProtocolVersion,
    server_name: Option<&str>,
) -> Result<(), ProbeFailure> {
    let mut random = [0u8; 32];
    rustls::crypto::aws_lc_rs::default_provider()
        .secure_random
        .fill(&mut random)
        .map_err(|_| ProbeFailure::Random)?;
    let hello = encode_client_hello(version, server_name, &random);
    stream.write_all(&hello)?;
    stream.flush()?;
    read_server_reply(stream, version)
}

/// Reads one record and decides whether it accepts `version`.
pub(crate) fn read_server_reply<R: Read>(
    reader: &mut R,
    version: ProtocolVersion,
) -> Result<(), ProbeFailure> {
    let mut header = [0u8; 5];
    read_exact_or_closed(reader, &mut header)?;
    let [content_type, _, _, len_hi, len_lo] = header;
    let length = usize::from(u16::from_be_bytes([len_hi, len_lo]));
    if length == 0 || length > MAX_FRAGMENT_LEN {
        return Err(ProbeFailure::Unexpected(format!("record length {length}")));
    }
    let mut fragment = vec![0u8; length];
    read_exact_or_closed(reader, &mut fragment)?;

    match content_type {
        CONTENT_ALERT => match fragment.get(1) {
            Some(description) => Err(ProbeFailure::Alert(alert_name(*description))),
            None => Err(ProbeFailure::Unexpected("truncated alert".to_string())),
        },
        CONTENT_HANDSHAKE => match fragment.as_slice() {
            [HANDSHAKE_SERVER_HELLO, _, _, _, major, minor, ..] => {
                let negotiated = [*major, *minor];
                if negotiated == version.wire() {
                    Ok(())
                } else {
                    Err(ProbeFailure::VersionMismatch {
                        requested: version.label(),
                        negotiated: wire_label(negotiated),
                    })
                }
            }
            [message_type, ..] => {
                Err(ProbeFailure::Unexpected(format!("handshake message type {message_type}")))
            }
            [] => Err(ProbeFailure::Unexpected("empty handshake record".to_string())),
        },
        other => Err(ProbeFailure::Unexpected(format!("record type 0x{other:02x}"))),
    }
}

/// Fills `buf`, mapping a short read to [`ProbeFailure::Closed`].
fn read_exact_or_closed<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), ProbeFailure> {
    reader.read_exact(buf).map_err(|err| {
        if err.kind() == ErrorKind::UnexpectedEof {
            ProbeFailure::Closed
        } else {
            ProbeFailure::Io(err)
        }
    })
}

// ============================================================================
// SECTION: Encoding
// ============================================================================

/// Encodes a ClientHello record offering exactly `version`.
///
/// SSLv3 hellos carry no extensions. SNI is only sent for DNS names.
pub(crate) fn encode_client_hello(
    version: ProtocolVersion,
    server_name: Option<&str>,
    random: &[u8; 32],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(128);
    body.extend_from_slice(&version.wire());
    body.extend_from_slice(random);
    body.push(0); // empty session id

    let mut suites = Vec::with_capacity(LEGACY_CIPHER_SUITES.len() * 2);
    for suite in LEGACY_CIPHER_SUITES {
        suites.extend_from_slice(&suite.to_be_bytes());
    }
    put_u16_prefixed(&mut body, &suites);
    body.extend_from_slice(&[1, 0]); // null compression only

    if version != ProtocolVersion::Ssl3 {
        let mut extensions = Vec::new();
        if let Some(name) = server_name {
            let mut entry = vec![0]; // host_name
            put_u16_prefixed(&mut entry, name.as_bytes());
            let mut list = Vec::new();
            put_u16_prefixed(&mut list, &entry);
            put_extension(&mut extensions, EXT_SERVER_NAME, &list);
        }
        let mut groups = Vec::with_capacity(SUPPORTED_GROUPS.len() * 2);
        for group in SUPPORTED_GROUPS {
            groups.extend_from_slice(&group.to_be_bytes());
        }
        let mut group_list = Vec::new();
        put_u16_prefixed(&mut group_list, &groups);
        put_extension(&mut extensions, EXT_SUPPORTED_GROUPS, &group_list);
        put_extension(&mut extensions, EXT_EC_POINT_FORMATS, &[1, 0]);
        put_u16_prefixed(&mut body, &extensions);
    }

    let mut handshake = Vec::with_capacity(body.len() + 4);
    handshake.push(HANDSHAKE_CLIENT_HELLO);
    put_u24(&mut handshake, body.len());
    handshake.extend_from_slice(&body);

    let record_version = if version == ProtocolVersion::Ssl3 {
        ProtocolVersion::Ssl3.wire()
    } else {
        ProtocolVersion::Tls1_0.wire()
    };
    let mut record = Vec::with_capacity(handshake.len() + 5);
    record.push(CONTENT_HANDSHAKE);
    record.extend_from_slice(&record_version);
    put_u16_prefixed(&mut record, &handshake);
    record
}

/// Appends one extension block.
fn put_extension(out: &mut Vec<u8>, kind: u16, data: &[u8]) {
    out.extend_from_slice(&kind.to_be_bytes());
    put_u16_prefixed(out, data);
}

/// Appends `data` behind a big-endian u16 length.
fn put_u16_prefixed(out: &mut Vec<u8>, data: &[u8]) {
    let len = u16::try_from(data.len()).unwrap_or(u16::MAX);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(data);
}

/// Appends a big-endian u24 length.
fn put_u24(out: &mut Vec<u8>, len: usize) {
    let len = u32::try_from(len).unwrap_or(u32::MAX);
    let [_, a, b, c] = len.to_be_bytes();
    out.extend_from_slice(&[a, b, c]);
}

// ============================================================================
// SECTION: Labels
// ============================================================================

/// Names a two-byte wire version.
fn wire_label(wire: [u8; 2]) -> String {
    ProtocolVersion::ALL.into_iter().find(|version| version.wire() == wire).map_or_else(
        || format!("0x{:02x}{:02x}", wire[0], wire[1]),
        |version| version.label().to_string(),
    )
}

/// Names an alert description the way rustls renders received alerts.
fn alert_name(description: u8) -> String {
    let name = match description {
        0 => "CloseNotify",
        10 => "UnexpectedMessage",
        40 => "HandshakeFailure",
        47 => "IllegalParameter",
        70 => "ProtocolVersion",
        71 => "InsufficientSecurity",
        80 => "InternalError",
        86 => "InappropriateFallback",
        112 => "UnrecognisedName",
        other => return format!("Unknown(0x{other:02x})"),
    };
    name.to_string()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
