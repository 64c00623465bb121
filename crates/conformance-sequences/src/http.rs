// crates/conformance-sequences/src/http.rs
// ============================================================================
// Module: JSON Exchange Client
// Description: Bounded blocking JSON requests issued by sequence steps.
// Purpose: Give steps status codes and parsed bodies without HTTP plumbing.
// Dependencies: conformance-core, reqwest, serde_json
// ============================================================================

//! ## Overview
//! [`JsonClient`] wraps a blocking reqwest client with a fixed timeout,
//! user agent, and body size limit. Transport failures become
//! [`StepError::Transport`]; a body that is not JSON becomes an assertion
//! failure because the server under test is expected to speak JSON.
//! Redirects are not followed and requests are never retried.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read;
use std::time::Duration;

use conformance_core::StepError;
use reqwest::blocking::Client;
use reqwest::blocking::RequestBuilder;
use reqwest::header::ACCEPT;
use reqwest::redirect::Policy;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Largest response body accepted from the server under test.
pub const MAX_RESPONSE_BYTES: usize = 1024 * 1024;
/// Media type for request and response bodies.
const JSON_MEDIA_TYPE: &str = "application/json";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Failure to construct the HTTP client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("http client build failed: {0}")]
pub struct HttpClientError(String);

/// Status and parsed body of one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonResponse {
    /// HTTP status code.
    pub status: u16,
    /// Parsed body; `Null` for an empty body.
    pub body: Value,
}

impl JsonResponse {
    /// Returns true when the body is an object containing `key`.
    #[must_use]
    pub fn has_field(&self, key: &str) -> bool {
        self.body.get(key).is_some()
    }

    /// Renders a body field as text; absent and null fields render empty.
    #[must_use]
    pub fn field_text(&self, key: &str) -> String {
        match self.body.get(key) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
        }
    }
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Blocking JSON client shared by every step of a run.
#[derive(Debug, Clone)]
pub struct JsonClient {
    /// Underlying reqwest client.
    client: Client,
}

impl JsonClient {
    /// Builds a client with the given timeout and user agent.
    ///
    /// # Errors
    ///
    /// Returns [`HttpClientError`] when the TLS backend cannot be initialized.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, HttpClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent.to_string())
            .redirect(Policy::none())
            .build()
            .map_err(|err| HttpClientError(err.to_string()))?;
        Ok(Self {
            client,
        })
    }

    /// Issues a GET expecting JSON.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::Transport`] on network failure and
    /// [`StepError::Assertion`] when the body is not JSON.
    pub fn get_json(&self, url: &str) -> Result<JsonResponse, StepError> {
        exchange(self.client.get(url))
    }

    /// Issues a POST with a JSON body, expecting JSON back.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::Transport`] on network failure and
    /// [`StepError::Assertion`] when the body is not JSON.
    pub fn post_json(&self, url: &str, body: &Value) -> Result<JsonResponse, StepError> {
        exchange(self.client.post(url).json(body))
    }
}

/// Sends a request and parses the bounded response body.
fn exchange(request: RequestBuilder) -> Result<JsonResponse, StepError> {
    let mut response = request
        .header(ACCEPT, JSON_MEDIA_TYPE)
        .send()
        .map_err(|err| StepError::Transport(err.to_string()))?;
    let status = response.status().as_u16();
    let bytes = read_response_limited(&mut response)?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(JsonResponse {
            status,
            body: Value::Null,
        });
    }
    let body = serde_json::from_slice(&bytes).map_err(|err| {
        StepError::Assertion(format!("response body is not valid JSON (HTTP {status}): {err}"))
    })?;
    Ok(JsonResponse {
        status,
        body,
    })
}

/// Reads the response body while enforcing [`MAX_RESPONSE_BYTES`].
fn read_response_limited(response: &mut reqwest::blocking::Response) -> Result<Vec<u8>, StepError> {
    let mut buf = Vec::new();
    let limit = u64::try_from(MAX_RESPONSE_BYTES).unwrap_or(u64::MAX).saturating_add(1);
    response
        .take(limit)
        .read_to_end(&mut buf)
        .map_err(|err| StepError::Transport(format!("failed to read response: {err}")))?;
    if buf.len() > MAX_RESPONSE_BYTES {
        return Err(StepError::Assertion("response body exceeds size limit".to_string()));
    }
    Ok(buf)
}
