// crates/conformance-sequences/src/dynamic_registration.rs
// ============================================================================
// Module: Dynamic Registration Sequence
// Description: Registers a client through the OAuth 2.0 registration endpoint.
// Purpose: Verify RFC 7591 support and record the issued client identity.
// Dependencies: conformance-core, serde_json, crate::{http, resources}
// ============================================================================

//! ## Overview
//! Posts client metadata to the registration endpoint, checks the response
//! for OAuth errors and the `201 Created` shape, and records the issued
//! `client_id`, granted scopes, and (for confidential clients) the
//! `client_secret`.
//!
//! Security posture: the registration response carries client credentials;
//! it stays in sequence scratch and only the recorded keys reach the bag.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use conformance_core::SequenceDefinition;
use conformance_core::StateValue;
use conformance_core::StepContext;
use conformance_core::StepError;
use conformance_core::StepMetadata;
use conformance_core::TestStep;
use conformance_core::assert_that;
use serde_json::Value;
use serde_json::json;

use crate::http::JsonResponse;
use crate::resources::SequenceResources;

// ============================================================================
// SECTION: Identity
// ============================================================================

/// Registered name of the dynamic registration sequence.
pub const DYNAMIC_REGISTRATION_SEQUENCE: &str = "Dynamic Registration";

/// Scratch key holding the registration response.
const RESPONSE_SCRATCH: &str = "registration_response";
/// OAuth 2.0 Dynamic Client Registration Protocol.
const RFC7591_LINK: &str = "https://tools.ietf.org/html/rfc7591";
/// FHIR security page.
const SECURITY_LINK: &str = "https://www.hl7.org/fhir/security.html";

// ============================================================================
// SECTION: Sequence
// ============================================================================

/// Builds the dynamic registration sequence.
#[must_use]
pub fn dynamic_registration_sequence(resources: &Arc<SequenceResources>) -> SequenceDefinition {
    SequenceDefinition::new(DYNAMIC_REGISTRATION_SEQUENCE, "Dynamic Registration", "DR")
        .description(
            "Verify that the server supports the OAuth 2.0 Dynamic Client Registration Protocol.",
        )
        .requires([
            "oauth_register_endpoint",
            "client_name",
            "initiate_login_uri",
            "redirect_uris",
            "scopes",
            "confidential_client",
        ])
        .defines(["client_id", "client_secret", "scopes", "dynamically_registered"])
        .optional()
        .step(transport_security_step(Arc::clone(resources)))
        .step(post_step(Arc::clone(resources)))
        .step(no_error_step())
        .step(created_step())
}

/// DR01: the registration endpoint is served over TLS 1.2 or newer.
fn transport_security_step(resources: Arc<SequenceResources>) -> TestStep {
    let metadata = StepMetadata::new(
        1,
        "Client registration endpoint secured by transport layer security",
        SECURITY_LINK,
        "The client registration endpoint MUST be protected by a transport layer security.",
    )
    .optional();
    TestStep::new(metadata, move |ctx: &mut StepContext<'_>| {
        let endpoint = register_endpoint(ctx)?;
        resources.check_transport_security(ctx, &endpoint)
    })
}

/// DR02: the endpoint accepts a JSON-encoded POST.
fn post_step(resources: Arc<SequenceResources>) -> TestStep {
    let metadata = StepMetadata::new(
        2,
        "Client registration endpoint accepts POST messages",
        RFC7591_LINK,
        "The client registration endpoint MUST accept HTTP POST messages with request \
         parameters encoded in the entity body using the \"application/json\" format.",
    )
    .spec_ref("3.1")
    .precondition();
    TestStep::new(metadata, move |ctx: &mut StepContext<'_>| {
        let endpoint = register_endpoint(ctx)?;
        let request = registration_request(ctx)?;
        let response = resources.http.post_json(&endpoint, &request)?;
        ctx.stash(
            RESPONSE_SCRATCH,
            json!({ "status": response.status, "body": response.body }),
        );
        Ok(())
    })
}

/// DR03: the response carries no OAuth error.
fn no_error_step() -> TestStep {
    let metadata = StepMetadata::new(
        3,
        "Registration endpoint does not respond with an error",
        RFC7591_LINK,
        "When an OAuth 2.0 error condition occurs, such as the client presenting an invalid \
         initial access token, the authorization server returns an error response appropriate \
         to the OAuth 2.0 token type.",
    )
    .spec_ref("3.2.2")
    .precondition();
    TestStep::new(metadata, |ctx: &mut StepContext<'_>| {
        let response = stashed_response(ctx)?;
        assert_that(
            !response.has_field("error") && !response.has_field("error_description"),
            format!(
                "Error returned.  Error: {}, Description: {}",
                response.field_text("error"),
                response.field_text("error_description")
            ),
        )
    })
}

/// DR04: the response is `201 Created` with the issued client identity.
fn created_step() -> TestStep {
    let metadata = StepMetadata::new(
        4,
        "Registration endpoint responds with HTTP 201 and body contains JSON with required fields",
        RFC7591_LINK,
        "The server responds with an HTTP 201 Created status code and a body of type \
         \"application/json\" with content as described in Section 3.2.1.",
    )
    .spec_ref("3.2.1");
    TestStep::new(metadata, |ctx: &mut StepContext<'_>| {
        let response = stashed_response(ctx)?;
        assert_that(
            response.status == 201,
            format!(
                "Expected HTTP 201 response from registration endpoint but received {}",
                response.status
            ),
        )?;
        assert_that(
            response.has_field("client_id") && response.has_field("scope"),
            "Registration response did not include client_id and scope fields in JSON body",
        )?;

        let scopes = granted_scopes(ctx.get("scopes"), &response.field_text("scope"));
        let confidential = ctx.require_bool("confidential_client")?;
        ctx.define("client_id", response.field_text("client_id"));
        ctx.define("dynamically_registered", true);
        ctx.define("scopes", scopes);
        if confidential && response.has_field("client_secret") {
            ctx.define("client_secret", response.field_text("client_secret"));
        }
        Ok(())
    })
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the registration endpoint recorded by discovery or config.
fn register_endpoint(ctx: &StepContext<'_>) -> Result<String, StepError> {
    Ok(ctx.require_text("oauth_register_endpoint")?.to_string())
}

/// Builds the client metadata document from the instance state.
fn registration_request(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    let auth_method =
        if ctx.require_bool("confidential_client")? { "client_secret_basic" } else { "none" };
    Ok(json!({
        "client_name": ctx.require_text("client_name")?,
        "initiate_login_uri": ctx.require_text("initiate_login_uri")?,
        "redirect_uris": ctx.require_list("redirect_uris")?,
        "grant_types": ["authorization_code"],
        "scope": scope_text(ctx.require("scopes")?),
        "token_endpoint_auth_method": auth_method,
    }))
}

/// Renders the configured scopes as a space-separated string.
fn scope_text(scopes: &StateValue) -> String {
    match scopes {
        StateValue::List(values) => values.join(" "),
        StateValue::Text(value) => value.clone(),
        StateValue::Bool(value) => value.to_string(),
        StateValue::Integer(value) => value.to_string(),
    }
}

/// Shapes the granted scope string like the configured scopes value.
fn granted_scopes(configured: Option<&StateValue>, granted: &str) -> StateValue {
    match configured {
        Some(StateValue::List(_)) => {
            StateValue::List(granted.split_whitespace().map(str::to_string).collect())
        }
        _ => StateValue::Text(granted.to_string()),
    }
}

/// Restores the response stashed by the POST step.
fn stashed_response(ctx: &StepContext<'_>) -> Result<JsonResponse, StepError> {
    let stashed = ctx.stashed(RESPONSE_SCRATCH)?;
    let status = stashed
        .get("status")
        .and_then(Value::as_u64)
        .and_then(|status| u16::try_from(status).ok())
        .ok_or_else(|| StepError::Internal("stashed registration status is invalid".to_string()))?;
    Ok(JsonResponse {
        status,
        body: stashed.get("body").cloned().unwrap_or(Value::Null),
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================
