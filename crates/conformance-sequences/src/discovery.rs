// crates/conformance-sequences/src/discovery.rs
// ============================================================================
// Module: Authorization Server Discovery Sequence
// Description: Locates OAuth endpoints from the SMART configuration document.
// Purpose: Define the endpoint keys later sequences depend on.
// Dependencies: conformance-core, serde_json, crate::resources
// ============================================================================

//! ## Overview
//! Fetches `{url}/.well-known/smart-configuration`, checks that the
//! authorization and token endpoints are advertised, and records them in
//! the instance state. The registration endpoint is recorded only when the
//! server advertises one.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use conformance_core::SequenceDefinition;
use conformance_core::StepContext;
use conformance_core::StepError;
use conformance_core::StepMetadata;
use conformance_core::TestStep;
use conformance_core::assert_that;
use serde_json::Value;

use crate::resources::SequenceResources;

// ============================================================================
// SECTION: Identity
// ============================================================================

/// Registered name of the discovery sequence.
pub const DISCOVERY_SEQUENCE: &str = "Authorization Server Discovery";
/// Path of the SMART configuration document relative to the base URL.
pub const SMART_CONFIGURATION_PATH: &str = ".well-known/smart-configuration";

/// Scratch key holding the configuration document.
const CONFIGURATION_SCRATCH: &str = "smart_configuration";
/// SMART App Launch conformance page.
const SMART_LINK: &str = "http://hl7.org/fhir/smart-app-launch/conformance/index.html";
/// FHIR security page.
const SECURITY_LINK: &str = "https://www.hl7.org/fhir/security.html";

// ============================================================================
// SECTION: Sequence
// ============================================================================

/// Builds the discovery sequence.
#[must_use]
pub fn discovery_sequence(resources: &Arc<SequenceResources>) -> SequenceDefinition {
    SequenceDefinition::new(DISCOVERY_SEQUENCE, "Authorization Server Discovery", "DS")
        .description("Retrieve the OAuth endpoints advertised by the server's SMART configuration.")
        .requires(["url"])
        .defines(["oauth_authorize_endpoint", "oauth_token_endpoint", "oauth_register_endpoint"])
        .step(transport_security_step(Arc::clone(resources)))
        .step(configuration_step(Arc::clone(resources)))
        .step(endpoints_step())
}

/// DS01: the base URL is served over TLS 1.2 or newer.
fn transport_security_step(resources: Arc<SequenceResources>) -> TestStep {
    let metadata = StepMetadata::new(
        1,
        "Server is secured by transport layer security",
        SECURITY_LINK,
        "All exchanged information MUST be protected by transport layer security.",
    )
    .optional();
    TestStep::new(metadata, move |ctx: &mut StepContext<'_>| {
        let url = ctx.require_text("url")?.to_string();
        resources.check_transport_security(ctx, &url)
    })
}

/// DS02: the configuration document is served as JSON.
fn configuration_step(resources: Arc<SequenceResources>) -> TestStep {
    let metadata = StepMetadata::new(
        2,
        "SMART configuration is available",
        SMART_LINK,
        "The server MUST serve its SMART configuration as JSON at \
         /.well-known/smart-configuration.",
    )
    .spec_ref("Using .well-known")
    .precondition();
    TestStep::new(metadata, move |ctx: &mut StepContext<'_>| {
        let url = configuration_url(ctx.require_text("url")?);
        let response = resources.http.get_json(&url)?;
        assert_that(
            response.status == 200,
            format!("Expected HTTP 200 response from {url} but received {}", response.status),
        )?;
        assert_that(response.body.is_object(), "SMART configuration is not a JSON object")?;
        ctx.stash(CONFIGURATION_SCRATCH, response.body);
        Ok(())
    })
}

/// DS03: the document names the authorization and token endpoints.
fn endpoints_step() -> TestStep {
    let metadata = StepMetadata::new(
        3,
        "SMART configuration contains required endpoints",
        SMART_LINK,
        "The configuration MUST include authorization_endpoint and token_endpoint.",
    )
    .spec_ref("Metadata");
    TestStep::new(metadata, |ctx: &mut StepContext<'_>| {
        let document = ctx.stashed(CONFIGURATION_SCRATCH)?.clone();
        let authorize = endpoint_field(&document, "authorization_endpoint");
        let token = endpoint_field(&document, "token_endpoint");
        let (Some(authorize), Some(token)) = (authorize, token) else {
            return Err(StepError::assertion(
                "SMART configuration did not include authorization_endpoint and token_endpoint",
            ));
        };
        ctx.define("oauth_authorize_endpoint", authorize);
        ctx.define("oauth_token_endpoint", token);
        if let Some(register) = endpoint_field(&document, "registration_endpoint") {
            ctx.define("oauth_register_endpoint", register);
        }
        Ok(())
    })
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Joins the configuration path onto the base URL.
fn configuration_url(base: &str) -> String {
    format!("{}/{SMART_CONFIGURATION_PATH}", base.trim_end_matches('/'))
}

/// Returns a non-empty string field of the document.
fn endpoint_field(document: &Value, key: &str) -> Option<String> {
    match document.get(key) {
        Some(Value::String(value)) if !value.trim().is_empty() => Some(value.clone()),
        _ => None,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn configuration_url_tolerates_trailing_slash() {
        assert_eq!(
            configuration_url("https://fhir.example.org/r4/"),
            "https://fhir.example.org/r4/.well-known/smart-configuration"
        );
        assert_eq!(
            configuration_url("https://fhir.example.org"),
            "https://fhir.example.org/.well-known/smart-configuration"
        );
    }

    #[test]
    fn endpoint_field_ignores_blank_and_non_string_values() {
        let document = json!({
            "authorization_endpoint": "https://auth.example.org/authorize",
            "token_endpoint": "  ",
            "registration_endpoint": 7,
        });
        assert_eq!(
            endpoint_field(&document, "authorization_endpoint").as_deref(),
            Some("https://auth.example.org/authorize")
        );
        assert_eq!(endpoint_field(&document, "token_endpoint"), None);
        assert_eq!(endpoint_field(&document, "registration_endpoint"), None);
        assert_eq!(endpoint_field(&document, "missing"), None);
    }
}
