// crates/conformance-core/tests/registry.rs
// ============================================================================
// Module: Sequence Registry Tests
// Description: Registration-time metadata and identifier validation.
// Purpose: Ensure incomplete or colliding definitions never reach a run.
// Dependencies: conformance-core
// ============================================================================
//! ## Overview
//! Exercises `SequenceRegistry::register` failure modes, the explicit
//! exemption set, and the metadata view consumed by report renderers.
//!
//! Security posture: registration is a trust boundary and must fail closed.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use conformance_core::MetadataError;
use conformance_core::MetadataExemptions;
use conformance_core::MetadataIssue;
use conformance_core::RegistryError;
use conformance_core::SequenceDefinition;
use conformance_core::SequenceRegistry;
use conformance_core::StateKey;
use conformance_core::StepMetadata;

use crate::common::LINK;
use crate::common::empty_sequence;
use crate::common::meta;
use crate::common::passing;
use crate::common::sequence;
use crate::common::step_with;

// ============================================================================
// SECTION: Metadata Validation
// ============================================================================

#[test]
fn register_accepts_complete_metadata() {
    let mut registry = SequenceRegistry::new();
    registry.register(sequence("Discovery", "DS")).unwrap();
    registry.register(sequence("Registration", "DR")).unwrap();
    assert_eq!(registry.len(), 2);
    assert!(registry.get("Discovery").is_some());
}

#[test]
fn register_rejects_step_missing_description() {
    let mut registry = SequenceRegistry::new();
    let definition = empty_sequence("Registration", "DR")
        .step(passing(1, "Endpoint secured"))
        .step(step_with(StepMetadata::new(2, "Accepts POST", LINK, ""), |_| Ok(())));

    let err = registry.register(definition).unwrap_err();
    assert_eq!(
        err,
        RegistryError::Metadata(MetadataError {
            sequence: "Registration".into(),
            position: 2,
            name: "Accepts POST".to_string(),
            issue: MetadataIssue::MissingDescription,
        })
    );
    assert!(registry.is_empty(), "rejected sequences must not be registered");
}

#[test]
fn register_rejects_missing_name_link_and_id() {
    let cases = [
        (StepMetadata::new(1, "  ", LINK, "desc"), MetadataIssue::MissingName),
        (
            StepMetadata::new(1, "name", "tools.ietf.org/html/rfc7591", "desc"),
            MetadataIssue::InvalidLink("tools.ietf.org/html/rfc7591".to_string()),
        ),
        (
            StepMetadata {
                id: None,
                ..meta(1, "name")
            },
            MetadataIssue::MissingId,
        ),
    ];
    for (metadata, expected) in cases {
        let mut registry = SequenceRegistry::new();
        let definition = empty_sequence("S", "S").step(step_with(metadata, |_| Ok(())));
        match registry.register(definition) {
            Err(RegistryError::Metadata(err)) => assert_eq!(err.issue, expected),
            other => panic!("expected metadata error, got {other:?}"),
        }
    }
}

#[test]
fn exempt_step_skips_validation_and_gets_positional_id() {
    let exemptions = MetadataExemptions::new().exempt("Patient has address");
    let mut registry = SequenceRegistry::with_exemptions(exemptions);
    let undocumented = StepMetadata {
        id: None,
        description: String::new(),
        ..meta(0, "Patient has address")
    };
    let definition = empty_sequence("Patient Read", "PR")
        .step(passing(1, "Patient read"))
        .step(step_with(undocumented, |_| Ok(())));

    registry.register(definition).unwrap();
    assert!(registry.exemptions().contains("Patient has address"));
    assert_eq!(registry.exemptions().names().collect::<Vec<_>>(), vec!["Patient has address"]);

    let metadata = registry.metadata();
    let ids: Vec<_> = metadata[0]
        .steps
        .iter()
        .map(|step| step.test_id.as_ref().map(|id| id.as_str().to_string()))
        .collect();
    assert_eq!(ids, vec![Some("PR01".to_string()), None]);
}

#[test]
fn exemptions_match_exact_names_only() {
    let exemptions: MetadataExemptions = ["Token expiration"].into_iter().collect();
    let mut registry = SequenceRegistry::with_exemptions(exemptions);
    let definition = empty_sequence("Token", "TK").step(step_with(
        StepMetadata::new(1, "Token expiration check", LINK, ""),
        |_| Ok(()),
    ));
    assert!(matches!(registry.register(definition), Err(RegistryError::Metadata(_))));
}

// ============================================================================
// SECTION: Identifier Collisions
// ============================================================================

#[test]
fn register_rejects_duplicate_sequence_name() {
    let mut registry = SequenceRegistry::new();
    registry.register(sequence("Discovery", "DS")).unwrap();
    let err = registry.register(sequence("Discovery", "DX")).unwrap_err();
    assert_eq!(err, RegistryError::DuplicateSequence("Discovery".into()));
}

#[test]
fn register_rejects_duplicate_prefix() {
    let mut registry = SequenceRegistry::new();
    registry.register(sequence("Discovery", "DS")).unwrap();
    let err = registry.register(sequence("Other", "DS")).unwrap_err();
    assert_eq!(
        err,
        RegistryError::DuplicatePrefix {
            sequence: "Other".into(),
            prefix: "DS".to_string(),
            existing: "Discovery".into(),
        }
    );
}

#[test]
fn register_rejects_empty_prefix() {
    let mut registry = SequenceRegistry::new();
    let err = registry.register(sequence("Discovery", " ")).unwrap_err();
    assert_eq!(err, RegistryError::EmptyPrefix("Discovery".into()));
}

#[test]
fn register_rejects_duplicate_step_id() {
    let mut registry = SequenceRegistry::new();
    let definition =
        empty_sequence("Registration", "DR").step(passing(2, "first")).step(passing(2, "second"));
    let err = registry.register(definition).unwrap_err();
    match err {
        RegistryError::DuplicateStepId {
            test_id, ..
        } => assert_eq!(test_id.as_str(), "DR02"),
        other => panic!("unexpected error: {other}"),
    }
}

// ============================================================================
// SECTION: Metadata Contract
// ============================================================================

#[test]
fn metadata_view_exposes_step_and_sequence_contract() {
    let mut registry = SequenceRegistry::new();
    let definition = SequenceDefinition::new("Dynamic Registration", "Dynamic Registration", "DR")
        .description("Verify dynamic client registration.")
        .requires(["oauth_register_endpoint", "client_name"])
        .defines(["client_id", "client_secret"])
        .optional()
        .step(step_with(meta(1, "Registration endpoint secured").spec_ref("3.1").optional(), |_| {
            Ok(())
        }));
    registry.register(definition).unwrap();

    let metadata = registry.metadata();
    let view = &metadata[0];
    assert_eq!(view.test_id_prefix, "DR");
    assert!(view.optional);
    assert!(!view.inactive);
    assert!(view.requires.contains(&StateKey::new("client_name")));
    assert!(view.defines.contains(&StateKey::new("client_secret")));

    let json = serde_json::to_value(view).unwrap();
    let step = &json["steps"][0];
    assert_eq!(step["test_id"], "DR01");
    assert_eq!(step["name"], "Registration endpoint secured");
    assert_eq!(step["link"], LINK);
    assert_eq!(step["spec_ref"], "3.1");
    assert_eq!(step["optional"], true);
}
