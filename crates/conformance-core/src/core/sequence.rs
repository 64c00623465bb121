// crates/conformance-core/src/core/sequence.rs
// ============================================================================
// Module: Sequence Definitions
// Description: Sequence and test step definitions with metadata validation.
// Purpose: Define immutable, citation-tagged conformance sequences.
// Dependencies: crate::core::identifiers, crate::interfaces, serde, url
// ============================================================================

//! ## Overview
//! A [`SequenceDefinition`] is an ordered list of [`TestStep`]s sharing a
//! title, description, test id prefix, and two declared dependency sets:
//! `requires` (keys read from the instance state bag) and `defines` (keys
//! written to it). Definitions are validated when registered and are
//! immutable afterwards.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::core::identifiers::SequenceName;
use crate::core::identifiers::StateKey;
use crate::core::identifiers::TestId;
use crate::interfaces::StepBody;

// ============================================================================
// SECTION: Test Steps
// ============================================================================

/// Citation and classification metadata of a test step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepMetadata {
    /// Numeric step id, unique within the sequence.
    pub id: Option<u16>,
    /// Step name shown in reports.
    pub name: String,
    /// Free-text description of the requirement under test.
    pub description: String,
    /// Link to the governing specification.
    pub link: String,
    /// Clause reference within the linked specification.
    pub spec_ref: Option<String>,
    /// Optional steps do not count toward certification.
    pub optional: bool,
    /// Failure of a precondition step skips the rest of the sequence.
    pub precondition: bool,
}

impl StepMetadata {
    /// Creates metadata with the required citation fields.
    #[must_use]
    pub fn new(
        id: u16,
        name: impl Into<String>,
        link: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Some(id),
            name: name.into(),
            description: description.into(),
            link: link.into(),
            spec_ref: None,
            optional: false,
            precondition: false,
        }
    }

    /// Sets the specification clause reference.
    #[must_use]
    pub fn spec_ref(mut self, spec_ref: impl Into<String>) -> Self {
        self.spec_ref = Some(spec_ref.into());
        self
    }

    /// Marks the step as optional.
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Marks the step as a hard precondition for later steps.
    #[must_use]
    pub const fn precondition(mut self) -> Self {
        self.precondition = true;
        self
    }

    /// Validates that name, description, link, and id are present.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataIssue`] describing the first missing or invalid field.
    pub fn validate(&self) -> Result<(), MetadataIssue> {
        if self.name.trim().is_empty() {
            return Err(MetadataIssue::MissingName);
        }
        if self.description.trim().is_empty() {
            return Err(MetadataIssue::MissingDescription);
        }
        if !is_valid_link(&self.link) {
            return Err(MetadataIssue::InvalidLink(self.link.clone()));
        }
        if self.id.is_none() {
            return Err(MetadataIssue::MissingId);
        }
        Ok(())
    }
}

/// Single metadata problem found on a step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataIssue {
    /// Step name is empty.
    #[error("missing name")]
    MissingName,
    /// Step description is empty.
    #[error("missing description")]
    MissingDescription,
    /// Step link is not an absolute http(s) URI.
    #[error("invalid link: {0:?}")]
    InvalidLink(String),
    /// Step id is not set.
    #[error("missing id")]
    MissingId,
}

/// Executable test step.
#[derive(Clone)]
pub struct TestStep {
    /// Step metadata.
    pub metadata: StepMetadata,
    /// Step body executed by the run coordinator.
    body: Arc<dyn StepBody>,
}

impl TestStep {
    /// Creates a step from metadata and a body.
    pub fn new(metadata: StepMetadata, body: impl StepBody + 'static) -> Self {
        Self {
            metadata,
            body: Arc::new(body),
        }
    }

    /// Returns the step body.
    #[must_use]
    pub fn body(&self) -> &dyn StepBody {
        self.body.as_ref()
    }

    /// Returns the full test id under `prefix`, when the step has an id.
    #[must_use]
    pub fn test_id(&self, prefix: &str) -> Option<TestId> {
        self.metadata.id.map(|id| TestId::compose(prefix, id))
    }

    /// Returns the test id, falling back to the 1-based `index` position for
    /// exempt steps declared without an id.
    #[must_use]
    pub fn resolved_test_id(&self, prefix: &str, index: usize) -> TestId {
        self.test_id(prefix).unwrap_or_else(|| {
            TestId::compose(prefix, u16::try_from(index + 1).unwrap_or(u16::MAX))
        })
    }
}

impl fmt::Debug for TestStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestStep").field("metadata", &self.metadata).finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Sequences
// ============================================================================

/// Ordered group of test steps with declared state dependencies.
#[derive(Debug, Clone)]
pub struct SequenceDefinition {
    /// Unique sequence name.
    pub name: SequenceName,
    /// Display title.
    pub title: String,
    /// Free-text description.
    pub description: String,
    /// Prefix for step test ids; unique across the registry.
    pub test_id_prefix: String,
    /// State keys read by the sequence.
    pub requires: BTreeSet<StateKey>,
    /// State keys the sequence may write.
    pub defines: BTreeSet<StateKey>,
    /// Optional sequences do not count toward certification.
    pub optional: bool,
    /// Inactive sequences are registered but never planned.
    pub inactive: bool,
    /// Steps in execution order.
    pub steps: Vec<TestStep>,
}

impl SequenceDefinition {
    /// Creates an active, required sequence with no steps.
    #[must_use]
    pub fn new(
        name: impl Into<SequenceName>,
        title: impl Into<String>,
        test_id_prefix: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            description: String::new(),
            test_id_prefix: test_id_prefix.into(),
            requires: BTreeSet::new(),
            defines: BTreeSet::new(),
            optional: false,
            inactive: false,
            steps: Vec::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Declares keys the sequence reads.
    #[must_use]
    pub fn requires<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<StateKey>,
    {
        self.requires.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Declares keys the sequence may write.
    #[must_use]
    pub fn defines<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<StateKey>,
    {
        self.defines.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Marks the sequence as optional.
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Marks the sequence as inactive.
    #[must_use]
    pub const fn inactive(mut self) -> Self {
        self.inactive = true;
        self
    }

    /// Appends a step.
    #[must_use]
    pub fn step(mut self, step: TestStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Returns the metadata view consumed by report renderers.
    #[must_use]
    pub fn metadata(&self) -> SequenceMetadata {
        SequenceMetadata {
            name: self.name.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            test_id_prefix: self.test_id_prefix.clone(),
            requires: self.requires.clone(),
            defines: self.defines.clone(),
            optional: self.optional,
            inactive: self.inactive,
            steps: self
                .steps
                .iter()
                .map(|step| StepMetadataView {
                    test_id: step.test_id(&self.test_id_prefix),
                    metadata: step.metadata.clone(),
                })
                .collect(),
        }
    }
}

/// Serializable sequence metadata for front ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceMetadata {
    /// Sequence name.
    pub name: SequenceName,
    /// Display title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Test id prefix.
    pub test_id_prefix: String,
    /// Keys read.
    pub requires: BTreeSet<StateKey>,
    /// Keys written.
    pub defines: BTreeSet<StateKey>,
    /// Optional flag.
    pub optional: bool,
    /// Inactive flag.
    pub inactive: bool,
    /// Step metadata in execution order.
    pub steps: Vec<StepMetadataView>,
}

/// Step metadata with its composed test id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepMetadataView {
    /// Full test id.
    pub test_id: Option<TestId>,
    /// Step metadata.
    #[serde(flatten)]
    pub metadata: StepMetadata,
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns true when `link` parses as an absolute http(s) URI with a host.
fn is_valid_link(link: &str) -> bool {
    let trimmed = link.trim();
    if trimmed.is_empty() {
        return false;
    }
    Url::parse(trimmed).is_ok_and(|url| {
        matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty())
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::MetadataIssue;
    use super::StepMetadata;
    use super::is_valid_link;

    #[test]
    fn link_validation_requires_absolute_http_uri() {
        assert!(is_valid_link("https://tools.ietf.org/html/rfc7591"));
        assert!(is_valid_link("http://hl7.org/fhir/smart-app-launch"));
        assert!(!is_valid_link(""));
        assert!(!is_valid_link("tools.ietf.org/html/rfc7591"));
        assert!(!is_valid_link("mailto:someone@example.com"));
        assert!(!is_valid_link("not a uri"));
    }

    #[test]
    fn validate_reports_first_missing_field() {
        let mut metadata = StepMetadata::new(1, "name", "https://example.com", "");
        assert_eq!(metadata.validate(), Err(MetadataIssue::MissingDescription));
        metadata.description = "desc".to_string();
        metadata.id = None;
        assert_eq!(metadata.validate(), Err(MetadataIssue::MissingId));
    }
}
