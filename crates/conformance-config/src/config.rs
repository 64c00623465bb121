// crates/conformance-config/src/config.rs
// ============================================================================
// Module: Conformance Configuration
// Description: Configuration loading and validation for conformance runs.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: conformance-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed: a run never starts from a
//! partially understood config. The `[instance]` table seeds the instance
//! state bag and its keys count as pre-seeded for sequence ordering.
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use conformance_core::InstanceState;
use conformance_core::MetadataExemptions;
use conformance_core::SequenceName;
use conformance_core::StateKey;
use conformance_core::StateValue;
use conformance_core::StepSettings;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "conformance.toml";
/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "CONFORMANCE_CONFIG";
/// Maximum size of the config file in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of one path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum length of a full path.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Upper bound for concurrently running sequences.
pub(crate) const MAX_PARALLEL_SEQUENCES: usize = 32;
/// Lower bound for network timeouts.
pub(crate) const MIN_TIMEOUT_MS: u64 = 100;
/// Upper bound for network timeouts.
pub(crate) const MAX_TIMEOUT_MS: u64 = 60_000;
/// Default network timeout.
pub(crate) const DEFAULT_TIMEOUT_MS: u64 = 5_000;
/// Maximum user agent length.
pub(crate) const MAX_USER_AGENT_LENGTH: usize = 256;
/// Maximum number of exempt step names.
pub(crate) const MAX_EXEMPT_STEPS: usize = 256;
/// Maximum number of pre-seeded instance keys.
pub(crate) const MAX_INSTANCE_KEYS: usize = 256;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Conformance run configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConformanceConfig {
    /// Run scheduling configuration.
    #[serde(default)]
    pub run: RunConfig,
    /// Protocol-version probe configuration.
    #[serde(default)]
    pub tls: TlsConfig,
    /// HTTP client configuration.
    #[serde(default)]
    pub http: HttpConfig,
    /// Metadata validation configuration.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Run log configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Pre-seeded instance state.
    #[serde(default)]
    pub instance: BTreeMap<String, StateValue>,
}

impl ConformanceConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// Resolution order: explicit `path`, then `CONFORMANCE_CONFIG`, then
    /// `conformance.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.run.validate()?;
        self.tls.validate()?;
        self.http.validate()?;
        self.metadata.validate()?;
        self.logging.validate()?;
        if self.instance.len() > MAX_INSTANCE_KEYS {
            return Err(ConfigError::Invalid("instance has too many keys".to_string()));
        }
        if self.instance.keys().any(|key| key.trim().is_empty()) {
            return Err(ConfigError::Invalid("instance keys must be non-empty".to_string()));
        }
        Ok(())
    }

    /// Builds the initial instance state bag from `[instance]`.
    #[must_use]
    pub fn instance_state(&self) -> InstanceState {
        self.instance
            .iter()
            .map(|(key, value)| (StateKey::new(key.as_str()), value.clone()))
            .collect()
    }

    /// Returns the keys seeded by `[instance]`.
    #[must_use]
    pub fn preseeded_keys(&self) -> BTreeSet<StateKey> {
        self.instance.keys().map(|key| StateKey::new(key.as_str())).collect()
    }

    /// Returns the metadata exemption set.
    #[must_use]
    pub fn exemptions(&self) -> MetadataExemptions {
        self.metadata.exempt_steps.iter().cloned().collect()
    }

    /// Returns the run-wide switches visible to step bodies.
    #[must_use]
    pub const fn step_settings(&self) -> StepSettings {
        StepSettings {
            disable_tls_tests: self.run.disable_tls_tests,
        }
    }
}

/// Run scheduling configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Maximum sequences running at once within a dependency wave.
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
    /// Skip every transport-security check.
    #[serde(default)]
    pub disable_tls_tests: bool,
    /// Explicit sequence order; derived from dependencies when absent.
    #[serde(default)]
    pub sequence_order: Option<Vec<String>>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
            disable_tls_tests: false,
            sequence_order: None,
        }
    }
}

impl RunConfig {
    /// Returns the explicit sequence order, if configured.
    #[must_use]
    pub fn sequence_order(&self) -> Option<Vec<SequenceName>> {
        self.sequence_order
            .as_ref()
            .map(|names| names.iter().map(|name| SequenceName::new(name.trim())).collect())
    }

    /// Validates run configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_parallel == 0 || self.max_parallel > MAX_PARALLEL_SEQUENCES {
            return Err(ConfigError::Invalid(format!(
                "run.max_parallel must be between 1 and {MAX_PARALLEL_SEQUENCES}"
            )));
        }
        if let Some(order) = &self.sequence_order
            && order.iter().any(|name| name.trim().is_empty())
        {
            return Err(ConfigError::Invalid(
                "run.sequence_order entries must be non-empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Protocol-version probe configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsConfig {
    /// Per-connection timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Probe SSLv3, TLS 1.0, and TLS 1.1 with hand-encoded hellos.
    #[serde(default = "default_true")]
    pub legacy_hello_probes: bool,
    /// PEM files with additional trust anchors.
    #[serde(default)]
    pub extra_root_certs: Vec<PathBuf>,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            legacy_hello_probes: true,
            extra_root_certs: Vec::new(),
        }
    }
}

impl TlsConfig {
    /// Returns the per-connection timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Validates probe configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_timeout("tls.timeout_ms", self.timeout_ms)?;
        for path in &self.extra_root_certs {
            validate_path_string("tls.extra_root_certs", &path.to_string_lossy())?;
        }
        Ok(())
    }
}

/// HTTP client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// User agent for outbound requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl HttpConfig {
    /// Returns the request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Validates HTTP configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_timeout("http.timeout_ms", self.timeout_ms)?;
        let agent = self.user_agent.trim();
        if agent.is_empty() || agent.len() > MAX_USER_AGENT_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "http.user_agent must be 1-{MAX_USER_AGENT_LENGTH} characters"
            )));
        }
        Ok(())
    }
}

/// Metadata validation configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetadataConfig {
    /// Step names exempt from metadata validation.
    #[serde(default)]
    pub exempt_steps: Vec<String>,
}

impl MetadataConfig {
    /// Validates the exemption set.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.exempt_steps.len() > MAX_EXEMPT_STEPS {
            return Err(ConfigError::Invalid(
                "metadata.exempt_steps has too many entries".to_string(),
            ));
        }
        if self.exempt_steps.iter().any(|name| name.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "metadata.exempt_steps entries must be non-empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Run log sink selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Discard events.
    None,
}

/// Run log configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Sink selection.
    #[serde(default)]
    pub sink: LogSinkKind,
    /// Log file path, required for the file sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl LoggingConfig {
    /// Validates log configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (LogSinkKind::File, Some(path)) => {
                validate_path_string("logging.path", &path.to_string_lossy())
            }
            (LogSinkKind::File, None) => {
                Err(ConfigError::Invalid("logging.path is required for the file sink".to_string()))
            }
            (LogSinkKind::Stderr | LogSinkKind::None, Some(_)) => Err(ConfigError::Invalid(
                "logging.path is only valid with the file sink".to_string(),
            )),
            (LogSinkKind::Stderr | LogSinkKind::None, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default for `run.max_parallel`.
const fn default_max_parallel() -> usize {
    1
}

/// Default for network timeouts.
const fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// Default for boolean switches that start enabled.
const fn default_true() -> bool {
    true
}

/// Default HTTP user agent.
fn default_user_agent() -> String {
    format!("conformance-engine/{}", env!("CARGO_PKG_VERSION"))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from the caller or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a configured path string.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a timeout against the shared bounds.
fn validate_timeout(field: &str, value: u64) -> Result<(), ConfigError> {
    if (MIN_TIMEOUT_MS ..= MAX_TIMEOUT_MS).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{field} must be between {MIN_TIMEOUT_MS} and {MAX_TIMEOUT_MS}"
        )))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only unwraps are permitted.")]

    use super::*;

    #[test]
    fn explicit_path_wins_resolution() {
        let resolved = resolve_path(Some(Path::new("custom.toml"))).unwrap();
        assert_eq!(resolved, PathBuf::from("custom.toml"));
    }

    #[test]
    fn validate_path_string_rejects_whitespace_only() {
        let err = validate_path_string("tls.extra_root_certs", "   ").unwrap_err();
        assert!(err.to_string().contains("non-empty"));
    }

    #[test]
    fn timeout_bounds_are_inclusive() {
        assert!(validate_timeout("t", MIN_TIMEOUT_MS).is_ok());
        assert!(validate_timeout("t", MAX_TIMEOUT_MS).is_ok());
        assert!(validate_timeout("t", MIN_TIMEOUT_MS - 1).is_err());
        assert!(validate_timeout("t", MAX_TIMEOUT_MS + 1).is_err());
    }
}
