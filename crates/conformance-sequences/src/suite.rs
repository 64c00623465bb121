// crates/conformance-sequences/src/suite.rs
// ============================================================================
// Module: Conformance Suite Bootstrap
// Description: Wires configuration into registry, plan, and coordinator.
// Purpose: Turn a validated config into a ready-to-run conformance suite.
// Dependencies: conformance-{config, core, tls}, crate::{discovery, dynamic_registration, http}
// ============================================================================

//! ## Overview
//! Built-in sequences are registered from an explicit list; nothing is
//! discovered implicitly. [`Suite::from_config`] builds the run log sink,
//! the probe factory, and the HTTP client from configuration, registers the
//! built-ins, orders them (explicitly or by dependencies), and prepares the
//! coordinator and instance state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use conformance_config::ConfigError;
use conformance_config::ConformanceConfig;
use conformance_config::LogSinkKind;
use conformance_config::LoggingConfig;
use conformance_config::TlsConfig;
use conformance_core::CancellationToken;
use conformance_core::FileRunLog;
use conformance_core::NoopRunLog;
use conformance_core::OrderingError;
use conformance_core::ProbeConfigError;
use conformance_core::RegistryError;
use conformance_core::RunCoordinator;
use conformance_core::RunAbort;
use conformance_core::RunLogSink;
use conformance_core::RunReport;
use conformance_core::RunTarget;
use conformance_core::SequenceDefinition;
use conformance_core::SequencePlan;
use conformance_core::SequenceRegistry;
use conformance_core::SharedInstanceState;
use conformance_core::StderrRunLog;
use conformance_tls::TlsProbeConfig;
use conformance_tls::TlsProberFactory;
use conformance_tls::load_root_certificates;
use thiserror::Error;

use crate::discovery::discovery_sequence;
use crate::dynamic_registration::dynamic_registration_sequence;
use crate::http::HttpClientError;
use crate::http::JsonClient;
use crate::resources::SequenceResources;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while building or running a suite.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SuiteError {
    /// Configuration could not be loaded or validated.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A built-in sequence failed registration.
    #[error("sequence registration failed: {0}")]
    Registry(#[from] RegistryError),
    /// The sequences could not be ordered.
    #[error("sequence ordering failed: {0}")]
    Ordering(#[from] OrderingError),
    /// Probe trust material could not be loaded.
    #[error(transparent)]
    Probe(#[from] ProbeConfigError),
    /// The HTTP client could not be built.
    #[error(transparent)]
    Http(#[from] HttpClientError),
    /// The run log sink could not be opened.
    #[error("run log unavailable: {0}")]
    Log(String),
    /// The run aborted; completed reports travel with the cause.
    #[error("run aborted: {0}")]
    Run(#[from] RunAbort),
}

// ============================================================================
// SECTION: Built-in Sequences
// ============================================================================

/// Returns the built-in sequences in declaration order.
#[must_use]
pub fn builtin_sequences(resources: &Arc<SequenceResources>) -> Vec<SequenceDefinition> {
    vec![discovery_sequence(resources), dynamic_registration_sequence(resources)]
}

/// Registers every built-in sequence.
///
/// # Errors
///
/// Returns [`RegistryError`] when a built-in fails metadata validation or
/// collides with an already registered sequence.
pub fn register_builtin_sequences(
    registry: &mut SequenceRegistry,
    resources: &Arc<SequenceResources>,
) -> Result<(), RegistryError> {
    for sequence in builtin_sequences(resources) {
        registry.register(sequence)?;
    }
    Ok(())
}

// ============================================================================
// SECTION: Collaborators
// ============================================================================

/// Opens the configured run log sink.
///
/// # Errors
///
/// Returns [`SuiteError::Log`] when the log file cannot be opened.
pub fn open_log_sink(config: &LoggingConfig) -> Result<Arc<dyn RunLogSink>, SuiteError> {
    match (config.sink, &config.path) {
        (LogSinkKind::Stderr, _) => Ok(Arc::new(StderrRunLog)),
        (LogSinkKind::None, _) => Ok(Arc::new(NoopRunLog)),
        (LogSinkKind::File, Some(path)) => FileRunLog::new(path)
            .map(|sink| Arc::new(sink) as Arc<dyn RunLogSink>)
            .map_err(|err| SuiteError::Log(format!("{}: {err}", path.display()))),
        (LogSinkKind::File, None) => Err(SuiteError::Log("file sink requires a path".to_string())),
    }
}

/// Builds probe settings, loading every extra root certificate file.
///
/// # Errors
///
/// Returns [`ProbeConfigError`] when a certificate file is unusable.
pub fn probe_config(config: &TlsConfig) -> Result<TlsProbeConfig, ProbeConfigError> {
    let mut extra_roots = Vec::new();
    for path in &config.extra_root_certs {
        extra_roots.extend(load_root_certificates(path)?);
    }
    Ok(TlsProbeConfig {
        timeout: config.timeout(),
        legacy_hello_probes: config.legacy_hello_probes,
        extra_roots,
        ..TlsProbeConfig::default()
    })
}

/// Builds network collaborators from configuration.
///
/// # Errors
///
/// Returns [`SuiteError`] when trust roots or the HTTP client fail to load.
pub fn resources_from_config(config: &ConformanceConfig) -> Result<SequenceResources, SuiteError> {
    let probes = TlsProberFactory::new(probe_config(&config.tls)?);
    let http = JsonClient::new(config.http.timeout(), &config.http.user_agent)?;
    Ok(SequenceResources::new(http, Arc::new(probes)))
}

// ============================================================================
// SECTION: Suite
// ============================================================================

/// Registered, ordered, and ready-to-run built-in sequences.
pub struct Suite {
    /// Registry holding the built-ins.
    registry: SequenceRegistry,
    /// Execution order.
    plan: SequencePlan,
    /// Configured coordinator.
    coordinator: RunCoordinator,
    /// Instance state seeded from `[instance]`.
    state: SharedInstanceState,
}

impl Suite {
    /// Builds a suite entirely from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SuiteError`] when any collaborator fails to build or the
    /// sequences cannot be registered or ordered.
    pub fn from_config(config: &ConformanceConfig) -> Result<Self, SuiteError> {
        let log = open_log_sink(&config.logging)?;
        let resources = resources_from_config(config)?;
        Self::build(config, &Arc::new(resources), log)
    }

    /// Builds a suite with caller-supplied collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`SuiteError`] when the configuration is invalid or the
    /// sequences cannot be registered or ordered.
    pub fn build(
        config: &ConformanceConfig,
        resources: &Arc<SequenceResources>,
        log: Arc<dyn RunLogSink>,
    ) -> Result<Self, SuiteError> {
        config.validate()?;
        let mut registry =
            SequenceRegistry::with_exemptions(config.exemptions()).with_log_sink(Arc::clone(&log));
        register_builtin_sequences(&mut registry, resources)?;

        let preseeded = config.preseeded_keys();
        let plan = match config.run.sequence_order() {
            Some(order) => registry.validate_ordering(&order, &preseeded)?,
            None => registry.plan(&preseeded)?,
        };
        let coordinator = RunCoordinator::new()
            .with_settings(config.step_settings())
            .with_log_sink(log)
            .with_max_parallel(config.run.max_parallel);
        Ok(Self {
            registry,
            plan,
            coordinator,
            state: SharedInstanceState::new(config.instance_state()),
        })
    }

    /// Returns the registry holding the built-ins.
    #[must_use]
    pub const fn registry(&self) -> &SequenceRegistry {
        &self.registry
    }

    /// Returns the execution order.
    #[must_use]
    pub const fn plan(&self) -> &SequencePlan {
        &self.plan
    }

    /// Returns the shared instance state.
    #[must_use]
    pub const fn state(&self) -> &SharedInstanceState {
        &self.state
    }

    /// Returns a token that cancels the run when raised.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.coordinator.cancellation_token()
    }

    /// Runs the plan against `target`.
    ///
    /// # Errors
    ///
    /// Returns [`SuiteError::Run`] when the run aborts. The error keeps the
    /// reports of sequences that finished first.
    pub fn run(&self, target: &RunTarget) -> Result<RunReport, SuiteError> {
        Ok(self.coordinator.run_plan(&self.plan, &self.state, target)?)
    }
}
