//! Config load validation tests for conformance-config.
// crates/conformance-config/tests/load_validation.rs
// =============================================================================
// Module: Config Load Validation Tests
// Description: Validate config loading guards, defaults, and section rules.
// Purpose: Ensure config input handling is strict and fail-closed.
// =============================================================================

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

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use conformance_config::ConfigError;
use conformance_config::ConformanceConfig;
use conformance_config::LogSinkKind;
use conformance_core::SequenceName;
use conformance_core::StateKey;
use conformance_core::StateValue;
use tempfile::NamedTempFile;

type TestResult = Result<(), String>;

fn assert_invalid(result: Result<ConformanceConfig, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config load".to_string()),
    }
}

fn write_config(content: &[u8]) -> Result<NamedTempFile, String> {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(content).map_err(|err| err.to_string())?;
    Ok(file)
}

const FULL_CONFIG: &str = r#"
[run]
max_parallel = 4
disable_tls_tests = true
sequence_order = ["Authorization Server Discovery", "Dynamic Registration"]

[tls]
timeout_ms = 2500
legacy_hello_probes = false
extra_root_certs = ["certs/test-ca.pem"]

[http]
timeout_ms = 3000
user_agent = "conformance-tests"

[metadata]
exempt_steps = ["Patient has address"]

[logging]
sink = "file"
path = "logs/run.jsonl"

[instance]
url = "https://fhir.example.org"
client_name = "Inferno"
confidential_client = false
redirect_uris = ["https://app.example.org/redirect"]
"#;

// ============================================================================
// SECTION: Load Guards
// ============================================================================

#[test]
fn load_rejects_path_too_long() -> TestResult {
    let long_path = "a".repeat(5_000);
    assert_invalid(
        ConformanceConfig::load(Some(Path::new(&long_path))),
        "config path exceeds max length",
    )
}

#[test]
fn load_rejects_path_component_too_long() -> TestResult {
    let long_component = "a".repeat(300);
    assert_invalid(
        ConformanceConfig::load(Some(Path::new(&long_component))),
        "config path component too long",
    )
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let file = write_config(&vec![b'#'; 1_048_577])?;
    assert_invalid(ConformanceConfig::load(Some(file.path())), "config file exceeds size limit")
}

#[test]
fn load_rejects_non_utf8_file() -> TestResult {
    let file = write_config(&[0xFF, 0xFE, 0xFF])?;
    assert_invalid(ConformanceConfig::load(Some(file.path())), "config file must be utf-8")
}

#[test]
fn load_reports_missing_file_as_io_error() -> TestResult {
    match ConformanceConfig::load(Some(Path::new("does-not-exist/conformance.toml"))) {
        Err(ConfigError::Io(_)) => Ok(()),
        other => Err(format!("expected io error, got {other:?}")),
    }
}

#[test]
fn load_rejects_unknown_fields() -> TestResult {
    let file = write_config(b"[run]\nmax_paralel = 2\n")?;
    assert_invalid(ConformanceConfig::load(Some(file.path())), "config parse error")
}

// ============================================================================
// SECTION: Contents
// ============================================================================

#[test]
fn empty_file_yields_defaults() -> TestResult {
    let file = write_config(b"")?;
    let config = ConformanceConfig::load(Some(file.path())).map_err(|err| err.to_string())?;
    if config != ConformanceConfig::default() {
        return Err(format!("unexpected defaults: {config:?}"));
    }
    if config.run.max_parallel != 1 || !config.tls.legacy_hello_probes {
        return Err("defaults must run serially with legacy probes enabled".to_string());
    }
    if config.tls.timeout() != Duration::from_secs(5) || config.logging.sink != LogSinkKind::Stderr {
        return Err("unexpected timeout or sink default".to_string());
    }
    Ok(())
}

#[test]
fn full_config_round_trips_into_engine_types() -> TestResult {
    let file = write_config(FULL_CONFIG.as_bytes())?;
    let config = ConformanceConfig::load(Some(file.path())).map_err(|err| err.to_string())?;

    if !config.step_settings().disable_tls_tests {
        return Err("disable_tls_tests not carried into step settings".to_string());
    }
    if config.tls.extra_root_certs != vec![PathBuf::from("certs/test-ca.pem")] {
        return Err("extra_root_certs not parsed".to_string());
    }
    if config.http.timeout() != Duration::from_millis(3_000) {
        return Err("http timeout not parsed".to_string());
    }
    if !config.exemptions().contains("Patient has address") {
        return Err("exemption set not built".to_string());
    }
    let order = config.run.sequence_order().ok_or("sequence order missing")?;
    if order
        != vec![
            SequenceName::new("Authorization Server Discovery"),
            SequenceName::new("Dynamic Registration"),
        ]
    {
        return Err(format!("unexpected order: {order:?}"));
    }

    let state = config.instance_state();
    let expected = [
        ("url", StateValue::Text("https://fhir.example.org".to_string())),
        ("client_name", StateValue::Text("Inferno".to_string())),
        ("confidential_client", StateValue::Bool(false)),
        ("redirect_uris", StateValue::List(vec!["https://app.example.org/redirect".to_string()])),
    ];
    for (key, value) in expected {
        if state.get(&StateKey::new(key)) != Some(&value) {
            return Err(format!("instance key {key} not seeded as {value:?}"));
        }
    }
    if config.preseeded_keys().len() != 4 {
        return Err("every instance key counts as pre-seeded".to_string());
    }
    Ok(())
}

// ============================================================================
// SECTION: Section Rules
// ============================================================================

#[test]
fn run_rejects_out_of_range_parallelism() -> TestResult {
    assert_invalid(ConformanceConfig::from_toml("[run]\nmax_parallel = 0\n"), "run.max_parallel")?;
    assert_invalid(ConformanceConfig::from_toml("[run]\nmax_parallel = 33\n"), "run.max_parallel")
}

#[test]
fn run_rejects_blank_sequence_names() -> TestResult {
    assert_invalid(
        ConformanceConfig::from_toml("[run]\nsequence_order = [\"Discovery\", \" \"]\n"),
        "run.sequence_order",
    )
}

#[test]
fn timeouts_are_bounded() -> TestResult {
    assert_invalid(ConformanceConfig::from_toml("[tls]\ntimeout_ms = 50\n"), "tls.timeout_ms")?;
    assert_invalid(ConformanceConfig::from_toml("[http]\ntimeout_ms = 600000\n"), "http.timeout_ms")
}

#[test]
fn http_rejects_blank_user_agent() -> TestResult {
    assert_invalid(ConformanceConfig::from_toml("[http]\nuser_agent = \"  \"\n"), "http.user_agent")
}

#[test]
fn metadata_rejects_blank_exemptions() -> TestResult {
    assert_invalid(
        ConformanceConfig::from_toml("[metadata]\nexempt_steps = [\"\"]\n"),
        "metadata.exempt_steps",
    )
}

#[test]
fn logging_file_sink_requires_path() -> TestResult {
    assert_invalid(
        ConformanceConfig::from_toml("[logging]\nsink = \"file\"\n"),
        "logging.path is required",
    )?;
    assert_invalid(
        ConformanceConfig::from_toml("[logging]\nsink = \"none\"\npath = \"run.jsonl\"\n"),
        "only valid with the file sink",
    )
}

#[test]
fn instance_rejects_unsupported_value_types() -> TestResult {
    match ConformanceConfig::from_toml("[instance]\nratio = 0.5\n") {
        Err(ConfigError::Parse(_)) => Ok(()),
        other => Err(format!("expected parse error, got {other:?}")),
    }
}

#[test]
fn instance_rejects_blank_keys() -> TestResult {
    assert_invalid(ConformanceConfig::from_toml("[instance]\n\" \" = \"x\"\n"), "instance keys")
}
