//! Loading policy documents from disk.

use std::path::PathBuf;

use fortdocs_integrity::{IntegrityConfig, IntegrityError, IntegrityGate};

fn example_policy() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("policy.example.json")
}

#[test]
fn shipped_example_policy_validates() {
    let config = IntegrityConfig::load(&example_policy()).unwrap();
    let policy = config.validate().unwrap();

    assert!(policy.fail_closed());
    assert_eq!(policy.probe_timeout().as_millis(), 750);
    let enabled: Vec<_> = config.enabled_probes().map(|p| p.name()).collect();
    assert_eq!(
        enabled,
        vec!["known_artifacts", "sandbox_write", "relocated_system_dirs"]
    );
}

#[tokio::test]
async fn example_policy_builds_a_gate() {
    let config = IntegrityConfig::load(&example_policy()).unwrap();
    let gate = IntegrityGate::from_config(config).unwrap();
    assert_eq!(
        gate.probe_names().await,
        vec!["known_artifacts", "sandbox_write", "relocated_system_dirs"]
    );
}

#[test]
fn embedded_default_round_trips_through_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.json");
    std::fs::write(&path, IntegrityConfig::default().to_json_pretty().unwrap()).unwrap();

    let loaded = IntegrityConfig::load(&path).unwrap();
    assert_eq!(loaded, IntegrityConfig::default());
    assert!(loaded.validate().is_ok());
}

#[test]
fn missing_file_is_a_configuration_error() {
    let err = IntegrityConfig::load(&PathBuf::from("/nonexistent/fortdocs/policy.json"))
        .unwrap_err();
    assert!(matches!(err, IntegrityError::PolicyIo { .. }));
    assert!(err.is_configuration());
}

#[test]
fn malformed_file_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.json");
    std::fs::write(&path, r#"{ "threshold_suspicious": 0.3, "tresholds": 1 }"#).unwrap();

    let err = IntegrityConfig::load(&path).unwrap_err();
    assert!(matches!(err, IntegrityError::PolicyParse(_)));
    assert!(err.is_configuration());
}

#[test]
fn inverted_thresholds_fail_before_probing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.json");
    std::fs::write(
        &path,
        r#"{ "threshold_suspicious": 0.8, "threshold_compromised": 0.4, "fail_closed": true }"#,
    )
    .unwrap();

    let config = IntegrityConfig::load(&path).unwrap();
    let err = IntegrityGate::from_config(config).unwrap_err();
    assert!(matches!(err, IntegrityError::ConfigError { .. }));
}
