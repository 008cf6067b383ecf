//! End-to-end gate scenarios on a fake filesystem.

use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use fortdocs_integrity::{
    ArtifactFs, ErrorWeighting, Evidence, GateAction, IntegrityConfig, IntegrityGate,
    KnownArtifactProbe, Policy, Probe, ProbeCategory, ProbeError, ProbeRegistry, TrustDecision,
    WritabilityProbe,
};

fn policy(fail_closed: bool, weighting: ErrorWeighting, timeout_ms: u64) -> Arc<Policy> {
    Arc::new(Policy::new(0.3, 0.7, fail_closed, timeout_ms, weighting).unwrap())
}

fn listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Sandbox that rejects every create with `EACCES`.
struct Sandboxed;

impl ArtifactFs for Sandboxed {
    fn create_new(&self, _path: &Path) -> io::Result<File> {
        Err(io::Error::from(io::ErrorKind::PermissionDenied))
    }

    fn write_payload(&self, _file: &mut File) -> io::Result<()> {
        Ok(())
    }

    fn remove(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }
}

/// Artifact probe over `<root>/x` plus a writability probe on a location
/// that rejects writes.
fn standard_registry(root: &Path) -> ProbeRegistry {
    let mut registry = ProbeRegistry::new();
    registry
        .register(KnownArtifactProbe::new(
            "known_artifacts",
            0.6,
            [root.join("x").to_string_lossy().into_owned()],
        ))
        .register(WritabilityProbe::new("sandbox_write", 0.4, root).with_fs(Sandboxed));
    registry
}

struct Hangs;

impl Probe for Hangs {
    fn name(&self) -> &str {
        "hangs"
    }

    fn category(&self) -> ProbeCategory {
        ProbeCategory::WritePermissionAnomaly
    }

    fn weight(&self) -> f64 {
        0.4
    }

    fn probe(&self) -> Result<Evidence, ProbeError> {
        std::thread::sleep(Duration::from_millis(500));
        Ok(Evidence::clean(self.name(), self.category(), "write_denied"))
    }
}

#[test]
fn clean_device_is_allowed() {
    let root = tempfile::tempdir().unwrap();
    let gate = IntegrityGate::new(
        policy(true, ErrorWeighting::Exclude, 1_000),
        standard_registry(root.path()),
    );

    let verdict = gate.evaluate().unwrap();
    assert_eq!(verdict.score, 0.0);
    assert_eq!(verdict.decision, TrustDecision::Trusted);
    assert_eq!(gate.decide(&verdict), GateAction::Allow);
    assert_eq!(verdict.contributing_evidence[0].detail, "artifacts_found=0/1");
    assert_eq!(verdict.contributing_evidence[1].detail, "write_denied");
}

#[test]
fn known_artifact_degrades_access() {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("x"), b"").unwrap();
    let gate = IntegrityGate::new(
        policy(true, ErrorWeighting::Exclude, 1_000),
        standard_registry(root.path()),
    );

    let verdict = gate.evaluate().unwrap();
    assert!((verdict.score - 0.6).abs() < 1e-12);
    assert_eq!(verdict.decision, TrustDecision::Suspicious);
    assert_eq!(gate.decide(&verdict), GateAction::AllowDegraded);
    assert_eq!(gate.last_verdict(), Some(verdict));
}

fn timeout_gate(root: &Path, weighting: ErrorWeighting) -> IntegrityGate {
    std::fs::write(root.join("x"), b"").unwrap();
    let mut registry = ProbeRegistry::new();
    registry
        .register(KnownArtifactProbe::new(
            "known_artifacts",
            0.6,
            [root.join("x").to_string_lossy().into_owned()],
        ))
        .register(Hangs);
    IntegrityGate::new(policy(true, weighting, 100), registry)
}

#[test]
fn hung_probe_excluded_from_denominator() {
    let root = tempfile::tempdir().unwrap();
    let gate = timeout_gate(root.path(), ErrorWeighting::Exclude);

    let verdict = gate.evaluate().unwrap();
    assert_eq!(verdict.contributing_evidence[1].detail, "probe_error:timeout");
    assert_eq!(verdict.score, 1.0);
    assert_eq!(gate.decide(&verdict), GateAction::Deny);
}

#[test]
fn hung_probe_included_in_denominator() {
    let root = tempfile::tempdir().unwrap();
    let gate = timeout_gate(root.path(), ErrorWeighting::Include);

    let verdict = gate.evaluate().unwrap();
    assert_eq!(verdict.contributing_evidence[1].detail, "probe_error:timeout");
    assert!((verdict.score - 0.6).abs() < 1e-12);
    assert_eq!(gate.decide(&verdict), GateAction::AllowDegraded);
}

#[test]
fn blocking_evaluate_returns_at_deadline() {
    let root = tempfile::tempdir().unwrap();
    let gate = timeout_gate(root.path(), ErrorWeighting::Exclude);

    let started = std::time::Instant::now();
    gate.evaluate().unwrap();
    assert!(started.elapsed() < Duration::from_millis(400));
}

#[test]
fn writable_protected_location_leaves_no_residue() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("keep.pdf"), b"%PDF").unwrap();
    let before = listing(dir.path());

    let mut registry = ProbeRegistry::new();
    registry.register(WritabilityProbe::new("sandbox_write", 0.4, dir.path()));
    let gate = IntegrityGate::new(policy(true, ErrorWeighting::Exclude, 1_000), registry);

    let verdict = gate.evaluate().unwrap();
    assert_eq!(
        verdict.contributing_evidence[0].detail,
        "protected_location_writable"
    );
    assert_eq!(gate.decide(&verdict), GateAction::Deny);
    assert_eq!(listing(dir.path()), before);
}

#[test]
fn missing_protected_directory_does_not_dilute_detections() {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("x"), b"").unwrap();

    let mut registry = ProbeRegistry::new();
    registry
        .register(KnownArtifactProbe::new(
            "known_artifacts",
            0.6,
            [root.path().join("x").to_string_lossy().into_owned()],
        ))
        .register(WritabilityProbe::new(
            "sandbox_write",
            0.4,
            root.path().join("no-such-directory"),
        ));
    let gate = IntegrityGate::new(policy(true, ErrorWeighting::Exclude, 1_000), registry);

    let verdict = gate.evaluate().unwrap();
    assert_eq!(
        verdict.contributing_evidence[1].detail,
        "probe_error:io_not_found"
    );
    assert_eq!(verdict.score, 1.0);
    assert_eq!(gate.decide(&verdict), GateAction::Deny);
}

#[test]
fn empty_registry_boundaries() {
    for (fail_closed, expected) in [(true, GateAction::Deny), (false, GateAction::Allow)] {
        let config = IntegrityConfig {
            fail_closed: Some(fail_closed),
            probes: Vec::new(),
            ..IntegrityConfig::default()
        };
        let gate = IntegrityGate::from_config(config).unwrap();
        let verdict = gate.evaluate().unwrap();
        assert!(verdict.contributing_evidence.is_empty());
        assert_eq!(gate.decide(&verdict), expected);
    }
}
