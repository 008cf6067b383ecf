//! Policy configuration for the integrity gate.
//!
//! The policy is data: a JSON document (or the embedded defaults) naming the
//! score thresholds, the fail-closed stance, the per-probe timeout and the
//! probes to run. Detection signatures such as the known-artifact path list
//! live here rather than in code so they can be updated without a rebuild.
//!
//! [`IntegrityConfig`] is the raw document. [`IntegrityConfig::validate`]
//! turns it into an immutable [`Policy`] or fails with
//! [`IntegrityError::ConfigError`]. Nothing is ever silently clamped.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::IntegrityError;
use crate::types::TrustDecision;

/// Paths installed by common iOS jailbreak tooling.
pub const DEFAULT_ARTIFACT_PATHS: &[&str] = &[
    "/Applications/Cydia.app",
    "/Applications/Sileo.app",
    "/Applications/Zebra.app",
    "/Library/MobileSubstrate/MobileSubstrate.dylib",
    "/Library/MobileSubstrate/DynamicLibraries",
    "/bin/bash",
    "/usr/sbin/sshd",
    "/usr/bin/sshd",
    "/usr/libexec/ssh-keysign",
    "/etc/apt",
    "/private/var/lib/apt/",
    "/private/var/lib/cydia",
    "/private/var/stash",
    "/var/cache/apt",
    "/var/lib/cydia",
    "/var/tmp/cydia.log",
    "/System/Library/LaunchDaemons/com.ikey.bbot.plist",
    "/System/Library/LaunchDaemons/com.saurik.Cydia.Startup.plist",
];

/// System locations that jailbreaks commonly relocate behind symlinks.
pub const DEFAULT_SYMLINK_PATHS: &[&str] = &[
    "/Applications",
    "/Library/Ringtones",
    "/Library/Wallpaper",
    "/usr/arm-apple-darwin9",
    "/usr/include",
    "/usr/libexec",
    "/usr/share",
];

/// Substrings of mapped library names left by instrumentation frameworks.
pub const DEFAULT_INSTRUMENTATION_MARKERS: &[&str] =
    &["frida", "gum-js-loop", "xposed", "substrate", "substitute", "cycript"];

/// Frida server's default listening port.
pub const DEFAULT_INSTRUMENTATION_PORTS: &[u16] = &[27042];

/// Directory outside the app sandbox that must reject writes.
pub const DEFAULT_PROTECTED_DIRECTORY: &str = "/private";

const DEFAULT_THRESHOLD_SUSPICIOUS: f64 = 0.3;
const DEFAULT_THRESHOLD_COMPROMISED: f64 = 0.7;
const DEFAULT_PROBE_TIMEOUT_MS: u64 = 750;
const DEFAULT_SATURATION_HITS: usize = 2;

/// How neutral evidence (probe errors, inconclusive cleanup) enters the
/// weighted-score denominator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorWeighting {
    /// Neutral evidence is left out of numerator and denominator, so a probe
    /// that can be made to hang cannot dilute the others.
    #[default]
    Exclude,
    /// Neutral evidence adds nothing to the numerator but keeps its weight
    /// in the denominator.
    Include,
}

/// Raw policy document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntegrityConfig {
    /// Scores at or above this are at least `Suspicious`.
    #[serde(default = "default_threshold_suspicious")]
    pub threshold_suspicious: f64,
    /// Scores at or above this are `Compromised`.
    #[serde(default = "default_threshold_compromised")]
    pub threshold_compromised: f64,
    /// Outcome when no probe produced usable evidence. Required when no
    /// probe is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_closed: Option<bool>,
    /// Per-probe deadline in milliseconds.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Denominator convention for neutral evidence.
    #[serde(default)]
    pub error_weighting: ErrorWeighting,
    /// Probes in execution order.
    #[serde(default)]
    pub probes: Vec<ProbeSpec>,
}

impl Default for IntegrityConfig {
    fn default() -> Self {
        Self {
            threshold_suspicious: DEFAULT_THRESHOLD_SUSPICIOUS,
            threshold_compromised: DEFAULT_THRESHOLD_COMPROMISED,
            fail_closed: Some(true),
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            error_weighting: ErrorWeighting::Exclude,
            probes: vec![
                ProbeSpec::KnownArtifact(KnownArtifactSpec {
                    name: "known_artifacts".into(),
                    weight: 0.6,
                    enabled: true,
                    paths: DEFAULT_ARTIFACT_PATHS.iter().map(|p| (*p).into()).collect(),
                    saturation_hits: DEFAULT_SATURATION_HITS,
                }),
                ProbeSpec::Writability(WritabilitySpec {
                    name: "sandbox_write".into(),
                    weight: 0.4,
                    enabled: true,
                    directory: PathBuf::from(DEFAULT_PROTECTED_DIRECTORY),
                }),
                ProbeSpec::Symlink(SymlinkSpec {
                    name: "relocated_system_dirs".into(),
                    weight: 0.3,
                    enabled: true,
                    paths: DEFAULT_SYMLINK_PATHS.iter().map(|p| (*p).into()).collect(),
                    saturation_hits: DEFAULT_SATURATION_HITS,
                }),
                ProbeSpec::ProcessAnomaly(ProcessAnomalySpec::default()),
            ],
        }
    }
}

impl IntegrityConfig {
    /// Parse a policy document.
    pub fn from_json_str(json: &str) -> Result<Self, IntegrityError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a policy file.
    pub fn load(path: &Path) -> Result<Self, IntegrityError> {
        let raw = std::fs::read_to_string(path).map_err(|source| IntegrityError::PolicyIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&raw)?;
        debug!(probes = config.probes.len(), "Loaded policy file");
        Ok(config)
    }

    /// Serialize as pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String, IntegrityError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Probe specs that will actually be registered.
    pub fn enabled_probes(&self) -> impl Iterator<Item = &ProbeSpec> {
        self.probes.iter().filter(|p| p.enabled())
    }

    /// Check every constraint and produce the immutable policy.
    pub fn validate(&self) -> Result<Policy, IntegrityError> {
        let mut names = HashSet::new();
        for spec in &self.probes {
            spec.validate()?;
            if !names.insert(spec.name()) {
                return Err(IntegrityError::config(format!(
                    "duplicate probe name '{}'",
                    spec.name()
                )));
            }
        }

        let fail_closed = match (self.fail_closed, self.enabled_probes().next()) {
            (Some(fail_closed), _) => fail_closed,
            (None, Some(_)) => true,
            (None, None) => {
                return Err(IntegrityError::config(
                    "fail_closed must be set explicitly when no probe is enabled",
                ))
            },
        };

        Policy::new(
            self.threshold_suspicious,
            self.threshold_compromised,
            fail_closed,
            self.probe_timeout_ms,
            self.error_weighting,
        )
    }
}

/// Validated, immutable scoring policy.
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    threshold_suspicious: f64,
    threshold_compromised: f64,
    fail_closed: bool,
    probe_timeout: Duration,
    error_weighting: ErrorWeighting,
}

impl Policy {
    /// Build a policy, rejecting thresholds outside
    /// `0 <= suspicious < compromised <= 1` and a zero timeout.
    pub fn new(
        threshold_suspicious: f64,
        threshold_compromised: f64,
        fail_closed: bool,
        probe_timeout_ms: u64,
        error_weighting: ErrorWeighting,
    ) -> Result<Self, IntegrityError> {
        if !threshold_suspicious.is_finite() || !threshold_compromised.is_finite() {
            return Err(IntegrityError::config("thresholds must be finite numbers"));
        }
        if threshold_suspicious < 0.0 {
            return Err(IntegrityError::config(format!(
                "threshold_suspicious must be >= 0 (got {threshold_suspicious})"
            )));
        }
        if threshold_compromised > 1.0 {
            return Err(IntegrityError::config(format!(
                "threshold_compromised must be <= 1 (got {threshold_compromised})"
            )));
        }
        if threshold_suspicious >= threshold_compromised {
            return Err(IntegrityError::config(format!(
                "threshold_suspicious ({threshold_suspicious}) must be below \
                 threshold_compromised ({threshold_compromised})"
            )));
        }
        if probe_timeout_ms == 0 {
            return Err(IntegrityError::config("probe_timeout_ms must be positive"));
        }

        Ok(Self {
            threshold_suspicious,
            threshold_compromised,
            fail_closed,
            probe_timeout: Duration::from_millis(probe_timeout_ms),
            error_weighting,
        })
    }

    /// Lower bound of the `Suspicious` band.
    pub fn threshold_suspicious(&self) -> f64 {
        self.threshold_suspicious
    }

    /// Lower bound of the `Compromised` band.
    pub fn threshold_compromised(&self) -> f64 {
        self.threshold_compromised
    }

    /// Whether absence of evidence is treated as untrusted.
    pub fn fail_closed(&self) -> bool {
        self.fail_closed
    }

    /// Per-probe deadline.
    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    /// Denominator convention for neutral evidence.
    pub fn error_weighting(&self) -> ErrorWeighting {
        self.error_weighting
    }

    /// Map a score onto the threshold bands.
    pub fn classify(&self, score: f64) -> TrustDecision {
        if score < self.threshold_suspicious {
            TrustDecision::Trusted
        } else if score < self.threshold_compromised {
            TrustDecision::Suspicious
        } else {
            TrustDecision::Compromised
        }
    }
}

/// One configured probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeSpec {
    /// Presence of known jailbreak artifacts.
    KnownArtifact(KnownArtifactSpec),
    /// Write attempt into a protected directory.
    Writability(WritabilitySpec),
    /// System locations replaced by symlinks.
    Symlink(SymlinkSpec),
    /// Debugger and instrumentation indicators.
    ProcessAnomaly(ProcessAnomalySpec),
}

impl ProbeSpec {
    /// Probe name.
    pub fn name(&self) -> &str {
        match self {
            Self::KnownArtifact(s) => &s.name,
            Self::Writability(s) => &s.name,
            Self::Symlink(s) => &s.name,
            Self::ProcessAnomaly(s) => &s.name,
        }
    }

    /// Probe weight.
    pub fn weight(&self) -> f64 {
        match self {
            Self::KnownArtifact(s) => s.weight,
            Self::Writability(s) => s.weight,
            Self::Symlink(s) => s.weight,
            Self::ProcessAnomaly(s) => s.weight,
        }
    }

    /// Whether the probe is registered.
    pub fn enabled(&self) -> bool {
        match self {
            Self::KnownArtifact(s) => s.enabled,
            Self::Writability(s) => s.enabled,
            Self::Symlink(s) => s.enabled,
            Self::ProcessAnomaly(s) => s.enabled,
        }
    }

    fn validate(&self) -> Result<(), IntegrityError> {
        let name = self.name();
        if name.trim().is_empty() {
            return Err(IntegrityError::config("probe name must not be empty"));
        }
        let weight = self.weight();
        if !(0.0..=1.0).contains(&weight) {
            return Err(IntegrityError::config(format!(
                "probe '{name}' weight must be within [0, 1] (got {weight})"
            )));
        }

        match self {
            Self::KnownArtifact(KnownArtifactSpec {
                paths,
                saturation_hits,
                ..
            })
            | Self::Symlink(SymlinkSpec {
                paths,
                saturation_hits,
                ..
            }) => {
                if paths.iter().all(|p| p.trim().is_empty()) {
                    return Err(IntegrityError::config(format!(
                        "probe '{name}' needs at least one path"
                    )));
                }
                if *saturation_hits == 0 {
                    return Err(IntegrityError::config(format!(
                        "probe '{name}' saturation_hits must be at least 1"
                    )));
                }
            },
            Self::Writability(spec) => {
                if !spec.directory.is_absolute() {
                    return Err(IntegrityError::config(format!(
                        "probe '{name}' directory must be an absolute path"
                    )));
                }
            },
            Self::ProcessAnomaly(_) => {},
        }
        Ok(())
    }
}

/// Parameters of a known-artifact probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KnownArtifactSpec {
    /// Probe name.
    pub name: String,
    /// Severity weight in [0, 1].
    pub weight: f64,
    /// Whether the probe is registered.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Candidate paths.
    pub paths: Vec<String>,
    /// Number of distinct hits that yields full confidence.
    #[serde(default = "default_saturation_hits")]
    pub saturation_hits: usize,
}

/// Parameters of a writability probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WritabilitySpec {
    /// Probe name.
    pub name: String,
    /// Severity weight in [0, 1].
    pub weight: f64,
    /// Whether the probe is registered.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Directory that should reject writes.
    pub directory: PathBuf,
}

/// Parameters of a symlink probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SymlinkSpec {
    /// Probe name.
    pub name: String,
    /// Severity weight in [0, 1].
    pub weight: f64,
    /// Whether the probe is registered.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Locations that must not be symbolic links.
    pub paths: Vec<String>,
    /// Number of distinct hits that yields full confidence.
    #[serde(default = "default_saturation_hits")]
    pub saturation_hits: usize,
}

/// Parameters of the process-anomaly probe. Disabled unless enabled explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessAnomalySpec {
    /// Probe name.
    pub name: String,
    /// Severity weight in [0, 1].
    pub weight: f64,
    /// Whether the probe is registered.
    #[serde(default)]
    pub enabled: bool,
    /// Lower-case substrings searched for in mapped library paths.
    #[serde(default = "default_instrumentation_markers")]
    pub library_markers: Vec<String>,
    /// Loopback ports where instrumentation servers listen.
    #[serde(default = "default_instrumentation_ports")]
    pub loopback_ports: Vec<u16>,
}

impl Default for ProcessAnomalySpec {
    fn default() -> Self {
        Self {
            name: "process_anomaly".into(),
            weight: 0.5,
            enabled: false,
            library_markers: default_instrumentation_markers(),
            loopback_ports: default_instrumentation_ports(),
        }
    }
}

fn default_threshold_suspicious() -> f64 {
    DEFAULT_THRESHOLD_SUSPICIOUS
}

fn default_threshold_compromised() -> f64 {
    DEFAULT_THRESHOLD_COMPROMISED
}

fn default_probe_timeout_ms() -> u64 {
    DEFAULT_PROBE_TIMEOUT_MS
}

fn default_saturation_hits() -> usize {
    DEFAULT_SATURATION_HITS
}

fn enabled_by_default() -> bool {
    true
}

fn default_instrumentation_markers() -> Vec<String> {
    DEFAULT_INSTRUMENTATION_MARKERS
        .iter()
        .map(|m| (*m).into())
        .collect()
}

fn default_instrumentation_ports() -> Vec<u16> {
    DEFAULT_INSTRUMENTATION_PORTS.to_vec()
}
