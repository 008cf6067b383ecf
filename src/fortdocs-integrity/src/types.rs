//! Evidence, verdict and action types shared across the gate.

use serde::{Deserialize, Serialize};

/// Detail prefix marking evidence from a probe that could not complete.
pub const PROBE_ERROR_PREFIX: &str = "probe_error:";

/// Detail of a writability probe whose artifact could not be removed.
pub const INCONCLUSIVE_DETAIL: &str = "inconclusive";

/// What kind of environment signal a probe inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeCategory {
    /// Files or directories installed by jailbreak/rooting tooling.
    FilesystemAnomaly,
    /// Protected locations that accept writes from the app.
    WritePermissionAnomaly,
    /// Debuggers or instrumentation attached to this process.
    ProcessAnomaly,
    /// System locations relocated behind symbolic links.
    SymbolicLinkAnomaly,
}

/// One probe's finding. Produced fresh on every run and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Name of the probe that produced this evidence.
    pub probe_name: String,
    /// Category of the producing probe.
    pub category: ProbeCategory,
    /// Whether the probe found an anomaly.
    pub detected: bool,
    /// Confidence in the finding, in [0, 1].
    pub confidence: f64,
    /// Categorical detail. Never contains paths or file contents.
    pub detail: String,
}

impl Evidence {
    /// Evidence of a clean check.
    pub fn clean(
        probe_name: impl Into<String>,
        category: ProbeCategory,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            probe_name: probe_name.into(),
            category,
            detected: false,
            confidence: 0.0,
            detail: detail.into(),
        }
    }

    /// Evidence of an anomaly. `confidence` is clamped into [0, 1];
    /// NaN is treated as full confidence.
    pub fn detected(
        probe_name: impl Into<String>,
        category: ProbeCategory,
        confidence: f64,
        detail: impl Into<String>,
    ) -> Self {
        let confidence = if confidence.is_nan() {
            1.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            probe_name: probe_name.into(),
            category,
            detected: true,
            confidence,
            detail: detail.into(),
        }
    }

    /// Neutral evidence for a probe that failed to complete.
    pub fn probe_error(
        probe_name: impl Into<String>,
        category: ProbeCategory,
        reason: &str,
    ) -> Self {
        Self::clean(probe_name, category, format!("{PROBE_ERROR_PREFIX}{reason}"))
    }

    /// Neutral evidence for a check whose outcome cannot be trusted either way.
    pub fn inconclusive(probe_name: impl Into<String>, category: ProbeCategory) -> Self {
        Self::clean(probe_name, category, INCONCLUSIVE_DETAIL)
    }

    /// True for `probe_error:*` evidence.
    #[must_use]
    pub fn is_probe_error(&self) -> bool {
        self.detail.starts_with(PROBE_ERROR_PREFIX)
    }

    /// True when the evidence carries no signal either way
    /// (probe error or inconclusive cleanup).
    #[must_use]
    pub fn is_neutral(&self) -> bool {
        self.is_probe_error() || self.detail == INCONCLUSIVE_DETAIL
    }
}

/// Evidence paired with the weight of the probe that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedEvidence {
    /// Severity weight of the producing probe, in [0, 1].
    pub weight: f64,
    /// The finding.
    #[serde(flatten)]
    pub evidence: Evidence,
}

impl WeightedEvidence {
    /// Pair evidence with a weight.
    pub fn new(evidence: Evidence, weight: f64) -> Self {
        Self { weight, evidence }
    }
}

/// Trust classification of the runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustDecision {
    /// Below the suspicious threshold.
    Trusted,
    /// Between the suspicious and compromised thresholds.
    Suspicious,
    /// At or above the compromised threshold.
    Compromised,
}

/// Aggregated trust decision with the evidence that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Weighted suspicion score in [0, 1].
    pub score: f64,
    /// Classification of `score` under the policy thresholds.
    pub decision: TrustDecision,
    /// Evidence in probe registration order.
    pub contributing_evidence: Vec<Evidence>,
}

impl Verdict {
    /// Number of probes that reported an anomaly.
    #[must_use]
    pub fn detections(&self) -> usize {
        self.contributing_evidence
            .iter()
            .filter(|e| e.detected)
            .count()
    }
}

/// What the host should do with the encrypted store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum GateAction {
    /// Unlock normally.
    Allow = 0,
    /// Unlock, but restrict high-value operations such as export.
    AllowDegraded = 1,
    /// Do not decrypt or display protected documents.
    Deny = 2,
}

impl GateAction {
    /// Stable numeric code used by the C ABI and CLI exit status.
    #[must_use]
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl From<TrustDecision> for GateAction {
    fn from(decision: TrustDecision) -> Self {
        match decision {
            TrustDecision::Trusted => Self::Allow,
            TrustDecision::Suspicious => Self::AllowDegraded,
            TrustDecision::Compromised => Self::Deny,
        }
    }
}
