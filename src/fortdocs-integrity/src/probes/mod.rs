//! Evidence probes.
//!
//! Each probe inspects one externally observable environment signal and
//! reports a single [`Evidence`]. Probes are independent of each other and
//! hold no mutable state, so the registry may run them concurrently.
//!
//! | Probe | Category | Default |
//! |-------|----------|---------|
//! | [`KnownArtifactProbe`] | filesystem anomaly | on |
//! | [`WritabilityProbe`] | write-permission anomaly | on |
//! | [`SymlinkProbe`] | symbolic-link anomaly | on |
//! | [`ProcessAnomalyProbe`] | process anomaly | off |
//!
//! Evidence detail never names the path that matched. A log reader learns
//! how many indicators were found, not which ones.

mod known_artifact;
mod process_anomaly;
mod symlink;
mod writability;

use std::sync::Arc;

pub use known_artifact::KnownArtifactProbe;
pub use process_anomaly::ProcessAnomalyProbe;
pub use symlink::SymlinkProbe;
pub use writability::{ArtifactFs, StdArtifactFs, WritabilityProbe};

use crate::config::ProbeSpec;
use crate::error::ProbeError;
use crate::types::{Evidence, ProbeCategory};

/// A single environment-integrity check.
pub trait Probe: Send + Sync + 'static {
    /// Unique probe name.
    fn name(&self) -> &str;

    /// What the probe inspects.
    fn category(&self) -> ProbeCategory;

    /// Severity contribution in [0, 1].
    fn weight(&self) -> f64;

    /// Run the check, reporting internal faults as errors.
    fn probe(&self) -> Result<Evidence, ProbeError>;

    /// Run the check. Faults become neutral `probe_error:<reason>` evidence.
    fn run(&self) -> Evidence {
        match self.probe() {
            Ok(evidence) => evidence,
            Err(err) => {
                tracing::debug!(probe = self.name(), error = %err, "Probe fault downgraded");
                Evidence::probe_error(self.name(), self.category(), &err.reason())
            },
        }
    }
}

/// Instantiate the probe described by a spec.
pub fn from_spec(spec: &ProbeSpec) -> Arc<dyn Probe> {
    match spec {
        ProbeSpec::KnownArtifact(s) => Arc::new(KnownArtifactProbe::from_spec(s)),
        ProbeSpec::Writability(s) => Arc::new(WritabilityProbe::from_spec(s)),
        ProbeSpec::Symlink(s) => Arc::new(SymlinkProbe::from_spec(s)),
        ProbeSpec::ProcessAnomaly(s) => Arc::new(ProcessAnomalyProbe::from_spec(s)),
    }
}

/// Collapse blank and repeated entries, keeping first-seen order.
pub(crate) fn distinct_paths<I, S>(paths: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = std::collections::HashSet::new();
    paths
        .into_iter()
        .map(|p| p.as_ref().trim().to_string())
        .filter(|p| !p.is_empty() && seen.insert(p.clone()))
        .collect()
}

/// Confidence for `hits` distinct indicators, saturating at
/// `min(saturation_hits, total)` hits.
pub(crate) fn hit_confidence(hits: usize, total: usize, saturation_hits: usize) -> f64 {
    if hits == 0 || total == 0 {
        return 0.0;
    }
    let saturation = saturation_hits.clamp(1, total);
    (hits as f64 / saturation as f64).min(1.0)
}
