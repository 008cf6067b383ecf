//! Presence check for files installed by jailbreak and rooting tools.

use std::path::Path;

use super::{distinct_paths, hit_confidence, Probe};
use crate::config::KnownArtifactSpec;
use crate::error::ProbeError;
use crate::types::{Evidence, ProbeCategory};

/// Reports an anomaly when any configured artifact path exists.
///
/// Existence is tested with `symlink_metadata`, so a dangling link left by an
/// uninstalled tool still counts. Lookups that fail for any reason
/// (including permission errors from the sandbox) count as absent.
#[derive(Debug, Clone)]
pub struct KnownArtifactProbe {
    name: String,
    weight: f64,
    paths: Vec<String>,
    saturation_hits: usize,
}

impl KnownArtifactProbe {
    /// Create a probe over `paths`; duplicates are collapsed.
    pub fn new<I, S>(name: impl Into<String>, weight: f64, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            name: name.into(),
            weight,
            paths: distinct_paths(paths),
            saturation_hits: 2,
        }
    }

    /// Number of distinct hits needed for full confidence.
    #[must_use]
    pub fn with_saturation_hits(mut self, saturation_hits: usize) -> Self {
        self.saturation_hits = saturation_hits;
        self
    }

    pub(crate) fn from_spec(spec: &KnownArtifactSpec) -> Self {
        Self::new(spec.name.clone(), spec.weight, &spec.paths)
            .with_saturation_hits(spec.saturation_hits)
    }

    /// Distinct candidate paths.
    pub fn paths(&self) -> &[String] {
        &self.paths
    }
}

impl Probe for KnownArtifactProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> ProbeCategory {
        ProbeCategory::FilesystemAnomaly
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn probe(&self) -> Result<Evidence, ProbeError> {
        let total = self.paths.len();
        let hits = self
            .paths
            .iter()
            .filter(|p| std::fs::symlink_metadata(Path::new(p)).is_ok())
            .count();

        let detail = format!("artifacts_found={hits}/{total}");
        if hits == 0 {
            return Ok(Evidence::clean(&self.name, self.category(), detail));
        }

        tracing::debug!(probe = %self.name, hits, total, "Known artifacts present");
        Ok(Evidence::detected(
            &self.name,
            self.category(),
            hit_confidence(hits, total, self.saturation_hits),
            detail,
        ))
    }
}
