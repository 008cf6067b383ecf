//! Detects system directories relocated behind symbolic links.
//!
//! Jailbreaks that need more space on the system partition move
//! `/Applications` and friends to the data partition and leave a symlink
//! behind. On a stock device these are real directories.

use std::path::Path;

use super::{distinct_paths, hit_confidence, Probe};
use crate::config::SymlinkSpec;
use crate::error::ProbeError;
use crate::types::{Evidence, ProbeCategory};

/// Reports an anomaly when a configured location is a symbolic link.
#[derive(Debug, Clone)]
pub struct SymlinkProbe {
    name: String,
    weight: f64,
    paths: Vec<String>,
    saturation_hits: usize,
}

impl SymlinkProbe {
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

    pub(crate) fn from_spec(spec: &SymlinkSpec) -> Self {
        Self::new(spec.name.clone(), spec.weight, &spec.paths)
            .with_saturation_hits(spec.saturation_hits)
    }
}

impl Probe for SymlinkProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> ProbeCategory {
        ProbeCategory::SymbolicLinkAnomaly
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn probe(&self) -> Result<Evidence, ProbeError> {
        let total = self.paths.len();
        let hits = self
            .paths
            .iter()
            .filter_map(|p| std::fs::symlink_metadata(Path::new(p)).ok())
            .filter(|meta| meta.file_type().is_symlink())
            .count();

        let detail = format!("symlinked={hits}/{total}");
        if hits == 0 {
            Ok(Evidence::clean(&self.name, self.category(), detail))
        } else {
            Ok(Evidence::detected(
                &self.name,
                self.category(),
                hit_confidence(hits, total, self.saturation_hits),
                detail,
            ))
        }
    }
}
