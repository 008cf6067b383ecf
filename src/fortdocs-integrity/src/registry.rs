//! Ordered probe registry.
//!
//! Registration order is execution order and evidence order. `run_all`
//! starts every probe at once on tokio's blocking pool and joins the handles
//! in registration order, so the evidence sequence never depends on which
//! probe finished first.
//!
//! Every probe shares one deadline (`start + probe_timeout`). A probe still
//! running at the deadline is abandoned and its slot records
//! `probe_error:timeout`. Blocking threads cannot be killed, so an abandoned
//! probe finishes in the background and runs its own scoped cleanup.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinError;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::ProbeSpec;
use crate::error::ProbeError;
use crate::probes::{self, Probe};
use crate::types::{Evidence, WeightedEvidence};

/// Ordered set of probes with their weights.
#[derive(Clone, Default)]
pub struct ProbeRegistry {
    probes: Vec<Arc<dyn Probe>>,
}

impl ProbeRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from policy specs, skipping disabled ones.
    pub fn from_specs<'a>(specs: impl IntoIterator<Item = &'a ProbeSpec>) -> Self {
        let mut registry = Self::new();
        for spec in specs.into_iter().filter(|s| s.enabled()) {
            registry.register_shared(probes::from_spec(spec));
        }
        registry
    }

    /// Append a probe. It runs after every probe already registered.
    pub fn register(&mut self, probe: impl Probe) -> &mut Self {
        self.register_shared(Arc::new(probe))
    }

    /// Append an already shared probe.
    pub fn register_shared(&mut self, probe: Arc<dyn Probe>) -> &mut Self {
        debug!(probe = probe.name(), weight = probe.weight(), "Registered probe");
        self.probes.push(probe);
        self
    }

    /// Number of registered probes.
    pub fn len(&self) -> usize {
        self.probes.len()
    }

    /// Whether no probe is registered.
    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// Probe names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.probes.iter().map(|p| p.name()).collect()
    }

    /// Run every probe concurrently and collect all evidence, in
    /// registration order. Never short-circuits and never fails.
    #[instrument(skip(self), fields(probes = self.probes.len()))]
    pub async fn run_all(&self, probe_timeout: Duration) -> Vec<WeightedEvidence> {
        let deadline = Instant::now() + probe_timeout;

        let handles: Vec<_> = self
            .probes
            .iter()
            .map(|probe| {
                let probe = Arc::clone(probe);
                tokio::task::spawn_blocking(move || probe.run())
            })
            .collect();

        let mut collected = Vec::with_capacity(handles.len());
        for (probe, handle) in self.probes.iter().zip(handles) {
            let evidence = match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(evidence)) => sanitize(probe.as_ref(), evidence),
                Ok(Err(join_err)) => {
                    error_evidence(probe.as_ref(), &join_failure(probe.as_ref(), join_err))
                },
                Err(_) => {
                    warn!(
                        probe = probe.name(),
                        timeout_ms = probe_timeout.as_millis() as u64,
                        "Probe exceeded its deadline"
                    );
                    error_evidence(probe.as_ref(), &ProbeError::Timeout)
                },
            };
            collected.push(WeightedEvidence::new(evidence, probe.weight()));
        }

        info!(
            detected = collected.iter().filter(|e| e.evidence.detected).count(),
            neutral = collected.iter().filter(|e| e.evidence.is_neutral()).count(),
            "Probe pass complete"
        );
        collected
    }
}

impl std::fmt::Debug for ProbeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeRegistry")
            .field("probes", &self.names())
            .finish()
    }
}

fn join_failure(probe: &dyn Probe, err: JoinError) -> ProbeError {
    if err.is_panic() {
        warn!(probe = probe.name(), "Probe panicked");
        ProbeError::Panicked
    } else {
        ProbeError::Internal {
            reason: "cancelled".into(),
        }
    }
}

fn error_evidence(probe: &dyn Probe, err: &ProbeError) -> Evidence {
    Evidence::probe_error(probe.name(), probe.category(), &err.reason())
}

/// Keep the aggregator's input inside its domain whatever a probe returns.
fn sanitize(probe: &dyn Probe, evidence: Evidence) -> Evidence {
    if !(0.0..=1.0).contains(&evidence.confidence) {
        warn!(probe = probe.name(), "Probe reported confidence outside [0, 1]");
        return error_evidence(
            probe,
            &ProbeError::Internal {
                reason: "invalid_confidence".into(),
            },
        );
    }
    evidence
}
