//! The integrity gate: probes → verdict → action.
//!
//! ```text
//!   host unlock path
//!         │
//!         ▼
//!   IntegrityGate::evaluate()
//!         │  read lock on ProbeRegistry
//!         ▼
//!   ProbeRegistry::run_all ──► Vec<WeightedEvidence>
//!         │
//!         ▼
//!   aggregator::score ──► Verdict ──► decide() ──► GateAction
//!         │
//!         └──► AuditRecord (fortdocs_integrity::audit)
//! ```
//!
//! The gate never terminates the process. `Deny` is returned to the host,
//! which keeps the document store locked.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::aggregator;
use crate::audit::AuditRecord;
use crate::config::{IntegrityConfig, Policy};
use crate::error::IntegrityError;
use crate::registry::ProbeRegistry;
use crate::types::{GateAction, Verdict};

/// Runtime integrity gate consulted before the document store is unlocked.
pub struct IntegrityGate {
    policy: Arc<Policy>,
    registry: RwLock<ProbeRegistry>,
    last_verdict: std::sync::RwLock<Option<Verdict>>,
}

impl IntegrityGate {
    /// Wire an already validated policy to a probe set.
    pub fn new(policy: Arc<Policy>, registry: ProbeRegistry) -> Self {
        info!(
            probes = registry.len(),
            fail_closed = policy.fail_closed(),
            "Integrity gate initialized"
        );
        Self {
            policy,
            registry: RwLock::new(registry),
            last_verdict: std::sync::RwLock::new(None),
        }
    }

    /// Validate `config` and build the gate it describes.
    ///
    /// Fails before any probe runs if the policy is invalid.
    pub fn from_config(config: IntegrityConfig) -> Result<Self, IntegrityError> {
        let policy = config.validate()?;
        let registry = ProbeRegistry::from_specs(&config.probes);
        Ok(Self::new(Arc::new(policy), registry))
    }

    /// Run one evaluation pass, blocking the calling thread.
    ///
    /// Uses a private current-thread runtime. Probes still running at the
    /// deadline are left to finish on their own threads; the call returns as
    /// soon as the deadline passes. Must not be called from inside a tokio
    /// runtime; use [`IntegrityGate::evaluate_async`] there.
    pub fn evaluate(&self) -> Result<Verdict, IntegrityError> {
        let runtime = standalone_runtime()?;
        let verdict = runtime.block_on(self.evaluate_async());
        runtime.shutdown_background();
        Ok(verdict)
    }

    /// Run one evaluation pass on the caller's runtime.
    #[instrument(skip(self))]
    pub async fn evaluate_async(&self) -> Verdict {
        let started = Instant::now();

        let evidence = {
            let registry = self.registry.read().await;
            registry.run_all(self.policy.probe_timeout()).await
        };
        let verdict = aggregator::score(&evidence, &self.policy);
        let action = self.decide(&verdict);

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        AuditRecord::new(&verdict, action, elapsed_ms).emit();
        info!(
            score = verdict.score,
            decision = ?verdict.decision,
            action = ?action,
            detections = verdict.detections(),
            "Integrity evaluation complete"
        );

        if let Ok(mut slot) = self.last_verdict.write() {
            *slot = Some(verdict.clone());
        }
        verdict
    }

    /// Map a verdict to the action the host must take.
    pub fn decide(&self, verdict: &Verdict) -> GateAction {
        GateAction::from(verdict.decision)
    }

    /// The most recent verdict, if any evaluation has completed.
    pub fn last_verdict(&self) -> Option<Verdict> {
        self.last_verdict.read().ok().and_then(|slot| slot.clone())
    }

    /// Replace the probe set. Waits for in-flight evaluations to finish;
    /// evaluations started afterwards see the new probes.
    pub async fn reconfigure(&self, registry: ProbeRegistry) {
        let mut current = self.registry.write().await;
        info!(
            old = current.len(),
            new = registry.len(),
            "Replacing probe registry"
        );
        *current = registry;
    }

    /// Blocking form of [`IntegrityGate::reconfigure`].
    pub fn reconfigure_blocking(&self, registry: ProbeRegistry) -> Result<(), IntegrityError> {
        ensure_outside_runtime("reconfigure_blocking")?;
        let mut current = self.registry.blocking_write();
        info!(
            old = current.len(),
            new = registry.len(),
            "Replacing probe registry"
        );
        *current = registry;
        Ok(())
    }

    /// Names of the currently registered probes, in execution order.
    pub async fn probe_names(&self) -> Vec<String> {
        self.registry
            .read()
            .await
            .names()
            .into_iter()
            .map(String::from)
            .collect()
    }
}

impl std::fmt::Debug for IntegrityGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrityGate")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

fn ensure_outside_runtime(operation: &str) -> Result<(), IntegrityError> {
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(IntegrityError::RuntimeError {
            message: format!("{operation} called from inside a tokio runtime"),
        });
    }
    Ok(())
}

fn standalone_runtime() -> Result<tokio::runtime::Runtime, IntegrityError> {
    ensure_outside_runtime("evaluate")?;
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|e| IntegrityError::RuntimeError {
            message: format!("failed to build evaluation runtime: {e}"),
        })
}
