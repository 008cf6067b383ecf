//! Structured audit trail for gate evaluations.
//!
//! Every evaluation produces one [`AuditRecord`], logged as a single JSON
//! line on the `fortdocs_integrity::audit` tracing target. Hosts route that
//! target wherever their audit log lives.
//!
//! Records carry only categorical evidence details (`artifacts_found=1/6`,
//! `write_denied`, ...). Probe paths never appear.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::{Evidence, GateAction, TrustDecision, Verdict};

/// Tracing target used for audit lines.
pub const AUDIT_TARGET: &str = "fortdocs_integrity::audit";

/// One evaluation, as written to the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// When the evaluation finished (RFC 3339, UTC).
    pub evaluated_at: String,
    /// Classified trust level.
    pub decision: TrustDecision,
    /// Action handed to the host.
    pub action: GateAction,
    /// Aggregate score in [0, 1].
    pub score: f64,
    /// Evidence in registration order.
    pub evidence: Vec<Evidence>,
    /// Wall-clock duration of the probe pass.
    pub elapsed_ms: u64,
}

impl AuditRecord {
    /// Record a verdict that finished now.
    pub fn new(verdict: &Verdict, action: GateAction, elapsed_ms: u64) -> Self {
        Self::at(Utc::now(), verdict, action, elapsed_ms)
    }

    /// Record a verdict that finished at `evaluated_at`.
    pub fn at(
        evaluated_at: DateTime<Utc>,
        verdict: &Verdict,
        action: GateAction,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            evaluated_at: evaluated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            decision: verdict.decision,
            action,
            score: verdict.score,
            evidence: verdict.contributing_evidence.clone(),
            elapsed_ms,
        }
    }

    /// Single-line JSON form.
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Write the record to the audit target.
    pub fn emit(&self) {
        match self.to_json_line() {
            Ok(line) => tracing::info!(
                target: AUDIT_TARGET,
                action = ?self.action,
                score = self.score,
                record = %line,
                "Integrity evaluation"
            ),
            Err(e) => warn!(target: AUDIT_TARGET, error = %e, "Failed to serialize audit record"),
        }
    }
}
