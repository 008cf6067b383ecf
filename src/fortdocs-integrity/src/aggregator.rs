//! Weighted verdict aggregation.
//!
//! ```text
//! score = Σ(confidence × weight) / Σ(weight)
//! ```
//!
//! over the probes that ran. Which probes "ran" depends on
//! [`ErrorWeighting`]: with `Exclude` neutral evidence leaves both sums, with
//! `Include` it stays in the denominator only. When nothing ran the policy's
//! fail-closed stance decides: 1.0 (no proof of trust) or 0.0.
//!
//! `score` is a pure function of its inputs. No clock, no I/O.

use crate::config::{ErrorWeighting, Policy};
use crate::types::{Verdict, WeightedEvidence};

/// Combine probe evidence into a verdict under `policy`.
pub fn score(evidence: &[WeightedEvidence], policy: &Policy) -> Verdict {
    let (weighted, total_weight) = evidence
        .iter()
        .filter(|item| match policy.error_weighting() {
            ErrorWeighting::Exclude => !item.evidence.is_neutral(),
            ErrorWeighting::Include => true,
        })
        .fold((0.0_f64, 0.0_f64), |(weighted, total), item| {
            let weight = effective_weight(item.weight);
            let confidence = if item.evidence.is_neutral() {
                0.0
            } else {
                item.evidence.confidence
            };
            (weighted + confidence * weight, total + weight)
        });

    let score = if total_weight > 0.0 {
        weighted / total_weight
    } else if policy.fail_closed() {
        1.0
    } else {
        0.0
    };

    debug_assert!(
        (0.0..=1.0).contains(&score),
        "aggregate score {score} escaped [0, 1]"
    );

    Verdict {
        score,
        decision: policy.classify(score),
        contributing_evidence: evidence.iter().map(|item| item.evidence.clone()).collect(),
    }
}

/// Weights outside [0, 1] can only come from a probe registered in code;
/// validated policies never produce them.
fn effective_weight(weight: f64) -> f64 {
    if weight.is_finite() {
        weight.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
