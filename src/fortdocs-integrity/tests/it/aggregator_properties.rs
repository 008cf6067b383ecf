//! Property-based tests for verdict aggregation.

use proptest::prelude::*;

use fortdocs_integrity::aggregator::score;
use fortdocs_integrity::{
    ErrorWeighting, Evidence, Policy, ProbeCategory, TrustDecision, WeightedEvidence,
};

/// Strategy for one evidence item: clean, detected, or a probe error.
fn evidence_item() -> impl Strategy<Value = WeightedEvidence> {
    (0u8..3, 0.0f64..=1.0, 0.0f64..=1.0, 0usize..1000).prop_map(|(kind, confidence, weight, id)| {
        let name = format!("probe_{id}");
        let evidence = match kind {
            0 => Evidence::clean(name, ProbeCategory::FilesystemAnomaly, "artifacts_found=0/1"),
            1 => Evidence::detected(
                name,
                ProbeCategory::FilesystemAnomaly,
                confidence,
                "artifacts_found=1/1",
            ),
            _ => Evidence::probe_error(name, ProbeCategory::ProcessAnomaly, "timeout"),
        };
        WeightedEvidence::new(evidence, weight)
    })
}

fn evidence_seq() -> impl Strategy<Value = Vec<WeightedEvidence>> {
    prop::collection::vec(evidence_item(), 0..12)
}

/// Strategy for valid policies.
fn policy_strategy() -> impl Strategy<Value = Policy> {
    (0.0f64..0.5, 0.5f64..=1.0, any::<bool>(), any::<bool>()).prop_map(
        |(suspicious, compromised, fail_closed, include)| {
            let weighting = if include {
                ErrorWeighting::Include
            } else {
                ErrorWeighting::Exclude
            };
            Policy::new(suspicious, compromised, fail_closed, 500, weighting)
                .expect("strategy only yields valid thresholds")
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 1000,
        ..ProptestConfig::default()
    })]

    // ========================================================================
    // Determinism and range
    // ========================================================================

    /// Identical inputs always produce identical verdicts.
    #[test]
    fn score_is_deterministic(evidence in evidence_seq(), policy in policy_strategy()) {
        prop_assert_eq!(score(&evidence, &policy), score(&evidence, &policy));
    }

    /// The score stays in [0, 1] and the decision matches the thresholds.
    #[test]
    fn score_in_range_and_classified(evidence in evidence_seq(), policy in policy_strategy()) {
        let verdict = score(&evidence, &policy);
        prop_assert!((0.0..=1.0).contains(&verdict.score));

        let expected = if verdict.score < policy.threshold_suspicious() {
            TrustDecision::Trusted
        } else if verdict.score < policy.threshold_compromised() {
            TrustDecision::Suspicious
        } else {
            TrustDecision::Compromised
        };
        prop_assert_eq!(verdict.decision, expected);
    }

    /// Every input item appears once in the verdict, in input order.
    #[test]
    fn evidence_passes_through_in_order(evidence in evidence_seq(), policy in policy_strategy()) {
        let verdict = score(&evidence, &policy);
        let expected: Vec<_> = evidence.iter().map(|item| item.evidence.clone()).collect();
        prop_assert_eq!(verdict.contributing_evidence, expected);
    }

    // ========================================================================
    // Monotonicity
    // ========================================================================

    /// Raising one probe's confidence never lowers the score.
    #[test]
    fn score_monotonic_in_confidence(
        evidence in prop::collection::vec(evidence_item(), 1..12),
        policy in policy_strategy(),
        index in any::<prop::sample::Index>(),
        increase in 0.0f64..=1.0,
    ) {
        let i = index.index(evidence.len());
        prop_assume!(!evidence[i].evidence.is_neutral());

        let before = score(&evidence, &policy);

        let mut raised = evidence.clone();
        let target = &mut raised[i].evidence;
        let confidence = (target.confidence + increase).min(1.0);
        *target = Evidence::detected(
            target.probe_name.clone(),
            target.category,
            confidence,
            "artifacts_found=1/1",
        );
        let after = score(&raised, &policy);

        prop_assert!(
            after.score >= before.score - 1e-12,
            "score dropped from {} to {}", before.score, after.score
        );
    }

    // ========================================================================
    // Neutral evidence
    // ========================================================================

    /// Under the excluding convention a timed-out probe changes nothing.
    #[test]
    fn excluded_errors_do_not_dilute(
        evidence in prop::collection::vec(evidence_item(), 0..12),
        weight in 0.0f64..=1.0,
        fail_closed in any::<bool>(),
    ) {
        let policy = Policy::new(0.3, 0.7, fail_closed, 500, ErrorWeighting::Exclude).unwrap();
        let before = score(&evidence, &policy);

        let mut extended = evidence.clone();
        extended.push(WeightedEvidence::new(
            Evidence::probe_error("hung", ProbeCategory::ProcessAnomaly, "timeout"),
            weight,
        ));
        let after = score(&extended, &policy);

        prop_assert_eq!(before.score, after.score);
        prop_assert_eq!(before.decision, after.decision);
    }

    /// Under the including convention a timed-out probe never raises the score.
    #[test]
    fn included_errors_never_raise(
        evidence in prop::collection::vec(evidence_item(), 1..12),
        weight in 0.0f64..=1.0,
    ) {
        let policy = Policy::new(0.3, 0.7, false, 500, ErrorWeighting::Include).unwrap();
        let before = score(&evidence, &policy);

        let mut extended = evidence.clone();
        extended.push(WeightedEvidence::new(
            Evidence::probe_error("hung", ProbeCategory::ProcessAnomaly, "timeout"),
            weight,
        ));
        let after = score(&extended, &policy);

        prop_assert!(after.score <= before.score + 1e-12);
    }
}
