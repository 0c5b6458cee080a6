//! Property-based tests for the statistics engine using proptest.

use proptest::prelude::*;

use llmeval_stats::{
    BootstrapConfig, DEFAULT_ALPHA, DEFAULT_POWER, SampleSize, bootstrap_interval, cohens_h,
    cohens_kappa, mcnemar_test, required_sample_size, wilson_interval,
};

// --- Wilson interval properties ---

proptest! {
    #[test]
    fn wilson_brackets_point_estimate(
        (correct, total) in (1i64..5_000).prop_flat_map(|t| (0..=t, Just(t))),
        confidence in 0.5f64..0.999,
    ) {
        let ci = wilson_interval(correct, total, confidence).unwrap();
        let p = correct as f64 / total as f64;
        prop_assert!(0.0 <= ci.lower);
        prop_assert!(ci.lower <= p + 1e-12);
        prop_assert!(p <= ci.upper + 1e-12);
        prop_assert!(ci.upper <= 1.0);
    }

    #[test]
    fn wilson_narrows_with_more_data(
        p_num in 0i64..=20,
        scale in 1i64..50,
    ) {
        // Fixed p = p_num / 20, total grows with scale.
        let small = wilson_interval(p_num * scale, 20 * scale, 0.95).unwrap();
        let large = wilson_interval(p_num * (scale + 1), 20 * (scale + 1), 0.95).unwrap();
        prop_assert!(large.width() <= small.width() + 1e-12);
    }

    #[test]
    fn wilson_rejects_counts_above_total(total in 1i64..1_000, excess in 1i64..100) {
        prop_assert!(wilson_interval(total + excess, total, 0.95).is_err());
    }
}

// --- Effect size properties ---

proptest! {
    #[test]
    fn cohens_h_is_antisymmetric(p1 in 0.0f64..=1.0, p2 in 0.0f64..=1.0) {
        let forward = cohens_h(p1, p2).unwrap();
        let backward = cohens_h(p2, p1).unwrap();
        prop_assert_eq!(forward.h, -backward.h);
        prop_assert_eq!(forward.magnitude, backward.magnitude);
    }

    #[test]
    fn cohens_h_of_equal_proportions_is_zero(p in 0.0f64..=1.0) {
        prop_assert_eq!(cohens_h(p, p).unwrap().h, 0.0);
    }

    #[test]
    fn kappa_of_identical_raters_is_one(
        ratings in prop::collection::vec(any::<bool>(), 1..200)
    ) {
        let kappa = cohens_kappa(&ratings, &ratings).unwrap();
        prop_assert!((kappa - 1.0).abs() < 1e-9);
    }
}

// --- Sample size properties ---

proptest! {
    #[test]
    fn smaller_effects_need_at_least_as_many_samples(
        effect in 0.01f64..3.0,
        shrink in 0.1f64..1.0,
    ) {
        let big = required_sample_size(effect, DEFAULT_POWER, DEFAULT_ALPHA).unwrap();
        let small = required_sample_size(effect * shrink, DEFAULT_POWER, DEFAULT_ALPHA).unwrap();
        prop_assert!(small.as_f64() >= big.as_f64());
    }
}

#[test]
fn zero_effect_needs_unbounded_samples() {
    let n = required_sample_size(0.0, DEFAULT_POWER, DEFAULT_ALPHA).unwrap();
    assert_eq!(n, SampleSize::Unbounded);
    assert_eq!(n.as_f64(), f64::INFINITY);
}

// --- McNemar properties ---

proptest! {
    #[test]
    fn mcnemar_without_discordance_is_null(
        predictions in prop::collection::vec(any::<bool>(), 1..200)
    ) {
        let truth = vec![true; predictions.len()];
        let result = mcnemar_test(&predictions, &predictions, &truth, DEFAULT_ALPHA).unwrap();
        prop_assert_eq!(result.statistic, 0.0);
        prop_assert_eq!(result.p_value, 1.0);
        prop_assert!(!result.significant);
    }

    #[test]
    fn mcnemar_p_value_in_unit_interval(
        pairs in prop::collection::vec((any::<bool>(), any::<bool>()), 1..300)
    ) {
        let (a, b): (Vec<bool>, Vec<bool>) = pairs.into_iter().unzip();
        let truth = vec![true; a.len()];
        let result = mcnemar_test(&a, &b, &truth, DEFAULT_ALPHA).unwrap();
        prop_assert!((0.0..=1.0).contains(&result.p_value));
        prop_assert!(result.statistic >= 0.0);
    }
}

// --- Bootstrap properties ---

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn bootstrap_is_deterministic_for_a_seed(
        outcomes in prop::collection::vec(any::<bool>(), 1..100),
        seed in any::<u64>(),
    ) {
        let config = BootstrapConfig::default().with_resamples(300).with_seed(seed);
        let first = bootstrap_interval(&outcomes, &config).unwrap();
        let second = bootstrap_interval(&outcomes, &config).unwrap();
        prop_assert_eq!(first.lower.to_bits(), second.lower.to_bits());
        prop_assert_eq!(first.upper.to_bits(), second.upper.to_bits());
        prop_assert!(first.lower <= first.upper);
    }
}
