//! One-call summaries for a single run and across repeated runs.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::interval::{
    BootstrapConfig, ConfidenceInterval, bootstrap_interval, standard_error, wilson_interval,
};

/// Everything reported for one evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyStatistics {
    pub accuracy: f64,
    pub correct: i64,
    pub total: i64,
    pub confidence_level: f64,
    /// Interval method used for `wilson_ci`; always `"wilson"`.
    pub method: String,
    pub wilson_ci: ConfidenceInterval,
    pub ci_width: f64,
    pub standard_error: f64,
    /// Present only when per-item outcomes were supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap_ci: Option<ConfidenceInterval>,
}

/// Accuracy, Wilson interval, standard error and, when `outcomes` is given
/// and non-empty, a bootstrap interval at the same confidence level.
pub fn accuracy_statistics(
    correct: i64,
    total: i64,
    outcomes: Option<&[bool]>,
    confidence: f64,
) -> Result<AccuracyStatistics> {
    let wilson_ci = wilson_interval(correct, total, confidence)?;
    let standard_error = standard_error(correct, total)?;

    let bootstrap_ci = match outcomes {
        Some(items) if !items.is_empty() => {
            let config = BootstrapConfig::default().with_confidence(confidence);
            Some(bootstrap_interval(items, &config)?)
        }
        _ => None,
    };

    Ok(AccuracyStatistics {
        accuracy: correct as f64 / total as f64,
        correct,
        total,
        confidence_level: confidence,
        method: "wilson".to_string(),
        wilson_ci,
        ci_width: wilson_ci.width(),
        standard_error,
        bootstrap_ci,
    })
}

/// Descriptive statistics over accuracies from repeated runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DescriptiveStats {
    pub mean: f64,
    /// Population standard deviation.
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub count: usize,
}

/// Summarise `values`. An empty slice yields all zeros with `count == 0`.
pub fn describe(values: &[f64]) -> DescriptiveStats {
    if values.is_empty() {
        return DescriptiveStats::default();
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };

    DescriptiveStats {
        mean,
        std: variance.sqrt(),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        median,
        count: values.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatsError;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_json_omits_absent_bootstrap_interval() {
        let stats = accuracy_statistics(3, 4, None, 0.95).unwrap();
        let without = serde_json::to_value(&stats).unwrap();
        assert!(without.get("bootstrap_ci").is_none());
        assert_eq!(without["method"], "wilson");

        let outcomes = [true, true, true, false];
        let with = accuracy_statistics(3, 4, Some(&outcomes), 0.95).unwrap();
        let json = serde_json::to_value(&with).unwrap();
        assert!(json["bootstrap_ci"]["lower"].is_number());

        let back: AccuracyStatistics = serde_json::from_value(json).unwrap();
        assert_eq!(back, with);
    }

    #[test]
    fn test_accuracy_statistics_without_outcomes() {
        let stats = accuracy_statistics(850, 1000, None, 0.95).unwrap();
        assert_eq!(stats.accuracy, 0.85);
        assert_eq!(stats.method, "wilson");
        assert!((stats.ci_width - stats.wilson_ci.width()).abs() < 1e-15);
        assert!((stats.standard_error - 0.0113).abs() < 0.0005);
        assert!(stats.bootstrap_ci.is_none());
    }

    #[test]
    fn test_accuracy_statistics_with_outcomes() {
        let mut outcomes = vec![true; 17];
        outcomes.extend([false; 3]);
        let stats = accuracy_statistics(17, 20, Some(&outcomes), 0.95).unwrap();
        let boot = stats.bootstrap_ci.unwrap();
        assert!(boot.contains(0.85));
    }

    #[test]
    fn test_accuracy_statistics_empty_outcomes_skip_bootstrap() {
        let stats = accuracy_statistics(5, 10, Some(&[]), 0.95).unwrap();
        assert!(stats.bootstrap_ci.is_none());
    }

    #[test]
    fn test_accuracy_statistics_propagates_invalid_counts() {
        assert!(matches!(
            accuracy_statistics(3, 0, None, 0.95),
            Err(StatsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_describe_runs() {
        let stats = describe(&[0.80, 0.84, 0.82, 0.86]);
        assert!((stats.mean - 0.83).abs() < 1e-12);
        assert!((stats.median - 0.83).abs() < 1e-12);
        assert_eq!(stats.min, 0.80);
        assert_eq!(stats.max, 0.86);
        assert_eq!(stats.count, 4);
        assert!((stats.std - 0.0005_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_describe_odd_length_median() {
        assert_eq!(describe(&[3.0, 1.0, 2.0]).median, 2.0);
    }

    #[test]
    fn test_describe_empty() {
        assert_eq!(
            describe(&[]),
            DescriptiveStats {
                mean: 0.0,
                std: 0.0,
                min: 0.0,
                max: 0.0,
                median: 0.0,
                count: 0,
            }
        );
    }
}
