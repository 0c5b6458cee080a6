//! Confidence intervals for accuracy: Wilson score, standard error, bootstrap.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::distribution::{percentile, z_for_confidence};
use crate::error::{Result, StatsError, ensure_counts, ensure_open_unit};

/// Default confidence level for every interval in this crate.
pub const DEFAULT_CONFIDENCE: f64 = 0.95;

/// A two-sided confidence interval on a proportion, clamped into `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

impl ConfidenceInterval {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn contains(&self, p: f64) -> bool {
        self.lower <= p && p <= self.upper
    }
}

impl From<ConfidenceInterval> for (f64, f64) {
    fn from(ci: ConfidenceInterval) -> Self {
        (ci.lower, ci.upper)
    }
}

/// Wilson score interval for `correct` successes out of `total` trials.
///
/// Unlike the normal approximation it stays inside `[0, 1]` and keeps its
/// coverage for small samples and proportions near 0 or 1.
///
/// `total == 0` is rejected rather than answered with the vacuous `(0, 1)`.
pub fn wilson_interval(correct: i64, total: i64, confidence: f64) -> Result<ConfidenceInterval> {
    ensure_counts(correct, total)?;
    let z = z_for_confidence(confidence)?;

    let n = total as f64;
    let p = correct as f64 / n;
    let z2 = z * z;

    let denom = 1.0 + z2 / n;
    let center = (p + z2 / (2.0 * n)) / denom;
    let margin = (z / denom) * (p * (1.0 - p) / n + z2 / (4.0 * n * n)).sqrt();

    Ok(ConfidenceInterval {
        lower: (center - margin).max(0.0),
        upper: (center + margin).min(1.0),
    })
}

/// Standard error of a proportion, `sqrt(p(1-p)/n)`.
pub fn standard_error(correct: i64, total: i64) -> Result<f64> {
    ensure_counts(correct, total)?;
    let n = total as f64;
    let p = correct as f64 / n;
    Ok((p * (1.0 - p) / n).sqrt())
}

/// Parameters for [`bootstrap_interval`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Number of resamples drawn.
    pub resamples: usize,
    pub confidence: f64,
    /// Seed for the per-call generator. Same seed, same interval.
    pub seed: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            resamples: 10_000,
            confidence: DEFAULT_CONFIDENCE,
            seed: 42,
        }
    }
}

impl BootstrapConfig {
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_resamples(mut self, resamples: usize) -> Self {
        self.resamples = resamples;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Percentile bootstrap interval for the proportion of `true` outcomes.
///
/// Each resample draws `n` indices uniformly with replacement. The generator
/// is created from `config.seed` inside the call, so results are reproducible
/// bit for bit and concurrent callers never share random state.
pub fn bootstrap_interval(
    outcomes: &[bool],
    config: &BootstrapConfig,
) -> Result<ConfidenceInterval> {
    if outcomes.is_empty() {
        return Err(StatsError::invalid_argument(
            "Predictions list cannot be empty",
        ));
    }
    if config.resamples == 0 {
        return Err(StatsError::invalid_argument(
            "Bootstrap resample count must be positive",
        ));
    }
    ensure_open_unit("confidence", config.confidence)?;

    let n = outcomes.len();
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut means = Vec::with_capacity(config.resamples);
    for _ in 0..config.resamples {
        let hits = (0..n).filter(|_| outcomes[rng.gen_range(0..n)]).count();
        means.push(hits as f64 / n as f64);
    }
    means.sort_by(f64::total_cmp);

    let alpha = 1.0 - config.confidence;
    let lower = percentile(&means, alpha / 2.0).unwrap_or(0.0);
    let upper = percentile(&means, 1.0 - alpha / 2.0).unwrap_or(1.0);

    debug!(
        n,
        resamples = config.resamples,
        seed = config.seed,
        lower,
        upper,
        "Bootstrap interval computed"
    );

    Ok(ConfidenceInterval { lower, upper })
}
