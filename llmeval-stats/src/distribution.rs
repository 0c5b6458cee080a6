//! Shared distribution math: normal quantiles, tail probabilities, percentiles.

use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};

use crate::error::{Result, StatsError, ensure_open_unit};

fn standard_normal() -> Result<Normal> {
    Normal::new(0.0, 1.0).map_err(|e| StatsError::distribution(e.to_string()))
}

/// Inverse CDF of the standard normal distribution.
pub fn normal_quantile(p: f64) -> Result<f64> {
    ensure_open_unit("probability", p)?;
    Ok(standard_normal()?.inverse_cdf(p))
}

/// CDF of the standard normal distribution.
pub fn normal_cdf(x: f64) -> Result<f64> {
    Ok(standard_normal()?.cdf(x))
}

/// Two-sided p-value for a standard normal test statistic.
pub fn two_sided_normal_p(z: f64) -> Result<f64> {
    let p = 2.0 * (1.0 - normal_cdf(z.abs())?);
    Ok(p.clamp(0.0, 1.0))
}

/// Upper tail `P(X > x)` of a chi-squared distribution.
pub fn chi_squared_sf(x: f64, df: f64) -> Result<f64> {
    let dist = ChiSquared::new(df).map_err(|e| StatsError::distribution(e.to_string()))?;
    Ok(dist.sf(x).clamp(0.0, 1.0))
}

/// Two-sided critical value for a confidence level, e.g. `1.96` for `0.95`.
pub fn z_for_confidence(confidence: f64) -> Result<f64> {
    ensure_open_unit("confidence", confidence)?;
    normal_quantile(1.0 - (1.0 - confidence) / 2.0)
}

/// Percentile of an ascending-sorted slice, linearly interpolating between
/// the two closest ranks (`index = q * (n - 1)`).
///
/// Returns `None` for an empty slice.
pub fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    let frac = pos - lo as f64;
    Some(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
}
