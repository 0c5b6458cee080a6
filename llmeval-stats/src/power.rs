//! Power analysis: how many items a benchmark needs before it is run.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::distribution::normal_quantile;
use crate::error::{Result, StatsError, ensure_open_unit};

/// Default statistical power (probability of detecting a true effect).
pub const DEFAULT_POWER: f64 = 0.8;

/// Floor applied to every finite recommendation.
pub const MIN_SAMPLE_SIZE: u64 = 10;

/// Required per-group sample size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleSize {
    PerGroup(u64),
    /// A zero effect cannot be detected by any finite sample.
    Unbounded,
}

impl SampleSize {
    /// `Unbounded` maps to `f64::INFINITY`.
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::PerGroup(n) => *n as f64,
            Self::Unbounded => f64::INFINITY,
        }
    }

    pub fn per_group(&self) -> Option<u64> {
        match self {
            Self::PerGroup(n) => Some(*n),
            Self::Unbounded => None,
        }
    }
}

impl fmt::Display for SampleSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PerGroup(n) => write!(f, "{n}"),
            Self::Unbounded => f.write_str("inf"),
        }
    }
}

/// Minimum per-group sample size to detect `effect_size` (e.g. Cohen's h)
/// with the given power at two-sided significance `alpha`:
/// `n = ceil(2·((z_{α/2} + z_power) / effect)²)`, never below
/// [`MIN_SAMPLE_SIZE`].
pub fn required_sample_size(effect_size: f64, power: f64, alpha: f64) -> Result<SampleSize> {
    if !effect_size.is_finite() {
        return Err(StatsError::invalid_argument(format!(
            "Effect size must be finite, got {effect_size}"
        )));
    }
    ensure_open_unit("power", power)?;
    ensure_open_unit("alpha", alpha)?;

    if effect_size == 0.0 {
        return Ok(SampleSize::Unbounded);
    }

    let z_alpha = normal_quantile(1.0 - alpha / 2.0)?;
    let z_beta = normal_quantile(power)?;
    let n = (2.0 * ((z_alpha + z_beta) / effect_size).powi(2)).ceil();

    // Tiny effects overflow u64; saturate rather than wrap.
    let n = if n >= u64::MAX as f64 {
        u64::MAX
    } else {
        n as u64
    };
    Ok(SampleSize::PerGroup(n.max(MIN_SAMPLE_SIZE)))
}
