//! Effect sizes and chance-corrected agreement.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StatsError};

/// Cohen's (1988) magnitude bands for `|h|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Magnitude {
    Negligible,
    Small,
    Medium,
    Large,
}

impl Magnitude {
    /// Classify the absolute value of an effect size.
    pub fn classify(h: f64) -> Self {
        let abs_h = h.abs();
        if abs_h >= 0.8 {
            Self::Large
        } else if abs_h >= 0.5 {
            Self::Medium
        } else if abs_h >= 0.2 {
            Self::Small
        } else {
            Self::Negligible
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Negligible => "negligible",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }
}

impl fmt::Display for Magnitude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sign of an effect: how the first proportion relates to the second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Higher,
    Lower,
    Equal,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Higher => "higher",
            Self::Lower => "lower",
            Self::Equal => "equal",
        })
    }
}

/// Cohen's h with its classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectSize {
    /// Signed effect, positive when the first proportion is higher.
    pub h: f64,
    pub magnitude: Magnitude,
    pub direction: Direction,
    /// Display-only.
    pub interpretation: String,
}

/// Cohen's h for the difference between two proportions:
/// `2·asin(√p1) − 2·asin(√p2)`.
///
/// Independent of sample size, so it complements the significance tests.
pub fn cohens_h(p1: f64, p2: f64) -> Result<EffectSize> {
    if !(0.0..=1.0).contains(&p1) {
        return Err(StatsError::invalid_argument(format!(
            "p1 must be between 0 and 1, got {p1}"
        )));
    }
    if !(0.0..=1.0).contains(&p2) {
        return Err(StatsError::invalid_argument(format!(
            "p2 must be between 0 and 1, got {p2}"
        )));
    }

    let phi1 = 2.0 * p1.sqrt().asin();
    let phi2 = 2.0 * p2.sqrt().asin();
    let h = phi1 - phi2;

    let magnitude = Magnitude::classify(h);
    let direction = if h > 0.0 {
        Direction::Higher
    } else if h < 0.0 {
        Direction::Lower
    } else {
        Direction::Equal
    };
    let interpretation = format!(
        "The difference is {magnitude} (h={h:.3}). First proportion is {direction} than second."
    );

    Ok(EffectSize {
        h,
        magnitude,
        direction,
        interpretation,
    })
}

/// Cohen's kappa between two boolean raters.
///
/// When chance agreement is already perfect (both raters constant and equal)
/// the ratio is undefined; that case returns `1.0` if observed agreement is
/// perfect and `0.0` otherwise.
pub fn cohens_kappa(a: &[bool], b: &[bool]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(StatsError::invalid_argument(format!(
            "Rater sequences must have same length ({} vs {})",
            a.len(),
            b.len()
        )));
    }
    if a.is_empty() {
        return Err(StatsError::invalid_argument(
            "Rater sequences cannot be empty",
        ));
    }

    let n = a.len() as f64;
    let agree = a.iter().zip(b).filter(|(x, y)| x == y).count() as f64;
    let po = agree / n;

    let pa = a.iter().filter(|&&x| x).count() as f64 / n;
    let pb = b.iter().filter(|&&x| x).count() as f64 / n;
    let pe = pa * pb + (1.0 - pa) * (1.0 - pb);

    if (1.0 - pe).abs() < f64::EPSILON {
        return Ok(if (1.0 - po).abs() < f64::EPSILON {
            1.0
        } else {
            0.0
        });
    }
    Ok((po - pe) / (1.0 - pe))
}

/// Landis & Koch (1977) agreement bands for a kappa score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Agreement {
    Poor,
    Slight,
    Fair,
    Moderate,
    Substantial,
    AlmostPerfect,
}

impl fmt::Display for Agreement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Poor => "Poor",
            Self::Slight => "Slight",
            Self::Fair => "Fair",
            Self::Moderate => "Moderate",
            Self::Substantial => "Substantial",
            Self::AlmostPerfect => "Almost Perfect",
        })
    }
}

/// Interpret a kappa score.
pub fn interpret_kappa(kappa: f64) -> Agreement {
    if kappa < 0.0 {
        Agreement::Poor
    } else if kappa < 0.20 {
        Agreement::Slight
    } else if kappa < 0.40 {
        Agreement::Fair
    } else if kappa < 0.60 {
        Agreement::Moderate
    } else if kappa < 0.80 {
        Agreement::Substantial
    } else {
        Agreement::AlmostPerfect
    }
}
