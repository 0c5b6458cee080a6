//! Significance tests between two models.
//!
//! - [`mcnemar_test`] for models scored on the *same* items (paired outcomes).
//! - [`proportion_test`] for two independent binomial proportions.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::distribution::{chi_squared_sf, two_sided_normal_p};
use crate::error::{Result, StatsError, ensure_counts, ensure_open_unit};

/// Default significance level for hypothesis tests.
pub const DEFAULT_ALPHA: f64 = 0.05;

/// One of the two models under comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelSide {
    A,
    B,
}

impl fmt::Display for ModelSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSide::A => write!(f, "Model A"),
            ModelSide::B => write!(f, "Model B"),
        }
    }
}

/// 2x2 table of paired correctness outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContingencyTable {
    pub both_correct: usize,
    /// A correct, B wrong.
    pub a_only: usize,
    /// A wrong, B correct.
    pub b_only: usize,
    pub both_wrong: usize,
}

impl ContingencyTable {
    /// Tally paired correctness flags. Fails when the slices differ in length.
    pub fn from_correctness(a_correct: &[bool], b_correct: &[bool]) -> Result<Self> {
        if a_correct.len() != b_correct.len() {
            return Err(StatsError::invalid_argument(format!(
                "Model predictions must have same length ({} vs {})",
                a_correct.len(),
                b_correct.len()
            )));
        }
        let mut table = Self::default();
        for (&a, &b) in a_correct.iter().zip(b_correct) {
            match (a, b) {
                (true, true) => table.both_correct += 1,
                (true, false) => table.a_only += 1,
                (false, true) => table.b_only += 1,
                (false, false) => table.both_wrong += 1,
            }
        }
        Ok(table)
    }

    pub fn discordant(&self) -> usize {
        self.a_only + self.b_only
    }

    pub fn total(&self) -> usize {
        self.both_correct + self.a_only + self.b_only + self.both_wrong
    }
}

/// Outcome of McNemar's test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McNemarResult {
    /// Continuity-corrected chi-squared statistic (1 df).
    pub statistic: f64,
    pub p_value: f64,
    pub significant: bool,
    /// The model with more exclusive wins, when the difference is significant.
    pub favored: Option<ModelSide>,
    /// Display-only summary; consumers should branch on `favored`.
    pub conclusion: String,
    pub table: ContingencyTable,
}

/// McNemar's test for two models evaluated on the same items.
///
/// Per item, a model is correct when its prediction equals the ground truth.
/// All three slices must have the same length.
pub fn mcnemar_test(
    a_predictions: &[bool],
    b_predictions: &[bool],
    ground_truth: &[bool],
    alpha: f64,
) -> Result<McNemarResult> {
    if a_predictions.len() != b_predictions.len() {
        return Err(StatsError::invalid_argument(
            "Model predictions must have same length",
        ));
    }
    if a_predictions.len() != ground_truth.len() {
        return Err(StatsError::invalid_argument(
            "Predictions and ground truth must have same length",
        ));
    }

    let a_correct: Vec<bool> = a_predictions
        .iter()
        .zip(ground_truth)
        .map(|(p, t)| p == t)
        .collect();
    let b_correct: Vec<bool> = b_predictions
        .iter()
        .zip(ground_truth)
        .map(|(p, t)| p == t)
        .collect();

    let table = ContingencyTable::from_correctness(&a_correct, &b_correct)?;
    mcnemar_from_table(table, alpha)
}

/// McNemar's test on a precomputed contingency table.
pub fn mcnemar_from_table(table: ContingencyTable, alpha: f64) -> Result<McNemarResult> {
    ensure_open_unit("alpha", alpha)?;

    let b = table.a_only as f64;
    let c = table.b_only as f64;

    // No discordant pairs: nothing distinguishes the models.
    let (statistic, p_value) = if table.discordant() == 0 {
        (0.0, 1.0)
    } else {
        let stat = ((b - c).abs() - 1.0).powi(2) / (b + c);
        (stat, chi_squared_sf(stat, 1.0)?)
    };

    let significant = p_value < alpha;
    let favored = significant.then(|| {
        if table.a_only > table.b_only {
            ModelSide::A
        } else {
            ModelSide::B
        }
    });
    let conclusion = match favored {
        Some(ModelSide::A) => "Model A significantly better than Model B".to_string(),
        Some(ModelSide::B) => "Model B significantly better than Model A".to_string(),
        None => "No significant difference between models".to_string(),
    };

    debug!(
        a_only = table.a_only,
        b_only = table.b_only,
        statistic,
        p_value,
        "McNemar test"
    );

    Ok(McNemarResult {
        statistic,
        p_value,
        significant,
        favored,
        conclusion,
        table,
    })
}

/// Standard error used by [`proportion_test`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProportionMethod {
    /// Pooled proportion under the null of equal rates.
    #[default]
    Exact,
    /// Unpooled, from the two observed proportions.
    Normal,
}

impl std::str::FromStr for ProportionMethod {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "exact" | "pooled" => Ok(Self::Exact),
            "normal" | "unpooled" => Ok(Self::Normal),
            other => Err(StatsError::invalid_argument(format!(
                "Unknown proportion test method '{other}' (expected 'exact' or 'normal')"
            ))),
        }
    }
}

/// Result of a two-proportion z-test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProportionTestResult {
    /// `accuracy_a - accuracy_b`.
    pub difference: f64,
    pub z_statistic: f64,
    pub p_value: f64,
    pub significant: bool,
    pub accuracy_a: f64,
    pub accuracy_b: f64,
}

/// Two-proportion z-test for groups of equal size `total`.
///
/// A zero standard error (both groups at 0% or 100%) yields `z = 0, p = 1`.
pub fn proportion_test(
    successes_a: i64,
    successes_b: i64,
    total: i64,
    method: ProportionMethod,
    alpha: f64,
) -> Result<ProportionTestResult> {
    ensure_counts(successes_a, total)?;
    ensure_counts(successes_b, total)?;
    ensure_open_unit("alpha", alpha)?;

    let n = total as f64;
    let p_a = successes_a as f64 / n;
    let p_b = successes_b as f64 / n;
    let diff = p_a - p_b;

    let se = match method {
        ProportionMethod::Exact => {
            let pooled = (successes_a + successes_b) as f64 / (2.0 * n);
            (2.0 * pooled * (1.0 - pooled) / n).sqrt()
        }
        ProportionMethod::Normal => ((p_a * (1.0 - p_a) + p_b * (1.0 - p_b)) / n).sqrt(),
    };

    let (z_statistic, p_value) = if se > 0.0 {
        let z = diff / se;
        (z, two_sided_normal_p(z)?)
    } else {
        (0.0, 1.0)
    };

    Ok(ProportionTestResult {
        difference: diff,
        z_statistic,
        p_value,
        significant: p_value < alpha,
        accuracy_a: p_a,
        accuracy_b: p_b,
    })
}
