//! Error types for the statistics engine.

use thiserror::Error;

/// Errors raised by statistical computations.
///
/// Input violations are never retried or coerced: the caller passed counts,
/// proportions or sequences that the requested statistic is undefined for.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StatsError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Distribution error: {0}")]
    Distribution(String),
}

impl StatsError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn distribution(msg: impl Into<String>) -> Self {
        Self::Distribution(msg.into())
    }
}

/// Result alias for statistics operations.
pub type Result<T> = std::result::Result<T, StatsError>;

/// Reject probabilities outside the open interval `(0, 1)`.
pub(crate) fn ensure_open_unit(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(StatsError::invalid_argument(format!(
            "{name} must be in (0, 1), got {value}"
        )))
    }
}

/// Reject `(correct, total)` pairs that do not describe a valid outcome count.
pub(crate) fn ensure_counts(correct: i64, total: i64) -> Result<()> {
    if total <= 0 {
        return Err(StatsError::invalid_argument(format!(
            "Total must be positive, got {total}"
        )));
    }
    if correct < 0 {
        return Err(StatsError::invalid_argument(format!(
            "Correct must be non-negative, got {correct}"
        )));
    }
    if correct > total {
        return Err(StatsError::invalid_argument(format!(
            "Correct ({correct}) cannot exceed total ({total})"
        )));
    }
    Ok(())
}
