//! # llmeval-stats: statistical inference for LLM evaluation
//!
//! Turns raw accuracy counts and per-item correctness sequences into estimates
//! that hold up in a paper: confidence intervals, significance tests between
//! models, effect sizes, and required-sample-size planning.
//!
//! Every function here is pure. Inputs are plain counts or boolean slices,
//! outputs are freshly built result structs, and invalid inputs are rejected
//! up front with [`StatsError::InvalidArgument`].
//!
//! ## References
//!
//! - Wilson (1927): confidence intervals for binomial proportions
//! - McNemar (1947): test for paired nominal data
//! - Efron & Tibshirani (1993): bootstrap methods
//! - Cohen (1988): statistical power analysis

pub mod distribution;
pub mod effect;
pub mod error;
pub mod hypothesis;
pub mod interval;
pub mod power;
pub mod summary;

pub use effect::{
    Agreement, Direction, EffectSize, Magnitude, cohens_h, cohens_kappa, interpret_kappa,
};
pub use error::{Result, StatsError};
pub use hypothesis::{
    ContingencyTable, DEFAULT_ALPHA, McNemarResult, ModelSide, ProportionMethod,
    ProportionTestResult, mcnemar_from_table, mcnemar_test, proportion_test,
};
pub use interval::{
    BootstrapConfig, ConfidenceInterval, DEFAULT_CONFIDENCE, bootstrap_interval, standard_error,
    wilson_interval,
};
pub use power::{DEFAULT_POWER, MIN_SAMPLE_SIZE, SampleSize, required_sample_size};
pub use summary::{AccuracyStatistics, DescriptiveStats, accuracy_statistics, describe};
