//! # llmeval-core
//!
//! Evaluation harness for large language models.
//! Provides the provider abstraction, the benchmark runner, the whole-model
//! evaluator, paired model comparison and leaderboards, report rendering
//! and configuration.
//! Statistics come from `llmeval-stats`.

pub mod benchmarks;
pub mod compare;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod provider;
pub mod report;

// Re-export commonly used types at the crate root.
pub use benchmarks::{
    BenchmarkDataset, BenchmarkItem, BenchmarkKind, BenchmarkOutcome, BenchmarkRunner,
    BenchmarkSuiteResult, BuiltinDataset, JsonDataset,
};
pub use compare::{
    Leaderboard, LeaderboardEntry, ModelComparison, compare_models, compare_outcomes, leaderboard,
    rank_models,
};
pub use config::{
    BenchmarkConfig, EvalConfig, ProviderConfig, RetryConfig, StatisticsConfig, load_config,
};
pub use error::{ConfigError, EvalError, ProviderError, Result};
pub use evaluator::{
    AcademicResults, BenchmarkStatistics, EvaluationResults, ModelEvaluator, PerformanceMetrics,
    QualityCase, QualityMetrics,
};
pub use provider::{
    CacheStats, CachedProvider, DetectedProvider, GenerationConfig, GenerationResult, LlmProvider,
    ModelInfo, OllamaProvider, OpenAiCompatibleProvider, ProviderType, ReplayProvider,
    create_provider, detect_provider,
};
